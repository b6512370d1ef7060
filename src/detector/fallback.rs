// SPDX-License-Identifier: GPL-3.0-only

//! Pixel-buffer fallback detector
//!
//! Frames are rasterized into a reusable 8-bit luma buffer and handed to an
//! external [`DecodeService`]. The buffer follows the frame dimensions and is
//! reset whenever a frame cannot be read, so a transient capture failure only
//! costs that one frame.

use super::{Detector, Point, RawDetection, Vocabulary};
use crate::backends::camera::{CameraFrame, PixelFormat};
use crate::errors::DetectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Options passed with every decode request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Compute the symbol outline (only needed when the HUD draws it)
    pub include_polygon: bool,
}

/// One decode request: a tightly packed luma raster
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
    pub options: DecodeOptions,
}

/// Result of a successful decode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedSymbol {
    pub data: String,
    /// Engine symbology tag such as `EAN-13` or `QR-Code`
    pub symbol: String,
    pub polygon: Vec<Point>,
}

/// External decoding capability
///
/// `decode` reports at most one symbol per request and `None` for both "no
/// symbol" and engine failures.
#[async_trait]
pub trait DecodeService: Send + Sync {
    /// Resolve once the service can accept requests; `false` if it never will
    async fn wait_ready(&self) -> bool {
        true
    }

    async fn decode(&self, request: DecodeRequest) -> Option<DecodedSymbol>;
}

/// Reusable luma raster
#[derive(Debug, Default)]
struct PixelBuffer {
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl PixelBuffer {
    fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.luma.clear();
    }

    fn ensure_size(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            debug!(width, height, "Resizing pixel buffer");
            self.width = width;
            self.height = height;
            self.luma.resize(width as usize * height as usize, 0);
        }
    }

    /// Fill the buffer from a frame
    fn rasterize(&mut self, frame: &CameraFrame) -> Result<(), DetectorError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DetectorError::Capture("empty frame".into()));
        }
        if !frame.is_complete() {
            return Err(DetectorError::Capture(format!(
                "incomplete {}x{} frame ({} bytes)",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }

        self.ensure_size(frame.width, frame.height);

        let width = frame.width as usize;
        let stride = frame.stride as usize;
        for (y, out) in self.luma.chunks_exact_mut(width).enumerate() {
            let row = &frame.data[y * stride..];
            match frame.format {
                PixelFormat::RGBA => fill_from_rgb(out, row, 4, [0, 1, 2]),
                PixelFormat::BGRA => fill_from_rgb(out, row, 4, [2, 1, 0]),
                PixelFormat::RGB24 => fill_from_rgb(out, row, 3, [0, 1, 2]),
                PixelFormat::Gray8 | PixelFormat::NV12 => out.copy_from_slice(&row[..width]),
                PixelFormat::YUYV => {
                    for (x, px) in out.iter_mut().enumerate() {
                        *px = row[x * 2];
                    }
                }
            }
        }

        Ok(())
    }
}

/// BT.601 luma for 8-bit RGB
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 66 + g as u32 * 129 + b as u32 * 25 + 4096) >> 8) as u8
}

fn fill_from_rgb(out: &mut [u8], row: &[u8], bpp: usize, [r, g, b]: [usize; 3]) {
    for (px, src) in out.iter_mut().zip(row.chunks_exact(bpp)) {
        *px = luma(src[r], src[g], src[b]);
    }
}

/// [`Detector`] feeding a [`DecodeService`] with rasterized frames
pub struct PixelBufferDetector {
    service: Arc<dyn DecodeService>,
    options: DecodeOptions,
    buffer: Mutex<PixelBuffer>,
}

impl PixelBufferDetector {
    pub fn new(service: Arc<dyn DecodeService>, include_polygon: bool) -> Self {
        Self {
            service,
            options: DecodeOptions { include_polygon },
            buffer: Mutex::new(PixelBuffer::default()),
        }
    }

    fn prepare(&self, frame: &CameraFrame) -> Result<DecodeRequest, DetectorError> {
        let mut buffer = self.buffer.lock().unwrap();
        if let Err(e) = buffer.rasterize(frame) {
            buffer.reset();
            return Err(e);
        }
        Ok(DecodeRequest {
            width: buffer.width,
            height: buffer.height,
            luma: buffer.luma.clone(),
            options: self.options,
        })
    }
}

#[async_trait]
impl Detector for PixelBufferDetector {
    fn vocabulary(&self) -> Vocabulary {
        Vocabulary::Engine
    }

    async fn detect(&self, frame: &CameraFrame) -> Vec<RawDetection> {
        let request = match self.prepare(frame) {
            Ok(request) => request,
            Err(e) => {
                trace!(error = %e, "Skipping frame");
                return Vec::new();
            }
        };

        let Some(symbol) = self.service.decode(request).await else {
            return Vec::new();
        };

        let vendor_payload = serde_json::to_value(&symbol).unwrap_or_default();
        vec![RawDetection {
            raw_value: symbol.data,
            format_tag: symbol.symbol,
            corner_points: symbol.polygon,
            aim_identifier: None,
            vendor_payload,
        }]
    }
}
