// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 camera capture
//!
//! Enumerates `/dev/video*` capture nodes and streams frames through a
//! memory-mapped V4L2 stream on a dedicated capture thread. YUYV, NV12,
//! GREY and RGB3 frames are passed through untouched; MJPEG frames are
//! decoded to RGBA with the `image` crate.
//!
//! V4L2 exposes no facing information, so every device reports no facing
//! modes and the session classifies it as front-facing.

use super::frame_loop::CaptureThread;
use super::frame_slot::FrameSlot;
use super::types::*;
use super::{CameraBackend, CaptureStream};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream as _;
use v4l::prelude::*;
use v4l::video::Capture;

/// Number of mmap buffers requested from the driver
const BUFFER_COUNT: u32 = 4;

/// V4L2 camera backend
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

/// List capture-capable V4L2 nodes (blocking)
fn enumerate_capture_nodes() -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();

    for node in v4l::context::enum_devices() {
        let path = node.path().to_string_lossy().to_string();
        let caps = match Device::with_path(&path).and_then(|dev| dev.query_caps()) {
            Ok(caps) => caps,
            Err(e) => {
                debug!(path = %path, error = %e, "Skipping unreadable V4L2 node");
                continue;
            }
        };

        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            trace!(path = %path, "Skipping non-capture V4L2 node");
            continue;
        }

        let label = if caps.card.is_empty() {
            node.name().unwrap_or_else(|| path.clone())
        } else {
            caps.card.clone()
        };

        devices.push(DeviceDescriptor {
            id: path.clone(),
            label,
            kind: DeviceKind::VideoInput,
            capabilities: TrackCapabilities {
                device_id: Some(path),
                facing_modes: None,
            },
        });
    }

    devices
}

#[async_trait]
impl CameraBackend for V4l2Backend {
    async fn enumerate_devices(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        tokio::task::spawn_blocking(enumerate_capture_nodes)
            .await
            .map_err(|e| BackendError::Other(format!("Enumeration task failed: {}", e)))
    }

    async fn open_stream(&self, request: &StreamRequest) -> BackendResult<Arc<dyn CaptureStream>> {
        let request = request.clone();
        let stream = tokio::task::spawn_blocking(move || V4l2Stream::open(&request))
            .await
            .map_err(|e| BackendError::Other(format!("Open task failed: {}", e)))??;
        Ok(Arc::new(stream))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

/// A running V4L2 capture
pub struct V4l2Stream {
    id: String,
    device_path: String,
    settings: StreamSettings,
    slot: Arc<FrameSlot>,
    capture: Mutex<Option<CaptureThread>>,
}

impl V4l2Stream {
    /// Open the requested device and start capturing (blocking)
    fn open(request: &StreamRequest) -> BackendResult<Self> {
        let device_path = match &request.device_id {
            Some(id) => id.clone(),
            None => enumerate_capture_nodes()
                .into_iter()
                .next()
                .map(|d| d.id)
                .ok_or_else(|| BackendError::DeviceNotFound("No V4L2 capture devices".into()))?,
        };

        let slot = Arc::new(FrameSlot::new());
        let (settings_tx, settings_rx) = std::sync::mpsc::channel();
        let thread_slot = Arc::clone(&slot);
        let thread_path = device_path.clone();
        let resolution = request.resolution;

        info!(device = %device_path, ?resolution, "Opening V4L2 stream");

        let capture = CaptureThread::spawn("v4l2-capture", move |ctx| {
            let dev = Device::with_path(&thread_path)
                .map_err(|e| format!("Failed to open V4L2 device {}: {}", thread_path, e))?;

            let mut format = dev
                .format()
                .map_err(|e| format!("Failed to query format: {}", e))?;
            if let Some(res) = resolution {
                format.width = res.width;
                format.height = res.height;
                format.fourcc = v4l::FourCC::new(b"YUYV");
            }
            let format = match dev.set_format(&format) {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, "Could not set format, using current device format");
                    dev.format()
                        .map_err(|e| format!("Failed to query format: {}", e))?
                }
            };

            let fourcc = format.fourcc.str().unwrap_or("????").to_string();
            let pixel_format = PixelFormat::from_fourcc(&fourcc);
            if pixel_format.is_none() && fourcc != "MJPG" {
                return Err(format!("Unsupported V4L2 pixel format {}", fourcc));
            }

            info!(
                width = format.width,
                height = format.height,
                fourcc = %fourcc,
                "Negotiated V4L2 format"
            );

            let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT)
                .map_err(|e| format!("Failed to create buffer stream: {}", e))?;

            let _ = settings_tx.send(StreamSettings {
                width: format.width,
                height: format.height,
            });
            ctx.ready();

            while !ctx.should_stop() {
                let (buf, meta) = match stream.next() {
                    Ok(next) => next,
                    Err(e) => {
                        warn!(error = %e, "Failed to capture frame");
                        std::thread::sleep(std::time::Duration::from_millis(10));
                        continue;
                    }
                };

                let frame = match pixel_format {
                    Some(pf) => Some(CameraFrame {
                        width: format.width,
                        height: format.height,
                        data: Arc::from(buf),
                        format: pf,
                        stride: format.stride,
                        captured_at: Instant::now(),
                    }),
                    None => decode_mjpeg(buf),
                };

                match frame {
                    Some(frame) => thread_slot.publish(frame),
                    None => trace!(sequence = meta.sequence, "Dropped undecodable frame"),
                }
            }

            Ok(())
        })
        .map_err(BackendError::InitializationFailed)?;

        let settings = settings_rx
            .recv()
            .map_err(|_| BackendError::InitializationFailed("No format negotiated".into()))?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_path,
            settings,
            slot,
            capture: Mutex::new(Some(capture)),
        })
    }
}

/// Decode an MJPEG buffer into an RGBA frame
fn decode_mjpeg(buf: &[u8]) -> Option<CameraFrame> {
    let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg).ok()?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Some(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

#[async_trait]
impl CaptureStream for V4l2Stream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<TrackCapabilities> {
        vec![TrackCapabilities {
            device_id: Some(self.device_path.clone()),
            facing_modes: None,
        }]
    }

    fn settings(&self) -> StreamSettings {
        self.settings
    }

    fn latest_frame(&self) -> Option<CameraFrame> {
        self.slot.latest()
    }

    async fn first_frame(&self) {
        self.slot.wait_first_frame().await
    }

    fn stop(&self) {
        self.slot.close();
        if let Some(capture) = self.capture.lock().unwrap().take() {
            debug!(device = %self.device_path, "Stopping V4L2 stream");
            capture.request_stop();
            // Joining waits for the current dequeue; keep that off the caller
            std::thread::spawn(move || drop(capture));
        }
    }

    fn is_live(&self) -> bool {
        self.slot.is_live()
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}
