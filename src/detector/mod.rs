// SPDX-License-Identifier: GPL-3.0-only

//! Pluggable barcode detection
//!
//! The scan pipeline only sees the [`Detector`] trait. Two adapters implement
//! it:
//!
//! - [`native::NativeDetector`] wraps a platform detection engine that works
//!   on frames directly.
//! - [`fallback::PixelBufferDetector`] rasterizes each frame into a luma
//!   buffer and forwards it to a [`fallback::DecodeService`], typically the
//!   isolated [`worker::DecodeWorker`].
//!
//! Which one is used is decided once by [`setup_detector`]. The fallback only
//! becomes available after its service reports ready, so callers wait on the
//! [`DetectorSlot`].

pub mod fallback;
pub mod native;
pub mod qr;
pub mod symbology;
pub mod worker;

pub use symbology::{Symbology, Vocabulary};

use crate::backends::camera::CameraFrame;
use crate::config::Config;
use crate::constants::readiness;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// A point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One symbol found by a detector in one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Decoded text
    pub raw_value: String,
    /// Backend-specific format tag, resolved through [`symbology::lookup`]
    pub format_tag: String,
    /// Symbol outline, normally the four corners in order
    pub corner_points: Vec<Point>,
    /// AIM symbology identifier when the engine reports one
    pub aim_identifier: Option<String>,
    /// Untouched backend result, attached to events in debug mode
    pub vendor_payload: serde_json::Value,
}

/// Frame detector capability
///
/// Implementations never fail: engine errors are logged and reported as an
/// empty detection list.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Vocabulary of the format tags this detector reports
    fn vocabulary(&self) -> Vocabulary;

    /// Detect all symbols in a frame
    async fn detect(&self, frame: &CameraFrame) -> Vec<RawDetection>;
}

/// Which adapter was selected at setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorBackend {
    Native,
    Fallback,
}

/// Holder for the detector once it is ready
#[derive(Default)]
pub struct DetectorSlot {
    detector: RwLock<Option<Arc<dyn Detector>>>,
}

impl DetectorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that is ready immediately
    pub fn with_detector(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector: RwLock::new(Some(detector)),
        }
    }

    pub fn install(&self, detector: Arc<dyn Detector>) {
        *self.detector.write().unwrap() = Some(detector);
    }

    pub fn get(&self) -> Option<Arc<dyn Detector>> {
        self.detector.read().unwrap().clone()
    }

    /// Poll for the detector over the bounded readiness window
    pub async fn wait_until_ready(&self) -> Option<Arc<dyn Detector>> {
        for _ in 0..=readiness::MAX_ATTEMPTS {
            if let Some(detector) = self.get() {
                return Some(detector);
            }
            tokio::time::sleep(readiness::POLL_INTERVAL).await;
        }
        self.get()
    }
}

/// Detection capabilities offered by the host
#[derive(Default, Clone)]
pub struct DetectorSources {
    /// Platform-native engine, preferred unless `useFallback` is set
    pub native: Option<Arc<dyn native::NativeBarcodeEngine>>,
    /// External decoding capability for the pixel-buffer adapter
    pub decoder: Option<Arc<dyn fallback::DecodeService>>,
}

/// Choose a detector backend and arrange for the slot to be filled
///
/// The native engine is installed immediately. The fallback is installed by a
/// background task once its decode service reports ready, so this must be
/// called from within a Tokio runtime.
pub fn setup_detector(
    config: &Config,
    sources: DetectorSources,
    slot: &Arc<DetectorSlot>,
) -> Option<DetectorBackend> {
    if let Some(engine) = sources.native.filter(|_| !config.use_fallback) {
        info!("Using native detection engine");
        slot.install(Arc::new(native::NativeDetector::new(engine)));
        return Some(DetectorBackend::Native);
    }

    let Some(service) = sources.decoder else {
        warn!("No detector backend available");
        return None;
    };

    info!("Using pixel-buffer fallback detector");
    let include_polygon = config.wants_polygons();
    let slot = Arc::clone(slot);
    tokio::spawn(async move {
        if service.wait_ready().await {
            slot.install(Arc::new(fallback::PixelBufferDetector::new(
                service,
                include_polygon,
            )));
            info!("Fallback detector ready");
        } else {
            warn!("Decode service failed to start");
        }
    });

    Some(DetectorBackend::Fallback)
}
