// SPDX-License-Identifier: GPL-3.0-only

//! Adapter for a platform-native detection engine

use super::{Detector, Point, RawDetection, Vocabulary};
use crate::backends::camera::CameraFrame;
use crate::errors::DetectorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A symbol as reported by the native engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBarcode {
    pub raw_value: String,
    /// Native format tag such as `ean_13` or `qr_code`
    pub format: String,
    pub corner_points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aim_identifier: Option<String>,
}

/// Detection engine provided by the host platform
#[async_trait]
pub trait NativeBarcodeEngine: Send + Sync {
    async fn detect(&self, frame: &CameraFrame) -> Result<Vec<NativeBarcode>, DetectorError>;
}

/// [`Detector`] backed by a [`NativeBarcodeEngine`]
pub struct NativeDetector {
    engine: Arc<dyn NativeBarcodeEngine>,
}

impl NativeDetector {
    pub fn new(engine: Arc<dyn NativeBarcodeEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Detector for NativeDetector {
    fn vocabulary(&self) -> Vocabulary {
        Vocabulary::Native
    }

    async fn detect(&self, frame: &CameraFrame) -> Vec<RawDetection> {
        let barcodes = match self.engine.detect(frame).await {
            Ok(barcodes) => barcodes,
            Err(e) => {
                warn!(error = %e, "Native detection failed");
                return Vec::new();
            }
        };

        barcodes
            .into_iter()
            .map(|barcode| {
                let vendor_payload = serde_json::to_value(&barcode).unwrap_or_default();
                RawDetection {
                    raw_value: barcode.raw_value,
                    format_tag: barcode.format,
                    corner_points: barcode.corner_points,
                    aim_identifier: barcode.aim_identifier,
                    vendor_payload,
                }
            })
            .collect()
    }
}
