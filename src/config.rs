// SPDX-License-Identifier: GPL-3.0-only

//! Scanner options
//!
//! The options mirror the flat object a host hands to the scanner and can be
//! loaded from JSON. Every key is optional.

use crate::backends::camera::{CameraBackendType, Resolution};
use crate::constants::{defaults, timing};
use crate::detector::Symbology;
use crate::errors::{ScannerError, ScannerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name inside the user config directory
const CONFIG_FILE: &str = "webcam-barcode-scanner/config.json";

/// Screen corner the preview is anchored to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreviewPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

/// Heads-up display drawn over the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HudSetting")]
pub struct HudConfig {
    pub enabled: bool,
    /// Draw a centred aiming guide
    pub guide: bool,
    /// Outline detected symbols
    pub outline: bool,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            guide: false,
            outline: true,
        }
    }
}

/// Accepted shapes for `preview.hud`
#[derive(Deserialize)]
#[serde(untagged)]
enum HudSetting {
    Toggle(bool),
    Detailed {
        #[serde(default = "default_true")]
        enabled: bool,
        #[serde(default)]
        guide: bool,
        #[serde(default = "default_true")]
        outline: bool,
    },
}

fn default_true() -> bool {
    true
}

impl From<HudSetting> for HudConfig {
    fn from(setting: HudSetting) -> Self {
        match setting {
            HudSetting::Toggle(enabled) => Self {
                enabled,
                ..Self::default()
            },
            HudSetting::Detailed {
                enabled,
                guide,
                outline,
            } => Self {
                enabled,
                guide,
                outline,
            },
        }
    }
}

/// Preview widget options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewConfig {
    pub enabled: bool,
    pub draggable: bool,
    /// Mirror front cameras
    pub mirrored: bool,
    /// Length of the preview's long edge in pixels
    pub size: u32,
    pub position: PreviewPosition,
    pub padding: u32,
    pub radius: u32,
    pub z_index: i32,
    pub hud: HudConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            draggable: false,
            mirrored: true,
            size: defaults::PREVIEW_SIZE,
            position: PreviewPosition::default(),
            padding: defaults::PREVIEW_PADDING,
            radius: defaults::PREVIEW_RADIUS,
            z_index: defaults::PREVIEW_Z_INDEX,
            hud: HudConfig::default(),
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Attach the raw detector payload to barcode events
    pub debug: bool,
    /// Symbologies to report; empty reports everything
    pub allowed_symbologies: Vec<Symbology>,
    /// Prefer the pixel-buffer fallback over a native engine
    pub use_fallback: bool,
    pub beep_on_scan: bool,
    /// Requested capture resolution
    pub resolution: Resolution,
    pub preview: PreviewConfig,
    /// Camera backend used by the command-line tool
    pub backend: CameraBackendType,
    pub dedup_window_ms: u64,
    pub camera_wait_ms: u64,
    pub detector_timeout_ms: u64,
    pub frame_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            allowed_symbologies: Vec::new(),
            use_fallback: false,
            beep_on_scan: true,
            resolution: Resolution::default(),
            preview: PreviewConfig::default(),
            backend: CameraBackendType::default(),
            dedup_window_ms: timing::DEDUP_WINDOW.as_millis() as u64,
            camera_wait_ms: timing::CAMERA_WAIT.as_millis() as u64,
            detector_timeout_ms: timing::DETECTOR_TIMEOUT.as_millis() as u64,
            frame_interval_ms: timing::FRAME_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Parse a JSON options object
    pub fn from_json(json: &str) -> ScannerResult<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load options from a JSON file
    pub fn load(path: &Path) -> ScannerResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScannerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Location of the per-user config file, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Reject values the scanner cannot work with
    pub fn validate(&self) -> ScannerResult<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ScannerError::Config(format!(
                "resolution must be non-zero, got {}",
                self.resolution
            )));
        }
        if self.preview.size == 0 {
            return Err(ScannerError::Config("preview.size must be non-zero".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(ScannerError::Config("frameIntervalMs must be non-zero".into()));
        }
        if self.dedup_window_ms == 0 {
            return Err(ScannerError::Config("dedupWindowMs must be non-zero".into()));
        }
        Ok(())
    }

    /// Whether events of this symbology may be emitted
    pub fn allows(&self, symbology: Symbology) -> bool {
        self.allowed_symbologies.is_empty() || self.allowed_symbologies.contains(&symbology)
    }

    /// Whether the HUD wants symbol outlines
    pub fn wants_polygons(&self) -> bool {
        self.preview.enabled && self.preview.hud.enabled
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn camera_wait(&self) -> Duration {
        Duration::from_millis(self.camera_wait_ms)
    }

    pub fn detector_timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.beep_on_scan);
        assert_eq!(config.resolution.width, 1920);
        assert_eq!(config.preview.position, PreviewPosition::BottomRight);
    }

    #[test]
    fn test_hud_accepts_bool_and_object() {
        let config = Config::from_json(r#"{"preview": {"hud": false}}"#).unwrap();
        assert!(!config.preview.hud.enabled);
        assert!(config.preview.hud.outline);

        let config = Config::from_json(r#"{"preview": {"hud": {"guide": true}}}"#).unwrap();
        assert!(config.preview.hud.enabled);
        assert!(config.preview.hud.guide);
    }

    #[test]
    fn test_allow_list() {
        let config = Config::from_json(r#"{"allowedSymbologies": ["qr-code", "ean13"]}"#).unwrap();
        assert!(config.allows(Symbology::QrCode));
        assert!(!config.allows(Symbology::Ean8));
        assert!(Config::default().allows(Symbology::Ean8));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_json(r#"{"resolution": {"width": 0, "height": 10}}"#).is_err());
        assert!(Config::from_json(r#"{"frameIntervalMs": 0}"#).is_err());
        assert!(Config::from_json(r#"{"allowedSymbologies": ["isbn"]}"#).is_err());
    }

    #[test]
    fn test_polygons_need_preview_and_hud() {
        let mut config = Config::default();
        assert!(config.wants_polygons());
        config.preview.enabled = false;
        assert!(!config.wants_polygons());
    }
}
