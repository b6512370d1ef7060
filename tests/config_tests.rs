// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use std::io::Write;
use webcam_barcode_scanner::backends::camera::CameraBackendType;
use webcam_barcode_scanner::config::PreviewPosition;
use webcam_barcode_scanner::{Config, Symbology};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.preview.enabled, "Preview should be enabled by default");
    assert!(config.preview.mirrored, "Front cameras should be mirrored by default");
    assert!(!config.use_fallback);
    assert!(config.allowed_symbologies.is_empty());
    assert_eq!(config.dedup_window_ms, 2000);
    assert_eq!(config.camera_wait_ms, 2000);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "debug": true,
            "useFallback": true,
            "beepOnScan": false,
            "allowedSymbologies": ["ean8", "interleaved-2-of-5"],
            "resolution": {{ "width": 1280, "height": 720 }},
            "preview": {{ "position": "top-left", "size": 320, "hud": false }},
            "backend": "virtual"
        }}"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert!(config.debug);
    assert!(config.use_fallback);
    assert!(!config.beep_on_scan);
    assert_eq!(
        config.allowed_symbologies,
        vec![Symbology::Ean8, Symbology::Interleaved2Of5]
    );
    assert_eq!((config.resolution.width, config.resolution.height), (1280, 720));
    assert_eq!(config.preview.position, PreviewPosition::TopLeft);
    assert_eq!(config.preview.size, 320);
    assert!(!config.wants_polygons());
    assert_eq!(config.backend, CameraBackendType::Virtual);
}

#[test]
fn test_missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_invalid_values_are_rejected() {
    assert!(Config::from_json(r#"{"frameIntervalMs": 0}"#).is_err());
    assert!(Config::from_json(r#"{"resolution": {"width": 0, "height": 480}}"#).is_err());
    assert!(Config::from_json(r#"{"allowedSymbologies": ["isbn"]}"#).is_err());
}

#[test]
fn test_default_path_is_per_user() {
    if let Some(path) = Config::default_path() {
        assert!(path.ends_with("webcam-barcode-scanner/config.json"));
    }
}
