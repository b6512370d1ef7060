// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning from a live camera
//! - Decoding still images through the same pipeline

use chrono::Local;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use webcam_barcode_scanner::backends::camera::virtual_camera::{
    VirtualBackend, VirtualDevice, load_image_as_frame,
};
use webcam_barcode_scanner::backends::camera::{CameraBackendType, get_backend_for_type};
use webcam_barcode_scanner::detector::qr::RqrrDecoder;
use webcam_barcode_scanner::detector::worker::{DecodeWorker, SymbolDecoder};
use webcam_barcode_scanner::feedback::LogFeedback;
use webcam_barcode_scanner::scanner::devices;
use webcam_barcode_scanner::{Config, EventKind, Scanner, ScannerEvent, Symbology};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Load the config file given on the command line, or the user's default one
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Config::load(path)?);
    }
    match Config::default_path().filter(|p| p.exists()) {
        Some(path) => Ok(Config::load(&path)?),
        None => Ok(Config::default()),
    }
}

/// List all available cameras
pub async fn list_cameras(config: &Config) -> CliResult {
    let backend = get_backend_for_type(config.backend);
    let cameras = devices::enumerate(backend.as_ref()).await?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  [{}] {}", camera.id, camera.label);
        println!("      Location: {}", camera.location);
        println!();
    }

    Ok(())
}

/// Flags of the `scan` command
pub struct ScanOptions {
    pub allow: Vec<String>,
    pub json: bool,
    pub debug: bool,
    pub fallback: bool,
}

/// Scan from a camera until Ctrl+C
pub async fn scan(mut config: Config, device: Option<String>, options: ScanOptions) -> CliResult {
    if !options.allow.is_empty() {
        config.allowed_symbologies = options
            .allow
            .iter()
            .map(|s| s.parse::<Symbology>())
            .collect::<Result<_, _>>()?;
    }
    config.debug |= options.debug;
    config.use_fallback |= options.fallback;
    config.preview.enabled = false;
    let json = options.json;

    let scanner = Scanner::builder(config)
        .decode_service(Arc::new(spawn_decoder()?))
        .feedback(Arc::new(LogFeedback))
        .build();

    for kind in [EventKind::Connected, EventKind::Disconnected, EventKind::Barcode] {
        scanner.add_event_listener(kind, move |event| print_event(event, json));
    }

    scanner.reconnect(device.as_deref()).await;
    if !scanner.is_connected() {
        return Err("No camera could be opened".into());
    }

    if !json {
        println!("Scanning... Press Ctrl+C to stop");
    }
    tokio::signal::ctrl_c().await?;

    scanner.disconnect().await;
    Ok(())
}

/// Run each image through a virtual camera and report what it contains
pub async fn decode_images(mut config: Config, paths: Vec<PathBuf>, json: bool) -> CliResult {
    config.backend = CameraBackendType::Virtual;
    config.preview.enabled = false;
    config.beep_on_scan = false;

    let service = Arc::new(spawn_decoder()?);
    let wait = config.camera_wait() + config.detector_timeout();

    for path in paths {
        let frame = load_image_as_frame(&path)?;
        let label = path.display().to_string();
        let backend = VirtualBackend::new()
            .with_device(VirtualDevice::new("image", label.as_str()).with_frame(frame));

        let scanner = Scanner::builder(config.clone())
            .backend(Arc::new(backend))
            .decode_service(service.clone())
            .build();
        let mut barcodes = std::pin::pin!(scanner.subscribe(EventKind::Barcode));

        scanner.connect().await;
        match tokio::time::timeout(wait, barcodes.next()).await {
            Ok(Some(event)) => {
                if !json {
                    print!("{}: ", label);
                }
                print_event(&event, json);
            }
            _ => {
                if json {
                    println!("{}", serde_json::json!({ "file": label, "event": null }));
                } else {
                    println!("{}: no barcode found", label);
                }
            }
        }
        scanner.disconnect().await;
    }

    Ok(())
}

fn spawn_decoder() -> std::io::Result<DecodeWorker> {
    DecodeWorker::spawn(|| Box::new(RqrrDecoder::new()) as Box<dyn SymbolDecoder>)
}

fn print_event(event: &ScannerEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to encode event: {}", e),
        }
        return;
    }

    let timestamp = Local::now().format("%H:%M:%S%.3f");
    match event {
        ScannerEvent::Connected(connected) => println!(
            "[{}] connected ({}) {}",
            timestamp,
            connected.kind,
            connected.device_id.as_deref().unwrap_or("unknown device")
        ),
        ScannerEvent::Disconnected => println!("[{}] disconnected", timestamp),
        ScannerEvent::Barcode(barcode) => {
            println!("[{}] {} {}", timestamp, barcode.symbology, barcode.value);
            if let Some(data) = &barcode.data {
                println!("      data: {}", data);
            }
        }
    }
}
