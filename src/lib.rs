// SPDX-License-Identifier: GPL-3.0-only

//! Live-video barcode scanning
//!
//! A [`Scanner`] owns one camera session at a time: it acquires a stream,
//! hands frames to a detector backend, deduplicates what it finds and reports
//! `connected`, `disconnected` and `barcode` events to the host.
//!
//! ```no_run
//! use webcam_barcode_scanner::{Config, EventKind, Scanner, ScannerEvent};
//!
//! # async fn run() {
//! let scanner = Scanner::builder(Config::default()).build();
//! scanner.add_event_listener(EventKind::Barcode, |event| {
//!     if let ScannerEvent::Barcode(barcode) = event {
//!         println!("{} ({})", barcode.value, barcode.symbology);
//!     }
//! });
//! scanner.connect().await;
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod detector;
pub mod errors;
pub mod events;
pub mod feedback;
pub mod scanner;

pub use config::Config;
pub use detector::Symbology;
pub use errors::{ScannerError, ScannerResult};
pub use events::{BarcodeEvent, ConnectedEvent, EventKind, ScannerEvent};
pub use scanner::{Scanner, ScannerBuilder};
