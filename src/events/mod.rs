// SPDX-License-Identifier: GPL-3.0-only

//! Scanner events
//!
//! The scanner publishes `connected`, `disconnected` and `barcode` events.
//! Hosts either register callbacks or consume a stream:
//!
//! ```rust,ignore
//! scanner.add_event_listener(EventKind::Barcode, |event| {
//!     if let ScannerEvent::Barcode(barcode) = event {
//!         println!("{} ({})", barcode.value, barcode.symbology);
//!     }
//! });
//!
//! let mut connected = Box::pin(scanner.subscribe(EventKind::Connected));
//! while let Some(event) = connected.next().await { /* ... */ }
//! ```

mod bus;
mod types;

pub use bus::{EventBus, ListenerId};
pub use types::*;
