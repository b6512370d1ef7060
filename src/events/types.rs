// SPDX-License-Identifier: GPL-3.0-only

//! Event types published to the host

use crate::detector::{Point, Symbology};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event names a listener can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connected,
    Disconnected,
    Barcode,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Barcode => "barcode",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(EventKind::Connected),
            "disconnected" => Ok(EventKind::Disconnected),
            "barcode" => Ok(EventKind::Barcode),
            other => Err(format!("Unknown event: {}", other)),
        }
    }
}

/// A stream was acquired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    /// Connection type, always `webcam`
    #[serde(rename = "type")]
    pub kind: String,
    pub device_id: Option<String>,
}

/// A symbol was accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeEvent {
    pub value: String,
    pub symbology: Symbology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aim_identifier: Option<String>,
    /// Structured payload produced by the configured parser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Raw detector output, only in debug mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

/// Everything the scanner publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ScannerEvent {
    Connected(ConnectedEvent),
    Disconnected,
    Barcode(BarcodeEvent),
}

impl ScannerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ScannerEvent::Connected(_) => EventKind::Connected,
            ScannerEvent::Disconnected => EventKind::Disconnected,
            ScannerEvent::Barcode(_) => EventKind::Barcode,
        }
    }
}
