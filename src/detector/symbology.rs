// SPDX-License-Identifier: GPL-3.0-only

//! Canonical symbology taxonomy
//!
//! Each detector backend reports formats in its own vocabulary. Both tables
//! below converge on [`Symbology`]; a tag missing from a table means the
//! detection is dropped before it reaches the scan history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical barcode/2D-code type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "ean8")]
    Ean8,
    #[serde(rename = "ean13")]
    Ean13,
    #[serde(rename = "upca")]
    UpcA,
    #[serde(rename = "upce")]
    UpcE,
    #[serde(rename = "code39")]
    Code39,
    #[serde(rename = "code93")]
    Code93,
    #[serde(rename = "code128")]
    Code128,
    #[serde(rename = "codabar")]
    Codabar,
    #[serde(rename = "interleaved-2-of-5")]
    Interleaved2Of5,
    #[serde(rename = "aztec-code")]
    AztecCode,
    #[serde(rename = "data-matrix")]
    DataMatrix,
    #[serde(rename = "qr-code")]
    QrCode,
    #[serde(rename = "pdf417")]
    Pdf417,
    #[serde(rename = "gs1-databar-omni")]
    Gs1DataBarOmni,
    #[serde(rename = "gs1-databar-limited")]
    Gs1DataBarLimited,
    #[serde(rename = "gs1-databar-expanded")]
    Gs1DataBarExpanded,
    #[serde(rename = "maxicode")]
    MaxiCode,
}

impl Symbology {
    pub const ALL: [Symbology; 17] = [
        Symbology::Ean8,
        Symbology::Ean13,
        Symbology::UpcA,
        Symbology::UpcE,
        Symbology::Code39,
        Symbology::Code93,
        Symbology::Code128,
        Symbology::Codabar,
        Symbology::Interleaved2Of5,
        Symbology::AztecCode,
        Symbology::DataMatrix,
        Symbology::QrCode,
        Symbology::Pdf417,
        Symbology::Gs1DataBarOmni,
        Symbology::Gs1DataBarLimited,
        Symbology::Gs1DataBarExpanded,
        Symbology::MaxiCode,
    ];

    /// Canonical identifier as used in events and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Ean8 => "ean8",
            Symbology::Ean13 => "ean13",
            Symbology::UpcA => "upca",
            Symbology::UpcE => "upce",
            Symbology::Code39 => "code39",
            Symbology::Code93 => "code93",
            Symbology::Code128 => "code128",
            Symbology::Codabar => "codabar",
            Symbology::Interleaved2Of5 => "interleaved-2-of-5",
            Symbology::AztecCode => "aztec-code",
            Symbology::DataMatrix => "data-matrix",
            Symbology::QrCode => "qr-code",
            Symbology::Pdf417 => "pdf417",
            Symbology::Gs1DataBarOmni => "gs1-databar-omni",
            Symbology::Gs1DataBarLimited => "gs1-databar-limited",
            Symbology::Gs1DataBarExpanded => "gs1-databar-expanded",
            Symbology::MaxiCode => "maxicode",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbology::ALL
            .into_iter()
            .find(|sym| sym.as_str() == s)
            .ok_or_else(|| format!("Unknown symbology: {}", s))
    }
}

/// Tag vocabulary spoken by a detector backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    /// Platform-native detection engine (`ean_13`, `qr_code`, ...)
    Native,
    /// External decoding engine behind the pixel-buffer adapter (`EAN-13`, `QR-Code`, ...)
    Engine,
}

/// Translate a backend format tag into the canonical symbology
pub fn lookup(vocabulary: Vocabulary, tag: &str) -> Option<Symbology> {
    match vocabulary {
        Vocabulary::Native => native_symbology(tag),
        Vocabulary::Engine => engine_symbology(tag),
    }
}

/// Table for the platform-native engine
fn native_symbology(tag: &str) -> Option<Symbology> {
    let symbology = match tag {
        "ean_8" => Symbology::Ean8,
        "ean_13" => Symbology::Ean13,
        "upc_a" => Symbology::UpcA,
        "upc_e" => Symbology::UpcE,
        "code_39" => Symbology::Code39,
        "code_93" => Symbology::Code93,
        "code_128" => Symbology::Code128,
        "codabar" => Symbology::Codabar,
        "itf" => Symbology::Interleaved2Of5,
        "aztec" => Symbology::AztecCode,
        "data_matrix" => Symbology::DataMatrix,
        "qr_code" | "micro_qr_code" => Symbology::QrCode,
        "pdf417" => Symbology::Pdf417,
        "databar" => Symbology::Gs1DataBarOmni,
        "databar_limited" => Symbology::Gs1DataBarLimited,
        "databar_expanded" => Symbology::Gs1DataBarExpanded,
        "maxi_code" => Symbology::MaxiCode,
        _ => return None,
    };
    Some(symbology)
}

/// Table for the external decoding engine
fn engine_symbology(tag: &str) -> Option<Symbology> {
    let symbology = match tag {
        "EAN-8" => Symbology::Ean8,
        "EAN-13" => Symbology::Ean13,
        "UPC-A" => Symbology::UpcA,
        "UPC-E" => Symbology::UpcE,
        "CODE-39" => Symbology::Code39,
        "CODE-93" => Symbology::Code93,
        "CODE-128" => Symbology::Code128,
        "Codabar" => Symbology::Codabar,
        "I2/5" => Symbology::Interleaved2Of5,
        "DataBar" => Symbology::Gs1DataBarLimited,
        "DataBar-Exp" => Symbology::Gs1DataBarExpanded,
        "QR-Code" => Symbology::QrCode,
        "PDF417" => Symbology::Pdf417,
        _ => return None,
    };
    Some(symbology)
}
