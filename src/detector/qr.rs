// SPDX-License-Identifier: GPL-3.0-only

//! QR decoding engine based on `rqrr`

use super::worker::{ScanResult, SymbolDecoder};
use tracing::{debug, trace};

/// Engine tag reported for QR codes
pub const QR_SYMBOL: &str = "QR-Code";

/// [`SymbolDecoder`] finding QR codes with `rqrr`
#[derive(Debug, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl SymbolDecoder for RqrrDecoder {
    fn scan(&mut self, width: u32, height: u32, luma: &[u8]) -> Result<Option<ScanResult>, String> {
        let (w, h) = (width as usize, height as usize);
        if luma.len() < w * h {
            return Err(format!(
                "raster too short for {}x{}: {} bytes",
                width,
                height,
                luma.len()
            ));
        }

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| luma[y * w + x]);
        let grids = prepared.detect_grids();
        trace!(count = grids.len(), "QR grids found");

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let points = grid
                        .bounds
                        .iter()
                        .map(|p| (p.x as f32, p.y as f32))
                        .collect();
                    return Ok(Some(ScanResult {
                        symbol: QR_SYMBOL.to_string(),
                        data: content,
                        points,
                    }));
                }
                Err(e) => debug!(error = ?e, "Failed to decode QR grid"),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_raster_has_no_symbol() {
        let mut decoder = RqrrDecoder::new();
        assert_eq!(decoder.scan(64, 64, &[255; 64 * 64]).unwrap(), None);
    }

    #[test]
    fn test_short_raster_is_rejected() {
        let mut decoder = RqrrDecoder::new();
        assert!(decoder.scan(64, 64, &[0; 10]).is_err());
    }
}
