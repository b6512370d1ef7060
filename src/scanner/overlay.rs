// SPDX-License-Identifier: GPL-3.0-only

//! Polygon overlay for the preview HUD
//!
//! Detected outlines are kept per decoded value for a short display time,
//! independently of the scan history, so the outline fades on its own
//! schedule while the value may still be suppressed.

use crate::config::HudConfig;
use crate::constants::defaults;
use crate::detector::Point;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// One outline shown on the HUD
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonOverlayEntry {
    pub value: String,
    pub timestamp: Instant,
    pub polygon: Vec<Point>,
}

/// Rectangle in overlay-buffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuideRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl GuideRect {
    /// Centred aiming guide for a buffer of the given size
    pub fn centred(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let guide_w = w * defaults::GUIDE_WIDTH_FRACTION;
        let guide_h = h * defaults::GUIDE_HEIGHT_FRACTION;
        Self {
            x: (w - guide_w) / 2.0,
            y: (h - guide_h) / 2.0,
            width: guide_w,
            height: guide_h,
        }
    }
}

/// Everything a host needs to draw the HUD for one refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HudFrame {
    /// Overlay buffer size, equal to the native frame size
    pub width: u32,
    pub height: u32,
    /// Outlines in overlay-buffer coordinates, already mirrored if needed
    pub polygons: Vec<Vec<Point>>,
    pub guide: Option<GuideRect>,
}

/// Live outlines keyed by decoded value
#[derive(Debug, Default)]
pub struct PolygonOverlay {
    entries: HashMap<String, PolygonOverlayEntry>,
}

impl PolygonOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or refresh the outline for a value
    pub fn record(&mut self, value: &str, polygon: Vec<Point>, now: Instant) {
        if polygon.is_empty() {
            return;
        }
        self.entries.insert(
            value.to_string(),
            PolygonOverlayEntry {
                value: value.to_string(),
                timestamp: now,
                polygon,
            },
        );
    }

    /// Drop outlines shown for longer than `ttl`
    pub fn prune(&mut self, now: Instant, ttl: Duration) {
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.timestamp) <= ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the HUD contents for an overlay buffer of `width` x `height`
    pub fn frame(&self, width: u32, height: u32, mirrored: bool, hud: &HudConfig) -> HudFrame {
        let polygons = if hud.outline {
            self.entries
                .values()
                .map(|entry| {
                    entry
                        .polygon
                        .iter()
                        .map(|p| {
                            if mirrored {
                                Point::new(width as f32 - p.x, p.y)
                            } else {
                                *p
                            }
                        })
                        .collect()
                })
                .collect()
        } else {
            Vec::new()
        };

        HudFrame {
            width,
            height,
            polygons,
            guide: hud.guide.then(|| GuideRect::centred(width, height)),
        }
    }
}
