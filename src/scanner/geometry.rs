// SPDX-License-Identifier: GPL-3.0-only

//! Preview sizing
//!
//! Derived numbers only: the on-screen preview size follows the native
//! stream size with the long edge fitted to the configured preview size.

use crate::config::{PreviewConfig, PreviewPosition};
use serde::Serialize;

/// Physical orientation relative to the negotiated stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Normal,
    /// Quarter-turn: width and height are swapped
    Rotated,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Normal => Orientation::Rotated,
            Orientation::Rotated => Orientation::Normal,
        }
    }
}

/// Geometry derived from the active stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewGeometry {
    /// Native frame size, also the overlay buffer size
    pub native_width: u32,
    pub native_height: u32,
    /// On-screen preview size
    pub width: f32,
    pub height: f32,
    pub orientation: Orientation,
    /// Whether the preview (and HUD) is mirrored
    pub mirrored: bool,
}

impl PreviewGeometry {
    /// Fit a native `width` x `height` stream into the preview size
    ///
    /// Landscape streams fit the width, portrait streams fit the height.
    pub fn compute(
        native_width: u32,
        native_height: u32,
        preview: &PreviewConfig,
        stream_mirrored: bool,
        orientation: Orientation,
    ) -> Self {
        let size = preview.size as f32;
        let (w, h) = (native_width.max(1) as f32, native_height.max(1) as f32);

        let (width, height) = if native_width >= native_height {
            (size, size * h / w)
        } else {
            (size * w / h, size)
        };

        Self {
            native_width,
            native_height,
            width,
            height,
            orientation,
            mirrored: stream_mirrored && preview.mirrored,
        }
    }

    /// Geometry after a quarter turn of the device
    pub fn rotated(&self, preview: &PreviewConfig) -> Self {
        Self::compute(
            self.native_height,
            self.native_width,
            preview,
            self.mirrored,
            self.orientation.toggled(),
        )
    }

    /// Layout handed to the preview host
    pub fn layout(&self, preview: &PreviewConfig) -> PreviewLayout {
        PreviewLayout {
            width: self.width,
            height: self.height,
            overlay_width: self.native_width,
            overlay_height: self.native_height,
            position: preview.position,
            padding: preview.padding,
            radius: preview.radius,
            z_index: preview.z_index,
            draggable: preview.draggable,
            mirrored: self.mirrored,
            hud: preview.hud.enabled,
        }
    }
}

/// Container layout for the preview host
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewLayout {
    pub width: f32,
    pub height: f32,
    pub overlay_width: u32,
    pub overlay_height: u32,
    pub position: PreviewPosition,
    pub padding: u32,
    pub radius: u32,
    pub z_index: i32,
    pub draggable: bool,
    pub mirrored: bool,
    pub hud: bool,
}
