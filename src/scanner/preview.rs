// SPDX-License-Identifier: GPL-3.0-only

//! Host-side preview surface
//!
//! The scanner decides what is shown and when; the host draws it. A preview
//! container holds at most one attached stream surface at a time once a
//! switch completes, plus an optional frozen snapshot during exclusive-camera
//! switches.

use super::devices::Device;
use super::geometry::PreviewLayout;
use crate::backends::camera::CaptureStream;
use std::fmt;
use std::sync::Arc;

/// Identifier of an attached stream surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(pub u64);

/// Identifier of a frozen last-frame image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub u64);

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview-{}", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot-{}", self.0)
    }
}

/// Preview widget implemented by the host
///
/// All calls are made from the scanner's session logic and must not block.
pub trait PreviewHost: Send + Sync {
    /// Create the container and the camera menu
    fn show_container(&self, layout: &PreviewLayout, devices: &[Device]);

    /// Render `stream` in a new surface inside the container
    fn attach(&self, id: PreviewId, stream: Arc<dyn CaptureStream>, layout: &PreviewLayout);

    /// Remove a surface; the stream itself is stopped by the scanner
    fn detach(&self, id: PreviewId);

    /// Freeze the last frame of a surface into a static image over it
    fn freeze(&self, preview: PreviewId, snapshot: SnapshotId);

    /// Fade out and remove a frozen image
    fn release_snapshot(&self, snapshot: SnapshotId);

    /// Apply new dimensions after an orientation change
    fn update_layout(&self, layout: &PreviewLayout);

    /// Remove the container and everything in it
    fn hide_container(&self);
}

/// Preview host for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreviewHost;

impl PreviewHost for NullPreviewHost {
    fn show_container(&self, _layout: &PreviewLayout, _devices: &[Device]) {}
    fn attach(&self, _id: PreviewId, _stream: Arc<dyn CaptureStream>, _layout: &PreviewLayout) {}
    fn detach(&self, _id: PreviewId) {}
    fn freeze(&self, _preview: PreviewId, _snapshot: SnapshotId) {}
    fn release_snapshot(&self, _snapshot: SnapshotId) {}
    fn update_layout(&self, _layout: &PreviewLayout) {}
    fn hide_container(&self) {}
}
