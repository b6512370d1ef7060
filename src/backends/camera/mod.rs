// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner never talks to a camera API directly. Everything goes through
//! two traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │    StreamSession    │
//! └──────────┬──────────┘
//!            │ enumerate / open
//!            ▼
//! ┌─────────────────────┐        ┌─────────────────────┐
//! │ CameraBackend Trait │ ─────▶ │ CaptureStream Trait │  frames, tracks, stop
//! └──────────┬──────────┘        └─────────────────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐  ┌─────────┐
//!   │ V4L2 │  │ Virtual │
//!   └──────┘  └─────────┘
//! ```

pub mod frame_loop;
pub mod frame_slot;
pub mod types;
pub mod v4l2;
pub mod virtual_camera;

pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Platform media layer
///
/// Provides device enumeration and stream acquisition. Implementations must be
/// cheap to share; the session holds one behind an `Arc`.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Enumerate media devices. Callers filter for `DeviceKind::VideoInput`.
    async fn enumerate_devices(&self) -> BackendResult<Vec<DeviceDescriptor>>;

    /// Open a capture stream matching the request
    ///
    /// The returned stream is live; its owner is responsible for calling
    /// [`CaptureStream::stop`] when done with it.
    async fn open_stream(&self, request: &StreamRequest) -> BackendResult<Arc<dyn CaptureStream>>;

    /// Whether two camera streams may be open at the same time
    ///
    /// Device switching overlaps the old and new stream when this is true and
    /// falls back to a frozen snapshot of the old preview otherwise.
    fn supports_concurrent_streams(&self) -> bool {
        true
    }

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// A live capture stream with one or more video tracks
#[async_trait]
pub trait CaptureStream: Send + Sync {
    /// Unique identifier of this stream instance
    fn id(&self) -> &str;

    /// Capability hints of the video tracks
    fn video_tracks(&self) -> Vec<TrackCapabilities>;

    /// Negotiated frame dimensions
    fn settings(&self) -> StreamSettings;

    /// Most recent frame, if one has been rendered
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Resolves once the stream has rendered its first frame
    ///
    /// Returns immediately if a frame was already rendered. Never resolves for
    /// a stream that stopped before producing one; callers bound the wait.
    async fn first_frame(&self);

    /// Stop all tracks. Idempotent.
    fn stop(&self);

    /// Whether the tracks are still running
    fn is_live(&self) -> bool;
}

/// Get a concrete backend instance for a backend type
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        CameraBackendType::Virtual => Arc::new(virtual_camera::VirtualBackend::new()),
    }
}
