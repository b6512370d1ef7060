// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Session timing defaults
pub mod timing {
    use super::Duration;

    /// Minimum silence before the same value may be emitted again
    pub const DEDUP_WINDOW: Duration = Duration::from_millis(2000);

    /// Bounded wait for a new camera/preview to render its first frame
    pub const CAMERA_WAIT: Duration = Duration::from_millis(2000);

    /// Upper bound for a single detector invocation
    pub const DETECTOR_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Frame loop tick (one display refresh at ~60 Hz)
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Extra settle time after a new preview plays, before the old one is removed
    pub const ANTI_FLICKER_DELAY: Duration = Duration::from_millis(50);

    /// How long a detected polygon stays on the HUD
    pub const OVERLAY_TTL: Duration = Duration::from_millis(300);

    /// Interval between scan-rate log lines
    pub const SCAN_RATE_LOG_INTERVAL: Duration = Duration::from_secs(5);
}

/// Detector readiness polling
pub mod readiness {
    use super::Duration;

    /// Delay between readiness checks
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Number of checks before the detector is declared unavailable
    pub const MAX_ATTEMPTS: u32 = 10;
}

/// Default capture and preview dimensions
pub mod defaults {
    pub const RESOLUTION_WIDTH: u32 = 1920;
    pub const RESOLUTION_HEIGHT: u32 = 1080;

    pub const PREVIEW_SIZE: u32 = 240;
    pub const PREVIEW_PADDING: u32 = 20;
    pub const PREVIEW_RADIUS: u32 = 6;
    pub const PREVIEW_Z_INDEX: i32 = 1000;

    /// Aiming guide size as a fraction of the overlay buffer
    pub const GUIDE_WIDTH_FRACTION: f32 = 0.7;
    pub const GUIDE_HEIGHT_FRACTION: f32 = 0.4;
}

/// Scan confirmation tone
pub mod beep {
    /// Tone length in milliseconds
    pub const DURATION_MS: u32 = 80;
    /// Tone frequency in Hz
    pub const FREQUENCY_HZ: u32 = 2800;
    /// Volume in percent
    pub const VOLUME: u32 = 100;
}

/// Connection type reported in `connected` events
pub const CONNECTION_TYPE: &str = "webcam";

/// Thread name for the isolated decode worker
pub const DECODE_WORKER_THREAD: &str = "barcode-decoder";
