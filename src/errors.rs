// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using ScannerError
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Main scanner error type
#[derive(Debug, Clone)]
pub enum ScannerError {
    /// Camera/session errors
    Camera(CameraError),
    /// Detector errors
    Detector(DetectorError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Stream session errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// The platform refused or failed to hand out a stream
    AcquisitionFailed(String),
    /// Requested device is not part of the last enumeration
    UnknownDevice(String),
    /// Another transition is in progress
    Busy,
    /// The session was closed while the operation was in flight
    Cancelled,
    /// No active stream
    NotConnected,
}

/// Detector errors
#[derive(Debug, Clone)]
pub enum DetectorError {
    /// No detector became ready within the readiness window
    NotReady,
    /// The detection engine reported a failure
    Engine(String),
    /// The isolated decode worker is gone
    WorkerUnavailable,
    /// The current frame could not be rasterized
    Capture(String),
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::Camera(e) => write!(f, "Camera error: {}", e),
            ScannerError::Detector(e) => write!(f, "Detector error: {}", e),
            ScannerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScannerError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::AcquisitionFailed(msg) => write!(f, "Stream acquisition failed: {}", msg),
            CameraError::UnknownDevice(id) => write!(f, "Unknown camera device: {}", id),
            CameraError::Busy => write!(f, "Session is busy"),
            CameraError::Cancelled => write!(f, "Session closed during operation"),
            CameraError::NotConnected => write!(f, "No active stream"),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::NotReady => write!(f, "Detector not ready"),
            DetectorError::Engine(msg) => write!(f, "Detection engine failed: {}", msg),
            DetectorError::WorkerUnavailable => write!(f, "Decode worker unavailable"),
            DetectorError::Capture(msg) => write!(f, "Frame capture failed: {}", msg),
        }
    }
}

impl std::error::Error for ScannerError {}
impl std::error::Error for CameraError {}
impl std::error::Error for DetectorError {}

impl From<CameraError> for ScannerError {
    fn from(err: CameraError) -> Self {
        ScannerError::Camera(err)
    }
}

impl From<DetectorError> for ScannerError {
    fn from(err: DetectorError) -> Self {
        ScannerError::Detector(err)
    }
}

impl From<BackendError> for CameraError {
    fn from(err: BackendError) -> Self {
        CameraError::AcquisitionFailed(err.to_string())
    }
}

impl From<BackendError> for ScannerError {
    fn from(err: BackendError) -> Self {
        ScannerError::Camera(err.into())
    }
}

impl From<std::io::Error> for ScannerError {
    fn from(err: std::io::Error) -> Self {
        ScannerError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        ScannerError::Config(err.to_string())
    }
}

impl From<String> for ScannerError {
    fn from(msg: String) -> Self {
        ScannerError::Other(msg)
    }
}
