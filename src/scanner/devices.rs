// SPDX-License-Identifier: GPL-3.0-only

//! Camera catalog

use crate::backends::camera::{BackendResult, CameraBackend, DeviceKind, TrackCapabilities};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Which side of the device a camera faces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    #[default]
    Front,
    Back,
}

impl Location {
    /// Classify from advertised facing modes
    ///
    /// No facing information, an empty list or a leading `user` mode all
    /// mean front-facing.
    pub fn from_facing_modes(modes: Option<&[String]>) -> Self {
        match modes {
            Some([first, ..]) if first != "user" => Location::Back,
            _ => Location::Front,
        }
    }

    /// Location of a stream from its video tracks; the last track with facing
    /// information wins
    pub fn from_tracks(tracks: &[TrackCapabilities]) -> Self {
        tracks
            .iter()
            .filter_map(|t| t.facing_modes.as_deref())
            .last()
            .map(|modes| Self::from_facing_modes(Some(modes)))
            .unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Front => write!(f, "front"),
            Location::Back => write!(f, "back"),
        }
    }
}

/// A video input as offered to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: String,
    pub label: String,
    pub location: Location,
}

/// Enumerate video inputs, building a fresh list on every call
pub async fn enumerate(backend: &dyn CameraBackend) -> BackendResult<Vec<Device>> {
    let devices: Vec<Device> = backend
        .enumerate_devices()
        .await?
        .into_iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .map(|d| Device {
            location: Location::from_facing_modes(d.capabilities.facing_modes.as_deref()),
            id: d.id,
            label: d.label,
        })
        .collect();

    debug!(count = devices.len(), "Enumerated cameras");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::virtual_camera::{VirtualBackend, VirtualDevice};

    fn modes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_location_classification() {
        assert_eq!(Location::from_facing_modes(None), Location::Front);
        assert_eq!(Location::from_facing_modes(Some(&[][..])), Location::Front);
        assert_eq!(Location::from_facing_modes(Some(modes(&["user"]).as_slice())), Location::Front);
        assert_eq!(
            Location::from_facing_modes(Some(modes(&["environment"]).as_slice())),
            Location::Back
        );
        assert_eq!(
            Location::from_facing_modes(Some(modes(&["environment", "user"]).as_slice())),
            Location::Back
        );
    }

    #[tokio::test]
    async fn test_enumerate_reports_location() {
        let backend = VirtualBackend::new()
            .with_device(VirtualDevice::new("front", "Front camera").facing("user"))
            .with_device(VirtualDevice::new("rear", "Rear camera").facing("environment"))
            .with_device(VirtualDevice::new("usb", "USB camera"));

        let devices = enumerate(&backend).await.unwrap();
        let locations: Vec<_> = devices.iter().map(|d| d.location).collect();
        assert_eq!(locations, vec![Location::Front, Location::Back, Location::Front]);
    }
}
