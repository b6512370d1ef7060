// SPDX-License-Identifier: GPL-3.0-only

//! In-memory virtual cameras
//!
//! Virtual devices serve a fixed frame (a solid fill, a prepared frame or an
//! image file) through the regular [`CameraBackend`] interface. They can
//! delay their first frame, refuse to open, advertise facing modes and forbid
//! concurrent streams, which makes them suitable both for decoding still
//! images and for exercising the session state machine.

use super::frame_slot::FrameSlot;
use super::types::*;
use super::{CameraBackend, CaptureStream};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Description of one virtual camera
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    pub id: String,
    pub label: String,
    pub facing_modes: Option<Vec<String>>,
    pub frame: CameraFrame,
    pub first_frame_delay: Duration,
    pub fail_open: bool,
}

impl VirtualDevice {
    /// A front camera serving a mid-gray 640x480 frame
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            facing_modes: None,
            frame: solid_frame(640, 480, 128),
            first_frame_delay: Duration::ZERO,
            fail_open: false,
        }
    }

    /// Advertise a facing mode ("user" or "environment")
    pub fn facing(mut self, mode: &str) -> Self {
        self.facing_modes = Some(vec![mode.to_string()]);
        self
    }

    pub fn with_frame(mut self, frame: CameraFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_first_frame_delay(mut self, delay: Duration) -> Self {
        self.first_frame_delay = delay;
        self
    }

    /// Make every open attempt fail with a permission error
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities {
            device_id: Some(self.id.clone()),
            facing_modes: self.facing_modes.clone(),
        }
    }
}

/// Build a grayscale frame filled with one luma value
pub fn solid_frame(width: u32, height: u32, luma: u8) -> CameraFrame {
    CameraFrame::from_gray(width, height, vec![luma; (width * height) as usize])
}

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, "Image loaded successfully");

    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

/// Backend serving virtual devices
pub struct VirtualBackend {
    devices: Mutex<Vec<VirtualDevice>>,
    streams: Mutex<Vec<Weak<VirtualStream>>>,
    concurrent: bool,
    open_delay: Duration,
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualBackend {
    /// A backend without devices
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            concurrent: true,
            open_delay: Duration::ZERO,
        }
    }

    pub fn with_device(self, device: VirtualDevice) -> Self {
        self.devices.lock().unwrap().push(device);
        self
    }

    /// Allow or forbid two open streams at once
    pub fn with_concurrent_streams(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Delay applied to every `open_stream` call
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// Replace the frame a device serves, including on its open streams
    pub fn set_frame(&self, device_id: &str, frame: CameraFrame) {
        if let Some(device) = self
            .devices
            .lock()
            .unwrap()
            .iter_mut()
            .find(|d| d.id == device_id)
        {
            device.frame = frame.clone();
        }
        for stream in self.live_streams() {
            if stream.device_id == device_id && stream.slot.frame_count() > 0 {
                stream.slot.publish(frame.clone());
            }
        }
    }

    /// Streams whose tracks are still running
    pub fn live_streams(&self) -> Vec<Arc<VirtualStream>> {
        let mut streams = self.streams.lock().unwrap();
        streams.retain(|s| s.strong_count() > 0);
        streams
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| s.is_live())
            .collect()
    }
}

#[async_trait]
impl CameraBackend for VirtualBackend {
    async fn enumerate_devices(&self) -> BackendResult<Vec<DeviceDescriptor>> {
        let devices = self.devices.lock().unwrap();
        Ok(devices
            .iter()
            .map(|d| DeviceDescriptor {
                id: d.id.clone(),
                label: d.label.clone(),
                kind: DeviceKind::VideoInput,
                capabilities: d.capabilities(),
            })
            .collect())
    }

    async fn open_stream(&self, request: &StreamRequest) -> BackendResult<Arc<dyn CaptureStream>> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        let device = {
            let devices = self.devices.lock().unwrap();
            match &request.device_id {
                Some(id) => devices.iter().find(|d| &d.id == id).cloned(),
                None => devices.first().cloned(),
            }
        }
        .ok_or_else(|| {
            BackendError::DeviceNotFound(request.device_id.clone().unwrap_or_default())
        })?;

        if device.fail_open {
            return Err(BackendError::PermissionDenied(device.id));
        }
        if !self.concurrent && !self.live_streams().is_empty() {
            return Err(BackendError::NotAvailable("camera already in use".into()));
        }

        let stream = Arc::new(VirtualStream {
            id: uuid::Uuid::new_v4().to_string(),
            device_id: device.id.clone(),
            capabilities: device.capabilities(),
            settings: StreamSettings {
                width: device.frame.width,
                height: device.frame.height,
            },
            slot: Arc::new(FrameSlot::new()),
        });
        self.streams.lock().unwrap().push(Arc::downgrade(&stream));

        let slot = Arc::clone(&stream.slot);
        let frame = device.frame.clone();
        let delay = device.first_frame_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            slot.publish(frame);
        });

        debug!(device = %device.id, stream = %stream.id, "Opened virtual stream");
        Ok(stream)
    }

    fn supports_concurrent_streams(&self) -> bool {
        self.concurrent
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }
}

/// Stream served by a [`VirtualBackend`]
pub struct VirtualStream {
    id: String,
    device_id: String,
    capabilities: TrackCapabilities,
    settings: StreamSettings,
    slot: Arc<FrameSlot>,
}

impl VirtualStream {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

#[async_trait]
impl CaptureStream for VirtualStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn video_tracks(&self) -> Vec<TrackCapabilities> {
        vec![self.capabilities.clone()]
    }

    fn settings(&self) -> StreamSettings {
        self.settings
    }

    fn latest_frame(&self) -> Option<CameraFrame> {
        self.slot.latest()
    }

    async fn first_frame(&self) {
        self.slot.wait_first_frame().await
    }

    fn stop(&self) {
        self.slot.close();
    }

    fn is_live(&self) -> bool {
        self.slot.is_live()
    }
}
