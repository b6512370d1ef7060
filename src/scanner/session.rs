// SPDX-License-Identifier: GPL-3.0-only

//! Camera stream lifecycle
//!
//! ```text
//! Idle ──acquire──▶ Acquiring ──▶ Active ◀──▶ Switching
//!   ▲                   │            │
//!   └────── close ──────┴────────────┘
//! ```
//!
//! The session is the only owner of stream tracks. Transitions that await
//! the platform (acquire, switch) are serialized; `close` is synchronous and
//! may run at any point. Every transition captures the close epoch before
//! awaiting and re-checks it under the state lock before adopting a stream,
//! so a stream that arrives after `close` is stopped instead of adopted.

use super::devices::{self, Device, Location};
use super::geometry::{Orientation, PreviewGeometry, PreviewLayout};
use super::preview::{PreviewHost, PreviewId, SnapshotId};
use crate::backends::camera::{CameraBackend, CameraFrame, CaptureStream, StreamRequest};
use crate::config::Config;
use crate::constants::{CONNECTION_TYPE, timing};
use crate::errors::{CameraError, ScannerResult};
use crate::events::{ConnectedEvent, EventBus, ScannerEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Acquiring,
    Active,
    Switching,
    Closing,
}

/// State of the active stream, shared with the scan pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSessionState {
    pub active_device_id: Option<String>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub orientation: Orientation,
    /// Set once the primary surface rendered its first frame
    pub playing: bool,
    /// Front-facing camera
    pub mirrored: bool,
}

/// A stream together with its preview surface
#[derive(Clone)]
struct Surface {
    stream: Arc<dyn CaptureStream>,
    preview: Option<PreviewId>,
    device_id: Option<String>,
    location: Location,
}

struct SessionInner {
    phase: SessionPhase,
    state: StreamSessionState,
    /// Stream feeding the detector
    primary: Option<Surface>,
    /// Previous streams kept alive until the replacement renders
    retiring: Vec<Surface>,
    devices: Vec<Device>,
    geometry: Option<PreviewGeometry>,
    /// Last reported physical orientation; survives switches and reconnects
    orientation: Orientation,
    container_shown: bool,
    next_id: u64,
}

impl SessionInner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Owner of the camera stream and its preview
pub struct StreamSession {
    backend: Arc<dyn CameraBackend>,
    preview: Arc<dyn PreviewHost>,
    events: Arc<EventBus>,
    config: Arc<Config>,
    inner: Arc<Mutex<SessionInner>>,
    /// Bumped by every `close`
    epoch: AtomicU64,
    /// Bumped whenever the primary surface changes
    surfaces: watch::Sender<u64>,
    transitions: tokio::sync::Mutex<()>,
}

impl StreamSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        preview: Arc<dyn PreviewHost>,
        events: Arc<EventBus>,
        config: Arc<Config>,
    ) -> Self {
        let (surfaces, _) = watch::channel(0);
        Self {
            backend,
            preview,
            events,
            config,
            inner: Arc::new(Mutex::new(SessionInner {
                phase: SessionPhase::Idle,
                state: StreamSessionState::default(),
                primary: None,
                retiring: Vec::new(),
                devices: Vec::new(),
                geometry: None,
                orientation: Orientation::Normal,
                container_shown: false,
                next_id: 0,
            })),
            epoch: AtomicU64::new(0),
            surfaces,
            transitions: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn state(&self) -> StreamSessionState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase(), SessionPhase::Active | SessionPhase::Switching)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().unwrap().state.playing
    }

    /// Devices from the last enumeration
    pub fn devices(&self) -> Vec<Device> {
        self.inner.lock().unwrap().devices.clone()
    }

    pub fn geometry(&self) -> Option<PreviewGeometry> {
        self.inner.lock().unwrap().geometry
    }

    /// Latest frame of the primary surface, only while it is playing
    pub fn current_frame(&self) -> Option<CameraFrame> {
        let inner = self.inner.lock().unwrap();
        if !inner.state.playing {
            return None;
        }
        inner.primary.as_ref()?.stream.latest_frame()
    }

    /// Re-enumerate cameras, replacing the cached list
    pub async fn refresh_devices(&self) -> Vec<Device> {
        let devices = match devices::enumerate(self.backend.as_ref()).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cameras");
                Vec::new()
            }
        };
        self.inner.lock().unwrap().devices = devices.clone();
        devices
    }

    /// Acquire a stream from any camera or from `device_id`
    ///
    /// On success the session is `Active` and `connected` has been emitted.
    pub async fn acquire(&self, device_id: Option<&str>) -> ScannerResult<()> {
        let _transition = self.transitions.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase != SessionPhase::Idle {
                return Err(CameraError::Busy.into());
            }
            inner.phase = SessionPhase::Acquiring;
        }

        let request = StreamRequest {
            device_id: device_id.map(str::to_string),
            resolution: Some(self.config.resolution),
        };
        info!(device_id = ?request.device_id, resolution = %self.config.resolution, "Acquiring camera stream");

        let stream = match self.backend.open_stream(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to acquire camera stream");
                self.reset_phase(epoch, SessionPhase::Acquiring, SessionPhase::Idle);
                return Err(CameraError::from(e).into());
            }
        };
        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!("Session closed during acquisition, releasing stream");
            stream.stop();
            return Err(CameraError::Cancelled.into());
        }

        let tracks = stream.video_tracks();
        let location = Location::from_tracks(&tracks);
        let device_id = tracks
            .iter()
            .rev()
            .find_map(|t| t.device_id.clone())
            .or(request.device_id);

        let devices = self.refresh_devices().await;

        let surface = Surface {
            stream: Arc::clone(&stream),
            preview: None,
            device_id: device_id.clone(),
            location,
        };
        let (surface, layout) = self.adopt(epoch, surface, None)?;

        info!(device_id = ?device_id, location = %location, "Camera stream active");
        self.events.emit(ScannerEvent::Connected(ConnectedEvent {
            kind: CONNECTION_TYPE.to_string(),
            device_id,
        }));

        if let Some(id) = surface.preview {
            self.show_container(&layout, &devices);
            self.preview.attach(id, stream, &layout);
        }

        Ok(())
    }

    /// Switch the active stream to another enumerated camera
    ///
    /// A failed switch leaves the session on its previous stream.
    pub async fn switch_device(&self, device_id: &str) -> ScannerResult<()> {
        let _transition = self.transitions.lock().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        let (previous, target) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(previous) = inner.primary.clone().filter(|_| inner.phase == SessionPhase::Active)
            else {
                return Err(CameraError::NotConnected.into());
            };
            let Some(target) = inner.devices.iter().find(|d| d.id == device_id).cloned() else {
                return Err(CameraError::UnknownDevice(device_id.to_string()).into());
            };
            if previous.device_id.as_deref() == Some(device_id) {
                debug!(device_id, "Camera already active");
                return Ok(());
            }
            inner.phase = SessionPhase::Switching;
            (previous, target)
        };

        info!(from = ?previous.device_id, to = %target.id, "Switching camera");

        let result = if self.backend.supports_concurrent_streams() {
            self.switch_overlapping(epoch, previous, &target).await
        } else {
            self.switch_exclusive(epoch, previous, &target).await
        };

        self.reset_phase(epoch, SessionPhase::Switching, SessionPhase::Active);
        if let Err(e) = &result {
            warn!(device_id = %target.id, error = %e, "Camera switch failed");
        }
        result
    }

    /// Overlap old and new stream until the new one renders
    async fn switch_overlapping(
        &self,
        epoch: u64,
        previous: Surface,
        target: &Device,
    ) -> ScannerResult<()> {
        let stream = self.open_device(&target.id).await?;
        let surface = Surface {
            stream: Arc::clone(&stream),
            preview: None,
            device_id: Some(target.id.clone()),
            location: target.location,
        };
        let (surface, layout) = self.adopt(epoch, surface, Some(previous.clone()))?;

        if let Some(id) = surface.preview {
            self.preview.attach(id, Arc::clone(&stream), &layout);
        }

        self.wait_for_render(stream.as_ref()).await;
        tokio::time::sleep(timing::ANTI_FLICKER_DELAY).await;

        self.retire(epoch, &previous);
        Ok(())
    }

    /// Freeze the old preview, release the camera, then open the new one
    async fn switch_exclusive(
        &self,
        epoch: u64,
        previous: Surface,
        target: &Device,
    ) -> ScannerResult<()> {
        let snapshot = previous.preview.map(|preview| {
            let snapshot = SnapshotId(self.inner.lock().unwrap().next_id());
            self.preview.freeze(preview, snapshot);
            snapshot
        });

        self.inner.lock().unwrap().state.playing = false;
        previous.stream.stop();

        let result = match self.open_device(&target.id).await {
            Ok(stream) => {
                let surface = Surface {
                    stream: Arc::clone(&stream),
                    preview: None,
                    device_id: Some(target.id.clone()),
                    location: target.location,
                };
                self.adopt(epoch, surface, Some(previous.clone()))
                    .map(|adopted| (adopted, stream))
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(((surface, layout), stream)) => {
                if let Some(id) = surface.preview {
                    self.preview.attach(id, Arc::clone(&stream), &layout);
                }
                self.wait_for_render(stream.as_ref()).await;
                self.retire(epoch, &previous);
                Ok(())
            }
            Err(e) => {
                self.restore(epoch, &previous).await;
                Err(e)
            }
        };

        if let Some(snapshot) = snapshot {
            self.preview.release_snapshot(snapshot);
        }
        outcome
    }

    /// Reopen the camera a failed exclusive switch released
    async fn restore(&self, epoch: u64, previous: &Surface) {
        let Some(device_id) = previous.device_id.as_deref() else {
            return;
        };
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }

        match self.open_device(device_id).await {
            Ok(stream) => {
                let surface = Surface {
                    stream: Arc::clone(&stream),
                    preview: None,
                    device_id: previous.device_id.clone(),
                    location: previous.location,
                };
                match self.adopt(epoch, surface, Some(previous.clone())) {
                    Ok((surface, layout)) => {
                        if let Some(id) = surface.preview {
                            self.preview.attach(id, stream, &layout);
                        }
                        self.retire(epoch, previous);
                        info!(device_id, "Restored previous camera");
                    }
                    Err(e) => debug!(error = %e, "Restore abandoned"),
                }
            }
            Err(e) => {
                error!(device_id, error = %e, "Failed to restore previous camera");
                self.close();
            }
        }
    }

    async fn open_device(&self, device_id: &str) -> ScannerResult<Arc<dyn CaptureStream>> {
        let request = StreamRequest::device(device_id, Some(self.config.resolution));
        self.backend
            .open_stream(&request)
            .await
            .map_err(|e| CameraError::from(e).into())
    }

    /// Make `surface` the primary surface unless the session was closed
    ///
    /// `previous`, if given, is parked in the retiring list so `close` can
    /// still stop it while the caller waits for the new surface to render.
    fn adopt(
        &self,
        epoch: u64,
        mut surface: Surface,
        previous: Option<Surface>,
    ) -> ScannerResult<(Surface, PreviewLayout)> {
        let mut inner = self.inner.lock().unwrap();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            drop(inner);
            info!("Session closed during transition, releasing stream");
            surface.stream.stop();
            return Err(CameraError::Cancelled.into());
        }

        if self.config.preview.enabled {
            surface.preview = Some(PreviewId(inner.next_id()));
        }

        let settings = surface.stream.settings();
        let front = surface.location == Location::Front;
        let mut geometry = PreviewGeometry::compute(
            settings.width,
            settings.height,
            &self.config.preview,
            front,
            Orientation::Normal,
        );
        if inner.orientation == Orientation::Rotated {
            geometry = geometry.rotated(&self.config.preview);
        }

        inner.state = StreamSessionState {
            active_device_id: surface.device_id.clone(),
            frame_width: geometry.native_width,
            frame_height: geometry.native_height,
            orientation: inner.orientation,
            playing: false,
            mirrored: front,
        };
        inner.geometry = Some(geometry);
        inner.phase = match inner.phase {
            SessionPhase::Acquiring => SessionPhase::Active,
            phase => phase,
        };
        inner.primary = Some(surface.clone());
        if let Some(previous) = previous {
            inner.retiring.push(previous);
        }

        let mut generation = 0;
        self.surfaces.send_modify(|g| {
            *g += 1;
            generation = *g;
        });
        drop(inner);

        self.watch_first_frame(Arc::clone(&surface.stream), generation);
        Ok((surface, geometry.layout(&self.config.preview)))
    }

    /// Mark the session playing once the primary surface renders
    fn watch_first_frame(&self, stream: Arc<dyn CaptureStream>, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let current = self.surfaces.subscribe();
        let mut replaced = self.surfaces.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = stream.first_frame() => {
                    let mut inner = inner.lock().unwrap();
                    if *current.borrow() == generation {
                        inner.state.playing = true;
                        debug!(stream = %stream.id(), "Stream playing");
                    }
                }
                _ = replaced.wait_for(|g| *g != generation) => {}
            }
        });
    }

    /// Bounded wait for a stream's first rendered frame
    async fn wait_for_render(&self, stream: &dyn CaptureStream) {
        if tokio::time::timeout(self.config.camera_wait(), stream.first_frame())
            .await
            .is_err()
        {
            debug!(stream = %stream.id(), "Camera did not render in time, continuing");
        }
    }

    /// Detach and stop a replaced surface
    fn retire(&self, epoch: u64, previous: &Surface) {
        {
            let mut inner = self.inner.lock().unwrap();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            inner
                .retiring
                .retain(|s| !Arc::ptr_eq(&s.stream, &previous.stream));
        }
        if let Some(id) = previous.preview {
            self.preview.detach(id);
        }
        previous.stream.stop();
        debug!(device_id = ?previous.device_id, "Previous stream stopped");
    }

    fn reset_phase(&self, epoch: u64, from: SessionPhase, to: SessionPhase) {
        let mut inner = self.inner.lock().unwrap();
        if self.epoch.load(Ordering::SeqCst) == epoch && inner.phase == from {
            inner.phase = to;
        }
    }

    fn show_container(&self, layout: &PreviewLayout, devices: &[Device]) {
        let mut inner = self.inner.lock().unwrap();
        if inner.container_shown {
            return;
        }
        inner.container_shown = true;
        drop(inner);
        self.preview.show_container(layout, devices);
    }

    /// Apply a physical orientation change
    ///
    /// The orientation is remembered even without an active stream and is
    /// applied to every stream adopted later. Returns `true` if the geometry
    /// changed.
    pub fn apply_orientation(&self, orientation: Orientation) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.orientation == orientation {
            return false;
        }
        inner.orientation = orientation;
        let Some(geometry) = inner.geometry else {
            return false;
        };

        let rotated = geometry.rotated(&self.config.preview);
        inner.geometry = Some(rotated);
        inner.state.orientation = orientation;
        inner.state.frame_width = rotated.native_width;
        inner.state.frame_height = rotated.native_height;
        let show = inner.container_shown;
        drop(inner);

        info!(
            ?orientation,
            width = rotated.native_width,
            height = rotated.native_height,
            "Orientation changed"
        );
        if show {
            self.preview.update_layout(&rotated.layout(&self.config.preview));
        }
        true
    }

    /// Stop every stream, remove the preview and emit `disconnected`
    ///
    /// Safe in any phase. Returns `false` when there was nothing to close.
    pub fn close(&self) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let (surfaces, container_shown) = {
            let mut inner = self.inner.lock().unwrap();
            inner.phase = SessionPhase::Closing;
            let mut surfaces: Vec<Surface> = inner.retiring.drain(..).collect();
            surfaces.extend(inner.primary.take());
            inner.state = StreamSessionState::default();
            inner.geometry = None;
            let shown = std::mem::take(&mut inner.container_shown);
            (surfaces, shown)
        };
        self.surfaces.send_modify(|g| *g += 1);

        let had_stream = !surfaces.is_empty();
        for surface in surfaces {
            if let Some(id) = surface.preview {
                self.preview.detach(id);
            }
            surface.stream.stop();
        }
        if container_shown {
            self.preview.hide_container();
        }

        self.inner.lock().unwrap().phase = SessionPhase::Idle;

        if had_stream {
            info!("Camera session closed");
            self.events.emit(ScannerEvent::Disconnected);
        }
        had_stream
    }
}
