// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing scanner
//!
//! ```text
//! connect ──▶ DetectorSlot (ready?) ──▶ StreamSession::acquire ──▶ ScanPipeline
//!                                                                      │
//!        Detector ─▶ symbology::lookup ─▶ ScanHistory ─▶ allow-list ─▶ EventBus
//! ```
//!
//! [`Scanner`] never reports errors from `connect`, `reconnect` or
//! `disconnect`; failures are logged and the host observes the absence of a
//! `connected` event.

pub mod devices;
pub mod geometry;
pub mod history;
pub mod overlay;
pub mod pipeline;
pub mod preview;
pub mod session;

pub use devices::{Device, Location};
pub use geometry::{Orientation, PreviewGeometry, PreviewLayout};
pub use overlay::{GuideRect, HudFrame};
pub use pipeline::PayloadParser;
pub use preview::{NullPreviewHost, PreviewHost, PreviewId, SnapshotId};
pub use session::{SessionPhase, StreamSession, StreamSessionState};

use crate::backends::camera::{CameraBackend, get_backend_for_type};
use crate::config::Config;
use crate::constants::timing;
use crate::detector::fallback::DecodeService;
use crate::detector::native::NativeBarcodeEngine;
use crate::detector::{Detector, DetectorBackend, DetectorSlot, DetectorSources, setup_detector};
use crate::errors::ScannerResult;
use crate::events::{EventBus, EventKind, ListenerId, ScannerEvent};
use crate::feedback::{ScanFeedback, SilentFeedback};
use futures::Stream;
use history::ScanHistory;
use overlay::PolygonOverlay;
use pipeline::{PipelineCommand, ScanPipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Builder for [`Scanner`]
pub struct ScannerBuilder {
    config: Config,
    backend: Option<Arc<dyn CameraBackend>>,
    sources: DetectorSources,
    detector: Option<Arc<dyn Detector>>,
    preview: Arc<dyn PreviewHost>,
    feedback: Arc<dyn ScanFeedback>,
    parser: Option<PayloadParser>,
}

impl ScannerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            backend: None,
            sources: DetectorSources::default(),
            detector: None,
            preview: Arc::new(NullPreviewHost),
            feedback: Arc::new(SilentFeedback),
            parser: None,
        }
    }

    /// Camera backend; defaults to the one named in the config
    pub fn backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn native_engine(mut self, engine: Arc<dyn NativeBarcodeEngine>) -> Self {
        self.sources.native = Some(engine);
        self
    }

    pub fn decode_service(mut self, service: Arc<dyn DecodeService>) -> Self {
        self.sources.decoder = Some(service);
        self
    }

    /// Use a ready detector directly, bypassing backend selection
    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn preview_host(mut self, preview: Arc<dyn PreviewHost>) -> Self {
        self.preview = preview;
        self
    }

    pub fn feedback(mut self, feedback: Arc<dyn ScanFeedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn payload_parser(mut self, parser: PayloadParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Build the scanner; must be called within a Tokio runtime
    pub fn build(self) -> Scanner {
        let config = Arc::new(self.config);
        let events = Arc::new(EventBus::new());
        let backend = self
            .backend
            .unwrap_or_else(|| get_backend_for_type(config.backend));

        let slot = Arc::new(DetectorSlot::new());
        let detector_backend = match self.detector {
            Some(detector) => {
                slot.install(detector);
                None
            }
            None => setup_detector(&config, self.sources, &slot),
        };

        info!(
            backend = %backend.backend_type(),
            detector = ?detector_backend,
            "Scanner created"
        );

        let session = Arc::new(StreamSession::new(
            backend,
            self.preview,
            Arc::clone(&events),
            Arc::clone(&config),
        ));

        Scanner {
            history: Arc::new(Mutex::new(ScanHistory::new(config.dedup_window()))),
            overlay: Arc::new(Mutex::new(PolygonOverlay::new())),
            config,
            events,
            session,
            slot,
            detector_backend,
            feedback: self.feedback,
            parser: self.parser,
            detector_unavailable: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }
}

/// Tasks belonging to a connected session
struct Running {
    commands: mpsc::UnboundedSender<PipelineCommand>,
    scan_loop: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

impl Running {
    fn stop(self) {
        self.scan_loop.abort();
        self.sweep.abort();
    }
}

/// Live barcode scanner
pub struct Scanner {
    config: Arc<Config>,
    events: Arc<EventBus>,
    session: Arc<StreamSession>,
    slot: Arc<DetectorSlot>,
    detector_backend: Option<DetectorBackend>,
    history: Arc<Mutex<ScanHistory>>,
    overlay: Arc<Mutex<PolygonOverlay>>,
    feedback: Arc<dyn ScanFeedback>,
    parser: Option<PayloadParser>,
    /// Set once the detector failed to become ready; connecting is disabled
    detector_unavailable: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl Scanner {
    pub fn builder(config: Config) -> ScannerBuilder {
        ScannerBuilder::new(config)
    }

    /// Connect to any camera
    pub async fn connect(&self) {
        self.open(None).await;
    }

    /// Connect to a previously used camera
    pub async fn reconnect(&self, previous_device: Option<&str>) {
        self.open(previous_device).await;
    }

    async fn open(&self, device_id: Option<&str>) {
        if self.detector_unavailable.load(Ordering::SeqCst) {
            debug!("Detector unavailable, ignoring connect");
            return;
        }

        let Some(detector) = self.slot.wait_until_ready().await else {
            warn!("No detector became ready, scanner disabled");
            self.detector_unavailable.store(true, Ordering::SeqCst);
            return;
        };

        if self.session.is_active() {
            debug!("Already connected");
            return;
        }

        if let Err(e) = self.session.acquire(device_id).await {
            warn!(error = %e, "Connect failed");
            return;
        }

        self.start(detector);
    }

    fn start(&self, detector: Arc<dyn Detector>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let pipeline = ScanPipeline {
            session: Arc::clone(&self.session),
            detector,
            history: Arc::clone(&self.history),
            overlay: Arc::clone(&self.overlay),
            events: Arc::clone(&self.events),
            feedback: Arc::clone(&self.feedback),
            parser: self.parser.clone(),
            config: Arc::clone(&self.config),
        };
        let scan_loop = tokio::spawn(pipeline.run(command_rx));

        let history = Arc::clone(&self.history);
        let overlay = Arc::clone(&self.overlay);
        let window = self.config.dedup_window();
        let sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                history.lock().unwrap().sweep(now);
                overlay.lock().unwrap().prune(now, timing::OVERLAY_TTL);
            }
        });

        let previous = self.running.lock().unwrap().replace(Running {
            commands,
            scan_loop,
            sweep,
        });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    /// Stop scanning and release the camera
    pub async fn disconnect(&self) {
        if let Some(running) = self.running.lock().unwrap().take() {
            running.stop();
            debug!("Scan loop stopped");
        }
        self.session.close();
        self.overlay.lock().unwrap().clear();
    }

    /// Call `handler` for every event of `kind`
    pub fn add_event_listener<F>(&self, kind: EventKind, handler: F) -> ListenerId
    where
        F: Fn(&ScannerEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.events.off(id);
    }

    /// Events of `kind` as a stream
    pub fn subscribe(&self, kind: EventKind) -> impl Stream<Item = ScannerEvent> + Send + 'static {
        self.events.subscribe(kind)
    }

    /// Switch to another camera from [`Scanner::devices`]
    pub async fn switch_device(&self, device_id: &str) -> ScannerResult<()> {
        self.session.switch_device(device_id).await
    }

    /// Report a physical orientation change
    ///
    /// While scanning, the change is handled on the frame loop between
    /// detector calls. Otherwise it is recorded for the next stream.
    pub fn notify_orientation(&self, orientation: Orientation) {
        let sent = match self.running.lock().unwrap().as_ref() {
            Some(running) => running
                .commands
                .send(PipelineCommand::Orientation(orientation))
                .is_ok(),
            None => false,
        };
        if !sent {
            debug!(?orientation, "Scan loop not running, recording orientation");
            if self.session.apply_orientation(orientation) {
                self.overlay.lock().unwrap().clear();
            }
        }
    }

    /// Cameras from the last enumeration
    pub fn devices(&self) -> Vec<Device> {
        self.session.devices()
    }

    /// Enumerate cameras again
    pub async fn refresh_devices(&self) -> Vec<Device> {
        self.session.refresh_devices().await
    }

    /// HUD contents for the current refresh, if a HUD is shown
    pub fn hud_frame(&self) -> Option<HudFrame> {
        if !self.config.wants_polygons() {
            return None;
        }
        let geometry = self.session.geometry()?;

        let mut overlay = self.overlay.lock().unwrap();
        overlay.prune(Instant::now(), timing::OVERLAY_TTL);
        Some(overlay.frame(
            geometry.native_width,
            geometry.native_height,
            geometry.mirrored,
            &self.config.preview.hud,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_active()
    }

    /// Whether connecting was disabled because no detector became ready
    pub fn is_detector_unavailable(&self) -> bool {
        self.detector_unavailable.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> StreamSessionState {
        self.session.state()
    }

    pub fn detector_backend(&self) -> Option<DetectorBackend> {
        self.detector_backend
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        if let Some(running) = self.running.lock().unwrap().take() {
            running.stop();
        }
        self.session.close();
    }
}
