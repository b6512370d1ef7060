// SPDX-License-Identifier: GPL-3.0-only

//! Frame loop
//!
//! One task per connected session. Each tick takes the current frame of the
//! primary surface (if it is playing), runs the detector once and turns
//! accepted detections into `barcode` events. Orientation changes arrive as
//! commands on the same loop, between detector calls.

use super::geometry::Orientation;
use super::history::ScanHistory;
use super::overlay::PolygonOverlay;
use super::session::StreamSession;
use crate::config::Config;
use crate::constants::timing;
use crate::detector::{Detector, RawDetection, symbology};
use crate::events::{BarcodeEvent, EventBus, ScannerEvent};
use crate::feedback::{BeepTone, ScanFeedback};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Converts decoded text into a structured payload
pub type PayloadParser = Arc<dyn Fn(&str) -> Option<serde_json::Value> + Send + Sync>;

/// Messages for a running pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    Orientation(Orientation),
}

/// Scan-rate accounting
#[derive(Debug)]
struct ScanStats {
    scans: u64,
    since: Instant,
}

impl ScanStats {
    fn new(now: Instant) -> Self {
        Self { scans: 0, since: now }
    }

    fn reset(&mut self, now: Instant) {
        self.scans = 0;
        self.since = now;
    }

    fn record(&mut self, now: Instant) {
        self.scans += 1;
        let elapsed = now.saturating_duration_since(self.since);
        if elapsed >= timing::SCAN_RATE_LOG_INTERVAL {
            let rate = self.scans as f64 / elapsed.as_secs_f64();
            debug!(
                scans = self.scans,
                elapsed_ms = elapsed.as_millis() as u64,
                scans_per_sec = format!("{:.1}", rate),
                "Scan rate"
            );
            self.reset(now);
        }
    }
}

/// Everything a pipeline run needs
pub struct ScanPipeline {
    pub session: Arc<StreamSession>,
    pub detector: Arc<dyn Detector>,
    pub history: Arc<Mutex<ScanHistory>>,
    pub overlay: Arc<Mutex<PolygonOverlay>>,
    pub events: Arc<EventBus>,
    pub feedback: Arc<dyn ScanFeedback>,
    pub parser: Option<PayloadParser>,
    pub config: Arc<Config>,
}

impl ScanPipeline {
    /// Run until the command sender is dropped
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<PipelineCommand>) {
        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = ScanStats::new(Instant::now());

        info!(interval_ms = self.config.frame_interval_ms, "Scan loop started");

        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(PipelineCommand::Orientation(orientation)) => {
                        self.handle_orientation(orientation);
                    }
                    None => break,
                },
                _ = ticker.tick() => self.process_frame(&mut stats).await,
            }
        }

        info!("Scan loop stopped");
    }

    async fn process_frame(&self, stats: &mut ScanStats) {
        let Some(frame) = self.session.current_frame() else {
            stats.reset(Instant::now());
            return;
        };

        let detections =
            match tokio::time::timeout(self.config.detector_timeout(), self.detector.detect(&frame))
                .await
            {
                Ok(detections) => detections,
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.detector_timeout_ms,
                        "Detector call timed out"
                    );
                    Vec::new()
                }
            };

        for detection in detections {
            self.handle_detection(detection);
        }

        stats.record(Instant::now());
    }

    /// Map, deduplicate, filter and publish one detection
    pub fn handle_detection(&self, detection: RawDetection) {
        let vocabulary = self.detector.vocabulary();
        let Some(symbology) = symbology::lookup(vocabulary, &detection.format_tag) else {
            trace!(tag = %detection.format_tag, "Dropping unmapped symbology");
            return;
        };

        let now = Instant::now();

        if self.config.wants_polygons() {
            let mut overlay = self.overlay.lock().unwrap();
            overlay.prune(now, timing::OVERLAY_TTL);
            overlay.record(&detection.raw_value, detection.corner_points.clone(), now);
        }

        if !self.history.lock().unwrap().accept(&detection.raw_value, now) {
            trace!(value = %detection.raw_value, "Suppressed duplicate");
            return;
        }

        if !self.config.allows(symbology) {
            debug!(%symbology, "Symbology not allowed");
            return;
        }

        if self.config.beep_on_scan {
            self.feedback.beep(&BeepTone::default());
        }

        let data = self
            .parser
            .as_ref()
            .and_then(|parser| parse_payload(parser, &detection.raw_value));

        info!(value = %detection.raw_value, %symbology, "Barcode scanned");

        let polygon = Some(detection.corner_points).filter(|points| !points.is_empty());
        self.events.emit(ScannerEvent::Barcode(BarcodeEvent {
            value: detection.raw_value,
            symbology,
            polygon,
            aim_identifier: detection.aim_identifier,
            data,
            debug: self.config.debug.then_some(detection.vendor_payload),
        }));
    }

    fn handle_orientation(&self, orientation: Orientation) {
        if self.session.apply_orientation(orientation) {
            self.overlay.lock().unwrap().clear();
        }
    }
}

/// Run the payload parser, treating a panic like a failed parse
fn parse_payload(parser: &PayloadParser, value: &str) -> Option<serde_json::Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| parser(value))) {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value, "Payload parser panicked");
            None
        }
    }
}
