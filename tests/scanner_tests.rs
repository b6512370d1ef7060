// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests for the scanner session against virtual cameras

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webcam_barcode_scanner::backends::camera::virtual_camera::{VirtualBackend, VirtualDevice};
use webcam_barcode_scanner::backends::camera::{CameraFrame, CaptureStream};
use webcam_barcode_scanner::detector::{Detector, Point, RawDetection, Vocabulary};
use webcam_barcode_scanner::feedback::{BeepTone, ScanFeedback};
use webcam_barcode_scanner::scanner::{
    Device, Orientation, PreviewHost, PreviewId, PreviewLayout, SnapshotId,
};
use webcam_barcode_scanner::{Config, EventKind, Scanner, ScannerEvent, Symbology};

/// Detector returning whatever the test currently shows it
struct ScriptedDetector {
    vocabulary: Vocabulary,
    visible: Mutex<Vec<RawDetection>>,
}

impl ScriptedDetector {
    fn new(vocabulary: Vocabulary) -> Arc<Self> {
        Arc::new(Self {
            vocabulary,
            visible: Mutex::new(Vec::new()),
        })
    }

    fn show(&self, detections: Vec<RawDetection>) {
        *self.visible.lock().unwrap() = detections;
    }

    fn hide(&self) {
        self.visible.lock().unwrap().clear();
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    fn vocabulary(&self) -> Vocabulary {
        self.vocabulary
    }

    async fn detect(&self, _frame: &CameraFrame) -> Vec<RawDetection> {
        self.visible.lock().unwrap().clone()
    }
}

fn detection(value: &str, tag: &str) -> RawDetection {
    RawDetection {
        raw_value: value.to_string(),
        format_tag: tag.to_string(),
        corner_points: vec![
            Point::new(10.0, 20.0),
            Point::new(110.0, 20.0),
            Point::new(110.0, 60.0),
            Point::new(10.0, 60.0),
        ],
        aim_identifier: None,
        vendor_payload: serde_json::json!({ "rawValue": value, "format": tag }),
    }
}

/// Preview host recording the surfaces it currently shows
#[derive(Default)]
struct RecordingPreview {
    attached: Mutex<Vec<PreviewId>>,
    frozen: Mutex<Vec<SnapshotId>>,
    released: Mutex<Vec<SnapshotId>>,
    layouts: Mutex<Vec<(f32, f32)>>,
    container_visible: Mutex<bool>,
}

impl PreviewHost for RecordingPreview {
    fn show_container(&self, _layout: &PreviewLayout, _devices: &[Device]) {
        *self.container_visible.lock().unwrap() = true;
    }

    fn attach(&self, id: PreviewId, _stream: Arc<dyn CaptureStream>, _layout: &PreviewLayout) {
        self.attached.lock().unwrap().push(id);
    }

    fn detach(&self, id: PreviewId) {
        self.attached.lock().unwrap().retain(|p| *p != id);
    }

    fn freeze(&self, _preview: PreviewId, snapshot: SnapshotId) {
        self.frozen.lock().unwrap().push(snapshot);
    }

    fn release_snapshot(&self, snapshot: SnapshotId) {
        self.released.lock().unwrap().push(snapshot);
    }

    fn update_layout(&self, layout: &PreviewLayout) {
        self.layouts.lock().unwrap().push((layout.width, layout.height));
    }

    fn hide_container(&self) {
        *self.container_visible.lock().unwrap() = false;
    }
}

#[derive(Default)]
struct CountingFeedback {
    beeps: AtomicUsize,
}

impl ScanFeedback for CountingFeedback {
    fn beep(&self, _tone: &BeepTone) {
        self.beeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collects every event the scanner publishes
fn record_events(scanner: &Scanner) -> Arc<Mutex<Vec<ScannerEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Connected, EventKind::Disconnected, EventKind::Barcode] {
        let events = Arc::clone(&events);
        scanner.add_event_listener(kind, move |event| events.lock().unwrap().push(event.clone()));
    }
    events
}

fn barcodes(events: &Mutex<Vec<ScannerEvent>>) -> Vec<(String, Symbology)> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            ScannerEvent::Barcode(b) => Some((b.value.clone(), b.symbology)),
            _ => None,
        })
        .collect()
}

fn count(events: &Mutex<Vec<ScannerEvent>>, kind: EventKind) -> usize {
    events.lock().unwrap().iter().filter(|e| e.kind() == kind).count()
}

fn two_cameras() -> VirtualBackend {
    VirtualBackend::new()
        .with_device(VirtualDevice::new("front", "Front camera").facing("user"))
        .with_device(VirtualDevice::new("rear", "Rear camera").facing("environment"))
}

#[tokio::test(start_paused = true)]
async fn test_repeated_value_is_deduplicated() {
    let detector = ScriptedDetector::new(Vocabulary::Native);
    let feedback = Arc::new(CountingFeedback::default());
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .feedback(feedback.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    detector.show(vec![detection("12345670", "ean_8")]);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(barcodes(&events), vec![("12345670".to_string(), Symbology::Ean8)]);

    tokio::time::sleep(Duration::from_millis(1600)).await;
    assert_eq!(barcodes(&events).len(), 2);
    assert_eq!(feedback.beeps.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_within_one_frame_emit_once() {
    let detector = ScriptedDetector::new(Vocabulary::Native);
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    detector.show(vec![
        detection("4006381333931", "ean_13"),
        detection("4006381333931", "ean_13"),
        detection("HELLO", "qr_code"),
    ]);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut found = barcodes(&events);
    found.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        found,
        vec![
            ("4006381333931".to_string(), Symbology::Ean13),
            ("HELLO".to_string(), Symbology::QrCode),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unmapped_tag_is_dropped() {
    let detector = ScriptedDetector::new(Vocabulary::Native);
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    // Engine spelling is not understood by a native-vocabulary detector
    detector.show(vec![detection("12345670", "EAN-8")]);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(barcodes(&events).is_empty());
    assert_eq!(count(&events, EventKind::Connected), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disallowed_symbology_holds_value_in_history() {
    let config = Config {
        allowed_symbologies: vec![Symbology::QrCode],
        ..Config::default()
    };
    let detector = ScriptedDetector::new(Vocabulary::Native);
    let scanner = Scanner::builder(config)
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    detector.show(vec![detection("SAME", "ean_8")]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    detector.show(vec![detection("SAME", "qr_code")]);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(barcodes(&events).is_empty());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(barcodes(&events), vec![("SAME".to_string(), Symbology::QrCode)]);
}

#[tokio::test(start_paused = true)]
async fn test_detector_never_ready_disables_connect() {
    let backend = Arc::new(two_cameras());
    let scanner = Scanner::builder(Config::default())
        .backend(backend.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    assert!(scanner.is_detector_unavailable());
    assert!(!scanner.is_connected());
    assert!(backend.live_streams().is_empty());

    let start = tokio::time::Instant::now();
    scanner.connect().await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(count(&events, EventKind::Connected), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_disconnect_lifecycle() {
    let backend = Arc::new(two_cameras());
    let preview = Arc::new(RecordingPreview::default());
    let scanner = Scanner::builder(Config::default())
        .backend(backend.clone())
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .preview_host(preview.clone())
        .build();
    let events = record_events(&scanner);

    scanner.reconnect(Some("rear")).await;
    assert!(scanner.is_connected());
    assert_eq!(scanner.state().active_device_id.as_deref(), Some("rear"));
    assert!(*preview.container_visible.lock().unwrap());
    assert_eq!(scanner.devices().len(), 2);

    // Connecting again while active changes nothing
    scanner.connect().await;
    assert_eq!(backend.live_streams().len(), 1);

    scanner.disconnect().await;
    scanner.disconnect().await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!scanner.is_connected());
    assert!(backend.live_streams().is_empty());
    assert!(preview.attached.lock().unwrap().is_empty());
    assert!(!*preview.container_visible.lock().unwrap());
    assert_eq!(count(&events, EventKind::Connected), 1);
    assert_eq!(count(&events, EventKind::Disconnected), 1);

    let connected = events.lock().unwrap().iter().find_map(|e| match e {
        ScannerEvent::Connected(c) => Some(c.clone()),
        _ => None,
    });
    let connected = connected.unwrap();
    assert_eq!(connected.kind, "webcam");
    assert_eq!(connected.device_id.as_deref(), Some("rear"));
}

#[tokio::test(start_paused = true)]
async fn test_switch_leaves_single_stream_and_surface() {
    let backend = Arc::new(two_cameras());
    let preview = Arc::new(RecordingPreview::default());
    let scanner = Scanner::builder(Config::default())
        .backend(backend.clone())
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .preview_host(preview.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    assert_eq!(scanner.state().active_device_id.as_deref(), Some("front"));
    assert!(scanner.state().mirrored);

    scanner.switch_device("rear").await.unwrap();

    let live = backend.live_streams();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].device_id(), "rear");
    assert_eq!(preview.attached.lock().unwrap().len(), 1);
    assert!(preview.frozen.lock().unwrap().is_empty());

    let state = scanner.state();
    assert_eq!(state.active_device_id.as_deref(), Some("rear"));
    assert!(!state.mirrored);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(scanner.state().playing);
    assert_eq!(count(&events, EventKind::Connected), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exclusive_switch_freezes_old_preview() {
    let backend = Arc::new(two_cameras().with_concurrent_streams(false));
    let preview = Arc::new(RecordingPreview::default());
    let scanner = Scanner::builder(Config::default())
        .backend(backend.clone())
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .preview_host(preview.clone())
        .build();

    scanner.connect().await;
    scanner.switch_device("rear").await.unwrap();

    let live = backend.live_streams();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].device_id(), "rear");
    assert_eq!(preview.attached.lock().unwrap().len(), 1);
    assert_eq!(preview.frozen.lock().unwrap().len(), 1);
    assert_eq!(*preview.frozen.lock().unwrap(), *preview.released.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_failed_exclusive_switch_restores_previous_camera() {
    let backend = Arc::new(
        VirtualBackend::new()
            .with_device(VirtualDevice::new("front", "Front camera"))
            .with_device(VirtualDevice::new("broken", "Broken camera").failing())
            .with_concurrent_streams(false),
    );
    let scanner = Scanner::builder(Config::default())
        .backend(backend.clone())
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .build();

    scanner.connect().await;
    assert!(scanner.switch_device("broken").await.is_err());

    assert!(scanner.is_connected());
    assert_eq!(scanner.state().active_device_id.as_deref(), Some("front"));
    let live = backend.live_streams();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].device_id(), "front");
}

#[tokio::test(start_paused = true)]
async fn test_orientation_clears_overlay_and_scanning_continues() {
    let preview = Arc::new(RecordingPreview::default());
    let detector = ScriptedDetector::new(Vocabulary::Engine);
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .preview_host(preview.clone())
        .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    detector.show(vec![detection("FIRST", "QR-Code")]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    detector.hide();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let hud = scanner.hud_frame().unwrap();
    assert_eq!((hud.width, hud.height), (640, 480));
    assert_eq!(hud.polygons.len(), 1);

    scanner.notify_orientation(Orientation::Rotated);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let hud = scanner.hud_frame().unwrap();
    assert_eq!((hud.width, hud.height), (480, 640));
    assert!(hud.polygons.is_empty());
    assert_eq!(preview.layouts.lock().unwrap().len(), 1);

    detector.show(vec![detection("SECOND", "QR-Code")]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let values: Vec<String> = barcodes(&events).into_iter().map(|(v, _)| v).collect();
    assert_eq!(values, vec!["FIRST".to_string(), "SECOND".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_hud_mirrors_front_camera_outlines() {
    let config = Config::from_json(r#"{"preview": {"hud": {"guide": true}}}"#).unwrap();
    let detector = ScriptedDetector::new(Vocabulary::Native);
    let scanner = Scanner::builder(config)
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .build();

    scanner.connect().await;
    detector.show(vec![detection("MIRROR", "qr_code")]);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let hud = scanner.hud_frame().unwrap();
    assert!(hud.guide.is_some());
    let first = hud.polygons[0][0];
    assert!((first.x - 630.0).abs() < 0.01);
    assert!((first.y - 20.0).abs() < 0.01);

    // Outlines fade once the symbol leaves the frame
    detector.hide();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(scanner.hud_frame().unwrap().polygons.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_acquire_releases_late_stream() {
    let backend = Arc::new(two_cameras().with_open_delay(Duration::from_millis(500)));
    let scanner = Arc::new(
        Scanner::builder(Config::default())
            .backend(backend.clone())
            .detector(ScriptedDetector::new(Vocabulary::Native))
            .build(),
    );
    let events = record_events(&scanner);

    let connecting = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move { scanner.connect().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    scanner.disconnect().await;
    connecting.await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!scanner.is_connected());
    assert!(backend.live_streams().is_empty());
    assert_eq!(count(&events, EventKind::Connected), 0);

    // The scanner is usable again afterwards
    scanner.connect().await;
    assert!(scanner.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_stream_subscription_receives_barcodes() {
    use futures::StreamExt;

    let detector = ScriptedDetector::new(Vocabulary::Native);
    let scanner = Scanner::builder(Config {
        debug: true,
        ..Config::default()
    })
    .backend(Arc::new(two_cameras()))
    .detector(detector.clone())
    .build();
    let mut stream = Box::pin(scanner.subscribe(EventKind::Barcode));

    scanner.connect().await;
    detector.show(vec![detection("STREAMED", "code_128")]);

    match stream.next().await {
        Some(ScannerEvent::Barcode(b)) => {
            assert_eq!(b.value, "STREAMED");
            assert_eq!(b.symbology, Symbology::Code128);
            assert_eq!(b.polygon.map(|p| p.len()), Some(4));
            assert_eq!(b.debug.unwrap()["format"], "code_128");
        }
        other => panic!("expected barcode, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_orientation_survives_camera_switch() {
    let preview = Arc::new(RecordingPreview::default());
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .preview_host(preview.clone())
        .build();

    scanner.connect().await;
    scanner.notify_orientation(Orientation::Rotated);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let hud = scanner.hud_frame().unwrap();
    assert_eq!((hud.width, hud.height), (480, 640));

    scanner.switch_device("rear").await.unwrap();
    let state = scanner.state();
    assert_eq!(state.active_device_id.as_deref(), Some("rear"));
    assert_eq!(state.orientation, Orientation::Rotated);
    assert_eq!((state.frame_width, state.frame_height), (480, 640));
    let hud = scanner.hud_frame().unwrap();
    assert_eq!((hud.width, hud.height), (480, 640));

    // Turning back still takes effect on the new camera
    scanner.notify_orientation(Orientation::Normal);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(scanner.state().orientation, Orientation::Normal);
    let hud = scanner.hud_frame().unwrap();
    assert_eq!((hud.width, hud.height), (640, 480));
}

/// Detector that takes a fixed time per call and tracks overlapping calls
struct SlowDetector {
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Detector for SlowDetector {
    fn vocabulary(&self) -> Vocabulary {
        Vocabulary::Native
    }

    async fn detect(&self, _frame: &CameraFrame) -> Vec<RawDetection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Vec::new()
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_detector_is_never_called_concurrently() {
    let detector = Arc::new(SlowDetector {
        delay: Duration::from_millis(100),
        calls: AtomicUsize::new(0),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(detector.clone())
        .build();

    scanner.connect().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    scanner.disconnect().await;

    assert_eq!(detector.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(detector.calls.load(Ordering::SeqCst) >= 5);
}

/// Detector whose first call never completes
struct StalledOnceDetector {
    calls: AtomicUsize,
}

#[async_trait]
impl Detector for StalledOnceDetector {
    fn vocabulary(&self) -> Vocabulary {
        Vocabulary::Native
    }

    async fn detect(&self, _frame: &CameraFrame) -> Vec<RawDetection> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::future::pending::<()>().await;
        }
        vec![detection("AFTER", "qr_code")]
    }
}

#[tokio::test(start_paused = true)]
async fn test_hung_detector_call_times_out_and_loop_continues() {
    let detector = Arc::new(StalledOnceDetector {
        calls: AtomicUsize::new(0),
    });
    let scanner = Scanner::builder(Config {
        detector_timeout_ms: 200,
        ..Config::default()
    })
    .backend(Arc::new(two_cameras()))
    .detector(detector.clone())
    .build();
    let events = record_events(&scanner);

    scanner.connect().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(barcodes(&events).is_empty());

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(detector.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(barcodes(&events), vec![("AFTER".to_string(), Symbology::QrCode)]);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_overlapping_switch_stops_both_streams() {
    let backend = Arc::new(
        VirtualBackend::new()
            .with_device(VirtualDevice::new("front", "Front camera").facing("user"))
            .with_device(
                VirtualDevice::new("rear", "Rear camera")
                    .facing("environment")
                    .with_first_frame_delay(Duration::from_secs(1)),
            ),
    );
    let scanner = Arc::new(
        Scanner::builder(Config::default())
            .backend(backend.clone())
            .detector(ScriptedDetector::new(Vocabulary::Native))
            .build(),
    );
    let events = record_events(&scanner);

    scanner.connect().await;
    let switching = {
        let scanner = Arc::clone(&scanner);
        tokio::spawn(async move { scanner.switch_device("rear").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.live_streams().len(), 2);

    scanner.disconnect().await;
    assert!(backend.live_streams().is_empty());

    let _ = switching.await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(backend.live_streams().is_empty());
    assert!(!scanner.is_connected());
    assert_eq!(count(&events, EventKind::Disconnected), 1);
}

#[tokio::test(start_paused = true)]
async fn test_orientation_reported_before_connect_is_kept() {
    let scanner = Scanner::builder(Config::default())
        .backend(Arc::new(two_cameras()))
        .detector(ScriptedDetector::new(Vocabulary::Native))
        .build();

    scanner.notify_orientation(Orientation::Rotated);
    scanner.connect().await;

    let state = scanner.state();
    assert_eq!(state.orientation, Orientation::Rotated);
    assert_eq!((state.frame_width, state.frame_height), (480, 640));
}
