//! # Pipeline Tests
//!
//! End-to-end runs of the `Printer` orchestrator against the in-memory mock
//! device. Every test compares the exact byte stream the device received
//! with the stream the job builder produces for the matched profile.
//!
//! Pacing goes through a `RecordingPacer`, so nothing here sleeps.

use std::sync::{Arc, Mutex};

use catprint::config::PrintConfig;
use catprint::job::{ConnectionState, JobBuilder, JobConfig, JobState, PrintRequest, Printer};
use catprint::printer::DeviceRegistry;
use catprint::printer::profile::{CAT_INIT_ENABLE, CAT_INIT_QUERY, PrinterProfile};
use catprint::render::buffer::PixelBuffer;
use catprint::render::dither::DitheringAlgorithm;
use catprint::render::process::ImageMode;
use catprint::render::text::{SpleenRasterizer, TextRasterizer, TextStyle};
use catprint::transport::TransportWriter;
use catprint::transport::mock::{MockDiscovery, MockPrinter, RecordingPacer};
use catprint::PrintError;
use pretty_assertions::assert_eq;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Config whose image mode is a plain threshold, so output is predictable.
fn threshold_config() -> PrintConfig {
    PrintConfig {
        image: ImageMode::Dither {
            algorithm: DitheringAlgorithm::Threshold(128),
        },
        ..PrintConfig::default()
    }
}

fn printer_for(mock: &MockPrinter, config: PrintConfig) -> (Printer, Arc<RecordingPacer>) {
    let pacer = Arc::new(RecordingPacer::default());
    let writer = TransportWriter::with_pacer(config.transport.clone(), pacer.clone());
    let printer = Printer::new(Arc::new(MockDiscovery::new(mock.clone())), config).with_writer(writer);
    (printer, pacer)
}

fn cat_init_bytes() -> Vec<u8> {
    let mut bytes = CAT_INIT_QUERY.to_vec();
    bytes.extend_from_slice(&CAT_INIT_ENABLE);
    bytes
}

fn text_bytes(profile: &PrinterProfile, text: &str, style: &TextStyle) -> Vec<u8> {
    let gray = SpleenRasterizer.rasterize(text, style).unwrap().to_grayscale();
    JobBuilder::new(profile, &JobConfig::default())
        .image(&gray)
        .unwrap()
        .to_bytes()
}

async fn wait_for_state(seen: &Arc<Mutex<Vec<ConnectionState>>>, state: ConnectionState) {
    for _ in 0..100 {
        if seen.lock().unwrap().contains(&state) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("never saw {state:?}");
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_concurrent_prints_are_serialized_in_order() {
    let mock = MockPrinter::x5();
    let (printer, _) = printer_for(&mock, threshold_config());

    let dark = PixelBuffer::filled(384, 4, [0, 0, 0, 255]);
    let light = PixelBuffer::filled(384, 6, [255, 255, 255, 255]);

    let (a, b) = tokio::join!(printer.print_image(&dark), printer.print_image(&light));
    assert_eq!(a.unwrap().rows, 4);
    assert_eq!(b.unwrap().rows, 6);

    let profile = PrinterProfile::X5_WRITE;
    let config = JobConfig::default();
    let builder = JobBuilder::new(&profile, &config);
    let mut expected = cat_init_bytes();
    expected.extend(builder.image(&printer.process_image(&dark).unwrap()).unwrap().to_bytes());
    expected.extend(builder.image(&printer.process_image(&light).unwrap()).unwrap().to_bytes());

    assert_eq!(mock.written_bytes(), expected);
    assert_eq!(printer.state(), JobState::Idle);
}

#[tokio::test]
async fn test_peripage_device_skips_cat_init() {
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE);
    let (printer, _) = printer_for(&mock, PrintConfig::default());

    let warnings = printer.connect().await.unwrap();
    assert!(warnings.is_empty());
    assert_eq!(mock.attempts(), 0);

    printer.print_text("hi").await.unwrap();
    assert_eq!(
        mock.written_bytes(),
        text_bytes(&PrinterProfile::PERIPAGE, "hi", &TextStyle::default())
    );
}

#[tokio::test]
async fn test_write_failure_aborts_queue_and_keeps_connection() {
    // preamble is writes 0..=2, the third draw row is write 5
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE).fail_write_at(5);
    let (printer, _) = printer_for(&mock, PrintConfig::default());

    let err = printer
        .print_queue(vec![
            PrintRequest::Text("first".into()),
            PrintRequest::Label("never sent".into()),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::WriteFailure { command: 5, chunk: 0, .. }));
    assert_eq!(mock.writes().len(), 5);
    assert_eq!(printer.state(), JobState::Failed);
    assert!(printer.is_connected().await);

    // retry on the same connection
    printer.print_label("retry").await.unwrap();
    assert_eq!(mock.disconnect_calls(), 0);
    assert_eq!(printer.state(), JobState::Idle);
}

#[tokio::test]
async fn test_disconnect_mid_job_fails_and_needs_reconnect() {
    // writes 0..=1 are init, 2..=4 preamble, 10 is the sixth row
    let mock = MockPrinter::x5().disconnect_at(10);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (printer, _) = printer_for(&mock, threshold_config());
    let printer = printer.on_connection_state(move |s| sink.lock().unwrap().push(s));

    let image = PixelBuffer::filled(384, 20, [0, 0, 0, 255]);
    let err = printer.print_image(&image).await.unwrap_err();
    assert!(matches!(err, PrintError::Disconnected));
    assert_eq!(printer.state(), JobState::Failed);
    wait_for_state(&seen, ConnectionState::Disconnected).await;

    // no automatic reconnect
    let attempts = mock.attempts();
    assert!(matches!(printer.print_label("x").await, Err(PrintError::Disconnected)));
    assert_eq!(mock.attempts(), attempts);

    printer.connect().await.unwrap();
    printer.print_label("back").await.unwrap();
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]
    );
}

#[tokio::test]
async fn test_preamble_failure_is_warning() {
    // write 1 is the energy command
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE).fail_write_at(1);
    let (printer, _) = printer_for(&mock, PrintConfig::default());

    let report = printer.print_label("warm").await.unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        report.warnings[0],
        PrintError::InitWarning {
            profile: "PeriPage",
            step: 1,
            ..
        }
    ));
    assert_eq!(mock.writes().len(), report.commands - 1);
}

#[tokio::test]
async fn test_progress_reports_batches_and_completion() {
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let (printer, _) = printer_for(&mock, threshold_config());
    let printer = printer.on_progress(move |sent, total| sink.lock().unwrap().push((sent, total)));

    let report = printer
        .print_image(&PixelBuffer::filled(100, 30, [0, 0, 0, 255]))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let total = report.commands;
    assert_eq!(seen.last(), Some(&(total, total)));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert!(seen.iter().all(|&(_, t)| t == total));
}

#[tokio::test]
async fn test_feed_and_cut_send_single_row_feeds() {
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE);
    let (printer, pacer) = printer_for(&mock, PrintConfig::default());

    printer.connect().await.unwrap();
    printer.feed(40).await.unwrap();
    let report = printer.print_and_cut().await.unwrap();
    assert_eq!(report.commands, 5);

    let writes = mock.writes();
    assert_eq!(writes.len(), 6);
    assert_eq!(writes[0].data[6..8], [40, 0]);
    assert!(writes[1..].iter().all(|w| w.data[6..8] == [1, 0]));
    // four gaps between the five cut feeds
    assert_eq!(pacer.pauses().len(), 4);
}

#[tokio::test]
async fn test_busy_when_not_waiting() {
    let mock = MockPrinter::for_profile("PeriPage_A6", &PrinterProfile::PERIPAGE)
        .with_latency(std::time::Duration::from_millis(50));
    let (printer, _) = printer_for(&mock, PrintConfig::default());
    let printer = Arc::new(printer);
    printer.connect().await.unwrap();

    let mut state = printer.subscribe();
    let background = {
        let printer = printer.clone();
        tokio::spawn(async move { printer.feed(10).await })
    };
    state.wait_for(|s| *s == JobState::Printing).await.unwrap();

    let err = printer.try_print_queue(vec![PrintRequest::Feed(1)]).await.unwrap_err();
    assert!(matches!(err, PrintError::Busy));
    background.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_custom_registry_gb02_framing() {
    // GB02 only wins when the X5 profiles are absent
    let mock = MockPrinter::x5();
    let (printer, _) = printer_for(&mock, PrintConfig::default());
    let printer = printer.with_registry(DeviceRegistry::new(vec![PrinterProfile::GB02]));

    printer.print_label("gb").await.unwrap();

    let mut expected = cat_init_bytes();
    expected.extend(text_bytes(&PrinterProfile::GB02, "gb", &TextStyle::label()));
    assert_eq!(mock.written_bytes(), expected);

    let gray = SpleenRasterizer
        .rasterize("gb", &TextStyle::label())
        .unwrap()
        .to_grayscale();
    let job = JobBuilder::new(&PrinterProfile::GB02, &JobConfig::default())
        .image(&gray)
        .unwrap();
    assert!(job.packets().all(|p| PrinterProfile::GB02.framing.decode(&p.bytes).is_ok()));
}

#[tokio::test]
async fn test_discovery_failure_surfaces() {
    let printer = Printer::new(Arc::new(MockDiscovery::empty()), PrintConfig::default());
    assert!(matches!(printer.connect().await, Err(PrintError::Discovery(_))));
    assert_eq!(printer.state(), JobState::Failed);

    let unknown = MockPrinter::new("Printer-Unknown");
    let (printer, _) = printer_for(&unknown, PrintConfig::default());
    assert!(matches!(
        printer.print_text("x").await,
        Err(PrintError::ProfileMismatch { .. })
    ));
}
