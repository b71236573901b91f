#![allow(clippy::unwrap_used)]
// Integration tests for `EventStream` against a scripted controller.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{MockController, acknowledge, eventually};
use vantage_api::{Error, EventOptions, EventStream, STATUS_CATEGORY, StatusEvent};

// ── Helpers ─────────────────────────────────────────────────────────

fn options() -> EventOptions {
    let mut options = EventOptions {
        request_timeout: Duration::from_millis(500),
        ..EventOptions::default()
    };
    options.reconnect.initial_delay = Duration::from_millis(10);
    options.reconnect.max_delay = Duration::from_millis(50);
    options
}

type Log = Arc<Mutex<Vec<String>>>;

fn recorder(log: &Log, name: &'static str) -> impl Fn(&StatusEvent) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |event: &StatusEvent| {
        log.lock()
            .unwrap()
            .push(format!("{name}:{}:{}", event.vid, event.args.join(" ")));
    }
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

async fn connected(stream: &EventStream) {
    let mut state = stream.connection_state();
    tokio::time::timeout(Duration::from_secs(2), state.wait_for(|up| *up))
        .await
        .unwrap()
        .unwrap();
}

// ── Dispatch ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dispatch_in_wire_order_to_every_subscriber() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    let log: Log = Arc::default();

    let _a = stream.subscribe_status(recorder(&log, "a"), "BTN");
    let _b = stream.subscribe_status(recorder(&log, "b"), "BTN");
    stream.start();
    connected(&stream).await;
    eventually("STATUS BTN", || mock.count("STATUS BTN") == 1).await;

    mock.push("S:BTN 447 PRESS");
    mock.push("S:BTN 447 RELEASE");
    eventually("four callbacks", || entries(&log).len() == 4).await;

    assert_eq!(
        entries(&log),
        vec!["a:447:PRESS", "b:447:PRESS", "a:447:RELEASE", "b:447:RELEASE"]
    );
    stream.stop().await;
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_and_unknown_go_to_catch_all() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    let log: Log = Arc::default();

    let _btn = stream.subscribe_status(recorder(&log, "btn"), "BTN");
    let _all = stream.subscribe_all(recorder(&log, "all"));
    stream.start();
    connected(&stream).await;
    eventually("STATUS BTN", || mock.count("STATUS BTN") == 1).await;

    mock.push("S:BTN abc PRESS");
    mock.push("complete garbage");
    mock.push("S:");
    mock.push("S:TEMP 9 20.5");
    mock.push("S:BTN 5 PRESS");
    eventually("two callbacks", || entries(&log).len() == 2).await;

    assert_eq!(entries(&log), vec!["all:9:20.5", "btn:5:PRESS"]);
    assert!(stream.is_connected());
    stream.stop().await;
}

#[tokio::test]
async fn test_unsubscribed_callback_stops_receiving() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    let log: Log = Arc::default();

    let gone = stream.subscribe_status(recorder(&log, "gone"), "LOAD");
    let _kept = stream.subscribe_status(recorder(&log, "kept"), "LOAD");
    stream.start();
    connected(&stream).await;
    eventually("STATUS LOAD", || mock.count("STATUS LOAD") == 1).await;

    gone.unsubscribe();
    mock.push("S:LOAD 12 75.000");
    eventually("one callback", || entries(&log).len() == 1).await;
    assert_eq!(entries(&log), vec!["kept:12:75.000"]);
    stream.stop().await;
}

// ── Enhanced log ────────────────────────────────────────────────────

#[tokio::test]
async fn test_enhanced_log_records_normalize_to_status() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    let log: Log = Arc::default();

    let _status = stream.subscribe_status(recorder(&log, "status"), STATUS_CATEGORY);
    stream.start();
    stream.enable_enhanced_log("STATUSEX").await.unwrap();
    assert_eq!(
        mock.received(),
        vec!["ELENABLE STATUSEX ON", "ELLOG STATUSEX ON"]
    );

    mock.push("EL: 447 Button.GetState 1");
    mock.push("S:STATUS 12 Load.GetLevel 50.000");
    eventually("two callbacks", || entries(&log).len() == 2).await;
    assert_eq!(
        entries(&log),
        vec!["status:447:Button.GetState 1", "status:12:Load.GetLevel 50.000"]
    );
    stream.stop().await;
}

#[tokio::test]
async fn test_rejected_enhanced_log_is_command_error() {
    let mock = MockController::start(|line| {
        if line.starts_with("ELENABLE") {
            vec!["R:ERROR:3 Unknown command".into()]
        } else {
            acknowledge(line)
        }
    })
    .await;
    let stream = EventStream::new(mock.transport(), options());
    stream.start();

    let err = stream.enable_enhanced_log("STATUSEX").await.unwrap_err();
    assert_eq!(err.command_code(), Some(3));
    assert!(stream.enablement().is_empty());
    assert!(stream.is_connected());
    stream.stop().await;
}

#[tokio::test]
async fn test_abandoned_enhanced_log_request_is_not_sent() {
    // Reserve a port, then leave it closed so the stream keeps retrying.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let transport = vantage_api::TransportConfig::new("127.0.0.1", vantage_api::TlsMode::Disabled)
        .with_port(port);
    let mut options = options();
    options.request_timeout = Duration::from_millis(100);
    let stream = EventStream::new(transport, options);
    let _btn = stream.subscribe_status(|_| {}, "BTN");
    stream.start();

    let err = stream.enable_enhanced_log("STATUSEX").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");

    let mock = MockController::start_on(port, acknowledge).await;
    connected(&stream).await;
    eventually("STATUS BTN", || mock.count("STATUS BTN") == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(mock.received(), vec!["STATUS BTN"]);
    assert_eq!(stream.enablement(), vec!["STATUS BTN"]);
    stream.stop().await;
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_reconnect_replays_enablement_and_keeps_subscribers() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    let log: Log = Arc::default();

    let _btn = stream.subscribe_status(recorder(&log, "btn"), "BTN");
    let _status = stream.subscribe_status(recorder(&log, "status"), STATUS_CATEGORY);
    stream.start();
    stream.enable_enhanced_log("STATUSEX").await.unwrap();
    eventually("STATUS BTN", || mock.count("STATUS BTN") == 1).await;

    mock.drop_connections();
    eventually("second connection", || mock.accepted() == 2).await;
    eventually("replayed enablement", || {
        mock.count("STATUS BTN") == 2
            && mock.count("ELENABLE STATUSEX ON") == 2
            && mock.count("ELLOG STATUSEX ON") == 2
    })
    .await;

    mock.push("S:BTN 447 PRESS");
    mock.push("EL: 447 Button.GetState 1");
    eventually("both subscribers", || entries(&log).len() == 2).await;
    assert_eq!(
        entries(&log),
        vec!["btn:447:PRESS", "status:447:Button.GetState 1"]
    );
    stream.stop().await;
}

#[tokio::test]
async fn test_stop_closes_connection() {
    let mock = MockController::start(acknowledge).await;
    let stream = EventStream::new(mock.transport(), options());
    stream.start();
    connected(&stream).await;

    stream.stop().await;
    assert!(!stream.is_connected());
    eventually("server side close", || mock.live() == 0).await;
    assert!(matches!(
        stream.enable_enhanced_log("STATUSEX").await,
        Err(Error::ConnectionClosed)
    ));
}
