//! End-to-end cycle tests
//!
//! Scripted radio in, in-memory or on-disk sinks out.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use common::{controller, MemoryDb, MemoryLog, DEVICE_ID};
use lorasrv::error::RadioError;
use lorasrv::radio::{HandshakeState, MockRadio};
use lorasrv::runtime::ReceiveEnd;
use lorasrv::storage::{DailyLogSink, DEVICE_TAG};

const VALID: &str = "ID:Device5, Max_A:2.50, RMS_A:1.20, Temp:25.5, Pressure:1013.25, Humidity:65.0";

#[tokio::test]
async fn test_valid_and_malformed_frames() {
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    radio.push_frame("ID:Device5, Temp");
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::default());

    let summary = controller(&radio, log.clone(), db.clone(), 2)
        .run_once()
        .await;

    assert_eq!(summary.handshake, HandshakeState::Acknowledged);
    assert_eq!(summary.received, 2);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.persisted, 1);
    assert!(summary.is_success());

    let lines = log.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(
        "ID:Device5, maxAcceleration_m/s2:2.5, rmsAcceleration_m/s2:1.2, temperature_C:25.5, pressure_hPa:1013.25, humidity_%:65.0"
    ));

    let points = db.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].measurement, "sensor_data");
    assert_eq!(points[0].tag(DEVICE_TAG), Some(DEVICE_ID));
    assert_eq!(points[0].fields.len(), 5);
}

#[tokio::test]
async fn test_out_of_range_reading_is_not_persisted() {
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame("ID:Device5, Temp:25.5, Humidity:150");
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::default());

    let summary = controller(&radio, log.clone(), db.clone(), 1)
        .run_once()
        .await;

    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.accepted, 0);
    assert!(log.lines().is_empty());
    assert!(db.points().is_empty());
    assert_eq!(db.attempts(), 0);
}

#[tokio::test]
async fn test_handshake_timeout_does_not_block() {
    let radio = MockRadio::new();
    radio.push_frame("Device6");
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::default());

    let started = Instant::now();
    let summary = controller(&radio, log.clone(), db.clone(), 1)
        .run_once()
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.handshake, HandshakeState::TimedOut);
    assert_eq!(summary.ended_by, ReceiveEnd::NotStarted);
    assert_eq!(summary.received, 0);
    assert!(log.lines().is_empty());
}

#[tokio::test]
async fn test_db_failure_still_logs() {
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::failing());

    let summary = controller(&radio, log.clone(), db.clone(), 1)
        .run_once()
        .await;

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.db_failures, 1);
    assert_eq!(summary.log_failures, 0);
    assert_eq!(db.attempts(), 3);
    assert_eq!(log.lines().len(), 1);
    assert!(summary.is_success());
}

#[tokio::test]
async fn test_both_sinks_failing_loses_reading() {
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    let log = Arc::new(MemoryLog::failing());
    let db = Arc::new(MemoryDb::failing());

    let summary = controller(&radio, log.clone(), db.clone(), 1)
        .run_once()
        .await;

    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.persisted, 0);
    assert_eq!(summary.lost(), 1);
    assert_eq!(log.attempts(), 3);
    assert!(!summary.is_success());
}

#[tokio::test]
async fn test_channel_error_keeps_earlier_frames() {
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    radio.push_error(RadioError::Channel("port closed".to_string()));
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::default());

    let summary = controller(&radio, log.clone(), db.clone(), 5)
        .run_once()
        .await;

    assert_eq!(summary.ended_by, ReceiveEnd::ChannelError);
    assert_eq!(summary.persisted, 1);
    assert_eq!(db.points().len(), 1);
}

#[tokio::test]
async fn test_daily_log_file_written() {
    let dir = TempDir::new().unwrap();
    let radio = MockRadio::new();
    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    let log = Arc::new(DailyLogSink::new(dir.path(), "readings.log"));
    let db = Arc::new(MemoryDb::default());

    let summary = controller(&radio, log, db, 1).run_once().await;
    assert_eq!(summary.persisted, 1);

    let days: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(days.len(), 1);
    assert!(days[0].is_dir());

    let content = std::fs::read_to_string(days[0].join("readings.log")).unwrap();
    assert_eq!(content.lines().count(), 1);
    assert!(content.starts_with('['));
    assert!(content.contains("ID:Device5, maxAcceleration_m/s2:2.5"));
    assert!(content.ends_with('\n'));
}

#[tokio::test]
async fn test_repeated_cycles_reset_handshake() {
    let radio = MockRadio::new();
    let log = Arc::new(MemoryLog::default());
    let db = Arc::new(MemoryDb::default());
    let mut ctl = controller(&radio, log.clone(), db.clone(), 1);

    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    assert!(ctl.run_once().await.is_success());

    let second = ctl.run_once().await;
    assert_eq!(second.handshake, HandshakeState::TimedOut);

    radio.push_frame(DEVICE_ID);
    radio.push_frame(VALID);
    assert!(ctl.run_once().await.is_success());

    assert_eq!(radio.sent().len(), 3);
    assert_eq!(log.lines().len(), 2);
}
