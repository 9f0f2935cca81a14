//! Test Common Utilities
//!
//! In-memory sinks and a controller builder shared by the lorasrv
//! integration tests.

#![allow(dead_code)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lorasrv::error::SinkError;
use lorasrv::processing::{FieldSpec, FieldTable, ReadingBuilder};
use lorasrv::radio::{MockRadio, RadioSession};
use lorasrv::runtime::{CycleController, CycleSettings};
use lorasrv::storage::{LogSink, Point, PointWriter, PersistenceCoordinator, RetryPolicy};

pub const DEVICE_ID: &str = "Device5";
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

/// Log sink that keeps lines in memory, optionally failing every write
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
    fail: bool,
    attempts: AtomicUsize,
}

impl MemoryLog {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSink for MemoryLog {
    async fn append_line(&self, _timestamp: DateTime<Utc>, line: &str) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SinkError::Io("disk full".to_string()));
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Point writer that keeps points in memory, optionally failing every write
#[derive(Debug, Default)]
pub struct MemoryDb {
    points: Mutex<Vec<Point>>,
    fail: bool,
    attempts: AtomicUsize,
}

impl MemoryDb {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn points(&self) -> Vec<Point> {
        self.points.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PointWriter for MemoryDb {
    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SinkError::Db("connection refused".to_string()));
        }
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }
}

/// The default five-field table with bounds on temperature and humidity
pub fn field_table() -> Arc<FieldTable> {
    Arc::new(
        FieldTable::new(vec![
            FieldSpec::new("Max_A", "maxAcceleration_m/s2"),
            FieldSpec::new("RMS_A", "rmsAcceleration_m/s2"),
            FieldSpec::new("Temp", "temperature_C").with_bounds(-40.0, 85.0),
            FieldSpec::new("Pressure", "pressure_hPa"),
            FieldSpec::new("Humidity", "humidity_%").with_bounds(0.0, 100.0),
        ])
        .unwrap(),
    )
}

pub fn settings(max_messages: usize) -> CycleSettings {
    CycleSettings {
        device_id: DEVICE_ID.to_string(),
        message_timeout: SHORT_TIMEOUT,
        max_messages_per_cycle: max_messages,
        interval: Duration::from_millis(10),
        max_consecutive_handshake_failures: 3,
    }
}

/// Controller over a scripted radio with the given sinks
pub fn controller(
    radio: &MockRadio,
    log: Arc<dyn LogSink>,
    db: Arc<dyn PointWriter>,
    max_messages: usize,
) -> CycleController<MockRadio> {
    CycleController::new(
        RadioSession::new(radio.clone(), DEVICE_ID, SHORT_TIMEOUT),
        ReadingBuilder::new(field_table()),
        PersistenceCoordinator::new(log, db, RetryPolicy::immediate(3), "sensor_data"),
        settings(max_messages),
    )
}
