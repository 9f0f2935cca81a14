//! Sink capability traits
//!
//! The coordinator only sees these traits; the concrete file and InfluxDB
//! adapters live next to them and tests swap in in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::SinkError;
use crate::processing::Reading;

/// Tag carrying the device identifier on every point
pub const DEVICE_TAG: &str = "device";

/// One time-series point
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, f64)>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    /// Point for a reading, stamped with the reading's own timestamp
    ///
    /// `None` when the reading carries no fields.
    pub fn from_reading(measurement: &str, reading: &Reading) -> Option<Self> {
        if reading.fields().is_empty() {
            return None;
        }

        Some(Self {
            measurement: measurement.to_string(),
            tags: vec![(DEVICE_TAG.to_string(), reading.device_id().to_string())],
            fields: reading.fields().to_vec(),
            timestamp: reading.timestamp(),
        })
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Append-only text log
#[async_trait]
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Append one line; `timestamp` selects the dated location
    async fn append_line(&self, timestamp: DateTime<Utc>, line: &str) -> Result<(), SinkError>;
}

/// Time-series database writer
#[async_trait]
pub trait PointWriter: Send + Sync + fmt::Debug {
    async fn write_point(&self, point: &Point) -> Result<(), SinkError>;

    /// Connectivity probe run once at startup
    async fn health_check(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
