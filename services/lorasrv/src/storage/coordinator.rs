//! Persistence coordinator
//!
//! Fans one reading out to the log sink and the point writer. Both writes
//! run concurrently, each under its own retry budget, and neither failure
//! affects the other.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::processing::Reading;
use crate::storage::retry::RetryPolicy;
use crate::storage::traits::{LogSink, Point, PointWriter};

/// Result of one sink write for one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    /// Every attempt failed; carries the last error
    RetriesExhausted(SinkError),
    /// Nothing to write to this sink
    Skipped,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, WriteOutcome::RetriesExhausted(_))
    }
}

impl std::fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOutcome::Success => write!(f, "ok"),
            WriteOutcome::RetriesExhausted(e) => write!(f, "failed ({})", e),
            WriteOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-sink outcomes for one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistOutcome {
    pub log: WriteOutcome,
    pub db: WriteOutcome,
}

impl PersistOutcome {
    /// At least one sink holds the reading
    pub fn persisted(&self) -> bool {
        self.log.is_success() || self.db.is_success()
    }
}

#[derive(Debug, Clone)]
pub struct PersistenceCoordinator {
    log_sink: Arc<dyn LogSink>,
    point_writer: Arc<dyn PointWriter>,
    retry: RetryPolicy,
    measurement: String,
}

impl PersistenceCoordinator {
    pub fn new(
        log_sink: Arc<dyn LogSink>,
        point_writer: Arc<dyn PointWriter>,
        retry: RetryPolicy,
        measurement: impl Into<String>,
    ) -> Self {
        Self {
            log_sink,
            point_writer,
            retry,
            measurement: measurement.into(),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Attempt both sinks; never fails, the outcome says what happened
    pub async fn persist(&self, reading: &Reading) -> PersistOutcome {
        let (log, db) = tokio::join!(self.write_log(reading), self.write_point(reading));

        if log.is_failure() || db.is_failure() {
            warn!(
                "Reading from {} persisted partially: log={}, db={}",
                reading.device_id(),
                log,
                db
            );
        } else {
            info!(
                "Reading from {} persisted: log={}, db={}",
                reading.device_id(),
                log,
                db
            );
        }

        PersistOutcome { log, db }
    }

    async fn write_log(&self, reading: &Reading) -> WriteOutcome {
        let timestamp = reading.timestamp();
        let line = reading.to_log_line();

        outcome(
            self.retry
                .run("log", || self.log_sink.append_line(timestamp, &line))
                .await,
        )
    }

    async fn write_point(&self, reading: &Reading) -> WriteOutcome {
        let Some(point) = Point::from_reading(&self.measurement, reading) else {
            debug!(
                "Reading from {} has no mapped fields, skipping time-series write",
                reading.device_id()
            );
            return WriteOutcome::Skipped;
        };

        outcome(
            self.retry
                .run("time-series", || self.point_writer.write_point(&point))
                .await,
        )
    }
}

fn outcome(result: Result<(), SinkError>) -> WriteOutcome {
    match result {
        Ok(()) => WriteOutcome::Success,
        Err(e) => WriteOutcome::RetriesExhausted(e),
    }
}
