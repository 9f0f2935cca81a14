//! Cycle controller
//!
//! One cycle: reset the session, handshake, collect frames until the budget,
//! the inter-message timeout or a channel error stops the receive loop, then
//! parse, validate and persist each frame in arrival order.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{LoraSrvError, ParseError, RadioError, RejectionReason, Result};
use crate::processing::{parse, Reading, ReadingBuilder};
use crate::radio::{HandshakeState, RadioChannel, RadioSession};
use crate::storage::PersistenceCoordinator;

/// Why the receive loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveEnd {
    /// Handshake failed, nothing was received
    NotStarted,
    BudgetReached,
    Timeout,
    ChannelError,
}

/// What happened in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub handshake: HandshakeState,
    pub received: usize,
    pub rejected: usize,
    pub accepted: usize,
    /// Readings stored by at least one sink
    pub persisted: usize,
    pub log_failures: usize,
    pub db_failures: usize,
    pub ended_by: ReceiveEnd,
}

impl CycleSummary {
    fn new(handshake: HandshakeState) -> Self {
        Self {
            handshake,
            received: 0,
            rejected: 0,
            accepted: 0,
            persisted: 0,
            log_failures: 0,
            db_failures: 0,
            ended_by: ReceiveEnd::NotStarted,
        }
    }

    /// Accepted readings that no sink stored
    pub fn lost(&self) -> usize {
        self.accepted - self.persisted
    }

    /// Handshake completed and, if anything was accepted, something was stored
    pub fn is_success(&self) -> bool {
        self.handshake == HandshakeState::Acknowledged && (self.accepted == 0 || self.persisted > 0)
    }
}

impl std::fmt::Display for CycleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "handshake {}, received {}, rejected {}, accepted {}, persisted {} (log failures {}, db failures {}), ended by {:?}",
            self.handshake,
            self.received,
            self.rejected,
            self.accepted,
            self.persisted,
            self.log_failures,
            self.db_failures,
            self.ended_by
        )
    }
}

/// Why a received frame was dropped
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Rejected(#[from] RejectionReason),
}

/// Timing and budget knobs for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSettings {
    pub device_id: String,
    pub message_timeout: Duration,
    pub max_messages_per_cycle: usize,
    pub interval: Duration,
    /// 0 disables the limit
    pub max_consecutive_handshake_failures: u32,
}

impl From<&Config> for CycleSettings {
    fn from(config: &Config) -> Self {
        Self {
            device_id: config.device.id.clone(),
            message_timeout: config.device.message_timeout,
            max_messages_per_cycle: config.device.max_messages_per_cycle,
            interval: config.service.interval,
            max_consecutive_handshake_failures: config.service.max_consecutive_handshake_failures,
        }
    }
}

pub struct CycleController<R: RadioChannel> {
    session: RadioSession<R>,
    builder: ReadingBuilder,
    coordinator: PersistenceCoordinator,
    settings: CycleSettings,
}

impl<R: RadioChannel> CycleController<R> {
    pub fn new(
        session: RadioSession<R>,
        builder: ReadingBuilder,
        coordinator: PersistenceCoordinator,
        settings: CycleSettings,
    ) -> Self {
        Self {
            session,
            builder,
            coordinator,
            settings,
        }
    }

    pub fn session(&self) -> &RadioSession<R> {
        &self.session
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Turn one raw frame into a reading from the configured device
    pub fn ingest(
        &self,
        raw_frame: &str,
        timestamp: DateTime<Utc>,
    ) -> std::result::Result<Reading, FrameError> {
        let parsed = parse(raw_frame)?;

        if parsed.device_id() != self.settings.device_id {
            return Err(RejectionReason::UnexpectedDevice {
                expected: self.settings.device_id.clone(),
                actual: parsed.device_id().to_string(),
            }
            .into());
        }

        Ok(self
            .builder
            .build(&self.settings.device_id, &parsed, timestamp)?)
    }

    /// Run a single handshake/receive/persist cycle
    pub async fn run_once(&mut self) -> CycleSummary {
        self.session.reset();
        let handshake = self.session.handshake().await;
        let mut summary = CycleSummary::new(handshake);

        if handshake != HandshakeState::Acknowledged {
            match self.session.last_error() {
                Some(e) => warn!("Handshake failed: {}", e),
                None => warn!("Handshake with {} timed out", self.settings.device_id),
            }
            return summary;
        }

        let mut frames = Vec::new();
        summary.ended_by = loop {
            if frames.len() >= self.settings.max_messages_per_cycle {
                break ReceiveEnd::BudgetReached;
            }
            match self.session.receive_frame(self.settings.message_timeout).await {
                Ok(frame) => frames.push((frame, Utc::now())),
                Err(RadioError::Timeout(_)) => {
                    debug!(
                        "No further frames within {:?}",
                        self.settings.message_timeout
                    );
                    break ReceiveEnd::Timeout;
                },
                Err(e) => {
                    warn!("Receive loop ended by radio error: {}", e);
                    break ReceiveEnd::ChannelError;
                },
            }
        };
        summary.received = frames.len();

        for (frame, timestamp) in frames {
            let reading = match self.ingest(&frame, timestamp) {
                Ok(reading) => reading,
                Err(e) => {
                    summary.rejected += 1;
                    warn!("Rejected frame {:?}: {}", frame.trim(), e);
                    continue;
                },
            };

            summary.accepted += 1;
            info!("Accepted reading: {}", reading.summary());

            let outcome = self.coordinator.persist(&reading).await;
            if outcome.persisted() {
                summary.persisted += 1;
            }
            if outcome.log.is_failure() {
                summary.log_failures += 1;
            }
            if outcome.db.is_failure() {
                summary.db_failures += 1;
            }
        }

        summary
    }

    /// Repeat cycles until `shutdown` fires
    ///
    /// The interval is measured from the end of one cycle to the start of
    /// the next. A running cycle always completes; only the pause between
    /// cycles is interrupted.
    pub async fn run_continuous(&mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting continuous mode with interval: {:?}",
            self.settings.interval
        );

        let mut cycle: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                info!("Shutdown requested, stopping after {} cycles", cycle);
                return Ok(());
            }

            cycle += 1;
            let summary = self.run_once().await;
            info!("Cycle {} complete: {}", cycle, summary);

            if summary.handshake == HandshakeState::Acknowledged {
                consecutive_failures = 0;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
                let limit = self.settings.max_consecutive_handshake_failures;
                if limit > 0 && consecutive_failures >= limit {
                    error!(
                        "Handshake failed {} times in a row, giving up",
                        consecutive_failures
                    );
                    return Err(LoraSrvError::HandshakeFailuresExceeded(consecutive_failures));
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping after {} cycles", cycle);
                    return Ok(());
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }
}
