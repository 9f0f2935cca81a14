//! Runtime: cycle controller and its assembly from configuration

pub mod cycle;

pub use cycle::{CycleController, CycleSettings, CycleSummary, FrameError, ReceiveEnd};

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::processing::ReadingBuilder;
use crate::radio::{self, RadioChannel, RadioSession};
use crate::storage::{DailyLogSink, InfluxWriter, PersistenceCoordinator, PointWriter};

/// Gateway wired for the configured radio and sinks
pub type Gateway = CycleController<Box<dyn RadioChannel>>;

/// Open the radio, create both sinks and assemble the controller
///
/// An unreachable InfluxDB is only reported; writes are retried per reading.
pub async fn build_gateway(config: &Config) -> Result<Gateway> {
    let table = Arc::new(config.field_table()?);
    info!("Loaded {} field mappings", table.len());

    let channel = radio::open_channel(config).await?;
    info!("Radio channel opened: {}", channel.kind());

    let session = RadioSession::new(
        channel,
        config.device.handshake_token(),
        config.device.handshake_timeout,
    );

    let log_sink = Arc::new(DailyLogSink::new(
        &config.storage.log_base_dir,
        &config.storage.daily_log_file,
    ));
    let influx = Arc::new(InfluxWriter::new(&config.influxdb));
    match influx.health_check().await {
        Ok(()) => info!("InfluxDB connection established"),
        Err(e) => warn!("InfluxDB health check failed, continuing: {}", e),
    }

    let coordinator = PersistenceCoordinator::new(
        log_sink,
        influx,
        config.retry_policy(),
        &config.influxdb.measurement,
    );

    Ok(CycleController::new(
        session,
        ReadingBuilder::new(table),
        coordinator,
        CycleSettings::from(config),
    ))
}
