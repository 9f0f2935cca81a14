//! InfluxDB 2.x point writer

use async_trait::async_trait;
use influxdb2::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::config::InfluxConfig;
use crate::error::SinkError;
use crate::storage::line_protocol::point_to_line;
use crate::storage::traits::{Point, PointWriter};

/// Writes points to one org/bucket through the official client
pub struct InfluxWriter {
    client: Client,
    url: String,
    org: String,
    bucket: String,
    write_timeout: Duration,
}

impl std::fmt::Debug for InfluxWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxWriter")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> Self {
        debug!(
            "Creating InfluxDB client: url={}, org={}, bucket={}",
            config.url, config.org, config.bucket
        );

        Self {
            client: Client::new(&config.url, &config.org, &config.token),
            url: config.url.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            write_timeout: config.write_timeout,
        }
    }

    /// Write raw line protocol, bounded by the configured timeout
    pub async fn write_line_protocol(&self, data: String) -> Result<(), SinkError> {
        debug!(
            "Writing to InfluxDB: org={}, bucket={}, data_len={}",
            self.org,
            self.bucket,
            data.len()
        );

        match timeout(
            self.write_timeout,
            self.client.write_line_protocol(&self.org, &self.bucket, data),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SinkError::Db(format!("Write failed: {e}"))),
            Err(_) => Err(SinkError::Db(format!(
                "Write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        let line = point_to_line(point)
            .ok_or_else(|| SinkError::Db("point has no fields".to_string()))?;
        self.write_line_protocol(line).await
    }

    async fn health_check(&self) -> Result<(), SinkError> {
        let probe = async {
            let health = self
                .client
                .health()
                .await
                .map_err(|e| SinkError::Db(format!("Health check failed: {e}")))?;
            debug!("InfluxDB health check: {:?}", health);

            let ready = self
                .client
                .ready()
                .await
                .map_err(|e| SinkError::Db(format!("Ready check failed: {e}")))?;
            if !ready {
                return Err(SinkError::Db("InfluxDB is not ready".to_string()));
            }
            Ok::<(), SinkError>(())
        };

        timeout(self.write_timeout, probe).await.map_err(|_| {
            SinkError::Db(format!(
                "Health check timed out after {:?}",
                self.write_timeout
            ))
        })??;

        Ok(())
    }
}
