//! Service bootstrap
//!
//! Command-line arguments, logging setup and the mapping from cycle results
//! to process exit codes.

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use common::{LogConfig, ServiceInfo};

use crate::config::{Config, RadioKind, DEFAULT_CONFIG_PATH};
use crate::error::{LoraSrvError, Result};
use crate::runtime::CycleSummary;

pub const SERVICE_NAME: &str = "lorasrv";

/// Cycle persisted data or was clean
pub const EXIT_OK: u8 = 0;
/// Handshake failed or every accepted reading was lost
pub const EXIT_CYCLE_FAILED: u8 = 1;
/// Configuration or startup error
pub const EXIT_STARTUP: u8 = 2;

/// Command-line arguments for lorasrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lorasrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "LoRa sensor gateway: radio handshake, validation, log + InfluxDB persistence",
    long_about = None
)]
pub struct Args {
    /// Configuration file
    #[arg(short = 'c', long, env = "LORASRV_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Run one cycle and exit
    #[arg(short = 's', long)]
    pub single: bool,

    /// Pause between cycles, in seconds or humantime (`90`, `5m`)
    #[arg(short = 'i', long, value_parser = parse_interval)]
    pub interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Validation mode - load and check the configuration, then exit
    #[arg(long)]
    pub validate: bool,

    /// Use the simulated radio regardless of configuration
    #[arg(long)]
    pub simulate: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(interval) = self.interval {
            config.service.interval = interval;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.simulate {
            config.radio.kind = RadioKind::Simulated;
        }
    }
}

/// Plain integers are seconds; anything else goes through humantime
pub fn parse_interval(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let interval = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime_serde::re::humantime::parse_duration(raw).map_err(|e| e.to_string())?,
    };
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

pub fn service_info() -> ServiceInfo {
    ServiceInfo::new(
        SERVICE_NAME,
        env!("CARGO_PKG_VERSION"),
        "LoRa sensor gateway",
    )
}

/// Logger settings derived from configuration
///
/// Log root priority: `LORASRV_LOG_DIR`, then `logging.dir`, then `logs`.
pub fn log_config(config: &Config, ansi: bool) -> Result<LogConfig> {
    let level = Level::from_str(&config.logging.level).map_err(|_| {
        LoraSrvError::Config(format!("invalid log level '{}'", config.logging.level))
    })?;

    Ok(LogConfig {
        service_name: SERVICE_NAME.to_string(),
        log_dir: Some(common::resolve_log_dir(config.logging.dir.as_deref())),
        level,
        enable_json: config.logging.json,
        ansi,
    })
}

/// Exit code for a single-cycle run
pub fn exit_code(summary: &CycleSummary) -> u8 {
    if summary.is_success() {
        EXIT_OK
    } else {
        EXIT_CYCLE_FAILED
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::radio::HandshakeState;
    use crate::runtime::ReceiveEnd;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lorasrv"]).unwrap();
        assert!(!args.single);
        assert!(!args.validate);
        assert!(args.interval.is_none());
        if std::env::var_os("LORASRV_CONFIG").is_none() {
            assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        }
    }

    #[test]
    fn test_short_flags() {
        let args =
            Args::try_parse_from(["lorasrv", "-c", "/etc/lorasrv.yaml", "-s", "-i", "60"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/lorasrv.yaml"));
        assert!(args.single);
        assert_eq!(args.interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("300").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("1m 30s").unwrap(), Duration::from_secs(90));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("soon").is_err());
    }

    fn summary(handshake: HandshakeState, accepted: usize, persisted: usize) -> CycleSummary {
        CycleSummary {
            handshake,
            received: accepted,
            rejected: 0,
            accepted,
            persisted,
            log_failures: 0,
            db_failures: 0,
            ended_by: ReceiveEnd::Timeout,
        }
    }

    #[test]
    fn test_exit_codes() {
        let exit = |h, a, p| exit_code(&summary(h, a, p));

        assert_eq!(exit(HandshakeState::Acknowledged, 1, 1), EXIT_OK);
        assert_eq!(exit(HandshakeState::Acknowledged, 0, 0), EXIT_OK);
        assert_eq!(exit(HandshakeState::Acknowledged, 2, 0), EXIT_CYCLE_FAILED);
        assert_eq!(exit(HandshakeState::TimedOut, 0, 0), EXIT_CYCLE_FAILED);
    }
}
