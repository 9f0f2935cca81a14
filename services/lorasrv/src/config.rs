//! lorasrv configuration
//!
//! Loaded with figment from a YAML file, then overridden by environment:
//! the plain `INFLUXDB_*` / `DEVICE_ID` variables first, then anything under
//! `LORASRV_` with `__` as the section separator (e.g. `LORASRV_DEVICE__ID`).

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{LoraSrvError, Result};
use crate::processing::{FieldSpec, FieldTable};
use crate::storage::RetryPolicy;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/lorasrv.yaml";

/// Environment prefix for structured overrides
pub const ENV_PREFIX: &str = "LORASRV_";

/// Unprefixed variables honoured for compatibility with existing deployments
const LEGACY_ENV_KEYS: [&str; 5] = [
    "INFLUXDB_TOKEN",
    "INFLUXDB_URL",
    "INFLUXDB_ORG",
    "INFLUXDB_BUCKET",
    "DEVICE_ID",
];

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Pause between the end of one cycle and the start of the next
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Consecutive handshake timeouts before continuous mode gives up (0 = never)
    #[serde(default = "default_max_handshake_failures")]
    pub max_consecutive_handshake_failures: u32,
}

fn default_service_name() -> String {
    "lorasrv".to_string()
}

fn default_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_max_handshake_failures() -> u32 {
    5
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            interval: default_interval(),
            max_consecutive_handshake_failures: default_max_handshake_failures(),
        }
    }
}

/// Which radio adapter to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioKind {
    /// LoRa UART modem driven with AT commands
    #[default]
    Serial,
    /// In-process simulated sensor node
    Simulated,
}

/// Radio adapter settings; modulation values are passed to the modem as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    #[serde(default)]
    pub kind: RadioKind,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Address of the local modem
    #[serde(default = "default_address")]
    pub address: u16,
    /// Destination for outgoing frames (0 = broadcast)
    #[serde(default)]
    pub remote_address: u16,
    #[serde(default = "default_network_id")]
    pub network_id: u8,
    #[serde(default = "default_frequency_mhz")]
    pub frequency_mhz: f64,
    #[serde(default = "default_spreading_factor")]
    pub spreading_factor: u8,
    #[serde(default = "default_bandwidth")]
    pub bandwidth: u8,
    #[serde(default = "default_coding_rate")]
    pub coding_rate: u8,
    #[serde(default = "default_preamble")]
    pub preamble: u8,
    #[serde(default = "default_tx_power")]
    pub tx_power: u8,
    /// How long to wait for `+OK` after an AT command
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_address() -> u16 {
    1
}

fn default_network_id() -> u8 {
    18
}

fn default_frequency_mhz() -> f64 {
    915.0
}

fn default_spreading_factor() -> u8 {
    7
}

fn default_bandwidth() -> u8 {
    9
}

fn default_coding_rate() -> u8 {
    1
}

fn default_preamble() -> u8 {
    12
}

fn default_tx_power() -> u8 {
    22
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            kind: RadioKind::default(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            address: default_address(),
            remote_address: 0,
            network_id: default_network_id(),
            frequency_mhz: default_frequency_mhz(),
            spreading_factor: default_spreading_factor(),
            bandwidth: default_bandwidth(),
            coding_rate: default_coding_rate(),
            preamble: default_preamble(),
            tx_power: default_tx_power(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Remote sensor node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    /// Handshake message; the node echoes it back as the acknowledgement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_token: Option<String>,
    #[serde(default = "default_handshake_timeout", with = "humantime_serde")]
    pub handshake_timeout: Duration,
    /// Maximum silence between two data frames
    #[serde(default = "default_message_timeout", with = "humantime_serde")]
    pub message_timeout: Duration,
    #[serde(default = "default_max_messages")]
    pub max_messages_per_cycle: usize,
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_message_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_messages() -> usize {
    1
}

impl DeviceConfig {
    /// Configured token, falling back to the device id
    pub fn handshake_token(&self) -> &str {
        self.handshake_token.as_deref().unwrap_or(&self.id)
    }
}

/// Append-only log location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_log_base_dir")]
    pub log_base_dir: String,
    #[serde(default = "default_daily_log_file")]
    pub daily_log_file: String,
}

fn default_log_base_dir() -> String {
    "data".to_string()
}

fn default_daily_log_file() -> String {
    "readings.log".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_base_dir: default_log_base_dir(),
            daily_log_file: default_daily_log_file(),
        }
    }
}

/// InfluxDB 2.x settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    pub url: String,
    pub org: String,
    pub bucket: String,
    #[serde(default, serialize_with = "redact")]
    pub token: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,
}

fn default_measurement() -> String {
    "sensor_data".to_string()
}

fn default_write_timeout() -> Duration {
    Duration::from_secs(10)
}

fn redact<S: Serializer>(value: &str, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("***")
    }
}

/// Retry settings applied to each sink write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay: default_max_delay(),
            jitter: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_delay,
            backoff_multiplier: config.backoff_multiplier,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }
}

/// Tracing output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Write the log file as JSON lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            json: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    pub device: DeviceConfig,
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub storage: StorageConfig,
    pub influxdb: InfluxConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Field mappings understood by the stock sensor firmware
fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("Max_A", "maxAcceleration_m/s2"),
        FieldSpec::new("RMS_A", "rmsAcceleration_m/s2"),
        FieldSpec::new("Temp", "temperature_C"),
        FieldSpec::new("Pressure", "pressure_hPa"),
        FieldSpec::new("Humidity", "humidity_%"),
    ]
}

impl Config {
    /// Load from `path` plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LoraSrvError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        Self::from_figment(Self::figment(path))
    }

    /// Provider chain used by `load`
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(
                Env::raw()
                    .only(&LEGACY_ENV_KEYS)
                    .map(|key| key.as_str().replacen('_', ".", 1).into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.service.name.trim().is_empty() {
            return Err(LoraSrvError::Config(
                "service.name cannot be empty".to_string(),
            ));
        }

        if self.device.id.trim().is_empty() {
            return Err(LoraSrvError::Config("device.id cannot be empty".to_string()));
        }
        if self.device.handshake_token().trim().is_empty() {
            return Err(LoraSrvError::Config(
                "device.handshake_token cannot be empty".to_string(),
            ));
        }
        // received IDs and acks are compared after trimming
        for (key, value) in [
            ("device.id", self.device.id.as_str()),
            ("device.handshake_token", self.device.handshake_token()),
        ] {
            if value.trim() != value {
                return Err(LoraSrvError::Config(format!(
                    "{} has surrounding whitespace: {:?}",
                    key, value
                )));
            }
        }
        if self.device.handshake_timeout.is_zero() || self.device.message_timeout.is_zero() {
            return Err(LoraSrvError::Config(
                "device timeouts must be greater than zero".to_string(),
            ));
        }
        if self.device.max_messages_per_cycle == 0 {
            return Err(LoraSrvError::Config(
                "device.max_messages_per_cycle must be at least 1".to_string(),
            ));
        }

        if self.radio.kind == RadioKind::Serial {
            if self.radio.port.trim().is_empty() {
                return Err(LoraSrvError::Config("radio.port cannot be empty".to_string()));
            }
            if self.radio.baud_rate == 0 {
                return Err(LoraSrvError::Config(
                    "radio.baud_rate must be greater than zero".to_string(),
                ));
            }
        }
        if !self.radio.frequency_mhz.is_finite() || self.radio.frequency_mhz <= 0.0 {
            return Err(LoraSrvError::Config(
                "radio.frequency_mhz must be a positive number".to_string(),
            ));
        }

        if self.storage.log_base_dir.trim().is_empty() || self.storage.daily_log_file.trim().is_empty()
        {
            return Err(LoraSrvError::Config(
                "storage.log_base_dir and storage.daily_log_file cannot be empty".to_string(),
            ));
        }

        for (key, value) in [
            ("influxdb.url", &self.influxdb.url),
            ("influxdb.org", &self.influxdb.org),
            ("influxdb.bucket", &self.influxdb.bucket),
            ("influxdb.measurement", &self.influxdb.measurement),
        ] {
            if value.trim().is_empty() {
                return Err(LoraSrvError::Config(format!("{} cannot be empty", key)));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(LoraSrvError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(LoraSrvError::Config(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        self.field_table().map(|_| ())
    }

    /// Build the field lookup table from `fields`
    pub fn field_table(&self) -> Result<FieldTable> {
        FieldTable::new(self.fields.clone())
    }

    /// Retry policy for sink writes
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// YAML rendering with secrets redacted
    pub fn to_redacted_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| LoraSrvError::Config(e.to_string()))
    }
}
