//! lorasrv - LoRa sensor gateway
//!
//! Polls a remote sensor node over a LoRa link, validates each telemetry
//! frame against the configured field table and writes accepted readings to
//! a daily log file and to InfluxDB.
//!
//! Pipeline, leaf first:
//! - `processing`: parse a frame, validate fields, build a `Reading`
//! - `radio`: channel adapters and the handshake session
//! - `storage`: sinks, retry policy and the dual-write coordinator
//! - `runtime`: the cycle controller tying it all together

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod processing;
pub mod radio;
pub mod runtime;
pub mod storage;

pub use config::Config;
pub use error::{LoraSrvError, Result};
pub use processing::{Reading, ReadingBuilder};
pub use radio::{HandshakeState, RadioChannel, RadioSession};
pub use runtime::{build_gateway, CycleController, CycleSummary, Gateway};
pub use storage::{PersistOutcome, PersistenceCoordinator, RetryPolicy, WriteOutcome};
