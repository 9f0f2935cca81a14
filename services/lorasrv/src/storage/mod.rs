//! Persistence: sink traits, adapters and the dual-write coordinator

pub mod coordinator;
pub mod influx;
pub mod line_protocol;
pub mod log_file;
pub mod retry;
pub mod traits;

pub use coordinator::{PersistOutcome, PersistenceCoordinator, WriteOutcome};
pub use influx::InfluxWriter;
pub use line_protocol::{point_to_line, LineProtocolBuilder};
pub use log_file::DailyLogSink;
pub use retry::RetryPolicy;
pub use traits::{LogSink, Point, PointWriter, DEVICE_TAG};
