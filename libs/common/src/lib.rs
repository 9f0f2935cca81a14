//! lorasrv basic library
//!
//! Provides infrastructure shared by the gateway binary and its tests:
//! - logging initialization (console + daily rolling file)
//! - shutdown signal handling
//! - service bootstrap helpers (startup banner)

pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use logging::{init_with_config, resolve_log_dir, LogConfig};
pub use service_bootstrap::{print_startup_banner, ServiceInfo};
pub use shutdown::{shutdown_token, wait_for_shutdown};
