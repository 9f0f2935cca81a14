//! Service bootstrap utilities
//!
//! Startup banner and service metadata.

use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "lorasrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
        }
    }
}

/// Print startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
 ██╗      ██████╗ ██████╗  █████╗ ███████╗██████╗ ██╗   ██╗
 ██║     ██╔═══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗██║   ██║
 ██║     ██║   ██║██████╔╝███████║███████╗██████╔╝██║   ██║
 ██║     ██║   ██║██╔══██╗██╔══██║╚════██║██╔══██╗╚██╗ ██╔╝
 ███████╗╚██████╔╝██║  ██║██║  ██║███████║██║  ██║ ╚████╔╝
 ╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝  ╚═══╝
    "#;

    info!("{}", banner);
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!("");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_info_fields() {
        let info = ServiceInfo::new("lorasrv", "0.1.0", "LoRa telemetry gateway");
        assert_eq!(info.name, "lorasrv");
        assert_eq!(info.version, "0.1.0");
    }
}
