//! LoRa Sensor Gateway (`lorasrv`)
//!
//! Handshakes with a remote sensor node, validates its telemetry and stores
//! every accepted reading in a daily log file and InfluxDB.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use lorasrv::bootstrap::{self, Args, EXIT_CYCLE_FAILED, EXIT_OK, EXIT_STARTUP};
use lorasrv::{build_gateway, Config, LoraSrvError};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            // logging may not be up yet
            eprintln!("lorasrv: {:#}", e);
            error!("Startup failed: {:#}", e);
            ExitCode::from(EXIT_STARTUP)
        },
    }
}

async fn run(args: Args) -> anyhow::Result<u8> {
    let mut config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate()?;

    let log_config = bootstrap::log_config(&config, !args.no_color)?;
    common::init_with_config(log_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let service_info = bootstrap::service_info();
    if !args.no_color {
        common::print_startup_banner(&service_info);
    }
    info!(
        "Starting {} v{} (config: {})",
        service_info.name,
        service_info.version,
        args.config.display()
    );

    // Validation mode: validate and exit
    if args.validate {
        let rendered = config.to_redacted_yaml()?;
        println!("{}", rendered);
        info!("Validation completed successfully");
        return Ok(EXIT_OK);
    }

    let mut gateway = build_gateway(&config).await?;

    if args.single {
        info!("Running single cycle");
        let summary = gateway.run_once().await;
        info!("Cycle complete: {}", summary);
        info!("Radio status: {:?}", gateway.session().diagnostics().await);
        return Ok(bootstrap::exit_code(&summary));
    }

    let shutdown = common::shutdown_token();
    match gateway.run_continuous(shutdown).await {
        Ok(()) => {
            info!("{} stopped", service_info.name);
            Ok(EXIT_OK)
        },
        Err(e @ LoraSrvError::HandshakeFailuresExceeded(_)) => {
            error!("{}", e);
            Ok(EXIT_CYCLE_FAILED)
        },
        Err(e) => Err(e.into()),
    }
}
