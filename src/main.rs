//! glean-boot - config-drive discovery and network bootstrap
//!
//! Run once at boot with no arguments to configure everything, or with an
//! interface name from a udev-triggered unit to configure just that
//! interface.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use glean_boot::config::{ConfigLoader, ConfigOverrides};
use glean_boot::gate::Platform;
use glean_boot::{BootConfig, BootRequest, Bootstrap, Outcome};

#[derive(Parser)]
#[command(name = "glean-boot")]
#[command(author, version, about = "Mount the config drive and run network configuration", long_about = None)]
struct Cli {
    /// Interface to configure (all interfaces when omitted)
    interface: Option<String>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file
    #[arg(short, long, env = "GLEAN_BOOT_CONFIG")]
    config: Option<PathBuf>,

    /// Filesystem root for artifact and os-release lookups
    #[arg(long)]
    root: Option<PathBuf>,

    /// Network layout (redhat, suse, debian, alpine, gentoo)
    #[arg(long)]
    platform: Option<Platform>,

    /// Configuration engine executable
    #[arg(long)]
    engine: Option<String>,

    /// Ask the engine not to write any files
    #[arg(short, long)]
    noop: bool,

    /// Configure the interface even if it already has configuration
    #[arg(long, requires = "interface")]
    force: bool,

    /// Do not take the per-interface lock
    #[arg(long)]
    no_lock: bool,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

async fn load_config(cli: &Cli) -> anyhow::Result<BootConfig> {
    let overrides = ConfigOverrides {
        root: cli.root.clone(),
        platform: cli.platform,
        engine: cli.engine.clone(),
        no_lock: cli.no_lock,
    };

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };

    loader
        .with_overrides(overrides)
        .load()
        .await
        .context("loading configuration")
}

fn request(cli: &Cli) -> BootRequest {
    let request = match (&cli.interface, cli.force) {
        (Some(name), false) => BootRequest::hotplug(name),
        (Some(name), true) => BootRequest::interface(name),
        (None, _) => BootRequest::boot(),
    };
    request.with_noop(cli.noop)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli).await {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let request = request(&cli);
    match &request.interface {
        Some(name) => info!("Configuring interface {}", name),
        None => info!("Configuring all interfaces"),
    }

    let bootstrap = Bootstrap::for_system(config).await;
    match bootstrap.run(&request).await {
        Ok(report) => {
            if report.outcome != Outcome::Completed {
                info!("Nothing to do ({:?})", report.outcome);
            }
            ExitCode::from(report.exit_code())
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
