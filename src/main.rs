//! R0N Relay binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use r0n_relay::config::{ConfigLoader, LogLevel, Protocol, RelayConfig, Route};
use r0n_relay::logging::subscriber;
use r0n_relay::modules::tcp_relay::available_cores;
use r0n_relay::supervisor::Supervisor;

/// Layer-4 TCP and UDP relay
#[derive(Parser)]
#[command(name = "r0n-relay")]
#[command(version, about = "Relay TCP and UDP ports to fixed remote endpoints")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comma-separated TCP routes in the format LOCALPORT:REMOTEHOST:REMOTEPORT
    #[arg(long)]
    routes: Option<String>,

    /// Comma-separated UDP routes in the format LOCALPORT:REMOTEHOST:REMOTEPORT
    #[arg(long)]
    udp_routes: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(long)]
    log_level: Option<LogLevel>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Merge the configuration file with command-line routes.
fn build_config(cli: &Cli, loader: &ConfigLoader) -> Result<RelayConfig, BoxError> {
    let mut config = match &cli.config {
        Some(path) => loader.parse_file(path)?,
        None => RelayConfig::default(),
    };

    if let Some(list) = &cli.routes {
        config.extend_routes(Route::parse_list(Protocol::Tcp, list)?);
    }
    if let Some(list) = &cli.udp_routes {
        config.extend_routes(Route::parse_list(Protocol::Udp, list)?);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    Ok(config)
}

fn print_banner(config: &RelayConfig) {
    println!("============ R0N RELAY ============");
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        println!("{protocol} routes:");
        for route in config.routes_for(protocol) {
            println!("  {} -> {}", route.listen_address(), route.target_address());
        }
    }
    println!("===================================");
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let loader = ConfigLoader::standard();
    let config = build_config(&cli, &loader)?;

    subscriber::init(&config.logging)?;
    loader.validate(&config)?;

    print_banner(&config);
    info!("Starting r0n-relay version {}", env!("CARGO_PKG_VERSION"));
    info!("Using {} CPU cores", available_cores());

    let mut supervisor = Supervisor::with_tracing(config);
    if supervisor.spawn_all().await == 0 {
        return Err("no route could be started".into());
    }

    tokio::select! {
        () = supervisor.wait() => {
            error!("All routes have stopped");
        },
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("Shutting down");
                supervisor.shutdown().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for shutdown signal");
                supervisor.wait().await;
            },
        },
    }

    for entry in supervisor.routes() {
        info!(route = %entry.route, status = %entry.status, "Route status");
    }

    Ok(())
}
