//! tcpeek Exporter CLI
//!
//! Serves tcpeek statistics on a Prometheus scrape endpoint.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tcpeek_exporter::{
    Collector, ExporterConfig, FileConfig, MetricRegistry, MetricsServer, MetricsServerConfig,
    StatsClient,
};
use tracing::{error, info};

/// Prometheus exporter for tcpeek.
#[derive(Debug, Parser)]
#[command(name = "tcpeek-exporter", version, about)]
struct Cli {
    /// Unix domain socket for tcpeek [default: /var/run/tcpeek.sock]
    #[arg(long = "tcpeek-socket", value_name = "PATH")]
    tcpeek_socket: Option<PathBuf>,

    /// Listen address and port [default: 127.0.0.1:9381]
    #[arg(long, value_name = "ADDR:PORT")]
    listen: Option<String>,

    /// Prometheus metric name prefix
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print verbose messages
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    if let Err(e) = run(cli) {
        error!("tcpeek-exporter-{} failed: {}", tcpeek_exporter::VERSION, e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path)?.exporter,
        None => ExporterConfig::default(),
    };
    let config = file
        .merge(cli.tcpeek_socket, cli.listen, cli.prefix)
        .resolve()?;

    info!(
        "tcpeek exporter v{} (socket={}, namespace={})",
        tcpeek_exporter::VERSION,
        config.socket.display(),
        config.namespace
    );

    let registry = Arc::new(MetricRegistry::new(&config.namespace)?);
    let collector = Arc::new(Collector::new(StatsClient::new(&config.socket), registry));
    let server = MetricsServer::new(
        MetricsServerConfig {
            bind_addr: config.listen,
        },
        collector,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server.run(shutdown_signal()))?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received interrupt, shutting down");
    }
}
