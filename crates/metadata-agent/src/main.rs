mod agent;
mod cli;

use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter};

use agent::Agent;

const EXIT_OK: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 1;
const EXIT_BIND_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let initial_filter = cli
        .log_level
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(EnvFilter::from_default_env);
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = if cli.config.exists() { Some(cli.config.as_path()) } else { None };
    let mut config = match metadata_config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // `--log-level` is an explicit override and takes priority; absent
    // that, `verbose_logging` from the loaded config bumps per-poll and
    // per-request lines to DEBUG.
    if cli.log_level.is_none() && config.verbose_logging {
        if filter_handle.modify(|f| *f = EnvFilter::new("debug")).is_err() {
            tracing::warn!("failed to apply verbose_logging to the log filter");
        }
    }

    if let Some(host) = cli.bind_host {
        config.metadata_api_bind_host = host;
    }
    if let Some(port) = cli.bind_port {
        config.metadata_api_bind_port = port;
    }

    let bind_addr: SocketAddr =
        match format!("{}:{}", config.metadata_api_bind_host, config.metadata_api_bind_port).parse() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::error!(error = %e, "invalid bind address");
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.metadata_api_num_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start async runtime");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    runtime.block_on(run(config, bind_addr))
}

async fn run(config: metadata_config::Configuration, bind_addr: SocketAddr) -> ExitCode {
    let agent = Agent::build(&config, bind_addr).await;

    match agent.run(shutdown_signal()).await {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(e) => {
            tracing::error!(error = %e, "agent exited with error");
            ExitCode::from(EXIT_BIND_ERROR)
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
