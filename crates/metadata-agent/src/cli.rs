use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "metadata-agent", about = "Host resource identity and metadata discovery", version)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "/etc/metadata-agent/config.toml")]
    pub config: PathBuf,

    /// Overrides `verbose_logging` / the tracing env filter.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Overrides `metadata_api_bind_host`.
    #[arg(long)]
    pub bind_host: Option<String>,

    /// Overrides `metadata_api_bind_port`.
    #[arg(long)]
    pub bind_port: Option<u16>,
}
