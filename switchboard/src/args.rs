use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Switchboard LLM gateway
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "OpenAI-compatible gateway in front of many LLM vendors")]
pub struct Args {
    /// Path to configuration file; a missing file means defaults plus environment credentials
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SWITCHBOARD_LISTEN")]
    pub listen: Option<SocketAddr>,
}
