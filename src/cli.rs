use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "untappd-irc-bridge", version, about)]
pub struct Args {
    /// Path to the JSON configuration file (defaults to config.json).
    #[arg(short, long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
