use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(
    author,
    version,
    about = "Deploy a compiled contract, wait for confirmations and verify it on the block explorer"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "SHIPYARD_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file (or a directory containing Shipyard.toml).
    ///
    /// If not provided, ./Shipyard.toml is used when present and the rest of the
    /// configuration is read from the environment.
    #[arg(short, long, alias = "conf", env = "SHIPYARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deploy without submitting the source to the block explorer.
    #[arg(long, env = "SHIPYARD_SKIP_VERIFY")]
    pub skip_verify: bool,
}
