use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[clap(bin_name = env!("CARGO_PKG_NAME"), version = env!("CARGO_PKG_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    /// Path to the configuration file
    #[clap(name = "config")]
    pub config: PathBuf,

    /// Refresh every calendar once, print the agenda and exit
    #[clap(long)]
    pub once: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[clap(short, long)]
    pub verbose: bool,
}
