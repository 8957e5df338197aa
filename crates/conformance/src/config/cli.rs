use clap::Parser;
use clap::Subcommand;
use utils::version;

use crate::config::run::CheckConfigArgs;
use crate::config::run::RunArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the cluster against the expected state
    Run(Box<RunArgs>),
    /// Load the expected state and print it without contacting the cluster
    #[command(name = "check-config")]
    CheckConfig(CheckConfigArgs),
}
