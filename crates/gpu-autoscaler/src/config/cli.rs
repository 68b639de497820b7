use clap::{Parser, Subcommand};
use utils::version;

use crate::config::run::{PlanArgs, RunArgs};

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the autoscaling control loop
    Run(Box<RunArgs>),
    /// Collect demand once, print the scaling decision and exit without actuating
    Plan(PlanArgs),
}
