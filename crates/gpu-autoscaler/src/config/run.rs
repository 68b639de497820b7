use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};

/// Where demand comes from and which nodes are managed.
#[derive(Args, Clone, Debug)]
pub struct ClusterArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "GPU_NODES_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "YAML/JSON list of GPU nodes, read in addition to <PREFIX>_GPU_COUNT environment variables"
    )]
    pub nodes_file: Option<PathBuf>,

    #[arg(
        long,
        env = "GPU_RESOURCE_NAME",
        default_value = "nvidia.com/gpu",
        help = "Extended resource name counted as GPU demand"
    )]
    pub gpu_resource_name: String,

    #[arg(
        long,
        env = "POD_LIST_TIMEOUT_SECS",
        default_value = "10",
        help = "Timeout for listing pods in one cycle"
    )]
    pub list_timeout_secs: u64,

    #[arg(
        long,
        env = "RECORD_IDLE_NODES",
        help = "Treat nodes running only non-GPU pods as active with zero GPU usage",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub record_idle_nodes: bool,
}

impl ClusterArgs {
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }
}

#[derive(Parser, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,

    #[arg(
        long,
        env = "SCALE_INTERVAL_SECS",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between scaling cycles"
    )]
    pub interval_secs: u64,

    #[arg(
        long,
        env = "WATCH_GPU_PODS",
        help = "Also run a cycle when a GPU pod changes",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub watch_pods: bool,

    #[arg(
        long,
        env = "ACTUATION_TIMEOUT_SECS",
        default_value = "5",
        help = "Timeout for a scale-up/scale-down webhook call"
    )]
    pub actuation_timeout_secs: u64,

    #[arg(
        long,
        env = "DRY_RUN",
        help = "Log decisions without calling any webhook",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub dry_run: bool,

    #[arg(
        long,
        env = "GPU_AUTOSCALER_METRICS_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Write capacity reports as influx lines to this file, e.g. /logs/metrics.log"
    )]
    pub metrics_file: Option<PathBuf>,
}

impl RunArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn actuation_timeout(&self) -> Duration {
        Duration::from_secs(self.actuation_timeout_secs)
    }
}

#[derive(Parser, Clone, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub cluster: ClusterArgs,
}
