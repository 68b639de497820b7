use anyhow::Result;
use clap::Parser;
use gpu_autoscaler::app::builder;
use gpu_autoscaler::app::control_loop;
use gpu_autoscaler::app::ApplicationBuilder;
use gpu_autoscaler::config::Cli;
use gpu_autoscaler::config::Commands;
use gpu_autoscaler::config::PlanArgs;
use gpu_autoscaler::config::RunArgs;
use gpu_autoscaler::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run_args) => run(*run_args).await,
        Commands::Plan(plan_args) => plan(plan_args).await,
    }
}

async fn run(run_args: RunArgs) -> Result<()> {
    let _guard = logging::init(run_args.metrics_file.as_ref())?;

    tracing::info!("Starting GPU autoscaler {}", &**version::VERSION);

    let app = ApplicationBuilder::new(run_args)
        .build(std::env::vars())
        .await?;

    let result = app.run().await;
    app.shutdown().await?;

    result
}

async fn plan(plan_args: PlanArgs) -> Result<()> {
    utils::logging::init();

    let inventory = builder::load_cluster_inventory(&plan_args.cluster, std::env::vars())?;
    let client = builder::connect(&plan_args.cluster).await?;

    let snapshot = builder::create_collector(&plan_args.cluster, client)
        .collect()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to collect GPU demand: {e:?}"))?;
    control_loop::evaluate(&inventory, &snapshot);

    tracing::info!("Plan complete, no scaling webhook was called");
    Ok(())
}
