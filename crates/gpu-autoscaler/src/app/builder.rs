use std::sync::Arc;

use anyhow::Result;
use kube::Client;

use crate::app::control_loop::ControlLoop;
use crate::app::core::Application;
use crate::config::load_inventory;
use crate::config::ClusterArgs;
use crate::config::RunArgs;
use crate::domain::NodeInventory;
use crate::infrastructure::actuator::HttpActuator;
use crate::infrastructure::k8s::DemandCollector;
use crate::infrastructure::k8s::KubePodSource;
use crate::infrastructure::k8s::PodWatcher;
use crate::infrastructure::kube_client;

/// Application builder
pub struct ApplicationBuilder {
    run_args: RunArgs,
}

impl ApplicationBuilder {
    /// Create new application builder
    pub fn new(run_args: RunArgs) -> Self {
        Self { run_args }
    }

    /// Build complete application.
    ///
    /// `env` is the process environment, scanned for `<PREFIX>_GPU_COUNT` nodes.
    /// Fails when no valid node is configured or the Kubernetes API is unreachable.
    pub async fn build<I>(self, env: I) -> Result<Application>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        tracing::info!("Building application components...");

        let inventory = Arc::new(load_cluster_inventory(&self.run_args.cluster, env)?);
        let client = connect(&self.run_args.cluster).await?;

        let actuator = HttpActuator::new(self.run_args.actuation_timeout())
            .map_err(|e| anyhow::anyhow!("Failed to create actuation client: {e:?}"))?;

        let control_loop = ControlLoop::new(
            inventory,
            create_collector(&self.run_args.cluster, client.clone()),
            Arc::new(actuator),
        )
        .with_dry_run(self.run_args.dry_run);

        let pod_watcher = self.run_args.watch_pods.then(|| {
            Arc::new(PodWatcher::new(
                client,
                self.run_args.cluster.gpu_resource_name.clone(),
            ))
        });

        Ok(Application::new(
            Arc::new(control_loop),
            pod_watcher,
            self.run_args,
        ))
    }
}

/// Load and validate the node inventory.
pub fn load_cluster_inventory<I>(cluster: &ClusterArgs, env: I) -> Result<NodeInventory>
where
    I: IntoIterator<Item = (String, String)>,
{
    load_inventory(cluster.nodes_file.as_deref(), env)
        .map_err(|e| anyhow::anyhow!("Failed to load GPU node inventory: {e:?}"))
}

/// Create the Kubernetes client and make sure the API server answers.
pub async fn connect(cluster: &ClusterArgs) -> Result<Client> {
    let client = kube_client::init_kube_client(cluster.kubeconfig.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {e:?}"))?;
    kube_client::verify_connection(&client)
        .await
        .map_err(|e| anyhow::anyhow!("Kubernetes API server is not reachable: {e:?}"))?;
    Ok(client)
}

pub fn create_collector(cluster: &ClusterArgs, client: Client) -> DemandCollector {
    DemandCollector::new(
        Arc::new(KubePodSource::new(client)),
        cluster.gpu_resource_name.clone(),
        cluster.list_timeout(),
    )
    .with_idle_nodes(cluster.record_idle_nodes)
}
