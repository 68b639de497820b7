use std::time::Duration;

use error_stack::Report;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::watcher;
use kube::runtime::watcher::Config;
use kube::runtime::WatchStreamExt;
use kube::Api;
use kube::Client;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::app::trigger::CycleTrigger;
use crate::infrastructure::k8s::pod_info::is_gpu_pod;
use crate::infrastructure::k8s::types::KubernetesError;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Watches pods in all namespaces and requests a scaling cycle whenever a
/// GPU pod is created, changes or goes away.
pub struct PodWatcher {
    client: Client,
    resource_name: String,
}

impl PodWatcher {
    pub fn new(client: Client, resource_name: String) -> Self {
        Self {
            client,
            resource_name,
        }
    }

    /// Start watching pods for changes.
    ///
    /// This method runs until cancelled, restarting the watch after a delay
    /// whenever the stream fails.
    #[tracing::instrument(skip(self, trigger, cancellation_token), fields(resource = %self.resource_name))]
    pub async fn run(
        &self,
        trigger: CycleTrigger,
        cancellation_token: CancellationToken,
    ) -> Result<(), Report<KubernetesError>> {
        info!("Starting pod watcher");
        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Pod watcher shutdown requested");
                    break;
                }
                result = self.watch_pods(&trigger) => {
                    match result {
                        Ok(()) => {
                            warn!("Pod watch stream ended unexpectedly, restarting...");
                        }
                        Err(e) => {
                            error!("Pod watch failed: {e:?}");
                            select! {
                                _ = cancellation_token.cancelled() => {
                                    info!("Pod watcher shutdown requested");
                                    break;
                                }
                                _ = tokio::time::sleep(RETRY_DELAY) => {}
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Watch pods and process events.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::WatchFailed`] if the watch operation fails
    async fn watch_pods(&self, trigger: &CycleTrigger) -> Result<(), Report<KubernetesError>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let mut stream = watcher(api, Config::default()).touched_objects().boxed();

        while let Some(event) = stream.next().await {
            match event {
                Ok(pod) => {
                    self.handle_pod_event(&pod, trigger);
                }
                Err(e) => {
                    return Err(Report::new(KubernetesError::WatchFailed {
                        message: format!("Watch stream error: {e}"),
                    }));
                }
            }
        }

        Ok(())
    }

    /// Request a cycle if `pod` is a GPU pod. Returns whether it was one.
    fn handle_pod_event(&self, pod: &Pod, trigger: &CycleTrigger) -> bool {
        if !is_gpu_pod(pod, &self.resource_name) {
            return false;
        }

        debug!(
            pod = pod.metadata.name.as_deref().unwrap_or("unknown"),
            namespace = pod.metadata.namespace.as_deref().unwrap_or("default"),
            "GPU pod changed, requesting scaling cycle"
        );
        if !trigger.request() {
            warn!("Control loop is not accepting cycle requests");
        }
        true
    }
}
