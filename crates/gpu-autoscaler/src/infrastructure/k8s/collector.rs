use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use tracing::debug;

use crate::domain::DemandSnapshot;
use crate::infrastructure::k8s::pod_info::pod_demand;
use crate::infrastructure::k8s::KubernetesError;
use crate::infrastructure::k8s::PodSource;

/// Demand/usage collector: one bounded pod listing per call, reduced to a snapshot.
pub struct DemandCollector {
    source: Arc<dyn PodSource>,
    resource_name: String,
    timeout: Duration,
    record_idle_nodes: bool,
}

impl DemandCollector {
    pub fn new(source: Arc<dyn PodSource>, resource_name: String, timeout: Duration) -> Self {
        Self {
            source,
            resource_name,
            timeout,
            record_idle_nodes: false,
        }
    }

    pub fn with_idle_nodes(mut self, record_idle_nodes: bool) -> Self {
        self.record_idle_nodes = record_idle_nodes;
        self
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Take a fresh demand snapshot.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::Timeout`] if listing takes longer than the configured timeout
    /// - [`KubernetesError::ListFailed`] if the pod source fails
    pub async fn collect(&self) -> Result<DemandSnapshot, Report<KubernetesError>> {
        let pods = match tokio::time::timeout(self.timeout, self.source.list_pods()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Report::new(KubernetesError::Timeout {
                    timeout: self.timeout,
                }))
            }
        };

        let snapshot = DemandSnapshot::from_pods(
            pods.iter().map(|pod| pod_demand(pod, &self.resource_name)),
            self.record_idle_nodes,
        );
        debug!(
            pods = pods.len(),
            requested = snapshot.total_requested,
            pending = snapshot.pending,
            active_nodes = snapshot.usage_by_node.len(),
            "Collected GPU demand"
        );
        Ok(snapshot)
    }
}
