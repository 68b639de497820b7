use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use kube::Client;

use crate::infrastructure::k8s::KubernetesError;

/// Read access to the pods of the whole cluster.
#[async_trait::async_trait]
pub trait PodSource: Send + Sync {
    /// List every pod in every namespace.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ListFailed`] if the API request fails
    async fn list_pods(&self) -> Result<Vec<Pod>, Report<KubernetesError>>;
}

/// [`PodSource`] backed by the Kubernetes API server.
pub struct KubePodSource {
    client: Client,
}

impl KubePodSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl PodSource for KubePodSource {
    async fn list_pods(&self) -> Result<Vec<Pod>, Report<KubernetesError>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = api
            .list(&ListParams::default())
            .await
            .change_context(KubernetesError::ListFailed {
                message: "Failed to list pods in all namespaces".to_string(),
            })?;
        Ok(pods.items)
    }
}
