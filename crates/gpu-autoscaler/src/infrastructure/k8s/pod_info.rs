//! Extraction of GPU requests, phase and binding from Kubernetes pods.

use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::warn;

use crate::domain::PodDemand;
use crate::domain::PodPhase;

/// Reduce a pod to the facts GPU accounting needs.
pub fn pod_demand(pod: &Pod, resource_name: &str) -> PodDemand {
    let node_name = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.clone())
        .filter(|name| !name.is_empty());
    let phase = PodPhase::from_status(
        pod.status
            .as_ref()
            .and_then(|status| status.phase.as_deref()),
    );

    PodDemand {
        node_name,
        phase,
        gpus: gpu_request(pod, resource_name),
    }
}

/// Sum of the pod's container requests for `resource_name`.
pub fn gpu_request(pod: &Pod, resource_name: &str) -> u64 {
    containers(pod)
        .filter_map(|container| container_gpu_request(pod, container, resource_name))
        .fold(0, u64::saturating_add)
}

/// Whether any container requests a non-zero amount of `resource_name`.
pub fn is_gpu_pod(pod: &Pod, resource_name: &str) -> bool {
    containers(pod).any(|container| {
        container_gpu_request(pod, container, resource_name).is_some_and(|gpus| gpus > 0)
    })
}

fn containers(pod: &Pod) -> impl Iterator<Item = &Container> {
    pod.spec.iter().flat_map(|spec| spec.containers.iter())
}

fn container_gpu_request(pod: &Pod, container: &Container, resource_name: &str) -> Option<u64> {
    let quantity = container
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get(resource_name)?;

    let gpus = parse_gpu_quantity(quantity);
    if gpus.is_none() {
        warn!(
            pod = pod.metadata.name.as_deref().unwrap_or("unknown"),
            namespace = pod.metadata.namespace.as_deref().unwrap_or("default"),
            container = %container.name,
            "Ignoring unparseable {resource_name} request {:?}",
            quantity.0
        );
    }
    gpus.filter(|gpus| *gpus > 0)
}

/// Parse a GPU quantity. Extended resources are whole numbers, so only plain
/// integers (or decimals with a zero fraction) are accepted.
pub(crate) fn parse_gpu_quantity(quantity: &Quantity) -> Option<u64> {
    let value = quantity.0.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b == b'0') {
            return None;
        }
    }
    whole.parse().ok()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::Container;
    use k8s_openapi::api::core::v1::Pod;
    use k8s_openapi::api::core::v1::PodSpec;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::api::core::v1::ResourceRequirements;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    pub(crate) const GPU: &str = "nvidia.com/gpu";

    pub(crate) fn container(name: &str, requests: &[(&str, &str)]) -> Container {
        let requests: BTreeMap<String, Quantity> = requests
            .iter()
            .map(|(resource, amount)| (resource.to_string(), Quantity(amount.to_string())))
            .collect();
        Container {
            name: name.to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn pod(
        name: &str,
        node_name: Option<&str>,
        phase: &str,
        containers: Vec<Container>,
    ) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: node_name.map(str::to_string),
                containers,
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    /// Single-container pod requesting `gpus` GPUs.
    pub(crate) fn gpu_pod(name: &str, node_name: Option<&str>, phase: &str, gpus: u64) -> Pod {
        pod(
            name,
            node_name,
            phase,
            vec![container("main", &[(GPU, &gpus.to_string())])],
        )
    }
}
