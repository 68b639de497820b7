use std::collections::BTreeMap;

/// Pod lifecycle phase as far as GPU accounting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    /// Succeeded, Failed, Unknown or missing.
    Other,
}

impl PodPhase {
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            _ => PodPhase::Other,
        }
    }
}

/// The three facts about a pod that GPU accounting consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodDemand {
    /// Assigned node, `None` while unscheduled.
    pub node_name: Option<String>,
    pub phase: PodPhase,
    /// Sum of the non-zero GPU requests over the pod's containers.
    pub gpus: u64,
}

/// GPU demand and usage reduced from one listing of all pods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemandSnapshot {
    /// Requests of every pod regardless of phase. Reported, never acted on.
    pub total_requested: u64,
    /// GPUs held by running pods, keyed by the node they are bound to.
    pub usage_by_node: BTreeMap<String, u64>,
    /// Requests of unscheduled pending pods.
    pub pending: u64,
}

impl DemandSnapshot {
    /// Reduce pods into a snapshot.
    ///
    /// With `record_idle_nodes` set, a running pod without GPU requests still
    /// marks its node as present in `usage_by_node` (with zero usage).
    pub fn from_pods<I>(pods: I, record_idle_nodes: bool) -> Self
    where
        I: IntoIterator<Item = PodDemand>,
    {
        let mut snapshot = Self::default();
        for pod in pods {
            snapshot.record(pod, record_idle_nodes);
        }
        snapshot
    }

    fn record(&mut self, pod: PodDemand, record_idle_nodes: bool) {
        self.total_requested = self.total_requested.saturating_add(pod.gpus);

        let node_name = pod.node_name.filter(|name| !name.is_empty());
        match (node_name, pod.phase) {
            (Some(node_name), PodPhase::Running) => {
                if pod.gpus > 0 {
                    let usage = self.usage_by_node.entry(node_name).or_insert(0);
                    *usage = usage.saturating_add(pod.gpus);
                } else if record_idle_nodes {
                    self.usage_by_node.entry(node_name).or_insert(0);
                }
            }
            (None, PodPhase::Pending) => self.pending = self.pending.saturating_add(pod.gpus),
            _ => {}
        }
    }

    /// Usage recorded for `node_name`, `None` when the node is not active.
    pub fn usage(&self, node_name: &str) -> Option<u64> {
        self.usage_by_node.get(node_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn pod(node_name: Option<&str>, phase: PodPhase, gpus: u64) -> PodDemand {
        PodDemand {
            node_name: node_name.map(str::to_string),
            phase,
            gpus,
        }
    }

    #[test]
    fn phase_from_status() {
        assert_eq!(PodPhase::from_status(Some("Pending")), PodPhase::Pending);
        assert_eq!(PodPhase::from_status(Some("Running")), PodPhase::Running);
        assert_eq!(PodPhase::from_status(Some("Succeeded")), PodPhase::Other);
        assert_eq!(PodPhase::from_status(None), PodPhase::Other);
    }

    #[test]
    fn running_bound_pods_count_as_usage() {
        let snapshot = DemandSnapshot::from_pods(
            [
                pod(Some("gpu-a"), PodPhase::Running, 2),
                pod(Some("gpu-a"), PodPhase::Running, 1),
                pod(Some("gpu-b"), PodPhase::Running, 4),
            ],
            false,
        );

        assert_eq!(snapshot.usage("gpu-a"), Some(3));
        assert_eq!(snapshot.usage("gpu-b"), Some(4));
        assert_eq!(snapshot.pending, 0);
        assert_eq!(snapshot.total_requested, 7);
    }

    #[test]
    fn unbound_pending_pods_count_as_pending() {
        let snapshot = DemandSnapshot::from_pods(
            [
                pod(None, PodPhase::Pending, 2),
                pod(Some(""), PodPhase::Pending, 1),
            ],
            false,
        );

        assert_eq!(snapshot.pending, 3);
        assert!(snapshot.usage_by_node.is_empty());
    }

    #[test]
    fn other_phase_and_binding_combinations_only_count_as_requested() {
        let snapshot = DemandSnapshot::from_pods(
            [
                pod(Some("gpu-a"), PodPhase::Pending, 2),
                pod(Some("gpu-a"), PodPhase::Other, 4),
                pod(None, PodPhase::Running, 1),
                pod(None, PodPhase::Other, 8),
            ],
            false,
        );

        assert_eq!(snapshot.total_requested, 15);
        assert_eq!(snapshot.pending, 0);
        assert!(snapshot.usage_by_node.is_empty());
    }

    #[test]
    fn pods_without_gpus_leave_node_inactive_by_default() {
        let snapshot =
            DemandSnapshot::from_pods([pod(Some("gpu-a"), PodPhase::Running, 0)], false);

        assert_eq!(snapshot.usage("gpu-a"), None);
    }

    #[test]
    fn record_idle_nodes_marks_node_present_with_zero_usage() {
        let snapshot = DemandSnapshot::from_pods(
            [
                pod(Some("gpu-a"), PodPhase::Running, 0),
                pod(Some("gpu-b"), PodPhase::Running, 0),
                pod(Some("gpu-b"), PodPhase::Running, 2),
            ],
            true,
        );

        assert_eq!(snapshot.usage("gpu-a"), Some(0));
        assert_eq!(snapshot.usage("gpu-b"), Some(2));
    }

    #[test]
    fn huge_requests_saturate() {
        let huge = i64::MAX as u64;
        let snapshot = DemandSnapshot::from_pods(
            [
                pod(None, PodPhase::Pending, huge),
                pod(None, PodPhase::Pending, huge),
                pod(None, PodPhase::Pending, huge),
                pod(Some("gpu-a"), PodPhase::Running, u64::MAX),
                pod(Some("gpu-a"), PodPhase::Running, 1),
            ],
            false,
        );

        assert_eq!(snapshot.pending, u64::MAX);
        assert_eq!(snapshot.total_requested, u64::MAX);
        assert_eq!(snapshot.usage("gpu-a"), Some(u64::MAX));
    }
}
