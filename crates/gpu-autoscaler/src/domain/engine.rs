//! Scaling decision engine
//!
//! Each cycle is evaluated from scratch:
//!
//! ```text
//! active    = inventory nodes present in usage_by_node
//! capacity  = sum(gpu_count of active)
//! used      = sum(usage of active)
//! available = capacity - used
//!
//! if pending > available:
//!     needed = pending - available
//!     activate inactive nodes ascending by gpu_count until needed <= 0
//! else:
//!     deactivate the largest active node with usage == 0, if any
//! ```
//!
//! Scale-up preempts scale-down, so a cycle yields at most one class of action.

use super::demand::DemandSnapshot;
use super::node::GpuNode;
use super::node::NodeInventory;

/// Demand and capacity figures emitted every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    pub requested: u64,
    pub capacity: u64,
    pub used: u64,
    /// Negative only when usage exceeds declared capacity.
    pub available: i64,
    pub pending: u64,
    pub active_nodes: usize,
}

impl CapacityReport {
    pub fn is_overcommitted(&self) -> bool {
        self.available < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalingAction {
    /// Power on `activate`, in order. `shortfall` is the demand still uncovered
    /// after all of them come up; `activate` is empty when nothing is left to start.
    ScaleUp {
        activate: Vec<GpuNode>,
        shortfall: u64,
    },
    /// Power off one idle node.
    ScaleDown { deactivate: GpuNode },
    /// Capacity matches demand.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalingDecision {
    pub report: CapacityReport,
    pub action: ScalingAction,
}

/// Stateless engine turning (inventory, snapshot) into a decision.
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn decide(inventory: &NodeInventory, snapshot: &DemandSnapshot) -> ScalingDecision {
        let (active, inactive): (Vec<&GpuNode>, Vec<&GpuNode>) = inventory
            .iter()
            .partition(|node| snapshot.usage_by_node.contains_key(&node.name));

        let report = Self::report(&active, snapshot);

        let action = match Self::plan_scale_up(inactive, &report) {
            Some(action) => action,
            None => Self::plan_scale_down(&active, snapshot),
        };

        ScalingDecision { report, action }
    }

    /// Usage recorded against nodes outside the inventory. Ignored by [`Self::decide`].
    pub fn unmanaged_usage<'a>(
        inventory: &NodeInventory,
        snapshot: &'a DemandSnapshot,
    ) -> Vec<(&'a str, u64)> {
        snapshot
            .usage_by_node
            .iter()
            .filter(|(name, _)| !inventory.contains(name))
            .map(|(name, usage)| (name.as_str(), *usage))
            .collect()
    }

    fn report(active: &[&GpuNode], snapshot: &DemandSnapshot) -> CapacityReport {
        let capacity: u64 = active.iter().map(|node| u64::from(node.gpu_count)).sum();
        let used = active
            .iter()
            .filter_map(|node| snapshot.usage(&node.name))
            .fold(0u64, u64::saturating_add);

        CapacityReport {
            requested: snapshot.total_requested,
            capacity,
            used,
            available: to_signed(capacity).saturating_sub(to_signed(used)),
            pending: snapshot.pending,
            active_nodes: active.len(),
        }
    }

    /// Greedy ascending-capacity selection over inactive nodes. `None` when
    /// pending demand fits in the available capacity.
    fn plan_scale_up(mut inactive: Vec<&GpuNode>, report: &CapacityReport) -> Option<ScalingAction> {
        let mut needed = to_signed(report.pending).saturating_sub(report.available);
        if needed <= 0 {
            return None;
        }

        // stable: equal capacities keep inventory order
        inactive.sort_by_key(|node| node.gpu_count);

        let mut activate = Vec::new();
        for node in inactive {
            if needed <= 0 {
                break;
            }
            needed = needed.saturating_sub(i64::from(node.gpu_count));
            activate.push(node.clone());
        }

        Some(ScalingAction::ScaleUp {
            activate,
            shortfall: u64::try_from(needed).unwrap_or(0),
        })
    }

    /// Largest idle active node, first in inventory order on ties.
    fn plan_scale_down(active: &[&GpuNode], snapshot: &DemandSnapshot) -> ScalingAction {
        let candidate = active
            .iter()
            .filter(|node| snapshot.usage(&node.name) == Some(0))
            .fold(None::<&GpuNode>, |best, node| match best {
                Some(best) if best.gpu_count >= node.gpu_count => Some(best),
                _ => Some(*node),
            });

        match candidate {
            Some(node) => ScalingAction::ScaleDown {
                deactivate: node.clone(),
            },
            None => ScalingAction::Hold,
        }
    }
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
