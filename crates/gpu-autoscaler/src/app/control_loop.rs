//! The scaling cycle: collect → decide → actuate, one cycle at a time.

use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::domain::CapacityReport;
use crate::domain::DecisionEngine;
use crate::domain::DemandSnapshot;
use crate::domain::NodeInventory;
use crate::domain::ScalingAction;
use crate::domain::ScalingDecision;
use crate::infrastructure::actuator::actuate;
use crate::infrastructure::actuator::Actuator;
use crate::infrastructure::actuator::ScaleDirection;
use crate::infrastructure::k8s::DemandCollector;
use crate::infrastructure::k8s::KubernetesError;

pub struct ControlLoop {
    inventory: Arc<NodeInventory>,
    collector: DemandCollector,
    actuator: Arc<dyn Actuator>,
    dry_run: bool,
}

impl ControlLoop {
    pub fn new(
        inventory: Arc<NodeInventory>,
        collector: DemandCollector,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            inventory,
            collector,
            actuator,
            dry_run: false,
        }
    }

    /// Decide and log, but never call a webhook.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run cycles until cancelled.
    ///
    /// A cycle starts on every interval tick and on every request received on
    /// `triggers`. Cycles never overlap: requests arriving while a cycle runs
    /// wait in the (single-slot) channel and start the next one.
    pub async fn run(
        &self,
        interval: Duration,
        mut triggers: mpsc::Receiver<()>,
        cancellation_token: CancellationToken,
    ) {
        info!(
            nodes = self.inventory.len(),
            interval = ?interval,
            dry_run = self.dry_run,
            "Starting GPU scaling loop"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Scaling loop shutdown requested");
                    break;
                }
                _ = ticker.tick() => {}
                Some(()) = triggers.recv() => {
                    debug!("Scaling cycle requested by pod event");
                    ticker.reset();
                }
            }

            if let Err(e) = self.run_cycle().await {
                warn!("Skipping scaling cycle: {e:?}");
            }
        }
    }

    /// One full cycle.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError`] if demand could not be collected; nothing is actuated then
    pub async fn run_cycle(&self) -> Result<ScalingDecision, Report<KubernetesError>> {
        let snapshot = self.collector.collect().await?;
        let decision = self.evaluate(&snapshot);
        self.apply(&decision).await;
        Ok(decision)
    }

    pub fn evaluate(&self, snapshot: &DemandSnapshot) -> ScalingDecision {
        evaluate(&self.inventory, snapshot)
    }

    /// Returns the number of delivered webhook calls.
    async fn apply(&self, decision: &ScalingDecision) -> usize {
        let calls: Vec<_> = match &decision.action {
            ScalingAction::ScaleUp { activate, .. } => activate
                .iter()
                .map(|node| (node, ScaleDirection::Up))
                .collect(),
            ScalingAction::ScaleDown { deactivate } => vec![(deactivate, ScaleDirection::Down)],
            ScalingAction::Hold => Vec::new(),
        };

        if self.dry_run {
            for (node, direction) in &calls {
                info!("Dry run: not sending scale {direction} for {}", node.name);
            }
            return 0;
        }

        let mut delivered = 0;
        for (node, direction) in calls {
            if actuate(self.actuator.as_ref(), node, direction).await {
                delivered += 1;
            }
        }
        delivered
    }
}

/// Decide on `snapshot` and log the outcome, without side effects.
pub fn evaluate(inventory: &NodeInventory, snapshot: &DemandSnapshot) -> ScalingDecision {
    for (node, usage) in DecisionEngine::unmanaged_usage(inventory, snapshot) {
        debug!("Ignoring {usage} GPUs in use on unmanaged node {node}");
    }

    let decision = DecisionEngine::decide(inventory, snapshot);
    log_report(&decision.report);
    log_action(&decision.action);
    decision
}

fn log_report(report: &CapacityReport) {
    info!(
        target: "metrics.gpu_capacity",
        requested = report.requested,
        capacity = report.capacity,
        used = report.used,
        available = report.available,
        pending = report.pending,
        active_nodes = report.active_nodes as u64,
    );
    info!(
        "GPU requested={} used={} available={} pending={} (capacity {} on {} active nodes)",
        report.requested,
        report.used,
        report.available,
        report.pending,
        report.capacity,
        report.active_nodes
    );
    if report.is_overcommitted() {
        warn!(
            "GPU usage {} exceeds active capacity {}",
            report.used, report.capacity
        );
    }
}

fn log_action(action: &ScalingAction) {
    match action {
        ScalingAction::ScaleUp {
            activate,
            shortfall,
        } => {
            for node in activate {
                info!(
                    "Requesting scale UP for {} ({} GPUs)",
                    node.name, node.gpu_count
                );
            }
            if *shortfall > 0 {
                warn!("Capacity shortfall: still short by {shortfall} GPUs with every node active");
            }
        }
        ScalingAction::ScaleDown { deactivate } => {
            info!(
                "Requesting scale DOWN for idle node {} ({} GPUs)",
                deactivate.name, deactivate.gpu_count
            );
        }
        ScalingAction::Hold => {
            info!("Capacity matches demand");
        }
    }
}
