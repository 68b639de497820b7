//! Pure scaling model: node inventory, per-cycle demand and the decision engine.
//!
//! Nothing in here performs I/O. The control loop feeds a fresh
//! [`DemandSnapshot`] in every cycle and acts on the returned [`ScalingDecision`].

pub mod demand;
pub mod engine;
pub mod node;

pub use demand::DemandSnapshot;
pub use demand::PodDemand;
pub use demand::PodPhase;
pub use engine::CapacityReport;
pub use engine::DecisionEngine;
pub use engine::ScalingAction;
pub use engine::ScalingDecision;
pub use node::GpuNode;
pub use node::NodeInventory;
