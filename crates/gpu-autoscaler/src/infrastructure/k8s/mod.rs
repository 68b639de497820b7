//! Kubernetes integration module.
//!
//! This module reads GPU demand from the pods of the whole cluster.
//!
//! The main components are:
//! - [`PodSource`]: Lists every pod in every namespace
//! - [`DemandCollector`]: Reduces one pod listing into a [`DemandSnapshot`](crate::domain::DemandSnapshot)
//! - [`PodWatcher`]: Requests an extra scaling cycle when a GPU pod changes

pub mod collector;
pub mod pod_info;
pub mod pod_source;
pub mod pod_watcher;
pub mod types;

pub use collector::DemandCollector;
pub use pod_source::KubePodSource;
pub use pod_source::PodSource;
pub use pod_watcher::PodWatcher;
pub use types::KubernetesError;
