//! GPU capacity autoscaler.
//!
//! Watches the GPU demand of a Kubernetes cluster and powers a fixed set of
//! GPU nodes on and off through per-node webhooks so that available capacity
//! follows demand.

pub mod app;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use infrastructure::logging;
