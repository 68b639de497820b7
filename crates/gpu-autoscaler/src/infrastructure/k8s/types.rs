use core::error::Error;
use std::time::Duration;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to list pods: {message}")]
    ListFailed { message: String },
    #[display("Listing pods timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[display("Failed to watch pods: {message}")]
    WatchFailed { message: String },
}

impl Error for KubernetesError {}
