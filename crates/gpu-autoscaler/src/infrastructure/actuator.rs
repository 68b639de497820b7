//! Best-effort delivery of scale-up/scale-down webhooks.
//!
//! A single POST with an empty JSON body per node and action. Any HTTP
//! response counts as delivered; the status code is only logged. There is no
//! retry: the next cycle re-observes the cluster and decides again.

use core::error::Error;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use reqwest::StatusCode;
use tracing::error;
use tracing::info;
use url::Url;

use crate::domain::GpuNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ScaleDirection {
    #[display("up")]
    Up,
    #[display("down")]
    Down,
}

impl ScaleDirection {
    pub fn target(self, node: &GpuNode) -> &Url {
        match self {
            ScaleDirection::Up => &node.scale_up_target,
            ScaleDirection::Down => &node.scale_down_target,
        }
    }
}

#[derive(Debug, derive_more::Display)]
pub enum ActuationError {
    #[display("Failed to create HTTP client")]
    ClientBuild,
    #[display("POST to {target} failed: {message}")]
    RequestFailed { target: Url, message: String },
    #[display("POST to {target} timed out")]
    Timeout { target: Url },
}

impl Error for ActuationError {}

#[async_trait::async_trait]
pub trait Actuator: Send + Sync {
    /// Deliver one action to `target`, returning the HTTP status on any response.
    ///
    /// # Errors
    ///
    /// - [`ActuationError::Timeout`] if no response arrives in time
    /// - [`ActuationError::RequestFailed`] on connection or protocol errors
    async fn post(&self, target: &Url) -> Result<StatusCode, Report<ActuationError>>;
}

/// [`Actuator`] issuing plain HTTP POSTs with a fixed timeout.
pub struct HttpActuator {
    client: reqwest::Client,
}

impl HttpActuator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(timeout: Duration) -> Result<Self, Report<ActuationError>> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .change_context(ActuationError::ClientBuild)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Actuator for HttpActuator {
    async fn post(&self, target: &Url) -> Result<StatusCode, Report<ActuationError>> {
        let response = self
            .client
            .post(target.clone())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| {
                let context = if e.is_timeout() {
                    ActuationError::Timeout {
                        target: target.clone(),
                    }
                } else {
                    ActuationError::RequestFailed {
                        target: target.clone(),
                        message: e.to_string(),
                    }
                };
                Report::new(e).change_context(context)
            })?;
        Ok(response.status())
    }
}

/// Send `direction` to `node` and log the outcome. Failures stop here.
///
/// Returns whether the request was delivered.
pub async fn actuate(actuator: &dyn Actuator, node: &GpuNode, direction: ScaleDirection) -> bool {
    let url = direction.target(node);
    match actuator.post(url).await {
        Ok(status) => {
            info!(
                target: "metrics.gpu_actuation",
                tag_node = %node.name,
                tag_direction = %direction,
                status = status.as_u16(),
            );
            info!("POST to {url} [{}] for node {}", status.as_u16(), node.name);
            true
        }
        Err(e) => {
            error!("POST to {url} for node {} failed: {e:?}", node.name);
            false
        }
    }
}
