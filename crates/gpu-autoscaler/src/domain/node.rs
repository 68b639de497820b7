use std::collections::HashSet;

use error_stack::Report;
use url::Url;

use crate::config::ConfigError;

/// A managed unit of GPU capacity that can be powered on and off through webhooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuNode {
    /// Must match the Kubernetes node name pods are bound to.
    pub name: String,
    /// GPUs provided while the node is active. Always positive.
    pub gpu_count: u32,
    pub scale_up_target: Url,
    pub scale_down_target: Url,
}

/// The fixed set of nodes the controller manages, in configuration order.
///
/// Configuration order matters: the decision engine breaks capacity ties by it.
#[derive(Debug, Clone)]
pub struct NodeInventory {
    nodes: Vec<GpuNode>,
}

impl NodeInventory {
    /// Build an inventory from already validated node records.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoValidNodes`] if `nodes` is empty
    /// - [`ConfigError::Duplicate`] if two nodes share a name
    /// - [`ConfigError::InvalidGpuCount`] if a node declares zero GPUs
    pub fn new(nodes: Vec<GpuNode>) -> Result<Self, Report<ConfigError>> {
        if nodes.is_empty() {
            return Err(Report::new(ConfigError::NoValidNodes));
        }

        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if node.gpu_count == 0 {
                return Err(Report::new(ConfigError::InvalidGpuCount {
                    name: node.name.clone(),
                    value: node.gpu_count.to_string(),
                }));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(Report::new(ConfigError::Duplicate {
                    name: node.name.clone(),
                }));
            }
        }

        Ok(Self { nodes })
    }

    pub fn iter(&self) -> impl Iterator<Item = &GpuNode> {
        self.nodes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&GpuNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of `gpu_count` over every managed node.
    pub fn total_gpus(&self) -> u64 {
        self.nodes.iter().map(|node| u64::from(node.gpu_count)).sum()
    }
}
