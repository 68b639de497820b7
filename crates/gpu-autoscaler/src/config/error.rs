use core::error::Error;

/// Errors raised while turning static configuration into a node inventory.
#[derive(Debug, derive_more::Display)]
pub enum ConfigError {
    #[display("Incomplete configuration for node {name}: missing {field}")]
    Incomplete { name: String, field: &'static str },
    #[display("Invalid GPU count for node {name}: {value:?}")]
    InvalidGpuCount { name: String, value: String },
    #[display("Invalid {field} for node {name}: {value:?}")]
    InvalidEndpoint {
        name: String,
        field: &'static str,
        value: String,
    },
    #[display("Duplicate node name: {name}")]
    Duplicate { name: String },
    #[display("Failed to read node inventory file: {path}")]
    FileUnreadable { path: String },
    #[display("Malformed node inventory file: {path}")]
    FileMalformed { path: String },
    #[display("No valid GPU nodes configured")]
    NoValidNodes,
}

impl Error for ConfigError {}
