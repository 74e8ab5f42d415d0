use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcustackError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse configuration {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("Tenant {name} not found in the configuration")]
    TenantNotFound { name: String, known: Vec<String> },

    #[error("Failed to read user data template {}: {source}", .path.display())]
    UserDataRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate logical ID '{id}' in stack {stack}")]
    DuplicateLogicalId { stack: String, id: String },

    #[error("Resource '{from}' in stack {stack} depends on unknown resource '{to}'")]
    DanglingDependency {
        stack: String,
        from: String,
        to: String,
    },

    #[error("Cannot allocate subnets: {0}")]
    SubnetAllocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AcustackError>;
