// Re-export modules for testing and external use
pub mod synth {
    pub mod assembly;
    pub mod graph;
    pub mod model;
    pub mod stack;

    // Re-export commonly used items
    pub use assembly::CloudAssembly;
    pub use graph::{GraphEdgeType, ResourceGraph};
    pub use model::{Environment, LogicalId, Output, Resource};
    pub use stack::Stack;
}

pub mod compose {
    pub mod bootstrap;
    pub mod network;
    pub mod security_group;
    pub mod tenant;

    pub use bootstrap::UserDataTemplate;
    pub use network::{compose_network, NetworkHandle};
    pub use tenant::{compose_tenant, TenantResources};
}

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod shared {
    pub mod logging;
}

pub mod core {
    pub mod orchestrator;
}

pub mod config;
pub mod error;

// Re-export commonly used types for easier testing and external use
pub use config::{GlobalConfig, TenantConfig};
pub use crate::core::orchestrator::Deployment;
pub use error::AcustackError;
pub use synth::CloudAssembly;
