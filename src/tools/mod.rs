pub mod builtin;
pub mod expression;
pub mod http;
pub mod traits;

pub use builtin::BuiltinRegistry;
pub use http::HttpRegistry;
pub use traits::{Tool, ToolRegistry};

use crate::config::{MediatorConfig, RegistryKind};
use anyhow::Result;
use std::sync::Arc;

/// Build the registry selected by the config.
pub fn registry_from_config(config: &MediatorConfig) -> Result<Arc<dyn ToolRegistry>> {
    let registry: Arc<dyn ToolRegistry> = match config.registry {
        RegistryKind::Builtin => Arc::new(BuiltinRegistry::arithmetic()),
        RegistryKind::Http => Arc::new(HttpRegistry::new(&config.registry_url)?),
    };
    Ok(registry)
}
