//! Tool and registry traits.

use crate::error::ToolError;
use crate::types::{Arguments, ToolSchema, ToolValue};
use anyhow::Result;
use async_trait::async_trait;

/// A single executable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (used in generated calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Parameter schema, in declaration order.
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with validated arguments.
    async fn execute(&self, args: &Arguments) -> Result<ToolValue, ToolError>;
}

/// A source of tools: something that can list schemas and invoke by name.
///
/// `discover` may fail transiently (the registry may live behind a network
/// boundary); `invoke` fails with a domain [`ToolError`].
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn discover(&self) -> Result<Vec<ToolSchema>>;

    async fn invoke(&self, name: &str, args: &Arguments) -> Result<ToolValue, ToolError>;
}
