//! Thin JSON-over-HTTP client for a remote tool registry.
//!
//! `GET {base}/tools` lists tools with JSON-schema parameters;
//! `POST {base}/tools/{name}` invokes one.

use super::traits::ToolRegistry;
use crate::error::ToolError;
use crate::types::{Arguments, ToolSchema, ToolValue};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout for registry calls.
const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote tool registry client.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    base_url: String,
    http: reqwest::Client,
}

// -- Request / response types -----------------------------------------------

#[derive(Debug, Deserialize)]
struct ToolListResponse {
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    arguments: &'a Arguments,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    value: Option<ToolValue>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpRegistry {
    /// Create a new registry client.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REGISTRY_TIMEOUT)
            .build()
            .context("Failed to build registry HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

/// Map a registry-reported error string onto the tool error taxonomy.
fn classify_remote_error(message: String) -> ToolError {
    let lower = message.to_lowercase();
    if lower.contains("invalid character") {
        let bad = message
            .split('\'')
            .nth(1)
            .and_then(|s| s.chars().next());
        if let Some(c) = bad {
            return ToolError::InvalidCharacter(c);
        }
    }
    if lower.contains("division by zero") {
        return ToolError::DivisionByZero;
    }
    if lower.contains("unknown tool") {
        return ToolError::UnknownTool(message);
    }
    ToolError::Malformed(message)
}

#[async_trait]
impl ToolRegistry for HttpRegistry {
    async fn discover(&self) -> Result<Vec<ToolSchema>> {
        let url = format!("{}/tools", self.base_url);
        debug!("Registry discover: {}", url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("Registry tool listing request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Registry tool listing failed ({}): {}", status, body);
        }

        let body: ToolListResponse = resp
            .json()
            .await
            .context("Failed to parse registry tool listing")?;

        Ok(body
            .tools
            .iter()
            .map(|t| ToolSchema::from_json_schema(&t.name, &t.description, &t.parameters))
            .collect())
    }

    async fn invoke(&self, name: &str, args: &Arguments) -> Result<ToolValue, ToolError> {
        let url = format!("{}/tools/{}", self.base_url, name);
        debug!("Registry invoke: {}", url);

        let resp = self
            .http
            .post(&url)
            .json(&InvokeRequest { arguments: args })
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ToolError::UnknownTool(name.into()));
        }

        let body: InvokeResponse = resp
            .json()
            .await
            .map_err(|e| ToolError::Transport(format!("({}) {}", status, e)))?;

        match (body.value, body.error) {
            (_, Some(err)) => Err(classify_remote_error(err)),
            (Some(value), None) => Ok(value),
            (None, None) => Err(ToolError::Transport(format!(
                "({}) response carried neither value nor error",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let reg = HttpRegistry::new("http://localhost:8100/").unwrap();
        assert_eq!(reg.base_url, "http://localhost:8100");
    }

    #[test]
    fn remote_errors_are_classified() {
        assert_eq!(
            classify_remote_error("Expression contains invalid character 'x'".into()),
            ToolError::InvalidCharacter('x')
        );
        assert_eq!(
            classify_remote_error("Calculation error: division by zero".into()),
            ToolError::DivisionByZero
        );
        assert!(matches!(
            classify_remote_error("something odd".into()),
            ToolError::Malformed(_)
        ));
    }

    #[test]
    fn listing_parses_json_schema_parameters() {
        let body: ToolListResponse = serde_json::from_str(
            r#"{"tools":[{"name":"add_numbers","description":"sum",
                "parameters":{"type":"object",
                  "properties":{"a":{"type":"number"},"b":{"type":"number"}},
                  "required":["a","b"]}}]}"#,
        )
        .unwrap();
        let entry = &body.tools[0];
        let schema = ToolSchema::from_json_schema(&entry.name, &entry.description, &entry.parameters);
        assert_eq!(schema.signature(), "add_numbers(a, b)");
        assert!(schema.parameters.iter().all(|p| p.required));
    }

    #[tokio::test]
    async fn unreachable_registry_fails_discovery() {
        // Port 9 (discard) is essentially never listening for HTTP.
        let reg = HttpRegistry::new("http://127.0.0.1:9").unwrap();
        assert!(reg.discover().await.is_err());
    }
}
