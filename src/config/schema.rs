//! Configuration schema for toolgate.toml.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where tools come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// In-process arithmetic tools.
    Builtin,
    /// Remote registry reached over HTTP.
    Http,
}

/// How the dispatcher drives the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One generation pass, at most one tool call, `"<label>: <value>"` reply.
    SingleShot,
    /// Bounded plan/act/observe loop.
    Iterative,
}

/// Which number wins when the answer normalizer falls back to scanning a
/// whole reasoning transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPreference {
    First,
    Last,
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Base URL of the OpenAI-compatible generator endpoint.
    pub generator_url: String,

    /// Model name sent to the generator.
    pub generator_model: String,

    /// Bearer token for the generator (empty = none).
    pub generator_api_key: String,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum tokens per generation.
    pub max_tokens: u32,

    /// Tool source.
    pub registry: RegistryKind,

    /// Base URL of the HTTP tool registry.
    pub registry_url: String,

    /// Discovery attempts before degrading to "no tools".
    pub discovery_max_attempts: u32,

    /// Fixed delay between discovery attempts.
    pub discovery_retry_delay_secs: u64,

    pub mode: DispatchMode,

    /// Iteration cap for iterative mode.
    pub max_iterations: u32,

    /// Overall per-request deadline.
    pub request_timeout_secs: u64,

    /// Upper bound on normalized answers.
    pub answer_max_chars: usize,

    pub numeric_preference: NumericPreference,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            generator_url: "http://localhost:8080".into(),
            generator_model: "llama-3.1-8b-instruct".into(),
            generator_api_key: String::new(),
            temperature: 0.1,
            max_tokens: 256,
            registry: RegistryKind::Builtin,
            registry_url: "http://localhost:8100".into(),
            discovery_max_attempts: 15,
            discovery_retry_delay_secs: 2,
            mode: DispatchMode::SingleShot,
            max_iterations: 3,
            request_timeout_secs: 120,
            answer_max_chars: 200,
            numeric_preference: NumericPreference::Last,
            log_level: "info".into(),
        }
    }
}

impl MediatorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.discovery_retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings that would make a turn unbounded or pointless.
    pub fn validate(&self) -> Result<()> {
        if self.discovery_max_attempts == 0 {
            bail!("discovery_max_attempts must be at least 1");
        }
        if self.max_iterations == 0 {
            bail!("max_iterations must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if self.answer_max_chars == 0 {
            bail!("answer_max_chars must be at least 1");
        }
        if self.max_tokens == 0 {
            bail!("max_tokens must be at least 1");
        }
        Ok(())
    }
}
