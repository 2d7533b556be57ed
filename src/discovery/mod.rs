//! Connection manager: discovers tools from the registry with bounded
//! retries and caches the result for the rest of the process.
//!
//! `discover` never fails. After the last failed attempt the manager
//! degrades to an empty tool list so direct questions still get answered.
//! Concurrent callers during a cold cache share one discovery cycle.

pub mod state;

pub use state::{DiscoveryEvent, DiscoveryState, RetryState};

use crate::config::MediatorConfig;
use crate::error::{describe_error, MediatorError};
use crate::tools::ToolRegistry;
use crate::types::ToolSchema;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

pub struct ConnectionManager {
    registry: Arc<dyn ToolRegistry>,
    max_attempts: u32,
    retry_delay: Duration,
    state: RwLock<DiscoveryState>,
    /// Held for the duration of a discovery cycle.
    discovery_lock: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(registry: Arc<dyn ToolRegistry>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            registry,
            max_attempts,
            retry_delay,
            state: RwLock::new(DiscoveryState::Idle),
            discovery_lock: Mutex::new(()),
        }
    }

    pub fn from_config(registry: Arc<dyn ToolRegistry>, config: &MediatorConfig) -> Self {
        Self::new(registry, config.discovery_max_attempts, config.retry_delay())
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> DiscoveryState {
        self.state.read().await.clone()
    }

    /// Tools, discovering them first if nothing has settled yet.
    pub async fn discover(&self) -> Arc<[ToolSchema]> {
        if let Some(tools) = self.state.read().await.settled_tools() {
            return tools;
        }

        let _cycle = self.discovery_lock.lock().await;
        // Another caller may have finished a cycle while we waited.
        if let Some(tools) = self.state.read().await.settled_tools() {
            return tools;
        }
        self.run_cycle().await
    }

    /// Drop whatever is cached and run a fresh discovery cycle.
    pub async fn refresh(&self) -> Arc<[ToolSchema]> {
        let _cycle = self.discovery_lock.lock().await;
        self.apply(DiscoveryEvent::Reset).await;
        self.run_cycle().await
    }

    /// Names of the available tools for "what tools exist" queries.
    ///
    /// Uses the cached list when one exists. Otherwise makes a single discovery
    /// attempt (no retries); a successful one populates the cache. While a
    /// discovery cycle is running, reports nothing rather than waiting on it.
    pub async fn tool_names(&self) -> Vec<String> {
        if let DiscoveryState::Ready(tools) = &*self.state.read().await {
            return tools.iter().map(|t| t.name.clone()).collect();
        }

        let Ok(_cycle) = self.discovery_lock.try_lock() else {
            return Vec::new();
        };

        match self.registry.discover().await {
            Ok(tools) => {
                let names = tools.iter().map(|t| t.name.clone()).collect();
                *self.state.write().await = DiscoveryState::Ready(tools.into());
                names
            }
            Err(e) => {
                warn!("{}", MediatorError::DiscoveryFailed(describe_error(&e)));
                Vec::new()
            }
        }
    }

    async fn apply(&self, event: DiscoveryEvent) -> DiscoveryState {
        let retry = RetryState::new(self.max_attempts, self.retry_delay);
        let mut state = self.state.write().await;
        let next = std::mem::replace(&mut *state, DiscoveryState::Idle).transition(event, &retry);
        *state = next.clone();
        next
    }

    /// One full cycle. Caller must hold `discovery_lock`.
    async fn run_cycle(&self) -> Arc<[ToolSchema]> {
        let mut retry = RetryState::new(self.max_attempts, self.retry_delay);
        let mut state = self.apply(DiscoveryEvent::Start).await;

        loop {
            match state {
                DiscoveryState::Retrying { attempt } => {
                    retry.attempt = attempt;
                    match self.registry.discover().await {
                        Ok(tools) => {
                            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                            info!(
                                "Registry connected, found {} tools: {:?}",
                                tools.len(),
                                names
                            );
                            state = self.apply(DiscoveryEvent::Succeeded(tools.into())).await;
                        }
                        Err(e) => {
                            let reason = describe_error(&e);
                            state = self.apply(DiscoveryEvent::AttemptFailed { reason: reason.clone() }).await;
                            if !retry.exhausted() {
                                info!(
                                    "Waiting for tool registry... (attempt {}/{}, error: {})",
                                    attempt, retry.max_attempts, reason
                                );
                                tokio::time::sleep(retry.delay).await;
                            }
                        }
                    }
                }
                DiscoveryState::Ready(tools) => return tools,
                DiscoveryState::Degraded { reason } => {
                    warn!(
                        "Tool registry unavailable after {} attempts, continuing without tools",
                        retry.max_attempts
                    );
                    error!("{}", MediatorError::DiscoveryFailed(reason));
                    return Arc::from(Vec::new());
                }
                DiscoveryState::Idle => return Arc::from(Vec::new()),
            }
        }
    }
}
