//! Request-level facade: gate → discovery → dispatcher → response.
//!
//! One [`Deadline`] starts when the message arrives and covers discovery
//! and dispatch. Discovery runs as its own task, so a request that gives up
//! waiting leaves the cycle running for the requests after it.

use super::dispatcher::{Deadline, Dispatcher};
use crate::config::MediatorConfig;
use crate::discovery::ConnectionManager;
use crate::gate::{self, GateDecision};
use crate::inference::{GenerationParams, Generator, GeneratorSession, HttpGenerator};
use crate::tools::{registry_from_config, ToolRegistry};
use crate::types::{ChatRequest, ChatResponse, ConversationTurn, ToolSchema, TurnOutcome};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Snapshot for health checks.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub tools_available: bool,
    pub tools_count: usize,
}

pub struct Mediator {
    connection: Arc<ConnectionManager>,
    dispatcher: Dispatcher,
    max_iterations: u32,
    request_timeout: Duration,
}

impl Mediator {
    pub fn new(
        connection: Arc<ConnectionManager>,
        dispatcher: Dispatcher,
        max_iterations: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            connection,
            dispatcher,
            max_iterations,
            request_timeout,
        }
    }

    /// Wire a mediator around the given generator and registry.
    pub fn with_collaborators(
        generator: Arc<dyn Generator>,
        registry: Arc<dyn ToolRegistry>,
        config: &MediatorConfig,
    ) -> Self {
        let session = GeneratorSession::new(generator, GenerationParams::from_config(config));
        let connection = Arc::new(ConnectionManager::from_config(registry.clone(), config));
        let dispatcher = Dispatcher::from_config(session, registry, config);
        Self::new(
            connection,
            dispatcher,
            config.max_iterations,
            config.request_timeout(),
        )
    }

    /// HTTP generator plus the registry named in the config.
    pub fn from_config(config: &MediatorConfig) -> anyhow::Result<Self> {
        let generator = Arc::new(HttpGenerator::new(
            &config.generator_url,
            &config.generator_api_key,
            &config.generator_model,
        ));
        Ok(Self::with_collaborators(
            generator,
            registry_from_config(config)?,
            config,
        ))
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Handle one request. Always answers.
    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        let (turn, tools_available) = self.run_turn(&request.message).await;
        ChatResponse::from_turn(&turn, tools_available)
    }

    /// Handle an untyped request body. A missing or non-string `message`
    /// gets the too-short reply instead of an error.
    pub async fn handle_json(&self, body: &Value) -> ChatResponse {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.handle(ChatRequest { message }).await
    }

    /// Run one turn and report the tool names known at the end of it.
    pub async fn run_turn(&self, message: &str) -> (ConversationTurn, Vec<String>) {
        let deadline = Deadline::after(self.request_timeout);
        let trimmed = message.trim();
        info!("Received message: {}", trimmed);

        let decision = gate::classify(trimmed);
        if let Some(reply) = decision.short_circuit_reply() {
            let mut turn = ConversationTurn::new(trimmed);
            turn.final_reply = reply;
            turn.outcome = match decision {
                GateDecision::TooShort => TurnOutcome::TooShort,
                _ => TurnOutcome::ShortCircuit,
            };
            debug!("Turn {} short-circuited ({})", turn.id, turn.outcome);
            let names = tokio::time::timeout_at(deadline.at, self.connection.tool_names())
                .await
                .unwrap_or_else(|_| {
                    warn!("Tool name lookup outlived the request deadline");
                    Vec::new()
                });
            return (turn, names);
        }

        let Some(tools) = self.discover_until(deadline).await else {
            let mut turn = ConversationTurn::new(trimmed);
            deadline.expire(&mut turn);
            return (turn, Vec::new());
        };
        let names = tools.iter().map(|t| t.name.clone()).collect();
        let turn = self
            .dispatcher
            .run(trimmed, &tools, self.max_iterations, deadline)
            .await;
        info!("Turn {} → {}: {}", turn.id, turn.outcome, turn.final_reply);
        (turn, names)
    }

    /// Drop cached tools and discover again.
    pub async fn refresh_tools(&self) -> Arc<[ToolSchema]> {
        self.connection.refresh().await
    }

    /// Wait for discovery until the deadline. `None` means time ran out; the
    /// discovery task keeps going in the background.
    async fn discover_until(&self, deadline: Deadline) -> Option<Arc<[ToolSchema]>> {
        let connection = self.connection.clone();
        let cycle = tokio::spawn(async move { connection.discover().await });

        match tokio::time::timeout_at(deadline.at, cycle).await {
            Ok(Ok(tools)) => Some(tools),
            Ok(Err(e)) => {
                error!("Discovery task failed: {}", e);
                Some(Arc::from(Vec::new()))
            }
            Err(_) => None,
        }
    }

    pub async fn health(&self) -> HealthReport {
        let names = self.connection.tool_names().await;
        HealthReport {
            status: "healthy".into(),
            tools_available: !names.is_empty(),
            tools_count: names.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::BuiltinRegistry;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and always emits the same text.
    struct FixedGenerator {
        text: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn generate(&self, _: &str, _: &str, _: GenerationParams) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }

    fn mediator(text: &str) -> (Mediator, Arc<FixedGenerator>) {
        let generator = Arc::new(FixedGenerator {
            text: text.into(),
            calls: AtomicUsize::new(0),
        });
        let m = Mediator::with_collaborators(
            generator.clone(),
            Arc::new(BuiltinRegistry::arithmetic()),
            &MediatorConfig::default(),
        );
        (m, generator)
    }

    #[tokio::test]
    async fn too_short_and_missing_message() {
        let (m, generator) = mediator("unused");
        for body in [json!({}), json!({"message": 5}), json!({"message": " a "})] {
            let resp = m.handle_json(&body).await;
            assert_eq!(resp.reply, "Input message is too short or empty");
            assert_eq!(resp.raw_text, resp.reply);
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_task_text_skips_generator() {
        let (m, generator) = mediator("unused");
        let resp = m.handle(ChatRequest { message: "what is the weather".into() }).await;
        assert_eq!(resp.reply, gate::NON_TASK_REPLY);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn computation_reports_tools_and_raw_text() {
        let call = "{\"tool\": \"multiply_numbers\", \"arguments\": {\"a\": 6, \"b\": 7}}";
        let (m, _) = mediator(call);
        let resp = m.handle(ChatRequest { message: "multiply 6 by 7".into() }).await;
        assert_eq!(resp.reply, "Product: 42.0");
        assert_eq!(resp.raw_text, call);
        assert_eq!(
            resp.tools_available,
            vec!["add_numbers", "multiply_numbers", "calculate_expression"]
        );
    }

    #[tokio::test]
    async fn response_serializes_camel_case() {
        let (m, _) = mediator("unused");
        let resp = m.handle(ChatRequest { message: "hello".into() }).await;
        let v = serde_json::to_value(&resp).unwrap();
        assert!(v.get("rawText").is_some());
        assert!(v.get("toolsAvailable").is_some());
    }

    #[tokio::test]
    async fn refresh_replaces_cached_tools() {
        let (m, _) = mediator("unused");
        assert_eq!(m.connection().discover().await.len(), 3);
        assert_eq!(m.refresh_tools().await.len(), 3);
        assert!(m.connection().state().await.is_ready());
    }

    #[tokio::test]
    async fn health_uses_discovered_tools() {
        let (m, _) = mediator("unused");
        let health = m.health().await;
        assert_eq!(health.status, "healthy");
        assert!(health.tools_available);
        assert_eq!(health.tools_count, 3);
    }
}
