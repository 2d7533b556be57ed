//! Shared types used across the mediation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Tool schemas
// ---------------------------------------------------------------------------

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Number,
    String,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }
}

/// Description of a tool as discovered from a registry.
///
/// Parameters keep their declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Build a schema from a JSON-schema style `parameters` object
    /// (`{"type": "object", "properties": {...}, "required": [...]}`).
    ///
    /// Properties with a type other than number/integer are treated as strings.
    pub fn from_json_schema(name: &str, description: &str, schema: &serde_json::Value) -> Self {
        let required: Vec<&str> = schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let parameters = schema["properties"]
            .as_object()
            .map(|props| {
                props
                    .iter()
                    .map(|(param_name, prop)| {
                        let param_type = match prop["type"].as_str() {
                            Some("number") | Some("integer") => ParamType::Number,
                            _ => ParamType::String,
                        };
                        ParamSpec {
                            name: param_name.clone(),
                            param_type,
                            required: required.contains(&param_name.as_str()),
                            description: prop["description"].as_str().unwrap_or_default().into(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// One-line signature used in prompts and listings, e.g. `add_numbers(a, b)`.
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Tool values and invocations
// ---------------------------------------------------------------------------

/// A typed value flowing into or out of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolValue {
    Number(f64),
    String(String),
}

impl ToolValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for ToolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug formatting keeps the trailing `.0` on whole floats (14.0, not 14).
            Self::Number(n) => write!(f, "{:?}", n),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

/// Validated, typed arguments keyed by parameter name.
pub type Arguments = BTreeMap<String, ToolValue>;

/// An untyped invocation recovered from generator text.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationCandidate {
    pub tool_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    /// Raw substring the candidate was parsed from.
    pub source_span: String,
}

/// Arguments of the two-operand arithmetic tools.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryArgs {
    pub a: f64,
    pub b: f64,
}

/// Arguments of the expression tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionArgs {
    pub expression: String,
}

/// A tool call whose arguments have passed schema validation.
///
/// Built-in tools get a fixed record; anything else a registry advertises
/// travels as `Other` with its coerced argument map.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    AddNumbers(BinaryArgs),
    MultiplyNumbers(BinaryArgs),
    CalculateExpression(ExpressionArgs),
    Other { name: String, arguments: Arguments },
}

impl ToolCall {
    pub fn name(&self) -> &str {
        match self {
            Self::AddNumbers(_) => "add_numbers",
            Self::MultiplyNumbers(_) => "multiply_numbers",
            Self::CalculateExpression(_) => "calculate_expression",
            Self::Other { name, .. } => name,
        }
    }

    /// Label used when composing `"<label>: <value>"` replies.
    pub fn label(&self) -> &str {
        match self {
            Self::AddNumbers(_) => "Sum",
            Self::MultiplyNumbers(_) => "Product",
            Self::CalculateExpression(_) => "Result",
            Self::Other { name, .. } => name,
        }
    }

    /// Arguments in registry form.
    pub fn arguments(&self) -> Arguments {
        match self {
            Self::AddNumbers(args) | Self::MultiplyNumbers(args) => Arguments::from([
                ("a".to_string(), ToolValue::Number(args.a)),
                ("b".to_string(), ToolValue::Number(args.b)),
            ]),
            Self::CalculateExpression(args) => Arguments::from([(
                "expression".to_string(),
                ToolValue::String(args.expression.clone()),
            )]),
            Self::Other { arguments, .. } => arguments.clone(),
        }
    }
}

/// A candidate refined by the validator. Only this form reaches the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvocation {
    pub call: ToolCall,
    pub source_span: String,
}

/// Outcome of executing one tool call. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { tool_name: String, value: ToolValue },
    Failure { tool_name: String, reason: String },
}

impl ToolResult {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Success { tool_name, .. } | Self::Failure { tool_name, .. } => tool_name,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Input rejected before gating.
    TooShort,
    /// Gate answered without the generator.
    ShortCircuit,
    /// Generator replied without a tool call.
    DirectReply,
    /// A tool ran successfully.
    ToolAnswered,
    /// A tool ran and failed; the failure is part of the reply.
    ToolFailed,
    /// The extracted call did not validate.
    InvalidCall,
    /// Generator could not be reached.
    GenerationFailed,
    MaxIterationsReached,
    Timeout,
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "too_short"),
            Self::ShortCircuit => write!(f, "short_circuit"),
            Self::DirectReply => write!(f, "direct_reply"),
            Self::ToolAnswered => write!(f, "tool_answered"),
            Self::ToolFailed => write!(f, "tool_failed"),
            Self::InvalidCall => write!(f, "invalid_call"),
            Self::GenerationFailed => write!(f, "generation_failed"),
            Self::MaxIterationsReached => write!(f, "max_iterations_reached"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// One complete request/response cycle. Created fresh per request, never persisted.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: String,
    pub user_message: String,
    pub generated_text: Option<String>,
    pub invocation: Option<ValidatedInvocation>,
    pub result: Option<ToolResult>,
    pub final_reply: String,
    pub outcome: TurnOutcome,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(user_message: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            user_message: user_message.into(),
            generated_text: None,
            invocation: None,
            result: None,
            final_reply: String::new(),
            outcome: TurnOutcome::DirectReply,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound / outbound
// ---------------------------------------------------------------------------

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Outbound chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    pub raw_text: String,
    pub tools_available: Vec<String>,
}

impl ChatResponse {
    /// Short-circuited turns have no generated text; their reply doubles as raw text.
    pub fn from_turn(turn: &ConversationTurn, tools_available: Vec<String>) -> Self {
        Self {
            reply: turn.final_reply.clone(),
            raw_text: turn
                .generated_text
                .clone()
                .unwrap_or_else(|| turn.final_reply.clone()),
            tools_available,
        }
    }
}
