//! Error taxonomy for the mediation engine.
//!
//! Everything except [`MediatorError::DiscoveryFailed`] ends up as reply text;
//! nothing here is fatal to the process.

use crate::types::ParamType;
use thiserror::Error;

/// Failures a turn can run into, rendered as user-facing text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediatorError {
    #[error("Input message is too short or empty")]
    TooShortInput,

    #[error("Timeout error: processing exceeded {0} seconds")]
    GenerationTimeout(u64),

    #[error("Tool discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameter(s): {}", .0.join(", "))]
    MissingParameter(Vec<String>),

    #[error("Parameter '{name}' should be a {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        got: String,
    },

    #[error("Expression contains invalid character '{0}'")]
    InvalidCharacter(char),

    #[error("Tool {tool} failed: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    #[error("Error: reached the maximum of {0} iterations without a final answer")]
    MaxIterationsReached(u32),
}

/// Why a candidate invocation was rejected before execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    /// Lists every missing parameter, in schema order.
    #[error("missing required parameter(s): {}", .0.join(", "))]
    MissingParameter(Vec<String>),

    #[error("parameter '{name}' should be a {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        got: String,
    },
}

impl From<ValidationError> for MediatorError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownTool(name) => Self::UnknownTool(name),
            ValidationError::MissingParameter(names) => Self::MissingParameter(names),
            ValidationError::TypeMismatch {
                name,
                expected,
                got,
            } => Self::TypeMismatch {
                name,
                expected,
                got,
            },
        }
    }
}

/// Domain failure raised by a tool or the registry transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("invalid character '{0}' in expression")]
    InvalidCharacter(char),

    #[error("division by zero")]
    DivisionByZero,

    #[error("malformed expression: {0}")]
    Malformed(String),

    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl ToolError {
    /// Lift into the turn-level taxonomy for the named tool.
    pub fn into_mediator_error(self, tool: &str) -> MediatorError {
        match self {
            Self::InvalidCharacter(c) => MediatorError::InvalidCharacter(c),
            Self::UnknownTool(name) => MediatorError::UnknownTool(name),
            other => MediatorError::ToolExecutionFailed {
                tool: tool.into(),
                reason: other.to_string(),
            },
        }
    }
}

/// A failure made of several independent causes, e.g. every connection
/// attempt a transport made before giving up.
#[derive(Debug, Error)]
#[error("{}", flatten_causes(.0))]
pub struct AggregateError(pub Vec<anyhow::Error>);

fn flatten_causes(causes: &[anyhow::Error]) -> String {
    causes
        .iter()
        .map(|e| format!("{:#}", e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Flatten an error (and any aggregate inside its chain) into one line.
pub fn describe_error(err: &anyhow::Error) -> String {
    for cause in err.chain() {
        if let Some(agg) = cause.downcast_ref::<AggregateError>() {
            let flat = agg.to_string();
            let outer = err.to_string();
            return if outer == flat {
                flat
            } else {
                format!("{}: {}", outer, flat)
            };
        }
    }
    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn missing_parameter_lists_every_name() {
        let err = ValidationError::MissingParameter(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "missing required parameter(s): a, b");
    }

    #[test]
    fn invalid_character_survives_lifting() {
        let lifted = ToolError::InvalidCharacter('x').into_mediator_error("calculate_expression");
        assert_eq!(lifted, MediatorError::InvalidCharacter('x'));
    }

    #[test]
    fn domain_errors_become_execution_failures() {
        let lifted = ToolError::DivisionByZero.into_mediator_error("calculate_expression");
        assert_eq!(
            lifted.to_string(),
            "Tool calculate_expression failed: division by zero"
        );
    }

    #[test]
    fn aggregate_is_flattened_into_one_line() {
        let agg = AggregateError(vec![
            anyhow!("connection refused"),
            anyhow!("dns lookup failed").context("resolving registry host"),
        ]);
        let err = anyhow::Error::new(agg).context("tool discovery");
        let flat = describe_error(&err);
        assert_eq!(
            flat,
            "tool discovery: connection refused; resolving registry host: dns lookup failed"
        );
        assert!(!flat.contains('\n'));
    }

    #[test]
    fn plain_chain_is_joined() {
        let err = Err::<(), _>(anyhow!("refused"))
            .context("GET /tools")
            .unwrap_err();
        assert_eq!(describe_error(&err), "GET /tools: refused");
    }
}
