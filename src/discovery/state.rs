//! Discovery state machine: `Idle → Retrying(attempt) → Ready | Degraded`.
//!
//! Kept free of I/O so the bounded-attempts invariant can be checked on its own.

use crate::error::MediatorError;
use crate::types::ToolSchema;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Retry bookkeeping for one discovery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Where the connection manager stands with the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryState {
    /// Nothing attempted since start or the last reset.
    Idle,
    /// Attempt `attempt` (1-based) is due or running.
    Retrying { attempt: u32 },
    /// Tools are known and cached.
    Ready(Arc<[ToolSchema]>),
    /// Every attempt failed; the engine runs with no tools.
    Degraded { reason: String },
}

/// Inputs that drive [`DiscoveryState::transition`].
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Start,
    AttemptFailed { reason: String },
    Succeeded(Arc<[ToolSchema]>),
    Reset,
}

impl DiscoveryState {
    /// Apply one event. Events that make no sense in the current state leave it unchanged.
    pub fn transition(self, event: DiscoveryEvent, retry: &RetryState) -> Self {
        match (self, event) {
            (_, DiscoveryEvent::Reset) => Self::Idle,
            (_, DiscoveryEvent::Start) => Self::Retrying { attempt: 1 },
            (Self::Retrying { .. }, DiscoveryEvent::Succeeded(tools)) => Self::Ready(tools),
            (Self::Retrying { attempt }, DiscoveryEvent::AttemptFailed { reason }) => {
                if attempt >= retry.max_attempts {
                    Self::Degraded { reason }
                } else {
                    Self::Retrying {
                        attempt: attempt + 1,
                    }
                }
            }
            (state, _) => state,
        }
    }

    /// Tools to serve without talking to the registry, if the state has settled.
    pub fn settled_tools(&self) -> Option<Arc<[ToolSchema]>> {
        match self {
            Self::Ready(tools) => Some(tools.clone()),
            Self::Degraded { .. } => Some(Arc::from(Vec::new())),
            Self::Idle | Self::Retrying { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Why discovery gave up, if it did.
    pub fn failure(&self) -> Option<MediatorError> {
        match self {
            Self::Degraded { reason } => Some(MediatorError::DiscoveryFailed(reason.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Retrying { attempt } => write!(f, "retrying (attempt {})", attempt),
            Self::Ready(tools) => write!(f, "ready ({} tools)", tools.len()),
            Self::Degraded { reason } => write!(f, "degraded ({})", reason),
        }
    }
}
