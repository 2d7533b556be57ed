//! Toolgate: tool-call mediation between a free-text generator and a tool registry.
//!
//! Gates requests before generation, recovers one structured tool call from
//! generator output, validates it against discovered schemas, executes it once
//! and folds the result into a concise reply.

pub mod agent;
pub mod config;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod inference;
pub mod tools;
pub mod types;
