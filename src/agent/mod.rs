//! Tool-call mediation: extraction, validation, dispatch and answer cleanup.

pub mod dispatcher;
pub mod extractor;
pub mod mediator;
pub mod normalizer;
pub mod system_prompt;
pub mod validator;

pub use dispatcher::{Deadline, Dispatcher};
pub use extractor::extract;
pub use mediator::{HealthReport, Mediator};
pub use normalizer::{extract_final_answer, NormalizerOptions};
pub use validator::validate;
