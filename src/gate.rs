//! Pre-generation gate.
//!
//! Small generators over-trigger tool use on conversational input, so any
//! message that does not look like arithmetic is answered here without
//! touching the generator or the tools.

use crate::error::MediatorError;
use tracing::info;

/// Minimum trimmed length (in characters) a message must have.
pub const MIN_MESSAGE_CHARS: usize = 2;

/// Substrings that mark a message as needing computation.
const COMPUTATION_SYMBOLS: &[&str] = &[
    // Chinese
    "计算", "算", "加", "减", "乘", "除", "等于",
    // Operators
    "+", "-", "*", "/",
];

/// English words that mark a message as needing computation. Matched as
/// whole words, or as a prefix for stems like "calculat".
const COMPUTATION_WORDS: &[&str] = &[
    "add", "plus", "sum", "subtract", "minus", "multiply", "times", "divide", "equals",
];
const COMPUTATION_STEMS: &[&str] = &["calculat", "comput"];

/// Words that mark a message as a greeting.
const GREETING_KEYWORDS: &[&str] = &[
    "hello", "hi", "hey", "hiya", "howdy", "greetings", "good morning", "good afternoon",
    "good evening", "thanks", "thank you", "你好", "您好", "早上好", "晚上好", "谢谢",
];

pub const GREETING_REPLY: &str = "Hello! I'm a math assistant. Ask me to add, multiply or evaluate an expression.";
pub const NON_TASK_REPLY: &str = "Non-mathematical question - direct reply, generator not called";

/// Gate verdict for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Shorter than [`MIN_MESSAGE_CHARS`] after trimming.
    TooShort,
    /// Greeting without computation content.
    Greeting,
    /// Neither greeting nor computation.
    NonTask,
    /// Needs the generator.
    Compute,
}

impl GateDecision {
    /// Fixed reply for short-circuited decisions.
    pub fn short_circuit_reply(&self) -> Option<String> {
        match self {
            Self::TooShort => Some(MediatorError::TooShortInput.to_string()),
            Self::Greeting => Some(GREETING_REPLY.into()),
            Self::NonTask => Some(NON_TASK_REPLY.into()),
            Self::Compute => None,
        }
    }
}

/// Whether the message contains anything that needs computing.
///
/// Computation keywords dominate: a greeting that also asks for a sum
/// still goes to the generator.
pub fn should_invoke_generator(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.chars().any(|c| c.is_ascii_digit())
        || COMPUTATION_SYMBOLS.iter().any(|kw| lower.contains(kw))
    {
        return true;
    }
    let found = split_words(&lower).any(|w| {
        COMPUTATION_WORDS.contains(&w) || COMPUTATION_STEMS.iter().any(|stem| w.starts_with(stem))
    });
    found
}

fn split_words(lower: &str) -> impl Iterator<Item = &str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

/// Whether the message reads as a greeting (ignores computation content).
pub fn is_greeting(message: &str) -> bool {
    let lower = message.to_lowercase();
    let words: Vec<&str> = split_words(&lower).collect();

    GREETING_KEYWORDS.iter().any(|kw| {
        if kw.is_ascii() {
            // Whole-word match so "this" is not "hi".
            let kw_words: Vec<&str> = kw.split(' ').collect();
            words
                .windows(kw_words.len())
                .any(|window| window == kw_words.as_slice())
        } else {
            lower.contains(kw)
        }
    })
}

/// Classify a raw user message.
pub fn classify(message: &str) -> GateDecision {
    let trimmed = message.trim();
    let decision = if trimmed.chars().count() < MIN_MESSAGE_CHARS {
        GateDecision::TooShort
    } else if should_invoke_generator(trimmed) {
        GateDecision::Compute
    } else if is_greeting(trimmed) {
        GateDecision::Greeting
    } else {
        GateDecision::NonTask
    };

    info!("Gate: {:?} for {} chars", decision, trimmed.chars().count());
    decision
}
