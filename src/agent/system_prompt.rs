//! System prompt builder.
//!
//! Sections (in order):
//! 1. Role statement
//! 2. Rules (direct greetings, one tool per request, answer right after the result)
//! 3. Tool list from the discovered schemas
//! 4. Call format
//! 5. Transcript convention (iterative mode only)

use crate::config::DispatchMode;
use crate::types::ToolSchema;
use tracing::debug;

const ROLE: &str = r#"
# Role

You are a careful math assistant. You answer arithmetic questions by calling
exactly the tools listed below and reporting their results.
"#;

const RULES: &str = r#"
# Rules

1. Answer greetings and small talk directly. Do not call a tool for them.
2. Call at most one tool per request.
3. After you receive a tool result, answer immediately. Do not call another tool.
4. Only use tool names and parameters exactly as listed.
"#;

const CALL_FORMAT: &str = r#"
# Calling a tool

Reply with a single fenced block and nothing else:

```json
{"tool": "<tool name>", "arguments": {"<parameter>": <value>}}
```
"#;

const TRANSCRIPT_CONVENTION: &str = r#"
# Transcript

Work step by step using these line prefixes:

Thought: what you need to do next
Action: the fenced tool call, when you need a tool
Observation: the tool result (provided to you, never written by you)
Answer: the final answer, as short as possible

Stop as soon as you have written the Answer line.
"#;

const NO_TOOLS: &str = r#"
# Tools

No tools are available right now. Answer directly and say that you could not
compute the result with a tool.
"#;

/// Build the system prompt for one request.
pub fn build_system_prompt(tools: &[ToolSchema], mode: DispatchMode) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(ROLE);
    prompt.push_str(RULES);

    if tools.is_empty() {
        prompt.push_str(NO_TOOLS);
    } else {
        prompt.push_str("\n# Tools\n\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.signature(), tool.description));
        }
        prompt.push_str(CALL_FORMAT);
    }

    if mode == DispatchMode::Iterative {
        prompt.push_str(TRANSCRIPT_CONVENTION);
    }

    debug!(
        "System prompt: {} chars, {} tools, {:?} mode",
        prompt.len(),
        tools.len(),
        mode
    );
    prompt
}

/// User message for a follow-up iteration: the original request plus every
/// observation gathered so far.
pub fn build_followup(user_message: &str, transcript: &[String]) -> String {
    let mut msg = String::from(user_message);
    for entry in transcript {
        msg.push_str("\n\n");
        msg.push_str(entry);
    }
    msg
}
