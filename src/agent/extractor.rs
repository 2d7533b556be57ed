//! Recovers at most one tool invocation from free generator text.
//!
//! Strategies run most-specific first and stop at the first hit:
//! 1. a ```json fenced block holding `{"tool": ..., "arguments": {...}}`
//! 2. the whole trimmed text as one object with a `tool` key
//! 3. a brace-balanced scan for the first complete object with a `tool` key

use crate::types::ToolInvocationCandidate;
use serde_json::{Map, Value};
use tracing::debug;

const FENCE: &str = "```";

/// Extract a candidate invocation. `None` means the text is a plain reply.
pub fn extract(text: &str) -> Option<ToolInvocationCandidate> {
    let found = from_json_fence(text)
        .map(|c| ("fence", c))
        .or_else(|| from_whole_text(text).map(|c| ("whole", c)))
        .or_else(|| from_balanced_scan(text).map(|c| ("scan", c)));

    match found {
        Some((strategy, candidate)) => {
            debug!(
                "Extracted call to '{}' via {} strategy",
                candidate.tool_name, strategy
            );
            Some(candidate)
        }
        None => {
            debug!("No tool call found in {} chars", text.len());
            None
        }
    }
}

/// Build a candidate from a parsed object. `require_arguments` demands an
/// explicit `arguments` object; otherwise a missing one reads as empty.
fn candidate_from(value: Value, span: &str, require_arguments: bool) -> Option<ToolInvocationCandidate> {
    let Value::Object(mut obj) = value else {
        return None;
    };
    let tool_name = obj.get("tool")?.as_str()?.trim().to_string();
    if tool_name.is_empty() {
        return None;
    }
    let arguments = match obj.remove("arguments") {
        Some(Value::Object(args)) => args,
        None | Some(Value::Null) if !require_arguments => Map::new(),
        _ => return None,
    };
    Some(ToolInvocationCandidate {
        tool_name,
        arguments,
        source_span: span.to_string(),
    })
}

/// Strategy 1: fenced code blocks labelled `json`, in order.
fn from_json_fence(text: &str) -> Option<ToolInvocationCandidate> {
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        // The label is the word glued to the fence; anything after it,
        // on the same line or not, is body.
        let body_start = after_open
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .unwrap_or(after_open.len());
        let label = &after_open[..body_start];
        let Some(close) = after_open[body_start..].find(FENCE) else {
            return None;
        };
        let body = &after_open[body_start..body_start + close];

        if label.eq_ignore_ascii_case("json") {
            let span = &rest[open..open + FENCE.len() + body_start + close + FENCE.len()];
            if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
                if let Some(c) = candidate_from(value, span, true) {
                    return Some(c);
                }
            }
        }
        rest = &after_open[body_start + close + FENCE.len()..];
    }
    None
}

/// Strategy 2: the entire trimmed text is the call.
fn from_whole_text(text: &str) -> Option<ToolInvocationCandidate> {
    let trimmed = text.trim();
    let value = serde_json::from_str::<Value>(trimmed).ok()?;
    candidate_from(value, trimmed, false)
}

/// End (exclusive byte offset) of the balanced object starting at `start`,
/// ignoring braces inside string literals.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strategy 3: scan for balanced `{...}` spans and take the first one that
/// parses and names a tool. Nested `arguments` objects do not end the span,
/// and an object without a top-level `tool` key is searched for inner ones.
fn from_balanced_scan(text: &str) -> Option<ToolInvocationCandidate> {
    let mut from = 0;
    while let Some(rel) = text[from..].find('{') {
        let start = from + rel;
        from = start + 1;
        let Some(end) = balanced_end(text, start) else {
            continue;
        };
        let span = &text[start..end];
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            if let Some(c) = candidate_from(value, span, false) {
                return Some(c);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(c: &ToolInvocationCandidate) -> Value {
        Value::Object(c.arguments.clone())
    }

    #[test]
    fn fenced_block_with_prose() {
        let text = "Sure, let me add those.\n```json\n{\"tool\": \"add_numbers\", \"arguments\": {\"a\": 5, \"b\": 3}}\n```\nDone.";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "add_numbers");
        assert_eq!(args(&c), json!({"a": 5, "b": 3}));
        assert!(c.source_span.starts_with("```json"));
        assert!(c.source_span.ends_with("```"));
    }

    #[test]
    fn fence_label_is_case_insensitive_and_skips_other_blocks() {
        let text = "```python\nprint(1)\n```\n```JSON\n{\"tool\":\"multiply_numbers\",\"arguments\":{\"a\":2,\"b\":4}}\n```";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "multiply_numbers");
    }

    #[test]
    fn whole_text_object() {
        let c = extract("  {\"tool\": \"calculate_expression\", \"arguments\": {\"expression\": \"2+3*4\"}}  ").unwrap();
        assert_eq!(c.tool_name, "calculate_expression");
        assert_eq!(args(&c), json!({"expression": "2+3*4"}));
    }

    #[test]
    fn whole_text_without_arguments_reads_empty() {
        let c = extract("{\"tool\": \"list_things\"}").unwrap();
        assert!(c.arguments.is_empty());
    }

    #[test]
    fn balanced_scan_handles_nested_arguments() {
        let text = "I will call {\"tool\": \"add_numbers\", \"arguments\": {\"a\": 1.5, \"b\": {\"x\": 1}}} and report back.";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "add_numbers");
        assert_eq!(args(&c)["b"], json!({"x": 1}));
        assert!(c.source_span.ends_with("}}}"));
    }

    #[test]
    fn balanced_scan_ignores_braces_in_strings() {
        let text = "Action: {\"tool\": \"calculate_expression\", \"arguments\": {\"expression\": \"(1+2)}\"}} trailing";
        let c = extract(text).unwrap();
        assert_eq!(args(&c)["expression"], "(1+2)}");
    }

    #[test]
    fn balanced_scan_skips_objects_without_tool() {
        let text = "context {\"note\": 1} then {\"tool\": \"add_numbers\", \"arguments\": {\"a\": 1, \"b\": 2}}";
        assert_eq!(extract(text).unwrap().tool_name, "add_numbers");
    }

    #[test]
    fn balanced_scan_finds_call_nested_in_wrapper_object() {
        let text = "{\"action\": {\"tool\": \"add_numbers\", \"arguments\": {\"a\": 1, \"b\": 2}}}";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "add_numbers");
        assert_eq!(args(&c), json!({"a": 1, "b": 2}));
        assert!(c.source_span.starts_with("{\"tool\""));
    }

    #[test]
    fn fence_with_inline_body_closes_on_its_own_line() {
        let text = "```json {\"tool\": \"add_numbers\", \"arguments\": {\"a\": 1, \"b\": 2}}```\nthen\n```json\n{\"tool\": \"multiply_numbers\", \"arguments\": {}}\n```";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "add_numbers");
        assert!(c.source_span.starts_with("```json {"));
        assert!(c.source_span.ends_with("}}```"));
    }

    #[test]
    fn inline_fence_does_not_misalign_later_blocks() {
        let text = "See ```text inline note``` first.\n```json\n{\"tool\": \"multiply_numbers\", \"arguments\": {\"a\": 2, \"b\": 4}}\n```";
        let c = extract(text).unwrap();
        assert_eq!(c.tool_name, "multiply_numbers");
        assert!(c.source_span.starts_with("```json\n"));
    }

    #[test]
    fn first_call_wins_when_several_are_present() {
        let text = "{\"tool\": \"add_numbers\", \"arguments\": {\"a\": 1, \"b\": 2}}\n{\"tool\": \"multiply_numbers\", \"arguments\": {\"a\": 3, \"b\": 4}}";
        assert_eq!(extract(text).unwrap().tool_name, "add_numbers");
    }

    #[test]
    fn fence_beats_later_bare_object() {
        let text = "{\"tool\": \"multiply_numbers\", \"arguments\": {}} \n```json\n{\"tool\": \"add_numbers\", \"arguments\": {}}\n```";
        assert_eq!(extract(text).unwrap().tool_name, "add_numbers");
    }

    #[test]
    fn plain_text_has_no_call() {
        assert!(extract("The answer is 8.").is_none());
        assert!(extract("").is_none());
        assert!(extract("{ not json at all").is_none());
        assert!(extract("```json\n{\"tool\": \"x\"").is_none());
    }

    #[test]
    fn non_object_arguments_rejected() {
        assert!(extract("{\"tool\": \"add_numbers\", \"arguments\": [1, 2]}").is_none());
        assert!(extract("{\"tool\": \"\", \"arguments\": {}}").is_none());
    }

    #[test]
    fn multibyte_text_is_safe() {
        let text = "好的，我来计算：{\"tool\": \"add_numbers\", \"arguments\": {\"a\": 5, \"b\": 3}} 结果如下";
        assert_eq!(extract(text).unwrap().tool_name, "add_numbers");
    }
}
