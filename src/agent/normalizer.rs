//! Pulls a concise final answer out of a verbose agent transcript.
//!
//! Deterministic and lossy: a fixed cascade of text heuristics, not
//! language understanding. Always returns something no longer than
//! `max_chars` characters.

use crate::config::NumericPreference;
use regex::Regex;
use std::sync::LazyLock;

/// Final-answer markers, matched case-insensitively; the last occurrence wins.
const ANSWER_MARKERS: &[&str] = &["final answer:", "answer:", "最终答案：", "最终答案:", "答案：", "答案:"];

/// Markers that identify a reasoning transcript.
const STEP_MARKERS: &[&str] = &["thought:", "action:", "observation:", "step "];

/// Lines scanned after the marker.
const LINES_AFTER_MARKER: usize = 3;

/// A short answer line is under this many characters...
const SHORT_LINE_CHARS: usize = 50;

/// ...and under this many words (unless purely numeric).
const SHORT_LINE_WORDS: usize = 5;

/// Texts longer than this are treated as reasoning chains.
const LONG_TEXT_CHARS: usize = 300;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.])(-?\d+(?:\.\d+)?)").expect("valid number regex"));

static BOXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\boxed\{([^{}]*)\}").expect("valid boxed regex"));

static PURE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("valid pure number regex"));

/// Tunables for [`extract_final_answer`].
#[derive(Debug, Clone, Copy)]
pub struct NormalizerOptions {
    pub max_chars: usize,
    pub numeric_preference: NumericPreference,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            max_chars: 200,
            numeric_preference: NumericPreference::Last,
        }
    }
}

/// Extract a concise answer from raw generator output.
pub fn extract_final_answer(raw: &str, opts: NormalizerOptions) -> String {
    let answer = cascade(raw, opts).unwrap_or_else(|| raw.trim().to_string());
    truncate_chars(answer.trim(), opts.max_chars)
}

fn cascade(raw: &str, opts: NormalizerOptions) -> Option<String> {
    let tail = after_last_marker(raw);

    if let Some(tail) = tail {
        if let Some(line) = short_answer_line(tail) {
            return Some(line);
        }
        if let Some(first) = numbers(tail).into_iter().next() {
            return Some(first);
        }
    }

    if looks_like_reasoning(raw) {
        let all = numbers(raw);
        let picked = match opts.numeric_preference {
            NumericPreference::Last => all.into_iter().last(),
            NumericPreference::First => all.into_iter().next(),
        };
        if picked.is_some() {
            return picked;
        }
    }

    if let Some(tail) = tail {
        let first = tail.lines().map(str::trim).find(|l| !l.is_empty());
        if let Some(line) = first.map(strip_markup) {
            if !line.is_empty() && line.chars().count() <= opts.max_chars {
                return Some(line);
            }
        }
    }

    None
}

/// Text following the last final-answer marker, if any.
fn after_last_marker(raw: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `raw`.
    let lower = raw.to_ascii_lowercase();
    ANSWER_MARKERS
        .iter()
        .filter_map(|m| lower.rfind(m).map(|pos| pos + m.len()))
        .max()
        .map(|end| &raw[end..])
}

fn short_answer_line(tail: &str) -> Option<String> {
    tail.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(LINES_AFTER_MARKER)
        .map(strip_markup)
        .find(|line| {
            !line.is_empty()
                && line.chars().count() < SHORT_LINE_CHARS
                && (PURE_NUMBER.is_match(line) || line.split_whitespace().count() < SHORT_LINE_WORDS)
        })
}

fn looks_like_reasoning(raw: &str) -> bool {
    if raw.chars().count() > LONG_TEXT_CHARS {
        return true;
    }
    let lower = raw.to_ascii_lowercase();
    STEP_MARKERS.iter().any(|m| lower.contains(m))
}

fn numbers(text: &str) -> Vec<String> {
    NUMBER
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Remove math-box and markdown wrappers around an answer.
fn strip_markup(line: &str) -> String {
    let unboxed = BOXED.replace_all(line, "$1");
    let cleaned: String = unboxed
        .replace("\\(", "")
        .replace("\\)", "")
        .replace("\\[", "")
        .replace("\\]", "")
        .replace(['$', '*', '`'], "");
    cleaned
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string()
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect::<String>().trim().to_string()
}
