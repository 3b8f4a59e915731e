//! Parser for tagged model responses.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Confidence assumed when the model reports none or an unusable value.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Structured view of a model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    /// Content of the `<thinking>` block.
    pub reasoning: String,

    /// Content of the `<result>` block.
    pub result: String,

    /// Content of the `<confidence>` block, in [0, 1].
    pub confidence: f64,
}

struct TagPatterns {
    thinking: Regex,
    confidence: Regex,
    result: Regex,
}

fn patterns() -> &'static TagPatterns {
    static PATTERNS: OnceLock<TagPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TagPatterns {
        thinking: Regex::new(r"(?is)<thinking>(.*?)</thinking>").expect("thinking pattern is valid"),
        confidence: Regex::new(r"(?is)<confidence>(.*?)</confidence>")
            .expect("confidence pattern is valid"),
        result: Regex::new(r"(?is)<result>(.*?)</result>").expect("result pattern is valid"),
    })
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_confidence(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|c| (0.0..=1.0).contains(c))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Parses a model response.
///
/// Never fails. When neither `<thinking>` nor `<result>` is present the
/// whole trimmed response becomes the result. When only `<result>` is
/// missing, whatever text lies outside the tagged blocks is used.
pub fn parse(text: &str) -> ParsedResponse {
    let patterns = patterns();

    let reasoning = capture(&patterns.thinking, text);
    let result = capture(&patterns.result, text);
    let confidence_raw = capture(&patterns.confidence, text);

    match (reasoning, result) {
        (None, None) => ParsedResponse {
            reasoning: String::new(),
            result: text.trim().to_string(),
            confidence: DEFAULT_CONFIDENCE,
        },
        (reasoning, Some(result)) => ParsedResponse {
            reasoning: reasoning.unwrap_or_default(),
            result,
            confidence: parse_confidence(confidence_raw.as_deref()),
        },
        (Some(reasoning), None) => {
            let stripped = patterns.thinking.replace_all(text, "");
            let stripped = patterns.confidence.replace_all(&stripped, "");
            ParsedResponse {
                reasoning,
                result: stripped.trim().to_string(),
                confidence: parse_confidence(confidence_raw.as_deref()),
            }
        }
    }
}
