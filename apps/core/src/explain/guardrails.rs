//! Input guardrails applied before anything is sent upstream.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::AppError;

const NEUTRALIZED: &str = "[removed]";

/// A guardrail that changed the learner's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guardrail {
    /// Leading or trailing whitespace was removed.
    InputTrimmed,
    #[serde(rename_all = "camelCase")]
    InputTruncated { original_chars: usize, kept_chars: usize },
    /// An instruction-override phrase was replaced.
    InjectionNeutralized { phrase: String },
}

// NOTE: expect() is acceptable here, the patterns are compile-time constants.
static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(ignore|disregard|forget)\s+(all\s+)?(the\s+)?(previous|prior|above|earlier|your)\s+(instructions|rules|prompts?)\b")
            .expect("Invalid regex: override instructions"),
        Regex::new(r"(?i)\byou\s+are\s+now\s+(a|an|in)\b").expect("Invalid regex: role switch"),
        Regex::new(r"(?i)\b(reveal|print|show)\s+(me\s+)?(your|the)\s+system\s+prompt\b")
            .expect("Invalid regex: prompt exfiltration"),
        Regex::new(r"(?i)\bact\s+as\s+(if\s+you\s+have\s+)?no\s+(rules|restrictions)\b")
            .expect("Invalid regex: no restrictions"),
    ]
});

/// Cleans learner input. Returns the text to send and every guardrail that fired.
///
/// Empty (or whitespace-only) input is rejected.
pub fn apply_guardrails(input: &str, max_chars: usize) -> Result<(String, Vec<Guardrail>), AppError> {
    let mut applied = Vec::new();

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("input must not be empty".to_string()));
    }
    if trimmed.len() != input.len() {
        applied.push(Guardrail::InputTrimmed);
    }

    let original_chars = trimmed.chars().count();
    let mut text: String = if original_chars > max_chars {
        applied.push(Guardrail::InputTruncated {
            original_chars,
            kept_chars: max_chars,
        });
        trimmed.chars().take(max_chars).collect()
    } else {
        trimmed.to_string()
    };

    for pattern in INJECTION_PATTERNS.iter() {
        let phrases: Vec<String> = pattern.find_iter(&text).map(|m| m.as_str().to_string()).collect();
        if phrases.is_empty() {
            continue;
        }
        text = pattern.replace_all(&text, NEUTRALIZED).into_owned();
        applied.extend(
            phrases
                .into_iter()
                .map(|phrase| Guardrail::InjectionNeutralized { phrase }),
        );
    }

    Ok((text, applied))
}
