//! Stuck Detection.
//!
//! Scores how stuck a learner looks from a bounded window of interaction signals,
//! cognitive-load selections and recently asked questions.
//!
//! Rule-based only: a weighted sum of recent signal severities plus fixed bonuses for
//! repeated questions, repeated "overwhelmed" selections and rereads. The score is clamped
//! to `0..=100`. Inputs arrive from the front end with no guaranteed shape, so malformed
//! entries are skipped instead of rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::models::{CognitiveLoad, InteractionSignal, Severity, SignalKind};

/// Number of most recent signals considered.
pub const SIGNAL_WINDOW: usize = 10;
/// Number of most recent questions compared for similarity.
pub const QUESTION_WINDOW: usize = 3;
/// Number of most recent cognitive-load selections inspected.
pub const LOAD_WINDOW: usize = 5;

pub const LOW_WEIGHT: u32 = 5;
pub const MEDIUM_WEIGHT: u32 = 10;
pub const HIGH_WEIGHT: u32 = 20;

pub const SIMILARITY_THRESHOLD: f32 = 0.6;
pub const REPEATED_QUESTION_BONUS: u32 = 25;
pub const OVERWHELMED_BONUS: u32 = 20;
pub const REREAD_BONUS: u32 = 15;

/// Minimum occurrences for the overwhelmed and reread bonuses.
const REPEAT_MIN: usize = 2;

/// Scores at or above this mark the learner as stuck.
pub const STUCK_THRESHOLD: u8 = 50;

const MAX_SCORE: u32 = 100;

/// Result of a stuck evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StuckAnalysis {
    /// Integer score in `0..=100`.
    pub score: u8,
    /// The well-formed signals that were inside the window.
    pub signals: Vec<InteractionSignal>,
    pub is_stuck: bool,
    pub suggestions: Vec<String>,
}

impl StuckAnalysis {
    /// The neutral result: nothing observed, nothing suggested.
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// Stateless stuck detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct StuckDetector;

impl StuckDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scores raw, unvalidated JSON input.
    ///
    /// Any top-level value that is not an array counts as empty; entries of the wrong shape
    /// are dropped. Never fails.
    pub fn analyze_raw(
        &self,
        signals: &Value,
        cognitive_load_history: &Value,
        question_history: &Value,
    ) -> StuckAnalysis {
        let signals = parse_signals(signals);
        let loads = parse_loads(cognitive_load_history);
        let questions = parse_questions(question_history);
        self.analyze(&signals, &loads, &questions)
    }

    /// Scores typed input.
    pub fn analyze(
        &self,
        signals: &[InteractionSignal],
        cognitive_load_history: &[CognitiveLoad],
        question_history: &[String],
    ) -> StuckAnalysis {
        let recent: Vec<InteractionSignal> = tail(signals, SIGNAL_WINDOW).to_vec();
        let mut suggestions = Vec::new();

        let mut score: u32 = recent.iter().map(|s| severity_weight(s.severity)).sum();

        if recent.iter().any(|s| s.severity == Severity::High) {
            suggestions.push("Break the problem into smaller steps and tackle them one by one.".to_string());
        }

        if has_repeated_question(tail(question_history, QUESTION_WINDOW)) {
            score += REPEATED_QUESTION_BONUS;
            suggestions.push(
                "You have asked something similar a few times. Try rephrasing it from a different angle or ask for a concrete example."
                    .to_string(),
            );
        }

        let overwhelmed = tail(cognitive_load_history, LOAD_WINDOW)
            .iter()
            .filter(|l| **l == CognitiveLoad::Overwhelmed)
            .count();
        if overwhelmed >= REPEAT_MIN {
            score += OVERWHELMED_BONUS;
            suggestions.push("Switch to a lighter explanation mode and take a short break.".to_string());
        }

        let rereads = recent.iter().filter(|s| s.kind == SignalKind::Reread).count();
        if rereads >= REPEAT_MIN {
            score += REREAD_BONUS;
            suggestions.push(
                "Ask for a summary or a visual breakdown of the part you keep rereading.".to_string(),
            );
        }

        let score = score.min(MAX_SCORE) as u8;
        let is_stuck = score >= STUCK_THRESHOLD;

        if is_stuck {
            suggestions.push("Walk through a worked example in Beginner mode before moving on.".to_string());
        }
        if score == 0 {
            suggestions.clear();
        }

        StuckAnalysis {
            score,
            signals: recent,
            is_stuck,
            suggestions,
        }
    }
}

fn severity_weight(severity: Severity) -> u32 {
    match severity {
        Severity::Low => LOW_WEIGHT,
        Severity::Medium => MEDIUM_WEIGHT,
        Severity::High => HIGH_WEIGHT,
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over lowercase word sets. Two empty texts are not similar.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let a = tokens(a);
    let b = tokens(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

fn has_repeated_question(questions: &[String]) -> bool {
    questions.iter().enumerate().any(|(i, q)| {
        questions[i + 1..]
            .iter()
            .any(|other| jaccard_similarity(q, other) >= SIMILARITY_THRESHOLD)
    })
}

fn as_array(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn parse_signals(value: &Value) -> Vec<InteractionSignal> {
    as_array(value).iter().filter_map(InteractionSignal::from_loose).collect()
}

fn parse_loads(value: &Value) -> Vec<CognitiveLoad> {
    as_array(value)
        .iter()
        .filter_map(|entry| {
            let raw = match entry {
                Value::String(s) => s.as_str(),
                Value::Object(map) => map.get("mode").and_then(Value::as_str)?,
                _ => return None,
            };
            serde_json::from_value(Value::String(raw.to_lowercase())).ok()
        })
        .collect()
}

fn parse_questions(value: &Value) -> Vec<String> {
    as_array(value)
        .iter()
        .filter_map(|entry| match entry {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("question").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|q| !q.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_input_is_neutral() {
        let detector = StuckDetector::new();
        let result = detector.analyze(&[], &[], &[]);
        assert_eq!(result, StuckAnalysis::neutral());
    }

    #[test]
    fn test_severity_weights_sum() {
        let detector = StuckDetector::new();
        let signals = vec![
            InteractionSignal::new(SignalKind::LongPause, Severity::Low),
            InteractionSignal::new(SignalKind::WrongAnswer, Severity::Medium),
            InteractionSignal::new(SignalKind::HintRequest, Severity::High),
        ];
        let result = detector.analyze(&signals, &[], &[]);
        assert_eq!(result.score, 35);
        assert!(!result.is_stuck);
        assert_eq!(result.signals.len(), 3);
    }

    #[test]
    fn test_only_recent_window_counts() {
        let detector = StuckDetector::new();
        let mut signals = vec![InteractionSignal::new(SignalKind::HintRequest, Severity::High); 5];
        signals.extend(vec![InteractionSignal::new(SignalKind::LongPause, Severity::Low); 10]);
        let result = detector.analyze(&signals, &[], &[]);
        assert_eq!(result.score, 50);
        assert_eq!(result.signals.len(), SIGNAL_WINDOW);
    }

    #[test]
    fn test_jaccard_similarity() {
        assert_eq!(jaccard_similarity("what is a closure", "what is a closure"), 1.0);
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert!(jaccard_similarity("what is a closure", "explain monads") < 0.1);
    }

    #[test]
    fn test_numeric_timestamps_keep_signals() {
        let detector = StuckDetector::new();
        let signal = json!({"type": "reread", "severity": "high", "timestamp": 1700000000000u64});
        let signals = json!([signal.clone(), signal.clone(), signal]);

        let result = detector.analyze_raw(&signals, &json!([]), &json!([]));
        // 3 x 20 + reread bonus
        assert_eq!(result.score, 75);
        assert_eq!(result.signals.len(), 3);
        assert!(result.signals.iter().all(|s| s.timestamp.is_some()));
    }

    #[test]
    fn test_raw_fields_ignore_case() {
        let detector = StuckDetector::new();
        let signals = json!([
            {"type": "reread", "severity": "High"},
            {"type": "REREAD", "severity": "HIGH"},
        ]);
        let loads = json!(["Overwhelmed", "OVERWHELMED"]);

        let result = detector.analyze_raw(&signals, &loads, &json!([]));
        // 2 x 20 + overwhelmed bonus + reread bonus
        assert_eq!(result.score, 75);
        assert_eq!(result.signals.len(), 2);
        assert!(result.is_stuck);
    }

    #[test]
    fn test_malformed_raw_input_is_neutral() {
        let detector = StuckDetector::new();
        let result = detector.analyze_raw(&Value::Null, &json!("nope"), &json!({"a": 1}));
        assert_eq!(result.score, 0);
        assert!(!result.is_stuck);
        assert!(result.suggestions.is_empty());
    }
}
