//! Intent Classification using regex patterns.
//!
//! Fast pattern-based detection of what a learner is asking for. The detected intent is
//! recorded in the answer's trace; it does not change how the answer is produced.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Detected learner intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Wants a concept explained (explain, what is, how does...)
    Explain,
    /// Pasted an error or describes broken code
    Debug,
    /// Wants two or more things contrasted
    Compare,
    /// Wants a concrete example or snippet
    Example,
    /// Wants to be tested
    Quiz,
    /// Wants a condensed version
    Summarize,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Explain => "explain",
            Intent::Debug => "debug",
            Intent::Compare => "compare",
            Intent::Example => "example",
            Intent::Quiz => "quiz",
            Intent::Summarize => "summarize",
            Intent::Unknown => "unknown",
        }
    }
}

/// Result of intent classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    pub intent: Intent,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Text fragments that matched
    pub matched_patterns: Vec<String>,
}

impl IntentResult {
    fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            matched_patterns: vec![],
        }
    }
}

struct IntentPattern {
    intent: Intent,
    patterns: &'static [Regex],
    weight: f32,
}

// NOTE: expect() is acceptable here, the patterns are compile-time constants.
static DEBUG_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(error|exception|traceback|stack trace|bug|crash(es|ed)?)\b").expect("Invalid regex: debug nouns"),
        Regex::new(r"(?i)\b(debug|fix|broken|fails?|failing|doesn'?t work|not working)\b").expect("Invalid regex: debug verbs"),
        Regex::new(r"\b\w*(Error|Exception):").expect("Invalid regex: error header"),
    ]
});

static QUIZ_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(quiz|test me|flashcards?)\b").expect("Invalid regex: quiz words"),
        Regex::new(r"(?i)\b(practice (questions?|problems?)|check my understanding)\b").expect("Invalid regex: practice phrases"),
    ]
});

static COMPARE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(compare|comparison|versus|vs)\b").expect("Invalid regex: compare verbs"),
        Regex::new(r"(?i)\b(difference between|differences|pros and cons|trade-?offs?)\b").expect("Invalid regex: compare phrases"),
    ]
});

static SUMMARIZE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(summari[sz]e|summary|recap|tl;?dr|overview)\b").expect("Invalid regex: summary words"),
        Regex::new(r"(?i)\b(in short|key points|in a nutshell)\b").expect("Invalid regex: summary phrases"),
    ]
});

static EXAMPLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(examples?|sample|demo|show me)\b").expect("Invalid regex: example words"),
        Regex::new(r"(?i)\b(how (do|would) i (use|write)|code snippet)\b").expect("Invalid regex: usage phrases"),
    ]
});

static EXPLAIN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(explain|clarify|elaborate|describe|teach me)\b").expect("Invalid regex: explain verbs"),
        Regex::new(r"(?i)^(what|why|how)\b").expect("Invalid regex: question openers"),
        Regex::new(r"(?i)\b(what is|what are|how does|meaning of)\b").expect("Invalid regex: definition phrases"),
    ]
});

/// Intent classifier using regex patterns
pub struct IntentClassifier {
    patterns: Vec<IntentPattern>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        // Order matters on ties: the first group with the best score wins.
        let patterns = vec![
            IntentPattern { intent: Intent::Debug, patterns: &DEBUG_PATTERNS, weight: 1.0 },
            IntentPattern { intent: Intent::Quiz, patterns: &QUIZ_PATTERNS, weight: 0.95 },
            IntentPattern { intent: Intent::Compare, patterns: &COMPARE_PATTERNS, weight: 0.9 },
            IntentPattern { intent: Intent::Summarize, patterns: &SUMMARIZE_PATTERNS, weight: 0.85 },
            IntentPattern { intent: Intent::Example, patterns: &EXAMPLE_PATTERNS, weight: 0.8 },
            // Lowest: almost every question looks like a request for an explanation
            IntentPattern { intent: Intent::Explain, patterns: &EXPLAIN_PATTERNS, weight: 0.7 },
        ];

        Self { patterns }
    }

    pub fn classify(&self, text: &str) -> IntentResult {
        let text = text.trim();
        if text.is_empty() {
            return IntentResult::unknown();
        }

        let mut best = IntentResult::unknown();

        for group in &self.patterns {
            let matched: Vec<String> = group
                .patterns
                .iter()
                .filter_map(|p| p.find(text).map(|m| m.as_str().to_string()))
                .collect();

            if matched.is_empty() {
                continue;
            }

            // A single hit already counts for most of the weight; more hits add the rest.
            let ratio = matched.len() as f32 / group.patterns.len() as f32;
            let score = (group.weight * (0.6 + 0.4 * ratio)).min(1.0);

            if score > best.confidence {
                best = IntentResult {
                    intent: group.intent,
                    confidence: score,
                    matched_patterns: matched,
                };
            }
        }

        best
    }
}
