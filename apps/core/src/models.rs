use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Explanation depth requested by the learner.
///
/// Serialized exactly as `Beginner`, `Student` or `Pro`, matching the request body of
/// `POST /api/explain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExplainMode {
    Beginner,
    #[default]
    Student,
    Pro,
}

impl ExplainMode {
    pub fn label(&self) -> &'static str {
        match self {
            ExplainMode::Beginner => "Beginner",
            ExplainMode::Student => "Student",
            ExplainMode::Pro => "Pro",
        }
    }
}

impl fmt::Display for ExplainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cognitive load presets. Each one fixes how dense an explanation may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CognitiveLoad {
    /// Learner feels swamped: short answers, one idea at a time.
    Overwhelmed,
    #[default]
    Steady,
    Focused,
    /// Learner wants to be pushed: dense, edge cases included.
    Stretch,
}

impl CognitiveLoad {
    pub fn label(&self) -> &'static str {
        match self {
            CognitiveLoad::Overwhelmed => "overwhelmed",
            CognitiveLoad::Steady => "steady",
            CognitiveLoad::Focused => "focused",
            CognitiveLoad::Stretch => "stretch",
        }
    }

    /// Upper bound on answer length, in words.
    pub fn word_budget(&self) -> usize {
        match self {
            CognitiveLoad::Overwhelmed => 150,
            CognitiveLoad::Steady => 350,
            CognitiveLoad::Focused => 600,
            CognitiveLoad::Stretch => 900,
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            CognitiveLoad::Overwhelmed => {
                "The learner is overwhelmed. Use very short paragraphs, introduce one idea at a time and end with a single next step."
            }
            CognitiveLoad::Steady => {
                "Keep a calm, even pace with a short summary at the end."
            }
            CognitiveLoad::Focused => {
                "The learner is focused. Be thorough, use headers to structure the answer and include a worked example."
            }
            CognitiveLoad::Stretch => {
                "The learner wants a challenge. Cover edge cases, trade-offs and finish with an open question."
            }
        }
    }
}

/// Angle from which an explanation is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    #[default]
    Default,
    Analogy,
    Visual,
    Practical,
    Historical,
}

impl Perspective {
    pub fn directive(&self) -> Option<&'static str> {
        match self {
            Perspective::Default => None,
            Perspective::Analogy => Some("Anchor the explanation in an everyday analogy."),
            Perspective::Visual => {
                Some("Describe the idea visually, using ASCII diagrams or tables where they help.")
            }
            Perspective::Practical => {
                Some("Focus on practical usage: when you would reach for this and what it looks like in real code.")
            }
            Perspective::Historical => {
                Some("Explain where the idea came from and what problem it originally solved.")
            }
        }
    }
}

/// Severity tier of an interaction signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Kinds of interaction signals the front end reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    QuestionRepeat,
    Reread,
    LongPause,
    WrongAnswer,
    HintRequest,
    Overwhelmed,
    #[serde(other)]
    Other,
}

/// A single learner interaction that may indicate difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionSignal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub severity: Severity,
    /// RFC 3339 text or epoch milliseconds (`Date.now()`). Anything else reads as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|ms| ms as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    })
}

impl InteractionSignal {
    pub fn new(kind: SignalKind, severity: Severity) -> Self {
        Self {
            kind,
            severity,
            timestamp: Some(Utc::now()),
        }
    }

    /// Reads a signal from loosely shaped JSON. Only `type` and `severity` decide whether
    /// the entry is usable; both are matched case-insensitively.
    pub fn from_loose(entry: &Value) -> Option<Self> {
        let mut map = entry.as_object()?.clone();
        for field in ["type", "severity"] {
            if let Some(Value::String(s)) = map.get_mut(field) {
                *s = s.trim().to_lowercase();
            }
        }
        serde_json::from_value(Value::Object(map)).ok()
    }
}

/// A mastery measurement for one topic (e.g. a graded quiz).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryRecord {
    pub topic: String,
    /// Score between 0 and 100.
    pub score: u8,
    pub recorded_at: DateTime<Utc>,
}

/// A focused study window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timebox {
    pub minutes: u32,
    pub started_at: DateTime<Utc>,
}

impl Timebox {
    pub fn start(minutes: u32) -> Self {
        Self {
            minutes,
            started_at: Utc::now(),
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::minutes(i64::from(self.minutes))
    }

    /// Time left at `now`, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.ends_at() - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at()
    }
}

// --- Knowledge graph ---

/// Role of a concept inside an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Harvested from a markdown header (or the query itself).
    Core,
    /// Harvested from a bold span.
    Related,
    /// Harvested from an inline code span.
    Example,
    /// Injected from the static keyword table when too little was found.
    Filler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: String,
    /// Between 0.0 and 1.0.
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeGraph {
    pub id: String,
    pub query: String,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of(&self, node_type: NodeType) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }
}

// --- Error debugger ---

/// One parsed stack frame. `raw` always holds the original line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    JavaScript,
    Python,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    pub id: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub language: SourceLanguage,
    pub stack: Vec<StackFrame>,
    pub root_location: Option<StackFrame>,
    pub suggested_fixes: Vec<FixSuggestion>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_mode_wire_names() {
        assert_eq!(serde_json::to_string(&ExplainMode::Student).unwrap(), "\"Student\"");
        let mode: ExplainMode = serde_json::from_str("\"Pro\"").unwrap();
        assert_eq!(mode, ExplainMode::Pro);
        assert!(serde_json::from_str::<ExplainMode>("\"student\"").is_err());
    }

    #[test]
    fn test_unknown_signal_kind_maps_to_other() {
        let signal: InteractionSignal =
            serde_json::from_str(r#"{"type":"tab_switch","severity":"low"}"#).unwrap();
        assert_eq!(signal.kind, SignalKind::Other);
        assert_eq!(signal.severity, Severity::Low);
    }

    #[test]
    fn test_signal_timestamp_formats() {
        let millis: InteractionSignal =
            serde_json::from_str(r#"{"type":"reread","severity":"high","timestamp":1700000000000}"#).unwrap();
        assert_eq!(millis.timestamp.map(|t| t.timestamp()), Some(1_700_000_000));

        let text: InteractionSignal = serde_json::from_str(
            r#"{"type":"reread","severity":"high","timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(text.timestamp.map(|t| t.timestamp()), Some(1_714_557_600));

        let junk: InteractionSignal =
            serde_json::from_str(r#"{"type":"reread","severity":"high","timestamp":{"at":"now"}}"#).unwrap();
        assert_eq!(junk.timestamp, None);
    }

    #[test]
    fn test_loose_signal_ignores_case() {
        let signal = InteractionSignal::from_loose(&serde_json::json!({"type": "Reread", "severity": "HIGH"}))
            .unwrap();
        assert_eq!(signal.kind, SignalKind::Reread);
        assert_eq!(signal.severity, Severity::High);

        assert!(InteractionSignal::from_loose(&serde_json::json!({"type": "reread"})).is_none());
        assert!(InteractionSignal::from_loose(&serde_json::json!("reread")).is_none());
    }

    #[test]
    fn test_timebox_remaining_never_negative() {
        let timebox = Timebox {
            minutes: 25,
            started_at: Utc::now() - Duration::minutes(30),
        };
        assert!(timebox.is_expired(Utc::now()));
        assert_eq!(timebox.remaining(Utc::now()), Duration::zero());

        let fresh = Timebox::start(25);
        assert!(!fresh.is_expired(Utc::now()));
        assert!(fresh.remaining(Utc::now()) > Duration::minutes(24));
    }

    #[test]
    fn test_cognitive_load_budgets_grow_with_density() {
        assert!(CognitiveLoad::Overwhelmed.word_budget() < CognitiveLoad::Steady.word_budget());
        assert!(CognitiveLoad::Focused.word_budget() < CognitiveLoad::Stretch.word_budget());
    }
}
