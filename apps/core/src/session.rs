//! Learning session state.
//!
//! The session is one JSON record holding the learner's preferences and a bounded history
//! of what they did. All mutations are plain methods; persistence is a separate step so
//! handlers can apply several changes and save once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::brain::stuck::{StuckAnalysis, StuckDetector};
use crate::error::AppError;
use crate::models::{CognitiveLoad, ExplainMode, InteractionSignal, MasteryRecord, Perspective, Timebox};
use crate::storage::{self, keys};

pub const MAX_MASTERY: usize = 50;
pub const MAX_SIGNALS: usize = 50;
pub const MAX_QUESTIONS: usize = 20;
pub const MAX_LOADS: usize = 20;

const MAX_TIMEBOX_MINUTES: u32 = 240;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningSession {
    pub mode: ExplainMode,
    pub cognitive_load: CognitiveLoad,
    pub perspective: Perspective,
    pub future_you: bool,
    pub mastery_history: Vec<MasteryRecord>,
    pub signals: Vec<InteractionSignal>,
    pub question_history: Vec<String>,
    pub load_history: Vec<CognitiveLoad>,
    pub stuck_score: u8,
    pub updated_at: DateTime<Utc>,
}

impl Default for LearningSession {
    fn default() -> Self {
        Self {
            mode: ExplainMode::default(),
            cognitive_load: CognitiveLoad::default(),
            perspective: Perspective::default(),
            future_you: false,
            mastery_history: Vec::new(),
            signals: Vec::new(),
            question_history: Vec::new(),
            load_history: Vec::new(),
            stuck_score: 0,
            updated_at: Utc::now(),
        }
    }
}

fn push_bounded<T>(items: &mut Vec<T>, item: T, max: usize) {
    items.push(item);
    if items.len() > max {
        let overflow = items.len() - max;
        items.drain(..overflow);
    }
}

impl LearningSession {
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn set_mode(&mut self, mode: ExplainMode) {
        self.mode = mode;
        self.touch();
    }

    pub fn set_perspective(&mut self, perspective: Perspective) {
        self.perspective = perspective;
        self.touch();
    }

    pub fn set_future_you(&mut self, enabled: bool) {
        self.future_you = enabled;
        self.touch();
    }

    /// Switches the active preset and remembers the choice for stuck detection.
    pub fn select_cognitive_load(&mut self, load: CognitiveLoad) {
        self.cognitive_load = load;
        push_bounded(&mut self.load_history, load, MAX_LOADS);
        self.touch();
    }

    pub fn record_signal(&mut self, signal: InteractionSignal) {
        push_bounded(&mut self.signals, signal, MAX_SIGNALS);
        self.touch();
    }

    /// Blank questions are ignored.
    pub fn record_question(&mut self, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            return;
        }
        push_bounded(&mut self.question_history, question.to_string(), MAX_QUESTIONS);
        self.touch();
    }

    /// Scores above 100 are clamped.
    pub fn record_mastery(&mut self, topic: &str, score: u8) {
        let record = MasteryRecord {
            topic: topic.trim().to_string(),
            score: score.min(100),
            recorded_at: Utc::now(),
        };
        push_bounded(&mut self.mastery_history, record, MAX_MASTERY);
        self.touch();
    }

    /// Latest mastery score recorded for `topic`, matched case-insensitively.
    pub fn mastery_for(&self, topic: &str) -> Option<u8> {
        let topic = topic.trim().to_lowercase();
        self.mastery_history
            .iter()
            .rev()
            .find(|m| m.topic.to_lowercase() == topic)
            .map(|m| m.score)
    }

    /// Runs stuck detection over the session history and stores the score.
    pub fn evaluate_stuck(&mut self) -> StuckAnalysis {
        let analysis =
            StuckDetector::new().analyze(&self.signals, &self.load_history, &self.question_history);
        self.stuck_score = analysis.score;
        self.touch();
        analysis
    }
}

/// Loads the stored session, or a fresh one when none is stored or it cannot be read.
pub async fn load_session(pool: &SqlitePool) -> LearningSession {
    storage::load_or_default(pool, keys::LEARNING_SESSION).await
}

pub async fn save_session(pool: &SqlitePool, session: &LearningSession) -> Result<(), AppError> {
    debug!("Saving learning session (mode: {}, stuck: {})", session.mode, session.stuck_score);
    storage::set_item(pool, keys::LEARNING_SESSION, session).await
}

/// Starts (or restarts) the study timebox.
pub async fn start_timebox(pool: &SqlitePool, minutes: u32) -> Result<Timebox, AppError> {
    if minutes == 0 || minutes > MAX_TIMEBOX_MINUTES {
        return Err(AppError::Validation(format!(
            "timebox must be between 1 and {} minutes",
            MAX_TIMEBOX_MINUTES
        )));
    }
    let timebox = Timebox::start(minutes);
    storage::set_item(pool, keys::TIMEBOX, &timebox).await?;
    Ok(timebox)
}

pub async fn current_timebox(pool: &SqlitePool) -> Option<Timebox> {
    storage::load_or_default::<Option<Timebox>>(pool, keys::TIMEBOX).await
}

pub async fn clear_timebox(pool: &SqlitePool) -> Result<bool, AppError> {
    storage::remove_item(pool, keys::TIMEBOX).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, SignalKind};

    #[test]
    fn test_histories_are_bounded() {
        let mut session = LearningSession::default();
        for i in 0..(MAX_QUESTIONS + 5) {
            session.record_question(&format!("question {}", i));
        }
        assert_eq!(session.question_history.len(), MAX_QUESTIONS);
        assert_eq!(session.question_history[0], "question 5");

        for _ in 0..(MAX_SIGNALS + 1) {
            session.record_signal(InteractionSignal::new(SignalKind::Reread, Severity::Low));
        }
        assert_eq!(session.signals.len(), MAX_SIGNALS);
    }

    #[test]
    fn test_blank_question_ignored() {
        let mut session = LearningSession::default();
        session.record_question("   ");
        assert!(session.question_history.is_empty());
    }

    #[test]
    fn test_select_cognitive_load_tracks_history() {
        let mut session = LearningSession::default();
        session.select_cognitive_load(CognitiveLoad::Overwhelmed);
        session.select_cognitive_load(CognitiveLoad::Focused);
        assert_eq!(session.cognitive_load, CognitiveLoad::Focused);
        assert_eq!(session.load_history, vec![CognitiveLoad::Overwhelmed, CognitiveLoad::Focused]);
    }

    #[test]
    fn test_mastery_latest_wins() {
        let mut session = LearningSession::default();
        session.record_mastery("Closures", 40);
        session.record_mastery("closures", 80);
        assert_eq!(session.mastery_for("CLOSURES"), Some(80));
        assert_eq!(session.mastery_for("recursion"), None);
    }

    #[test]
    fn test_evaluate_stuck_stores_score() {
        let mut session = LearningSession::default();
        for _ in 0..3 {
            session.record_signal(InteractionSignal::new(SignalKind::WrongAnswer, Severity::High));
        }
        let analysis = session.evaluate_stuck();
        assert_eq!(analysis.score, 60);
        assert!(analysis.is_stuck);
        assert_eq!(session.stuck_score, 60);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let session: LearningSession = serde_json::from_str(r#"{"mode":"Pro"}"#).unwrap();
        assert_eq!(session.mode, ExplainMode::Pro);
        assert_eq!(session.cognitive_load, CognitiveLoad::Steady);
        assert!(session.signals.is_empty());
    }
}
