//! Traces: how an answer was produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::guardrails::Guardrail;
use crate::brain::intent::IntentResult;
use crate::models::ExplainMode;

const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Streaming,
    Completed,
    /// Output had started when the stream broke off.
    Interrupted,
    /// Nothing was produced.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: String,
    pub input_preview: String,
    pub mode: ExplainMode,
    pub intent: IntentResult,
    pub guardrails: Vec<Guardrail>,
    pub model: String,
    pub status: TraceStatus,
    pub output_chars: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trace {
    pub fn start(
        input: &str,
        mode: ExplainMode,
        intent: IntentResult,
        guardrails: Vec<Guardrail>,
        model: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            input_preview: preview(input),
            mode,
            intent,
            guardrails,
            model: model.to_string(),
            status: TraceStatus::Streaming,
            output_chars: 0,
            duration_ms: 0,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Records the outcome. `error` is kept only for unsuccessful runs.
    pub fn finish(&mut self, status: TraceStatus, output: &str, elapsed: Duration, error: Option<String>) {
        self.status = status;
        self.output_chars = output.chars().count();
        self.duration_ms = elapsed.as_millis() as u64;
        self.error = if status == TraceStatus::Completed { None } else { error };
    }
}

fn preview(input: &str) -> String {
    let mut chars = input.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
