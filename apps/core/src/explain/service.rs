use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use super::guardrails::apply_guardrails;
use super::messages::ChatMessage;
use super::prompts::{build_system_prompt, PromptOptions};
use super::trace::{Trace, TraceStatus};
use super::traits::LlmActor;
use crate::brain::concepts::extract_concepts_from_text;
use crate::brain::intent::IntentClassifier;
use crate::error::AppError;
use crate::models::{CognitiveLoad, ExplainMode, KnowledgeGraph, Perspective};
use crate::session::{load_session, save_session};
use crate::storage::{self, keys};

/// Appended to the output when the upstream stream breaks after text was sent.
pub const INTERRUPTION_MARKER: &str =
    "\n\n---\n_The explanation was interrupted. Please try again._\n";

const CHUNK_BUFFER: usize = 32;

/// Body of `POST /api/explain`. Only `input` and `mode` are required; the rest default
/// to the stored learning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainRequest {
    pub input: String,
    #[serde(default)]
    pub mode: ExplainMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognitive_load: Option<CognitiveLoad>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Perspective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_you: Option<bool>,
}

impl ExplainRequest {
    pub fn new(input: impl Into<String>, mode: ExplainMode) -> Self {
        Self {
            input: input.into(),
            mode,
            cognitive_load: None,
            perspective: None,
            future_you: None,
        }
    }
}

/// A request that passed the guardrails and is ready to be streamed.
#[derive(Debug)]
pub struct PreparedExplain {
    pub input: String,
    pub messages: Vec<ChatMessage>,
    pub trace: Trace,
    started: Instant,
}

/// Runs explanations: guardrails, prompt, streaming and the bookkeeping afterwards.
#[derive(Clone)]
pub struct ExplainService {
    llm: Arc<dyn LlmActor>,
    pool: SqlitePool,
    classifier: Arc<IntentClassifier>,
    model: String,
    max_input_chars: usize,
}

impl ExplainService {
    pub fn new(llm: Arc<dyn LlmActor>, pool: SqlitePool, model: &str, max_input_chars: usize) -> Self {
        Self {
            llm,
            pool,
            classifier: Arc::new(IntentClassifier::new()),
            model: model.to_string(),
            max_input_chars,
        }
    }

    /// Validates the request and builds the prompt. Fails only on unusable input.
    pub async fn prepare(&self, request: ExplainRequest) -> Result<PreparedExplain, AppError> {
        let started = Instant::now();
        let (input, guardrails) = apply_guardrails(&request.input, self.max_input_chars)?;

        let session = load_session(&self.pool).await;
        let options = PromptOptions {
            mode: request.mode,
            cognitive_load: request.cognitive_load.unwrap_or(session.cognitive_load),
            perspective: request.perspective.unwrap_or(session.perspective),
            future_you: request.future_you.unwrap_or(session.future_you),
        };

        let intent = self.classifier.classify(&input);
        let trace = Trace::start(&input, request.mode, intent, guardrails, &self.model);

        let messages = vec![
            ChatMessage::system(build_system_prompt(&options)),
            ChatMessage::user(input.clone()),
        ];

        Ok(PreparedExplain {
            input,
            messages,
            trace,
            started,
        })
    }

    /// Streams the answer to `out`, chunk by chunk and unmodified.
    ///
    /// Returns the finished trace. An error means the upstream failed; if some text had
    /// already been sent, [`INTERRUPTION_MARKER`] was sent after it.
    #[instrument(skip(self, prepared, out), fields(trace_id = %prepared.trace.id))]
    pub async fn run(&self, prepared: PreparedExplain, out: mpsc::Sender<String>) -> Result<Trace, AppError> {
        let PreparedExplain {
            input,
            messages,
            mut trace,
            started,
        } = prepared;

        let (chunk_tx, mut chunk_rx) = mpsc::channel(CHUNK_BUFFER);
        let llm = Arc::clone(&self.llm);
        let upstream = tokio::spawn(async move { llm.stream(messages, chunk_tx).await });

        let mut answer = String::new();
        let mut client_gone = false;
        while let Some(chunk) = chunk_rx.recv().await {
            answer.push_str(&chunk);
            if out.send(chunk).await.is_err() {
                client_gone = true;
                break;
            }
        }
        // Makes the upstream stop at its next send
        drop(chunk_rx);

        let outcome = match upstream.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Internal(format!("LLM task failed: {}", e))),
        };

        match outcome {
            Ok(()) if client_gone => {
                warn!("Client disconnected after {} chars", answer.chars().count());
                trace.finish(
                    TraceStatus::Interrupted,
                    &answer,
                    started.elapsed(),
                    Some("client disconnected".to_string()),
                );
            }
            Ok(()) => {
                trace.finish(TraceStatus::Completed, &answer, started.elapsed(), None);
                self.record_answer(&input, &answer).await;
            }
            Err(e) => {
                let status = if answer.is_empty() {
                    TraceStatus::Failed
                } else {
                    let _ = out.send(INTERRUPTION_MARKER.to_string()).await;
                    TraceStatus::Interrupted
                };
                trace.finish(status, &answer, started.elapsed(), Some(e.to_string()));
                self.store_trace(&trace).await;
                return Err(e);
            }
        }

        self.store_trace(&trace).await;
        info!(
            "Explanation {:?} ({} chars, {} ms)",
            trace.status, trace.output_chars, trace.duration_ms
        );
        Ok(trace)
    }

    /// [`prepare`](Self::prepare) followed by [`run`](Self::run).
    pub async fn stream_explain(
        &self,
        request: ExplainRequest,
        out: mpsc::Sender<String>,
    ) -> Result<Trace, AppError> {
        let prepared = self.prepare(request).await?;
        self.run(prepared, out).await
    }

    /// Bookkeeping after a complete answer. The learner already has the text, so failures
    /// are logged rather than returned.
    async fn record_answer(&self, input: &str, answer: &str) {
        let mut session = load_session(&self.pool).await;
        session.record_question(input);
        if let Err(e) = save_session(&self.pool, &session).await {
            error!("Failed to record question in session: {}", e);
        }

        let graph = extract_concepts_from_text(answer, input);
        if graph.nodes.is_empty() {
            return;
        }
        if let Err(e) = storage::push_capped::<KnowledgeGraph>(
            &self.pool,
            keys::KNOWLEDGE_GRAPHS,
            graph,
            keys::MAX_KNOWLEDGE_GRAPHS,
        )
        .await
        {
            error!("Failed to store knowledge graph: {}", e);
        }
    }

    async fn store_trace(&self, trace: &Trace) {
        if let Err(e) =
            storage::push_capped(&self.pool, keys::TRACES, trace.clone(), keys::MAX_TRACES).await
        {
            error!("Failed to store trace {}: {}", trace.id, e);
        }
    }
}
