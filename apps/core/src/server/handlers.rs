//! HTTP handlers.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::ServerState;
use crate::brain::concepts::extract_concepts_from_text;
use crate::brain::quiz::{self, Quiz, QuizGrade};
use crate::brain::stack_parser::parse_error_stack;
use crate::brain::stuck::{StuckAnalysis, StuckDetector};
use crate::error::AppError;
use crate::explain::{ExplainRequest, Trace};
use crate::models::{
    CognitiveLoad, ErrorAnalysis, ExplainMode, InteractionSignal, KnowledgeGraph, Perspective, Timebox,
};
use crate::session::{self, LearningSession};
use crate::storage::{self, keys};

const BODY_BUFFER: usize = 32;
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// --- Explain ---

/// Streams the raw markdown answer.
///
/// The response is only committed once the first chunk exists, so an upstream failure
/// before any output still becomes a proper error status.
pub async fn explain(
    State(state): State<ServerState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ExplainRequest>,
) -> Result<Response, AppError> {
    {
        let client = addr.ip().to_string();
        let mut limiter = state.rate_limiter.lock().await;
        if !limiter.check(&client) {
            let wait = limiter.retry_after(&client);
            // Whole seconds, rounded up
            let retry_after_secs = (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1);
            return Err(AppError::RateLimited { retry_after_secs });
        }
    }

    let prepared = state.explain.prepare(request).await?;

    let (tx, mut rx) = mpsc::channel::<String>(BODY_BUFFER);
    let service = state.explain.clone();
    let task = tokio::spawn(async move {
        let result = service.run(prepared, tx).await;
        if let Err(e) = &result {
            warn!("Explanation ended with an error: {}", e);
        }
        result
    });

    let Some(first) = rx.recv().await else {
        // Nothing was produced: the task has finished, its result decides the status.
        return match task.await {
            Ok(Ok(_)) => Ok(([(CONTENT_TYPE, TEXT_PLAIN)], Body::empty()).into_response()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(AppError::Internal(format!("Explain task failed: {}", e))),
        };
    };

    let body = futures::stream::once(async move { first })
        .chain(ReceiverStream::new(rx))
        .map(Ok::<_, Infallible>);

    Ok(([(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(body)).into_response())
}

// --- Stuck detection ---

/// Fail-soft: any body, even invalid JSON, yields an analysis.
pub async fn analyze_stuck(body: Bytes) -> Json<StuckAnalysis> {
    let payload: Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!("Stuck payload is not JSON ({}), scoring as empty", e);
        Value::Null
    });
    let field = |name: &str| payload.get(name).cloned().unwrap_or(Value::Null);

    Json(StuckDetector::new().analyze_raw(
        &field("signals"),
        &field("cognitiveLoadHistory"),
        &field("questionHistory"),
    ))
}

// --- Learning session ---

pub async fn get_session(State(state): State<ServerState>) -> Json<LearningSession> {
    Json(session::load_session(&state.pool).await)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub mode: Option<ExplainMode>,
    pub cognitive_load: Option<CognitiveLoad>,
    pub perspective: Option<Perspective>,
    pub future_you: Option<bool>,
}

pub async fn update_session(
    State(state): State<ServerState>,
    Json(update): Json<SessionUpdate>,
) -> Result<Json<LearningSession>, AppError> {
    let mut current = session::load_session(&state.pool).await;
    if let Some(mode) = update.mode {
        current.set_mode(mode);
    }
    if let Some(load) = update.cognitive_load {
        current.select_cognitive_load(load);
    }
    if let Some(perspective) = update.perspective {
        current.set_perspective(perspective);
    }
    if let Some(future_you) = update.future_you {
        current.set_future_you(future_you);
    }
    session::save_session(&state.pool, &current).await?;
    Ok(Json(current))
}

/// Records a signal and returns the fresh stuck analysis.
pub async fn record_signal(
    State(state): State<ServerState>,
    Json(mut signal): Json<InteractionSignal>,
) -> Result<Json<StuckAnalysis>, AppError> {
    if signal.timestamp.is_none() {
        signal.timestamp = Some(Utc::now());
    }

    let mut current = session::load_session(&state.pool).await;
    current.record_signal(signal);
    let analysis = current.evaluate_stuck();
    session::save_session(&state.pool, &current).await?;
    Ok(Json(analysis))
}

#[derive(Debug, Deserialize)]
pub struct TimeboxRequest {
    pub minutes: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeboxStatus {
    pub timebox: Timebox,
    pub remaining_seconds: i64,
    pub expired: bool,
}

impl TimeboxStatus {
    fn of(timebox: Timebox) -> Self {
        let now = Utc::now();
        Self {
            remaining_seconds: timebox.remaining(now).num_seconds(),
            expired: timebox.is_expired(now),
            timebox,
        }
    }
}

pub async fn get_timebox(State(state): State<ServerState>) -> Json<Option<TimeboxStatus>> {
    Json(session::current_timebox(&state.pool).await.map(TimeboxStatus::of))
}

pub async fn start_timebox(
    State(state): State<ServerState>,
    Json(request): Json<TimeboxRequest>,
) -> Result<Json<TimeboxStatus>, AppError> {
    let timebox = session::start_timebox(&state.pool, request.minutes).await?;
    Ok(Json(TimeboxStatus::of(timebox)))
}

pub async fn clear_timebox(State(state): State<ServerState>) -> Result<Json<Value>, AppError> {
    let cleared = session::clear_timebox(&state.pool).await?;
    Ok(Json(json!({ "cleared": cleared })))
}

// --- Error debugger ---

#[derive(Debug, Deserialize)]
pub struct AnalyzeErrorRequest {
    pub stack: String,
}

pub async fn analyze_error(
    State(state): State<ServerState>,
    Json(request): Json<AnalyzeErrorRequest>,
) -> Result<Json<ErrorAnalysis>, AppError> {
    if request.stack.trim().is_empty() {
        return Err(AppError::Validation("stack must not be empty".to_string()));
    }
    let analysis = parse_error_stack(&request.stack);
    storage::push_capped(
        &state.pool,
        keys::ERROR_HISTORY,
        analysis.clone(),
        keys::MAX_ERROR_HISTORY,
    )
    .await?;
    Ok(Json(analysis))
}

pub async fn error_history(State(state): State<ServerState>) -> Json<Vec<ErrorAnalysis>> {
    Json(storage::load_or_default(&state.pool, keys::ERROR_HISTORY).await)
}

pub async fn clear_error_history(State(state): State<ServerState>) -> Result<Json<Value>, AppError> {
    let cleared = storage::remove_item(&state.pool, keys::ERROR_HISTORY).await?;
    Ok(Json(json!({ "cleared": cleared })))
}

// --- Knowledge graphs ---

#[derive(Debug, Deserialize)]
pub struct ExtractGraphRequest {
    pub text: String,
    #[serde(default)]
    pub query: String,
    /// Stores the graph in the history unless set to false.
    #[serde(default = "default_true")]
    pub save: bool,
}

fn default_true() -> bool {
    true
}

pub async fn extract_graph(
    State(state): State<ServerState>,
    Json(request): Json<ExtractGraphRequest>,
) -> Result<Json<KnowledgeGraph>, AppError> {
    let graph = extract_concepts_from_text(&request.text, &request.query);
    if request.save && !graph.nodes.is_empty() {
        storage::push_capped(
            &state.pool,
            keys::KNOWLEDGE_GRAPHS,
            graph.clone(),
            keys::MAX_KNOWLEDGE_GRAPHS,
        )
        .await?;
    }
    Ok(Json(graph))
}

pub async fn list_graphs(State(state): State<ServerState>) -> Json<Vec<KnowledgeGraph>> {
    Json(storage::load_or_default(&state.pool, keys::KNOWLEDGE_GRAPHS).await)
}

// --- Quiz ---

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub answer: String,
}

pub async fn create_quiz(Json(request): Json<CreateQuizRequest>) -> Json<Quiz> {
    Json(quiz::build_quiz(&request.answer))
}

#[derive(Debug, Deserialize)]
pub struct GradeQuizRequest {
    pub quiz: Quiz,
    pub responses: Vec<String>,
    /// When set, the score is recorded as mastery of this topic.
    #[serde(default)]
    pub topic: Option<String>,
}

pub async fn grade_quiz(
    State(state): State<ServerState>,
    Json(request): Json<GradeQuizRequest>,
) -> Result<Json<QuizGrade>, AppError> {
    let grade = quiz::grade_quiz(&request.quiz, &request.responses)?;

    if let Some(topic) = request.topic.as_deref().filter(|t| !t.trim().is_empty()) {
        let mut current = session::load_session(&state.pool).await;
        current.record_mastery(topic, grade.score);
        session::save_session(&state.pool, &current).await?;
    }

    Ok(Json(grade))
}

// --- Traces ---

pub async fn list_traces(State(state): State<ServerState>) -> Json<Vec<Trace>> {
    Json(storage::load_or_default(&state.pool, keys::TRACES).await)
}
