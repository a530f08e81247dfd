//! HTTP server.

pub mod handlers;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::explain::{ExplainService, LlmActor};
use crate::rate_limiter::RateLimiter;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<AppConfig>,
    pub pool: SqlitePool,
    pub explain: ExplainService,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ServerState {
    pub fn new(config: AppConfig, pool: SqlitePool, llm: Arc<dyn LlmActor>) -> Self {
        let explain = ExplainService::new(llm, pool.clone(), &config.model, config.max_input_chars);
        let rate_limiter = RateLimiter::new(config.rate_limit, config.rate_window);
        Self {
            config: Arc::new(config),
            pool,
            explain,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        }

        let mut response = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

pub fn build_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/explain", post(handlers::explain))
        .route("/api/stuck", post(handlers::analyze_stuck))
        .route("/api/session", get(handlers::get_session).put(handlers::update_session))
        .route("/api/session/signal", post(handlers::record_signal))
        .route(
            "/api/session/timebox",
            get(handlers::get_timebox)
                .post(handlers::start_timebox)
                .delete(handlers::clear_timebox),
        )
        .route("/api/errors/analyze", post(handlers::analyze_error))
        .route(
            "/api/errors/history",
            get(handlers::error_history).delete(handlers::clear_error_history),
        )
        .route("/api/graph/extract", post(handlers::extract_graph))
        .route("/api/graphs", get(handlers::list_graphs))
        .route("/api/quiz", post(handlers::create_quiz))
        .route("/api/quiz/grade", post(handlers::grade_quiz))
        .route("/api/traces", get(handlers::list_traces))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), AppError> {
    info!("Server listening on {}", listener.local_addr()?);

    let limiter = Arc::clone(&state.rate_limiter);
    let every = state.config.rate_window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let mut guard = limiter.lock().await;
            guard.prune();
            debug!("Rate limiter tracking {} clients", guard.tracked_clients());
        }
    });

    let app = build_router(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

/// Binds `config.bind_addr` and serves.
pub async fn start(state: ServerState) -> Result<(), AppError> {
    let listener = TcpListener::bind(state.config.bind_addr).await?;
    serve(listener, state).await
}
