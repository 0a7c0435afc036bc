use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use banter_core::{ChatTurn, Completion, CompletionClient, HistoryReply, RelayReply, RelayRequest};
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::history::SessionHistory;
use crate::rate_limit::{self, RateLimiter};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<dyn Completion>,
    pub default_model: String,
    pub history: Arc<SessionHistory>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(completion: Arc<dyn Completion>, default_model: &str) -> Self {
        Self {
            completion,
            default_model: default_model.to_string(),
            history: Arc::new(SessionHistory::new(256, 200)),
            limiter: Arc::new(RateLimiter::new(100, Duration::from_secs(15 * 60))),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let client = CompletionClient::new(&config.api_url, &config.api_key);
        Self::new(Arc::new(client), &config.default_model)
            .with_rate_limit(config.rate_limit_max, config.rate_limit_window)
            .with_history_limits(config.history_max_sessions, config.history_max_messages)
    }

    pub fn with_rate_limit(mut self, max: u32, window: Duration) -> Self {
        self.limiter = Arc::new(RateLimiter::new(max, window));
        self
    }

    pub fn with_history_limits(mut self, max_sessions: usize, max_messages: usize) -> Self {
        self.history = Arc::new(SessionHistory::new(max_sessions, max_messages));
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ai-chat", post(chat))
        .route("/ai/chat", post(chat).get(history))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Json<RelayReply>, RelayError> {
    let Json(request) = body.map_err(|rejection| {
        warn!("[relay] rejected request body: {}", rejection.body_text());
        RelayError::from(rejection)
    })?;
    if request.prompt.trim().is_empty() {
        return Err(RelayError::EmptyPrompt);
    }

    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model.clone());

    let mut messages = request.history.unwrap_or_default();
    messages.push(ChatTurn::user(&request.prompt));

    info!("[relay] chat model={} messages={}", model, messages.len());

    let message = state
        .completion
        .complete(&model, &messages)
        .await
        .map_err(|e| {
            error!("[relay] error communicating with completion API: {e:#}");
            RelayError::Upstream(e)
        })?;

    if let Some(session_id) = request.session_id.as_deref() {
        state.history.record(session_id, &message);
    }

    Ok(Json(RelayReply { message }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    session_id: Option<String>,
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryReply> {
    let messages = query
        .session_id
        .map(|id| state.history.messages(&id))
        .unwrap_or_default();
    Json(HistoryReply { messages })
}

async fn health() -> &'static str {
    "ok"
}
