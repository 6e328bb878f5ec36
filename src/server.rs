//! HTTP API.
//!
//! A thin JSON front over [`Judge::handle_turn`]. The server holds no
//! conversation state: clients send back the `context` object they
//! received with the previous reply.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Run one turn |
//! | `GET`  | `/health` | Health check (returns version and index size) |
//!
//! # Request / Response
//!
//! ```json
//! { "query": "what is its price?", "history": ["Tell me about Goblin Lackey", "..."],
//!   "smart_mode": false, "context": { "active_cards": ["Goblin Lackey"] } }
//! ```
//!
//! ```json
//! { "response": "...", "intent": "market", "context": { "active_cards": ["Goblin Lackey"], ... } }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! on another port can call the API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{cap_history, Intent, ModelTier};
use crate::orchestrator::{Judge, TurnRequest};
use crate::session::SessionContext;

#[derive(Clone)]
struct AppState {
    judge: Arc<Judge>,
    index_segments: usize,
}

/// Load the judge from `config` and serve until the process is stopped.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let judge = Judge::from_config(config).await?;
    let bind_addr = config.server.bind.clone();

    let app = router(Arc::new(judge));

    tracing::info!(addr = %bind_addr, "judge API listening");
    println!("Judge API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Routes with CORS applied, for embedding or testing.
pub fn router(judge: Arc<Judge>) -> Router {
    let state = AppState {
        index_segments: judge.index_len(),
        judge,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    index_segments: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        index_segments: state.index_segments,
    })
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    history: Vec<String>,
    /// Use the deep model tier.
    #[serde(default)]
    smart_mode: bool,
    #[serde(default)]
    context: Option<SessionContext>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    intent: Intent,
    context: SessionContext,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;

    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let mut history = request.history;
    cap_history(&mut history);

    let turn = state
        .judge
        .handle_turn(TurnRequest {
            query: request.query,
            history,
            model_tier: if request.smart_mode {
                ModelTier::Deep
            } else {
                ModelTier::Fast
            },
            session: request.context,
        })
        .await;

    Ok(Json(ChatResponse {
        response: turn.response_text,
        intent: turn.intent,
        context: turn.session,
    }))
}
