//! HTTP routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::persona::system_prompt;
use crate::upstream::{CompletionBackend, CompletionRequest};
use crate::{MISSING_KEY_REPLY, RelayError, STATIC_REPLY};

pub const CHAT_PATH: &str = "/api/ubba-ai";

/// Shared handler state.
pub struct AppState {
    pub config: RelayConfig,
    pub backend: Arc<dyn CompletionBackend>,
}

impl AppState {
    pub fn new(config: RelayConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { config, backend }
    }
}

type AppStateArc = Arc<AppState>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(CHAT_PATH, post(chat).fallback(method_not_allowed))
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http())
}

async fn chat(
    State(state): State<AppStateArc>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, RelayError> {
    let Some(api_key) = state.config.api_key.clone() else {
        return Err(RelayError::MissingApiKey);
    };

    let Json(request) = body.map_err(|e| RelayError::BadRequest(e.body_text()))?;
    // Blank messages are refused, anything else is forwarded as typed.
    if request.message.trim().is_empty() {
        return Err(RelayError::BadRequest("message is empty".to_string()));
    }
    let len = request.message.chars().count();
    if len > state.config.max_message_len {
        return Err(RelayError::BadRequest(format!(
            "message is {} characters, limit is {}",
            len, state.config.max_message_len
        )));
    }

    info!(chars = len, "Chat message received");
    let reply = state
        .backend
        .complete(CompletionRequest {
            api_key,
            model: state.config.model.clone(),
            system: system_prompt(state.config.persona.as_deref()).to_string(),
            message: request.message,
            temperature: state.config.temperature,
            max_tokens: state.config.max_tokens,
        })
        .await?;

    Ok(Json(ChatResponse { response: reply }))
}

async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "Method not allowed" }),
            ),
            Self::BadRequest(reason) => {
                warn!("Rejected chat request: {}", reason);
                (StatusCode::BAD_REQUEST, json!({ "error": "Invalid request" }))
            }
            Self::MissingApiKey => {
                error!("{} is not set", crate::config::API_KEY_ENV);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "response": MISSING_KEY_REPLY }),
                )
            }
            other => {
                error!("Chat failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "response": STATIC_REPLY }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
