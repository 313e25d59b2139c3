//! Chat-completions backends.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::RelayConfig;

/// Why an upstream call produced no reply.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream reply had no message")]
    Empty,
}

/// One player message to answer in character.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub api_key: String,
    pub model: String,
    pub system: String,
    pub message: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait CompletionBackend: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>>;
}

// ============================================================================
// OpenAI-compatible Backend
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Posts to a `/v1/chat/completions` endpoint with bearer auth.
pub struct OpenAiBackend {
    http_client: Client,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(config: &RelayConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn send(&self, request: CompletionRequest) -> Result<String, UpstreamError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.message,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "Upstream responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        first_reply(reply).ok_or(UpstreamError::Empty)
    }
}

fn first_reply(reply: ChatResponse) -> Option<String> {
    reply.choices.into_iter().next()?.message?.content
}

impl CompletionBackend for OpenAiBackend {
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, UpstreamError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }
}
