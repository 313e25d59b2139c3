//! UBBA Chat Relay
//!
//! A single HTTP endpoint that lets players talk to UBBA. Each message is
//! forwarded to an OpenAI-compatible chat-completions endpoint together with
//! UBBA's persona; the reply comes back verbatim.
//!
//! Failures never leak upstream detail: callers only ever see one of two
//! fixed in-character strings.

#![deny(unsafe_code)]

pub mod config;
pub mod persona;
pub mod routes;
pub mod upstream;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use config::RelayConfig;
pub use routes::{AppState, router};
pub use upstream::{CompletionBackend, CompletionRequest, OpenAiBackend, UpstreamError};

/// Shown when no upstream credential is configured.
pub const MISSING_KEY_REPLY: &str = "SYSTEM ERROR: API KEY NOT CONFIGURED";

/// Shown when the upstream call fails for any reason.
pub const STATIC_REPLY: &str = "THE STATIC INTERFERES... TRY AGAIN";

/// Relay errors, from startup and from request handling.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid relay config: {0}")]
    InvalidConfig(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}
