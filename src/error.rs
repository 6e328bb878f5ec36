//! Typed failures at the component seams.
//!
//! Command plumbing uses `anyhow`; the orchestrator needs to tell failure
//! kinds apart (skip a card, degrade an answer, rewrite a rate limit), so
//! the seams return these enums instead.

use thiserror::Error;

/// Failure to load the vector index. Fatal at startup.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("vector index is corrupt: {0}")]
    Corrupt(String),
}

/// Failure talking to the card catalog or a price source.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("catalog request failed: {0}")]
    Transport(String),

    #[error("unexpected catalog response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Failure from the completion provider.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion response had no content")]
    Empty,

    #[error("API key not set: {0}")]
    MissingApiKey(String),
}

impl CompletionError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::RateLimited(_))
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Transport(err.to_string())
    }
}
