//! Error types for the assistant domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.
//!
//! Retrieval has no error type: failures there degrade to sentinel text
//! that is injected into the prompt instead of aborting the request.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Memory service request failed: {0}")]
    Request(String),

    #[error("Memory service returned errno {errno}: {message}")]
    Service { errno: i64, message: String },

    #[error("Unexpected memory service response: {0}")]
    InvalidResponse(String),

    #[error("Memory service not configured: {0}")]
    NotConfigured(String),

    #[error("Memory write task aborted: {0}")]
    TaskAborted(String),
}

/// Errors raised before a chat stream is opened.
///
/// Once streaming has begun, failures are reported in-band as an
/// `error` event instead.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("消息不能为空")]
    EmptyMessage,

    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl ChatError {
    /// Whether the caller is at fault (maps to HTTP 4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyMessage)
    }
}
