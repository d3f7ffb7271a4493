//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lumen_watch::WatchError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Blocking task panicked or was cancelled.
    #[error("Request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Response could not be assembled.
    #[error("Invalid response: {0}")]
    Http(#[from] axum::http::Error),

    /// Listener failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watcher setup failure.
    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
