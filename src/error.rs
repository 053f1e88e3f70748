//! Error types for the chat client.

use thiserror::Error;

/// Chat client error type.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend returned a non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// Reading an attachment or stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket layer failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The real-time transport is not available.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Peer sent something the Socket.IO codec does not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for chat client operations.
pub type Result<T> = std::result::Result<T, Error>;
