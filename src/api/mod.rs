//! REST side of the chat backend.
//!
//! - [`ChatBackend`]: the interface the widget talks to
//! - [`HttpBackend`]: `reqwest` implementation against a live server
//! - [`MockBackend`]: scripted in-process backend for mock mode and tests
//! - [`types`]: wire records shared with the real-time transport

pub mod client;
pub mod mock;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{MessageRecord, OutgoingMessage, SendReceipt};

pub use client::HttpBackend;
pub use mock::{BackendCall, MockBackend};

/// Operations the widget needs from the chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync + std::fmt::Debug {
    /// `GET /api/chat/history/{user_id}`.
    async fn history_by_path(&self, user_id: &str) -> Result<Vec<MessageRecord>>;

    /// `POST /api/chat/history` with the id in the body.
    async fn history_by_body(&self, user_id: &str) -> Result<Vec<MessageRecord>>;

    /// `POST /api/chat` as multipart form data.
    async fn send_message(&self, message: OutgoingMessage) -> Result<SendReceipt>;
}
