//! HTTP client for the chat backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

use super::ChatBackend;
use super::types::{HistoryRequest, MessageRecord, OutgoingMessage, SendReceipt, decode_history};
use crate::error::{Error, Result};

/// REST client for the chat backend.
///
/// # Example
///
/// ```rust,no_run
/// use support_chat::api::{ChatBackend, HttpBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = HttpBackend::new("http://localhost:5000")?;
/// let history = backend.history_by_path("user-42").await?;
/// println!("{} messages", history.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The backend base URL (e.g., "http://localhost:5000")
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client whose requests time out after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a new client with a custom reqwest client.
    pub fn with_client(base_url: impl AsRef<str>, http: reqwest::Client) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref().trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "backend URL cannot be used as a base: {base_url}"
            )));
        }
        Ok(Self { base_url, http })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(Error::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    fn build_form(message: OutgoingMessage) -> Result<Form> {
        let mut form = Form::new()
            .text("userId", message.user_id)
            .text("message", message.text);
        if let Some(file) = message.file {
            let part = Part::bytes(file.bytes().to_vec())
                .file_name(file.name().to_string())
                .mime_str(file.mime_type())?;
            form = form.part("file", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn history_by_path(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        let response = self
            .http
            .get(self.endpoint(&["api", "chat", "history", user_id]))
            .send()
            .await?;
        let body: Value = Self::handle_response(response).await?;
        Ok(decode_history(body))
    }

    async fn history_by_body(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        let response = self
            .http
            .post(self.endpoint(&["api", "chat", "history"]))
            .json(&HistoryRequest { user_id })
            .send()
            .await?;
        let body: Value = Self::handle_response(response).await?;
        Ok(decode_history(body))
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<SendReceipt> {
        let form = Self::build_form(message)?;
        let response = self
            .http
            .post(self.endpoint(&["api", "chat"]))
            .multipart(form)
            .send()
            .await?;
        Self::handle_response(response).await
    }
}
