//! Scripted in-process backend.
//!
//! Used by mock mode (running the widget with no server) and by tests that
//! need to control which history endpoint succeeds and what a send returns.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::ChatBackend;
use super::types::{MessageRecord, OutgoingMessage, SendReceipt};
use crate::error::{Error, Result};

/// Reply the mock backend gives to every send unless told otherwise.
const DEFAULT_BOT_REPLY: &str =
    "Thanks for reaching out! A member of our support team will be with you shortly.";

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    HistoryByPath(String),
    HistoryByBody(String),
    Send {
        user_id: String,
        text: String,
        file_name: Option<String>,
    },
}

#[derive(Debug)]
struct Script {
    /// `None` makes the endpoint answer 404.
    primary: Option<Vec<MessageRecord>>,
    secondary: Option<Vec<MessageRecord>>,
    /// `None` makes sends answer 500.
    receipt: Option<SendReceipt>,
    calls: Vec<BackendCall>,
}

/// Backend whose responses are set up in advance.
#[derive(Debug)]
pub struct MockBackend {
    script: Mutex<Script>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Empty history on both endpoints and a canned bot reply.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                primary: Some(Vec::new()),
                secondary: Some(Vec::new()),
                receipt: Some(SendReceipt {
                    bot_response: Some(DEFAULT_BOT_REPLY.to_string()),
                    file_data: None,
                }),
                calls: Vec::new(),
            }),
        }
    }

    /// Serve `records` from the primary (GET) history endpoint.
    #[must_use]
    pub fn with_primary_history(self, records: Vec<MessageRecord>) -> Self {
        self.lock().primary = Some(records);
        self
    }

    /// Make the primary history endpoint fail.
    #[must_use]
    pub fn failing_primary(self) -> Self {
        self.lock().primary = None;
        self
    }

    /// Serve `records` from the fallback (POST) history endpoint.
    #[must_use]
    pub fn with_secondary_history(self, records: Vec<MessageRecord>) -> Self {
        self.lock().secondary = Some(records);
        self
    }

    /// Make the fallback history endpoint fail.
    #[must_use]
    pub fn failing_secondary(self) -> Self {
        self.lock().secondary = None;
        self
    }

    /// Answer sends with `receipt`.
    #[must_use]
    pub fn with_receipt(self, receipt: SendReceipt) -> Self {
        self.lock().receipt = Some(receipt);
        self
    }

    /// Make sends fail.
    #[must_use]
    pub fn failing_send(self) -> Self {
        self.lock().receipt = None;
        self
    }

    /// Change the send behavior after construction.
    pub fn set_receipt(&self, receipt: Option<SendReceipt>) {
        self.lock().receipt = receipt;
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found() -> Error {
    Error::Api {
        status: 404,
        message: "Not Found".to_string(),
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn history_by_path(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        let mut script = self.lock();
        script.calls.push(BackendCall::HistoryByPath(user_id.to_string()));
        script.primary.clone().ok_or_else(not_found)
    }

    async fn history_by_body(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        let mut script = self.lock();
        script.calls.push(BackendCall::HistoryByBody(user_id.to_string()));
        script.secondary.clone().ok_or_else(not_found)
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<SendReceipt> {
        let mut script = self.lock();
        script.calls.push(BackendCall::Send {
            user_id: message.user_id,
            text: message.text,
            file_name: message.file.map(|f| f.name().to_string()),
        });
        script.receipt.clone().ok_or_else(|| Error::Api {
            status: 500,
            message: "Internal Server Error".to_string(),
        })
    }
}
