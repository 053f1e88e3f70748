//! The chat widget: conversation state plus the send and event paths.
//!
//! A widget owns the displayed [`MessageLog`] and is driven from a single
//! task: the caller feeds it real-time events from the [`Subscription`]
//! returned by [`ChatWidget::mount`] and user actions (typing, attaching,
//! sending). Backend and transport are injected so either can be faked.
//!
//! History loads and REST sends come in two halves. The `begin_*` call flips
//! the indicator and hands back a request that runs without borrowing the
//! widget; the matching `finish_*` call applies the result and clears the
//! indicator. [`ChatWidget::load_history`] and [`ChatWidget::send`] run both
//! halves back to back.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::attachment::{AttachmentSelection, PendingFile};
use super::clock::{Clock, SystemClock};
use super::history;
use super::log::{BOT_ECHO_WINDOW, Ingested, MessageLog, USER_ECHO_WINDOW};
use super::message::{FileAttachment, Message, SenderType};
use crate::api::ChatBackend;
use crate::api::types::{OutgoingMessage, SendReceipt};
use crate::error::Result;
use crate::realtime::{ClientEvent, RealtimeTransport, ServerEvent, Subscription};
use crate::session::SessionContext;

/// What a call to [`ChatWidget::send`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing to send.
    Skipped,
    /// Pushed over the real-time channel; the server echo will add it.
    Realtime,
    /// Submitted over REST; reports which provisional entries were added.
    Rest {
        user_appended: bool,
        bot_appended: bool,
    },
    /// REST submit failed; input and attachment are untouched.
    Failed,
}

/// What [`ChatWidget::begin_send`] left to do.
#[derive(Debug)]
pub enum SendStep {
    /// The send is over.
    Done(SendOutcome),
    /// A REST submit is pending; run it and pass the result to
    /// [`ChatWidget::finish_send`].
    Submit(RestSubmit),
}

/// A REST submit started by [`ChatWidget::begin_send`].
#[derive(Debug)]
pub struct RestSubmit {
    backend: Arc<dyn ChatBackend>,
    message: OutgoingMessage,
    username: String,
}

impl RestSubmit {
    /// Post the message to the backend.
    pub async fn submit(self) -> RestSubmitted {
        let result = self.backend.send_message(self.message.clone()).await;
        RestSubmitted {
            message: self.message,
            username: self.username,
            result,
        }
    }
}

/// A finished REST submit, ready for [`ChatWidget::finish_send`].
#[derive(Debug)]
pub struct RestSubmitted {
    message: OutgoingMessage,
    username: String,
    result: Result<SendReceipt>,
}

/// A history fetch started by [`ChatWidget::begin_history_load`].
#[derive(Debug)]
pub struct HistoryLoad {
    backend: Arc<dyn ChatBackend>,
    user_id: String,
    username: String,
    now: DateTime<Utc>,
}

impl HistoryLoad {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Read the history with the GET then POST fallback.
    pub async fn fetch(self) -> LoadedHistory {
        let messages =
            history::load(self.backend.as_ref(), &self.user_id, &self.username, self.now).await;
        LoadedHistory {
            user_id: self.user_id,
            messages,
        }
    }
}

/// Result of [`HistoryLoad::fetch`], ready for [`ChatWidget::finish_history_load`].
#[derive(Debug)]
pub struct LoadedHistory {
    user_id: String,
    messages: Vec<Message>,
}

/// Customer-support chat widget.
#[derive(Debug)]
pub struct ChatWidget {
    session: SessionContext,
    backend: Arc<dyn ChatBackend>,
    transport: Arc<dyn RealtimeTransport>,
    clock: Arc<dyn Clock>,
    log: MessageLog,
    input: String,
    attachment: AttachmentSelection,
    is_loading: bool,
    is_sending: bool,
    transport_available: bool,
}

impl ChatWidget {
    pub fn new(
        session: SessionContext,
        backend: Arc<dyn ChatBackend>,
        transport: Arc<dyn RealtimeTransport>,
    ) -> Self {
        Self {
            session,
            backend,
            transport,
            clock: Arc::new(SystemClock),
            log: MessageLog::new(),
            input: String::new(),
            attachment: AttachmentSelection::new(),
            is_loading: false,
            is_sending: false,
            transport_available: false,
        }
    }

    /// Use `clock` for provisional timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribe to the transport and load history.
    ///
    /// The returned subscription is the widget's event feed; dropping it
    /// ends the subscription.
    pub async fn mount(&mut self) -> Subscription {
        let subscription = self.subscribe().await;
        self.load_history().await;
        subscription
    }

    /// Subscribe to the transport, joining right away if it is already up.
    pub async fn subscribe(&mut self) -> Subscription {
        let subscription = self.transport.subscribe();
        if self.transport.is_connected() {
            self.transport_available = true;
            self.join().await;
        }
        subscription
    }

    /// Replace the conversation with the session user's history.
    ///
    /// No-op without a user identifier. Failures leave an empty conversation.
    pub async fn load_history(&mut self) {
        if let Some(load) = self.begin_history_load() {
            let loaded = load.fetch().await;
            self.finish_history_load(loaded);
        }
    }

    /// Start a history fetch for the session user and raise the loading flag.
    ///
    /// Returns `None` without a user identifier.
    pub fn begin_history_load(&mut self) -> Option<HistoryLoad> {
        let user_id = self.session.user_id()?.to_owned();
        self.is_loading = true;
        Some(HistoryLoad {
            backend: Arc::clone(&self.backend),
            user_id,
            username: self.session.username().to_owned(),
            now: self.clock.now(),
        })
    }

    /// Apply a fetched history and clear the loading flag.
    ///
    /// A result for a user other than the current one is discarded; the
    /// load started for the current user finishes the loading state.
    pub fn finish_history_load(&mut self, loaded: LoadedHistory) {
        if self.session.user_id() != Some(loaded.user_id.as_str()) {
            tracing::debug!(name: "widget.history.stale", user_id = %loaded.user_id, "Discarding history for previous user");
            return;
        }
        self.log.replace_all(loaded.messages);
        self.is_loading = false;
    }

    /// Set or change the user identifier, reloading history and re-joining.
    pub async fn set_user_id(&mut self, user_id: impl Into<String>) {
        if let Some(load) = self.change_user(user_id).await {
            let loaded = load.fetch().await;
            self.finish_history_load(loaded);
        }
    }

    /// Switch users: re-join if the transport is up and start the new user's
    /// history fetch. Returns `None` when the identifier did not change.
    pub async fn change_user(&mut self, user_id: impl Into<String>) -> Option<HistoryLoad> {
        if !self.session.set_user_id(user_id) {
            return None;
        }
        if self.transport_available {
            self.join().await;
        }
        self.begin_history_load()
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.session.set_username(username);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Real-time events
    // ─────────────────────────────────────────────────────────────────────

    /// Apply one event from the real-time channel.
    pub async fn handle_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected => {
                tracing::info!(name: "widget.transport.available", "Socket connected");
                self.transport_available = true;
                self.join().await;
            }
            ServerEvent::Joined(data) => {
                tracing::info!(name: "widget.joined", data = %data, "Successfully joined room");
            }
            ServerEvent::Disconnected { reason } => {
                tracing::info!(name: "widget.transport.unavailable", reason = %reason, "Socket disconnected");
                self.transport_available = false;
            }
            ServerEvent::ConnectError(reason) => {
                tracing::warn!(name: "widget.transport.rejected", reason = %reason, "Socket connection rejected");
                self.transport_available = false;
            }
            ServerEvent::Message(record) => {
                let message =
                    Message::from_record(record, self.session.username(), self.clock.now());
                let id = message.id.clone();
                match self.log.ingest(message) {
                    Ingested::Appended => {}
                    Ingested::Duplicate if id.is_empty() => {
                        tracing::warn!(name: "widget.message.dropped", "Dropping message without an id");
                    }
                    Ingested::Duplicate => {
                        tracing::debug!(name: "widget.message.duplicate", id = %id, "Ignoring duplicate message");
                    }
                    Ingested::Confirmed => {
                        tracing::debug!(name: "widget.message.confirmed", id = %id, "Server echo confirmed local message");
                    }
                }
            }
            ServerEvent::MessageUpdated(update) => {
                if !self
                    .log
                    .apply_update(&update.id, update.content, update.updated_at)
                {
                    tracing::debug!(name: "widget.update.unknown", id = %update.id, "Update for unknown message");
                }
            }
            ServerEvent::MessageDeleted(deletion) => {
                if !self.log.apply_delete(&deletion.id, deletion.deleted_at) {
                    tracing::debug!(name: "widget.delete.unknown", id = %deletion.id, "Delete for unknown message");
                }
            }
        }
    }

    /// Ask to join the session user's private channel.
    async fn join(&self) {
        let Some(user_id) = self.session.user_id() else {
            return;
        };
        let event = ClientEvent::Join {
            user_id: user_id.to_string(),
        };
        match self.transport.emit(event).await {
            Ok(()) => tracing::info!(name: "widget.join.requested", user_id, "Joined room for user"),
            Err(e) => tracing::warn!(name: "widget.join.failed", user_id, error = %e, "Failed to join room"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Composer
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Choose a file from disk. Returns `Ok(false)` if the picker saw no change.
    pub async fn attach(&mut self, path: &Path) -> Result<bool> {
        self.attachment.pick(path).await
    }

    /// Select an in-memory file, replacing any current one.
    pub fn select_file(&mut self, file: PendingFile) {
        self.attachment.select(file);
    }

    pub fn clear_attachment(&mut self) {
        self.attachment.clear();
    }

    /// Send the current input and attachment.
    pub async fn send(&mut self) -> SendOutcome {
        match self.begin_send().await {
            SendStep::Done(outcome) => outcome,
            SendStep::Submit(submit) => {
                let submitted = submit.submit().await;
                self.finish_send(submitted)
            }
        }
    }

    /// Start sending the current input and attachment.
    ///
    /// Text alone over an available transport is emitted right away. Anything
    /// else raises the sending flag and returns the REST submit to run.
    pub async fn begin_send(&mut self) -> SendStep {
        let has_text = !self.input.trim().is_empty();
        let has_file = !self.attachment.is_empty();
        if !has_text && !has_file {
            return SendStep::Done(SendOutcome::Skipped);
        }

        let user_id = self.session.user_id().unwrap_or_default().to_string();
        let username = self.session.username().to_string();

        if has_text && !has_file && self.transport_available {
            let event = ClientEvent::SendMessage {
                user_id: user_id.clone(),
                text: self.input.clone(),
                timestamp: self.clock.now(),
                username: username.clone(),
            };
            match self.transport.emit(event).await {
                Ok(()) => {
                    tracing::debug!(name: "widget.send.realtime", "Sending message via WebSocket");
                    self.input.clear();
                    return SendStep::Done(SendOutcome::Realtime);
                }
                Err(e) => {
                    tracing::warn!(name: "widget.send.realtime_failed", error = %e, "Real-time send failed; using REST");
                }
            }
        }

        let file = self.attachment.selected().cloned();
        tracing::debug!(
            name: "widget.send.rest",
            file = file.as_ref().map(PendingFile::name),
            "Sending message via REST API"
        );
        self.is_sending = true;
        SendStep::Submit(RestSubmit {
            backend: Arc::clone(&self.backend),
            message: OutgoingMessage {
                user_id,
                text: self.input.clone(),
                file,
            },
            username,
        })
    }

    /// Apply a finished REST submit and clear the sending flag.
    ///
    /// On success the provisional copies are added and the composer is
    /// cleared; on failure input and attachment stay as they were.
    pub fn finish_send(&mut self, submitted: RestSubmitted) -> SendOutcome {
        self.is_sending = false;
        let RestSubmitted {
            message,
            username,
            result,
        } = submitted;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::error!(name: "widget.send.failed", error = %e, "Error sending message");
                return SendOutcome::Failed;
            }
        };

        let (user_message, bot_message) = self.provisional_messages(&username, &message, receipt);

        let user_appended = self.log.append_provisional(user_message, USER_ECHO_WINDOW);
        let bot_appended =
            bot_message.is_some_and(|m| self.log.append_provisional(m, BOT_ECHO_WINDOW));

        self.input.clear();
        self.attachment.clear();

        SendOutcome::Rest {
            user_appended,
            bot_appended,
        }
    }

    /// Local copies of a REST-sent message and its bot reply.
    fn provisional_messages(
        &self,
        username: &str,
        sent: &OutgoingMessage,
        receipt: SendReceipt,
    ) -> (Message, Option<Message>) {
        let now = self.clock.now();
        let base_id = now.timestamp_millis();

        let mut user_message = Message::new(
            base_id.to_string(),
            SenderType::User,
            sent.text.clone(),
            now,
            username,
        );
        if let Some(file) = &sent.file {
            let data = receipt
                .file_data
                .clone()
                .or_else(|| file.is_image().then(|| file.data_url()));
            user_message = user_message.with_file(FileAttachment {
                name: file.name().to_string(),
                mime_type: Some(file.mime_type().to_string()),
                data,
            });
        }

        let bot_message = receipt.bot_response.map(|text| {
            Message::new(
                (base_id + 1).to_string(),
                SenderType::Bot,
                text,
                now,
                SenderType::Bot.display_name(username),
            )
        });

        (user_message, bot_message)
    }

    // ─────────────────────────────────────────────────────────────────────
    // View state
    // ─────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    #[must_use]
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn attachment(&self) -> Option<&PendingFile> {
        self.attachment.selected()
    }

    #[must_use]
    pub fn attachment_selection(&self) -> &AttachmentSelection {
        &self.attachment
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    #[must_use]
    pub fn transport_available(&self) -> bool {
        self.transport_available
    }

    /// Whether the send control should be enabled.
    #[must_use]
    pub fn can_send(&self) -> bool {
        !self.is_loading && (!self.input.trim().is_empty() || !self.attachment.is_empty())
    }
}
