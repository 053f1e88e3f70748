//! Widget behavior with a scripted backend and an in-memory transport.

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tokio::sync::Notify;

use support_chat::api::types::{
    MessageDeletion, MessageRecord, MessageUpdate, OutgoingMessage, SendReceipt,
};
use support_chat::api::{BackendCall, ChatBackend, MockBackend};
use support_chat::chat::render::{DELETED_PLACEHOLDER, LOADING_TEXT, render_conversation};
use support_chat::chat::{
    ChatWidget, Clock, ManualClock, PendingFile, SendOutcome, SendStep, SenderType,
};
use support_chat::error::Result;
use support_chat::realtime::{
    ClientEvent, MemoryTransport, RealtimeTransport, ServerEvent, Subscription,
};
use support_chat::session::SessionContext;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
}

fn record(id: &str, sender: &str, content: &str, at: DateTime<Utc>) -> MessageRecord {
    serde_json::from_value(json!({
        "_id": id,
        "content": content,
        "senderType": sender,
        "timestamp": at.timestamp_millis(),
    }))
    .unwrap()
}

fn session(user_id: &str) -> SessionContext {
    SessionContext::new(Some(user_id.to_string()), Some("Ana".to_string()))
}

struct Harness {
    widget: ChatWidget,
    backend: Arc<MockBackend>,
    transport: Arc<MemoryTransport>,
    clock: Arc<ManualClock>,
    events: Subscription,
}

impl Harness {
    async fn mount(backend: MockBackend, connected: bool, session: SessionContext) -> Self {
        let backend = Arc::new(backend);
        let transport = Arc::new(MemoryTransport::new());
        transport.set_connected_silently(connected);
        let clock = Arc::new(ManualClock::new(start()));

        let mut widget = ChatWidget::new(
            session,
            Arc::clone(&backend) as Arc<dyn ChatBackend>,
            Arc::clone(&transport) as Arc<dyn RealtimeTransport>,
        )
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        let events = widget.mount().await;

        Self {
            widget,
            backend,
            transport,
            clock,
            events,
        }
    }

    /// Feed every queued transport event to the widget.
    async fn pump(&mut self) {
        while let Some(event) = self.events.try_next() {
            self.widget.handle_event(event).await;
        }
    }

    fn deliver_message(&self, id: &str, sender: &str, content: &str, at: DateTime<Utc>) {
        self.transport
            .deliver(ServerEvent::Message(record(id, sender, content, at)));
    }

    fn ids(&self) -> Vec<String> {
        self.widget.messages().iter().map(|m| m.id.clone()).collect()
    }

    fn sent_over_socket(&self) -> usize {
        self.transport
            .emitted()
            .iter()
            .filter(|e| matches!(e, ClientEvent::SendMessage { .. }))
            .count()
    }

    fn rest_sends(&self) -> Vec<BackendCall> {
        self.backend
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::Send { .. }))
            .collect()
    }
}

/// Holds every backend call until the gate is opened.
#[derive(Debug)]
struct GatedBackend {
    inner: MockBackend,
    gate: Arc<Notify>,
}

#[async_trait]
impl ChatBackend for GatedBackend {
    async fn history_by_path(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        self.gate.notified().await;
        self.inner.history_by_path(user_id).await
    }

    async fn history_by_body(&self, user_id: &str) -> Result<Vec<MessageRecord>> {
        self.gate.notified().await;
        self.inner.history_by_body(user_id).await
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<SendReceipt> {
        self.gate.notified().await;
        self.inner.send_message(message).await
    }
}

fn gated_widget(inner: MockBackend) -> (ChatWidget, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    let backend = GatedBackend {
        inner,
        gate: Arc::clone(&gate),
    };
    let widget = ChatWidget::new(
        session("42"),
        Arc::new(backend) as Arc<dyn ChatBackend>,
        Arc::new(MemoryTransport::new()) as Arc<dyn RealtimeTransport>,
    );
    (widget, gate)
}

/// Log sink for asserting on emitted events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn png() -> PendingFile {
    PendingFile::new("shot.png", "image/png", vec![0x89, b'P', b'N', b'G'])
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_history_in_server_order() {
    let records: Vec<_> = (0..5)
        .map(|i| {
            let sender = if i % 2 == 0 { "user" } else { "bot" };
            // Deliberately not in timestamp order.
            record(&format!("m{i}"), sender, &format!("text {i}"), start() - Duration::minutes(i))
        })
        .collect();
    let h = Harness::mount(MockBackend::new().with_primary_history(records), false, session("42")).await;

    assert_eq!(h.ids(), ["m0", "m1", "m2", "m3", "m4"]);
    assert_eq!(h.widget.messages()[0].username, "Ana");
    assert_eq!(h.widget.messages()[1].username, "Bot");
    assert!(!h.widget.is_loading());
    assert_eq!(h.backend.calls(), vec![BackendCall::HistoryByPath("42".into())]);
}

#[tokio::test]
async fn test_history_fallback_uses_same_user_id() {
    let backend = MockBackend::new()
        .failing_primary()
        .with_secondary_history(vec![record("a", "admin", "Hello!", start())]);
    let h = Harness::mount(backend, false, session("user-7")).await;

    assert_eq!(h.ids(), ["a"]);
    assert_eq!(h.widget.messages()[0].sender_type, SenderType::Admin);
    assert_eq!(
        h.backend.calls(),
        vec![
            BackendCall::HistoryByPath("user-7".into()),
            BackendCall::HistoryByBody("user-7".into()),
        ]
    );
}

#[tokio::test]
async fn test_history_failure_leaves_empty_conversation() {
    let backend = MockBackend::new().failing_primary().failing_secondary();
    let h = Harness::mount(backend, false, session("42")).await;

    assert!(h.widget.messages().is_empty());
    assert!(!h.widget.is_loading());
    assert!(render_conversation(&h.widget).contains("Welcome to Customer Support"));
}

#[tokio::test]
async fn test_mount_without_user_skips_history_and_join() {
    let h = Harness::mount(MockBackend::new(), true, SessionContext::default()).await;

    assert!(h.backend.calls().is_empty());
    assert!(h.transport.emitted().is_empty());
    assert!(h.widget.transport_available());
}

#[tokio::test]
async fn test_set_user_id_reloads_and_rejoins() {
    let backend = MockBackend::new().with_primary_history(vec![record("h1", "bot", "Welcome back", start())]);
    let mut h = Harness::mount(backend, true, SessionContext::default()).await;

    h.widget.set_user_id("42").await;
    assert_eq!(h.ids(), ["h1"]);
    assert_eq!(
        h.transport.emitted(),
        vec![ClientEvent::Join {
            user_id: "42".into()
        }]
    );

    // Same id again: nothing to do.
    h.widget.set_user_id("42").await;
    assert_eq!(h.backend.calls().len(), 1);
    assert_eq!(h.transport.emitted().len(), 1);
}

#[tokio::test]
async fn test_loading_indicator_shown_while_history_pending() {
    let backend = MockBackend::new().with_primary_history(vec![record("h1", "bot", "Welcome back", start())]);
    let (mut widget, gate) = gated_widget(backend);
    let _events = widget.subscribe().await;
    widget.set_input("hello");

    let load = widget.begin_history_load().expect("session has a user id");
    assert_eq!(load.user_id(), "42");
    let pending = tokio::spawn(load.fetch());
    tokio::task::yield_now().await;

    assert!(widget.is_loading());
    assert!(!widget.can_send());
    assert!(render_conversation(&widget).contains(LOADING_TEXT));

    gate.notify_one();
    let loaded = pending.await.unwrap();
    widget.finish_history_load(loaded);

    assert!(!widget.is_loading());
    assert!(widget.can_send());
    let screen = render_conversation(&widget);
    assert!(!screen.contains(LOADING_TEXT));
    assert!(screen.contains("Welcome back"));
}

#[tokio::test]
async fn test_history_for_previous_user_is_discarded() {
    let backend = MockBackend::new().with_primary_history(vec![record("h1", "bot", "Welcome back", start())]);
    let mut h = Harness::mount(backend, false, session("42")).await;

    let stale = h.widget.begin_history_load().unwrap();
    let current = h.widget.change_user("7").await.unwrap();
    assert_eq!(current.user_id(), "7");

    h.widget.finish_history_load(stale.fetch().await);
    assert!(h.widget.is_loading());

    h.widget.finish_history_load(current.fetch().await);
    assert!(!h.widget.is_loading());
    assert_eq!(h.ids(), ["h1"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mount_when_connected_joins() {
    let h = Harness::mount(MockBackend::new(), true, session("42")).await;

    assert!(h.widget.transport_available());
    assert_eq!(
        h.transport.emitted(),
        vec![ClientEvent::Join {
            user_id: "42".into()
        }]
    );
}

#[tokio::test]
async fn test_connect_and_reconnect_rejoin() {
    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;
    assert!(!h.widget.transport_available());
    assert!(h.transport.emitted().is_empty());

    h.transport.connect();
    h.pump().await;
    assert!(h.widget.transport_available());

    h.transport.disconnect("transport close");
    h.pump().await;
    assert!(!h.widget.transport_available());
    assert!(render_conversation(&h.widget).contains("(offline)"));

    h.transport.connect();
    h.pump().await;
    let joins = h
        .transport
        .emitted()
        .into_iter()
        .filter(|e| matches!(e, ClientEvent::Join { .. }))
        .count();
    assert_eq!(joins, 2);
}

#[tokio::test]
async fn test_connect_error_keeps_transport_unavailable() {
    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;
    h.transport
        .deliver(ServerEvent::ConnectError("unauthorized".into()));
    h.pump().await;
    assert!(!h.widget.transport_available());
}

#[tokio::test]
async fn test_dropping_subscription_unsubscribes() {
    let h = Harness::mount(MockBackend::new(), false, session("42")).await;
    assert_eq!(h.transport.subscriber_count(), 1);

    let Harness {
        events, transport, ..
    } = h;
    events.close();
    assert_eq!(transport.subscriber_count(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sending
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_realtime_send_then_echo_single_entry() {
    let mut h = Harness::mount(MockBackend::new(), true, session("42")).await;

    h.widget.set_input("Where is my order?");
    assert_eq!(h.widget.send().await, SendOutcome::Realtime);
    assert_eq!(h.widget.input(), "");
    assert!(h.widget.messages().is_empty());
    assert!(h.rest_sends().is_empty());

    let sent = h.transport.emitted().pop().unwrap();
    assert_eq!(
        sent,
        ClientEvent::SendMessage {
            user_id: "42".into(),
            text: "Where is my order?".into(),
            timestamp: start(),
            username: "Ana".into(),
        }
    );

    h.deliver_message("srv-1", "user", "Where is my order?", start());
    h.pump().await;
    // Redelivery of the same id is ignored.
    h.deliver_message("srv-1", "user", "Where is my order?", start());
    h.pump().await;

    assert_eq!(h.ids(), ["srv-1"]);
}

#[tokio::test]
async fn test_realtime_emit_failure_falls_back_to_rest() {
    let mut h = Harness::mount(MockBackend::new(), true, session("42")).await;
    h.transport.set_fail_emits(true);

    h.widget.set_input("hello?");
    let outcome = h.widget.send().await;

    assert_eq!(
        outcome,
        SendOutcome::Rest {
            user_appended: true,
            bot_appended: true
        }
    );
    assert_eq!(h.rest_sends().len(), 1);
    assert_eq!(h.widget.messages().len(), 2);
}

#[tokio::test]
async fn test_disconnected_send_uses_rest_with_bot_reply() {
    let backend = MockBackend::new().with_receipt(SendReceipt {
        bot_response: Some("We'll check on that.".into()),
        file_data: None,
    });
    let mut h = Harness::mount(backend, false, session("42")).await;

    h.widget.set_input("Where is my order?");
    assert_eq!(
        h.widget.send().await,
        SendOutcome::Rest {
            user_appended: true,
            bot_appended: true
        }
    );

    let messages = h.widget.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender_type, SenderType::User);
    assert_eq!(messages[0].text, "Where is my order?");
    assert_eq!(messages[0].username, "Ana");
    assert_eq!(messages[0].id, start().timestamp_millis().to_string());
    assert_eq!(messages[1].sender_type, SenderType::Bot);
    assert_eq!(messages[1].text, "We'll check on that.");
    assert_eq!(messages[1].id, (start().timestamp_millis() + 1).to_string());
    assert_eq!(h.widget.input(), "");
    assert_eq!(h.sent_over_socket(), 0);
}

#[tokio::test]
async fn test_file_send_uses_rest_and_suppresses_echoes() {
    let backend = MockBackend::new().with_receipt(SendReceipt {
        bot_response: Some("Got your screenshot.".into()),
        file_data: Some("https://files.example.com/shot.png".into()),
    });
    let mut h = Harness::mount(backend, true, session("42")).await;

    h.widget.select_file(png());
    h.widget.set_input("see attached");
    assert_eq!(
        h.widget.send().await,
        SendOutcome::Rest {
            user_appended: true,
            bot_appended: true
        }
    );
    assert_eq!(h.sent_over_socket(), 0);
    assert_eq!(
        h.rest_sends(),
        vec![BackendCall::Send {
            user_id: "42".into(),
            text: "see attached".into(),
            file_name: Some("shot.png".into()),
        }]
    );
    assert!(h.widget.attachment().is_none());
    let file = h.widget.messages()[0].file.clone().unwrap();
    assert_eq!(file.data.as_deref(), Some("https://files.example.com/shot.png"));

    // Server echoes both messages half a second later.
    h.clock.advance(Duration::milliseconds(500));
    let echo_at = h.clock.now();
    h.deliver_message("srv-user", "user", "see attached", echo_at);
    h.deliver_message("srv-bot", "bot", "Got your screenshot.", echo_at);
    h.pump().await;

    assert_eq!(h.ids(), ["srv-user", "srv-bot"]);
}

#[tokio::test]
async fn test_late_user_echo_is_a_new_entry() {
    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;

    h.widget.select_file(png());
    h.widget.set_input("see attached");
    h.widget.send().await;
    let reply = h.widget.messages()[1].text.clone();

    h.clock.advance(Duration::milliseconds(1500));
    let echo_at = h.clock.now();
    h.deliver_message("srv-user", "user", "see attached", echo_at);
    h.deliver_message("srv-bot", "bot", &reply, echo_at);
    h.pump().await;

    // The user echo is outside its 1s window; the bot echo is inside 3s.
    assert_eq!(h.widget.messages().len(), 3);
    assert_eq!(h.widget.messages()[1].id, "srv-bot");
    assert_eq!(h.widget.messages()[2].id, "srv-user");
}

#[tokio::test]
async fn test_echo_before_response_suppresses_provisional() {
    let backend = MockBackend::new().with_receipt(SendReceipt {
        bot_response: Some("Thanks!".into()),
        file_data: None,
    });
    let mut h = Harness::mount(backend, false, session("42")).await;

    h.deliver_message("srv-user", "user", "invoice", start() - Duration::milliseconds(300));
    h.deliver_message("srv-bot", "bot", "Thanks!", start() - Duration::milliseconds(200));
    h.pump().await;

    h.widget.select_file(PendingFile::new("invoice.pdf", "application/pdf", b"%PDF".to_vec()));
    h.widget.set_input("invoice");
    assert_eq!(
        h.widget.send().await,
        SendOutcome::Rest {
            user_appended: false,
            bot_appended: false
        }
    );
    assert_eq!(h.ids(), ["srv-user", "srv-bot"]);
}

#[tokio::test]
async fn test_rest_failure_keeps_input_and_attachment() {
    let mut h = Harness::mount(MockBackend::new().failing_send(), false, session("42")).await;

    h.widget.select_file(png());
    h.widget.set_input("please look");
    assert_eq!(h.widget.send().await, SendOutcome::Failed);

    assert!(h.widget.messages().is_empty());
    assert_eq!(h.widget.input(), "please look");
    assert_eq!(h.widget.attachment().map(PendingFile::name), Some("shot.png"));
    assert!(!h.widget.is_sending());
}

#[tokio::test]
async fn test_sending_indicator_shown_while_submit_pending() {
    let (mut widget, gate) = gated_widget(MockBackend::new());
    widget.set_input("where is my order?");

    let SendStep::Submit(submit) = widget.begin_send().await else {
        panic!("offline text send should go over REST");
    };
    let pending = tokio::spawn(submit.submit());
    tokio::task::yield_now().await;

    assert!(widget.is_sending());
    assert!(render_conversation(&widget).contains("sending..."));
    assert_eq!(widget.input(), "where is my order?");

    gate.notify_one();
    let outcome = widget.finish_send(pending.await.unwrap());

    assert!(matches!(outcome, SendOutcome::Rest { user_appended: true, .. }));
    assert!(!widget.is_sending());
    assert!(!render_conversation(&widget).contains("sending..."));
    assert_eq!(widget.messages()[0].text, "where is my order?");
    assert_eq!(widget.input(), "");
}

#[tokio::test]
async fn test_missing_bot_response_adds_only_user_entry() {
    let backend = MockBackend::new().with_receipt(SendReceipt::default());
    let mut h = Harness::mount(backend, false, session("42")).await;

    h.widget.set_input("anyone there?");
    assert_eq!(
        h.widget.send().await,
        SendOutcome::Rest {
            user_appended: true,
            bot_appended: false
        }
    );
    assert_eq!(h.widget.messages().len(), 1);
}

#[tokio::test]
async fn test_image_without_file_data_uses_inline_preview() {
    let backend = MockBackend::new().with_receipt(SendReceipt::default());
    let mut h = Harness::mount(backend, false, session("42")).await;

    h.widget.select_file(png());
    h.widget.send().await;

    let file = h.widget.messages()[0].file.clone().unwrap();
    assert_eq!(file.name, "shot.png");
    assert!(file.data.unwrap().starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_blank_input_without_file_is_skipped() {
    let mut h = Harness::mount(MockBackend::new(), true, session("42")).await;

    h.widget.set_input("   ");
    assert!(!h.widget.can_send());
    assert_eq!(h.widget.send().await, SendOutcome::Skipped);
    assert!(h.rest_sends().is_empty());
    assert_eq!(h.sent_over_socket(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Updates and deletions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_changes_text_in_place() {
    let history = vec![
        record("a", "user", "my order is late", start()),
        record("b", "admin", "checking now", start()),
        record("c", "bot", "anything else?", start()),
    ];
    let mut h = Harness::mount(MockBackend::new().with_primary_history(history), false, session("42")).await;
    let before = h.widget.messages()[1].clone();

    let edited_at = start() + Duration::minutes(2);
    h.transport.deliver(ServerEvent::MessageUpdated(MessageUpdate {
        id: "b".into(),
        content: Some("checking now, one moment".into()),
        updated_at: Some(edited_at),
    }));
    h.transport.deliver(ServerEvent::MessageUpdated(MessageUpdate {
        id: "nope".into(),
        content: Some("ghost".into()),
        updated_at: None,
    }));
    h.pump().await;

    assert_eq!(h.ids(), ["a", "b", "c"]);
    let after = &h.widget.messages()[1];
    assert_eq!(after.text, "checking now, one moment");
    assert_eq!(after.updated_at, Some(edited_at));
    assert_eq!(after.sender_type, before.sender_type);
    assert_eq!(after.timestamp, before.timestamp);
    assert_eq!(after.username, before.username);
}

#[tokio::test]
async fn test_delete_marks_and_renders_placeholder() {
    let history = vec![
        record("a", "user", "my card number is 1234", start()),
        record("b", "admin", "please don't share that", start()),
    ];
    let mut h = Harness::mount(MockBackend::new().with_primary_history(history), false, session("42")).await;

    let deleted_at = start() + Duration::minutes(1);
    h.transport.deliver(ServerEvent::MessageDeleted(MessageDeletion {
        id: "a".into(),
        deleted_at: Some(deleted_at),
    }));
    h.pump().await;

    assert_eq!(h.ids(), ["a", "b"]);
    let deleted = &h.widget.messages()[0];
    assert!(deleted.is_deleted);
    assert_eq!(deleted.deleted_at, Some(deleted_at));

    let screen = render_conversation(&h.widget);
    assert!(screen.contains(DELETED_PLACEHOLDER));
    assert!(!screen.contains("1234"));
}

#[tokio::test]
async fn test_messages_without_id_collapse_with_warning() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;
    for text in ["An agent has joined", "How can I help?"] {
        let anonymous: MessageRecord = serde_json::from_value(json!({
            "content": text,
            "senderType": "admin",
            "timestamp": start().timestamp_millis(),
        }))
        .unwrap();
        h.transport.deliver(ServerEvent::Message(anonymous));
    }
    h.pump().await;

    assert_eq!(h.widget.messages().len(), 1);
    assert_eq!(h.widget.messages()[0].text, "An agent has joined");
    assert!(logs.contents().contains("Dropping message without an id"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Attachments
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reselect_replaces_and_clear_allows_same_file_again() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.jpg");
    std::fs::write(&first, b"log output").unwrap();
    std::fs::write(&second, b"\xff\xd8\xff").unwrap();

    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;

    assert!(h.widget.attach(&first).await.unwrap());
    assert!(h.widget.attach(&second).await.unwrap());
    let selected = h.widget.attachment().unwrap();
    assert_eq!(selected.name(), "second.jpg");
    assert_eq!(selected.mime_type(), "image/jpeg");

    // The picker already holds this file, so picking it again changes nothing.
    assert!(!h.widget.attach(&second).await.unwrap());

    h.widget.clear_attachment();
    assert!(h.widget.attachment().is_none());
    assert!(h.widget.attach(&second).await.unwrap());
    assert_eq!(h.widget.attachment().map(PendingFile::name), Some("second.jpg"));
}

#[tokio::test]
async fn test_attach_missing_file_is_error() {
    let mut h = Harness::mount(MockBackend::new(), false, session("42")).await;
    let missing = std::path::Path::new("/definitely/not/here.png");

    assert!(h.widget.attach(missing).await.is_err());
    assert!(h.widget.attachment().is_none());
    // A failed read leaves the picker free to retry the same path.
    assert!(h.widget.attach(missing).await.is_err());
}
