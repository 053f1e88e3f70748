//! Socket.IO v4 client transport.
//!
//! Connects with the WebSocket transport only (no long-polling upgrade), to
//! the default namespace. A background task owns the socket: it answers
//! server pings, decodes events and fans them out, and reconnects with
//! exponential backoff whenever the socket drops. The task stops when the
//! transport is dropped or [`SocketIoTransport::shutdown`] is called.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;

use super::packet::{
    CONNECT_FRAME, DISCONNECT_FRAME, ENGINE_IO_VERSION, EnginePacket, PONG_FRAME, SocketPacket,
    decode_engine, decode_socket, encode_event,
};
use super::{ClientEvent, EVENT_BUFFER, RealtimeTransport, ServerEvent, Subscription};
use crate::error::{Error, Result};

/// How long to wait for the first frame before the server's own ping
/// settings are known.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// Delay between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug)]
struct Shared {
    connected: AtomicBool,
    events: broadcast::Sender<ServerEvent>,
}

impl Shared {
    fn publish(&self, event: ServerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

/// Socket.IO client over WebSocket.
pub struct SocketIoTransport {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<String>,
    endpoint: Url,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl std::fmt::Debug for SocketIoTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketIoTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("connected", &self.shared.connected.load(Ordering::SeqCst))
            .field("subscribers", &self.shared.events.receiver_count())
            .finish()
    }
}

impl SocketIoTransport {
    /// Start connecting to the Socket.IO server at `base_url`.
    ///
    /// Returns immediately; subscribers learn about the connection through
    /// [`ServerEvent::Connected`]. Must be called inside a Tokio runtime.
    pub fn connect(base_url: &str, policy: ReconnectPolicy) -> Result<Self> {
        let endpoint = socket_endpoint(base_url)?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            events,
        });
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tracing::info!(name: "realtime.starting", endpoint = %endpoint, "Starting real-time transport");
        tokio::spawn(run(
            endpoint.clone(),
            Arc::clone(&shared),
            outgoing_rx,
            policy,
            cancel.clone(),
        ));

        Ok(Self {
            shared,
            outgoing,
            endpoint,
            _guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    /// The WebSocket URL in use.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Close the socket and stop reconnecting.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl RealtimeTransport for SocketIoTransport {
    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.shared.events.subscribe())
    }

    async fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Transport(format!(
                "cannot emit '{}': transport not connected",
                event.name()
            )));
        }
        let frame = encode_event(event.name(), &event.payload());
        self.outgoing
            .send(frame)
            .map_err(|e| Error::Transport(format!("transport task stopped: {e}")))
    }
}

/// Build the Engine.IO WebSocket URL for a server base URL.
///
/// `http`/`https` map to `ws`/`wss`; the engine path is always `/socket.io/`.
pub fn socket_endpoint(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::Config(format!(
                "unsupported real-time URL scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::Config(format!("cannot use '{base_url}' as a WebSocket URL")))?;
    url.set_path("/socket.io/");
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", ENGINE_IO_VERSION)
        .append_pair("transport", "websocket");
    Ok(url)
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection task
// ─────────────────────────────────────────────────────────────────────────────

enum SessionEnd {
    Cancelled,
    Closed,
}

/// What to do in response to one incoming frame.
#[derive(Debug, PartialEq)]
enum FrameAction {
    /// Engine.IO open: join the default namespace; the socket is considered
    /// dead after `liveness` without traffic.
    Handshake { liveness: Duration },
    Reply(&'static str),
    Connected,
    Event(ServerEvent),
    Close,
    Rejected(String),
    Ignore,
}

async fn run(
    endpoint: Url,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    policy: ReconnectPolicy,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        let outcome = run_session(&endpoint, &shared, &mut outgoing, &cancel).await;

        let was_connected = shared.connected.swap(false, Ordering::SeqCst);
        if was_connected {
            attempt = 0;
            let reason = match &outcome {
                Ok(_) => "transport close".to_string(),
                Err(e) => e.to_string(),
            };
            tracing::info!(name: "realtime.disconnected", reason = %reason, "Real-time transport disconnected");
            shared.publish(ServerEvent::Disconnected { reason });
        }

        match outcome {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::Closed) => {}
            Err(e) => {
                tracing::warn!(name: "realtime.session.failed", error = %e, "Real-time session failed");
            }
        }
        if cancel.is_cancelled() {
            break;
        }

        let delay = policy.delay(attempt);
        attempt = attempt.saturating_add(1);
        tracing::debug!(
            name: "realtime.reconnect.scheduled",
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        tokio::select! {
            () = cancel.cancelled() => break,
            () = sleep(delay) => {}
        }
    }
    tracing::debug!(name: "realtime.stopped", "Real-time transport stopped");
}

async fn run_session(
    endpoint: &Url,
    shared: &Shared,
    outgoing: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> Result<SessionEnd> {
    let (ws, _response) = tokio::select! {
        () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        result = connect_async(endpoint.as_str()) => result?,
    };
    let (mut sink, mut stream) = ws.split();

    // Frames queued for a dead session are not replayed.
    while outgoing.try_recv().is_ok() {}

    let mut liveness = HANDSHAKE_TIMEOUT;
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.send(WsMessage::text(DISCONNECT_FRAME)).await;
                let _ = sink.close().await;
                return Ok(SessionEnd::Cancelled);
            }
            () = sleep_until(deadline) => {
                return Err(Error::Transport(format!(
                    "no traffic from server for {}s",
                    liveness.as_secs()
                )));
            }
            Some(frame) = outgoing.recv() => {
                sink.send(WsMessage::text(frame)).await?;
            }
            incoming = stream.next() => {
                let Some(incoming) = incoming else {
                    return Ok(SessionEnd::Closed);
                };
                let text = match incoming? {
                    WsMessage::Text(text) => text,
                    WsMessage::Close(_) => return Ok(SessionEnd::Closed),
                    _ => continue,
                };
                deadline = Instant::now() + liveness;

                let action = match interpret(text.as_str()) {
                    Ok(action) => action,
                    Err(e) => {
                        tracing::warn!(name: "realtime.frame.invalid", error = %e, "Ignoring undecodable frame");
                        continue;
                    }
                };
                match action {
                    FrameAction::Handshake { liveness: window } => {
                        liveness = window;
                        deadline = Instant::now() + liveness;
                        sink.send(WsMessage::text(CONNECT_FRAME)).await?;
                    }
                    FrameAction::Reply(frame) => sink.send(WsMessage::text(frame)).await?,
                    FrameAction::Connected => {
                        shared.connected.store(true, Ordering::SeqCst);
                        tracing::info!(name: "realtime.connected", "Real-time transport connected");
                        shared.publish(ServerEvent::Connected);
                    }
                    FrameAction::Event(event) => shared.publish(event),
                    FrameAction::Close => return Ok(SessionEnd::Closed),
                    FrameAction::Rejected(reason) => {
                        shared.publish(ServerEvent::ConnectError(reason.clone()));
                        return Err(Error::Transport(format!("connection rejected: {reason}")));
                    }
                    FrameAction::Ignore => {}
                }
            }
        }
    }
}

fn interpret(frame: &str) -> Result<FrameAction> {
    let action = match decode_engine(frame)? {
        EnginePacket::Open(handshake) => {
            tracing::debug!(
                name: "realtime.handshake",
                sid = %handshake.sid,
                ping_interval = handshake.ping_interval,
                "Engine.IO handshake"
            );
            let liveness = if handshake.ping_interval == 0 {
                HANDSHAKE_TIMEOUT
            } else {
                Duration::from_millis(handshake.ping_interval + handshake.ping_timeout)
            };
            FrameAction::Handshake { liveness }
        }
        EnginePacket::Ping => FrameAction::Reply(PONG_FRAME),
        EnginePacket::Close => FrameAction::Close,
        EnginePacket::Message(body) => match decode_socket(&body)? {
            SocketPacket::Connect(_) => FrameAction::Connected,
            SocketPacket::Disconnect => FrameAction::Close,
            SocketPacket::ConnectError(data) => FrameAction::Rejected(error_message(&data)),
            SocketPacket::Event { name, payload } => match ServerEvent::from_named(&name, payload)
            {
                Ok(Some(event)) => FrameAction::Event(event),
                Ok(None) => {
                    tracing::debug!(name: "realtime.event.unhandled", event = %name, "Unhandled event");
                    FrameAction::Ignore
                }
                Err(e) => {
                    tracing::warn!(name: "realtime.event.malformed", event = %name, error = %e, "Malformed event payload");
                    FrameAction::Ignore
                }
            },
            SocketPacket::Ack | SocketPacket::Unsupported(_) => FrameAction::Ignore,
        },
        EnginePacket::Pong | EnginePacket::Upgrade | EnginePacket::Noop => FrameAction::Ignore,
    };
    Ok(action)
}

fn error_message(data: &Value) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .map_or_else(|| data.to_string(), str::to_string)
}
