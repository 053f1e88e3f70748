//! Real-time channel to the chat backend.
//!
//! # Architecture
//!
//! - [`RealtimeTransport`]: the interface the widget is given
//! - [`SocketIoTransport`]: Socket.IO v4 over WebSocket, with reconnect
//! - [`MemoryTransport`]: in-process transport driven by hand
//! - [`Subscription`]: scoped handle on the transport's event stream
//!
//! Transports fan events out to every open [`Subscription`]. Connection
//! changes are reported as [`ServerEvent::Connected`] and
//! [`ServerEvent::Disconnected`]; reconnecting is the transport's own
//! business.

pub mod events;
pub mod memory;
pub mod packet;
pub mod socketio;
mod subscription;

use async_trait::async_trait;

use crate::error::Result;

pub use events::{ClientEvent, ServerEvent};
pub use memory::MemoryTransport;
pub use socketio::{ReconnectPolicy, SocketIoTransport};
pub use subscription::Subscription;

/// Capacity of each transport's event fan-out.
pub(crate) const EVENT_BUFFER: usize = 256;

/// Bidirectional real-time channel.
#[async_trait]
pub trait RealtimeTransport: Send + Sync + std::fmt::Debug {
    /// Whether the channel is currently usable.
    fn is_connected(&self) -> bool;

    /// Open a subscription to incoming events.
    fn subscribe(&self) -> Subscription;

    /// Send an event to the server.
    async fn emit(&self, event: ClientEvent) -> Result<()>;
}
