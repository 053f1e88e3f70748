//! In-process transport.
//!
//! Nothing goes over the network: the owner decides when the transport is
//! connected and which events arrive, and can inspect what was emitted.
//! Backs mock mode and the widget tests.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{ClientEvent, EVENT_BUFFER, RealtimeTransport, ServerEvent, Subscription};
use crate::error::{Error, Result};

#[derive(Debug)]
pub struct MemoryTransport {
    connected: AtomicBool,
    fail_emits: AtomicBool,
    events: broadcast::Sender<ServerEvent>,
    emitted: Mutex<Vec<ClientEvent>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A disconnected transport.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            connected: AtomicBool::new(false),
            fail_emits: AtomicBool::new(false),
            events,
            emitted: Mutex::new(Vec::new()),
        }
    }

    /// Bring the transport up and announce it to subscribers.
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.deliver(ServerEvent::Connected);
    }

    /// Drop the transport and announce it to subscribers.
    pub fn disconnect(&self, reason: impl Into<String>) {
        self.connected.store(false, Ordering::SeqCst);
        self.deliver(ServerEvent::Disconnected {
            reason: reason.into(),
        });
    }

    /// Flip the connected flag without telling subscribers.
    pub fn set_connected_silently(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make subsequent emits fail.
    pub fn set_fail_emits(&self, fail: bool) {
        self.fail_emits.store(fail, Ordering::SeqCst);
    }

    /// Push an event to every subscriber.
    pub fn deliver(&self, event: ServerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Events emitted so far, in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<ClientEvent> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    async fn emit(&self, event: ClientEvent) -> Result<()> {
        if !self.is_connected() || self.fail_emits.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!(
                "cannot emit '{}': transport not connected",
                event.name()
            )));
        }
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}
