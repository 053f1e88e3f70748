//! Scoped event subscription.

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

use super::events::ServerEvent;

/// A live subscription to transport events.
///
/// Holding the value keeps the subscription open; dropping it (or calling
/// [`Subscription::close`]) tears it down.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ServerEvent>,
}

impl Subscription {
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<ServerEvent>) -> Self {
        tracing::debug!(name: "realtime.subscribed", "Event subscription opened");
        Self { receiver }
    }

    /// Wait for the next event. `None` once the transport is gone.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(name: "realtime.lagged", skipped, "Subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(name: "realtime.lagged", skipped, "Subscriber lagged; events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// End the subscription.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::debug!(name: "realtime.unsubscribed", "Event subscription closed");
    }
}
