//! Session-expiry signal channel.
//!
//! Any gateway that sees its credentials rejected publishes here; the
//! session manager owns the single consumer and reacts by forcing a
//! logout. A typed channel with one well-defined receiver replaces
//! ambient event dispatch, so deep call sites stay decoupled from the
//! top-level session object.

use tokio::sync::mpsc;

/// Payload-free "credentials are no longer valid" event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpired;

/// Cloneable publishing handle handed to every gateway.
#[derive(Debug, Clone)]
pub struct ExpiryPublisher {
    tx: mpsc::UnboundedSender<SessionExpired>,
}

impl ExpiryPublisher {
    /// Announce that the stored credentials were rejected. Never
    /// blocks; silently drops the event if the consumer is gone
    /// (process teardown).
    pub fn publish(&self) {
        if self.tx.send(SessionExpired).is_err() {
            tracing::debug!("session expiry published with no consumer");
        }
    }
}

/// The consuming end; exactly one per process, owned by the session
/// wiring.
#[derive(Debug)]
pub struct ExpiryEvents {
    rx: mpsc::UnboundedReceiver<SessionExpired>,
}

impl ExpiryEvents {
    /// Wait for the next expiry event; `None` once every publisher is
    /// dropped.
    pub async fn recv(&mut self) -> Option<SessionExpired> {
        self.rx.recv().await
    }
}

/// Create the channel pair.
pub fn channel() -> (ExpiryPublisher, ExpiryEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ExpiryPublisher { tx }, ExpiryEvents { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_consumer() {
        let (publisher, mut events) = channel();
        publisher.publish();
        publisher.clone().publish();
        assert_eq!(events.recv().await, Some(SessionExpired));
        assert_eq!(events.recv().await, Some(SessionExpired));
    }

    #[tokio::test]
    async fn publish_without_consumer_does_not_panic() {
        let (publisher, events) = channel();
        drop(events);
        publisher.publish();
    }

    #[tokio::test]
    async fn recv_ends_when_publishers_drop() {
        let (publisher, mut events) = channel();
        drop(publisher);
        assert_eq!(events.recv().await, None);
    }
}
