//! Cross-context session notifications
//!
//! Every [`AuthContext`] gets a [`ContextId`]; contexts that should observe
//! each other (the tabs of one browser profile, say) share one [`SessionBus`].
//! A context never receives its own events. Delivery is best-effort: a slow
//! listener that falls behind skips the missed events, and storage stays the
//! source of truth.
//!
//! [`AuthContext`]: crate::AuthContext

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

pub type ContextId = Uuid;

const DEFAULT_CAPACITY: usize = 64;

/// What changed about the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was written (login or token swap)
    Updated,
    /// The session was removed
    LoggedOut,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Updated => write!(f, "updated"),
            SessionEvent::LoggedOut => write!(f, "logged_out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnvelope {
    pub origin: ContextId,
    pub event: SessionEvent,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<SessionEnvelope>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event on behalf of `origin`
    pub fn publish(&self, origin: ContextId, event: SessionEvent) {
        let envelope = SessionEnvelope {
            origin,
            event,
            at: Utc::now(),
        };

        // no listeners is fine
        let delivered = self.sender.send(envelope).unwrap_or(0);
        debug!(%origin, %event, delivered, "Published session event");
    }

    /// Listen for events published by contexts other than `origin`
    pub fn listen(&self, origin: ContextId) -> SessionEvents {
        SessionEvents {
            origin,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of foreign session events for one context
#[derive(Debug)]
pub struct SessionEvents {
    origin: ContextId,
    receiver: broadcast::Receiver<SessionEnvelope>,
}

impl SessionEvents {
    /// Next event from another context, `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SessionEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(origin = %self.origin, skipped, "Session listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<SessionEnvelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if envelope.origin == self.origin => continue,
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(origin = %self.origin, skipped, "Session listener lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

/// Handle for a callback registered with [`SessionStore::subscribe`]
///
/// Dropping the handle unsubscribes.
///
/// [`SessionStore::subscribe`]: crate::SessionStore::subscribe
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Spawn a task that feeds every foreign event to `callback`
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn<F>(mut events: SessionEvents, callback: F) -> Self
    where
        F: Fn(SessionEnvelope) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            while let Some(envelope) = events.recv().await {
                callback(envelope);
            }
        });
        Self { handle }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
