//! Auth state change broadcasting
//!
//! Backends push every sign-in, sign-out and token refresh through an
//! [`AuthBroadcaster`]. Each subscriber gets its own receiver and sees the
//! changes in emission order.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::Session;

/// Kind of auth state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One auth state transition and the session it left behind
#[derive(Debug, Clone, PartialEq)]
pub struct AuthStateChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthStateChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}

/// Default number of buffered auth changes per subscriber
pub const DEFAULT_AUTH_EVENT_CAPACITY: usize = 64;

/// Fan-out of auth state changes to any number of subscribers
#[derive(Clone)]
pub struct AuthBroadcaster {
    tx: broadcast::Sender<AuthStateChange>,
}

impl AuthBroadcaster {
    /// Create a broadcaster buffering up to `capacity` changes per subscriber
    ///
    /// # Panics
    /// Panics if `capacity` is zero; config validation rejects that value.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit a change to all subscribers
    ///
    /// # Returns
    /// Number of subscribers that received the change
    pub fn emit(&self, change: AuthStateChange) -> usize {
        self.tx.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_EVENT_CAPACITY)
    }
}
