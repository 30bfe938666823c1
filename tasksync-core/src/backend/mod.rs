//! Remote backend contract
//!
//! The sync layer talks to the hosted backend only through [`BackendClient`].
//! Two implementations ship with the crate:
//! - [`MemoryBackend`]: in-process state with fault injection, for tests and demos
//! - [`RestBackend`]: the hosted auth + table HTTP API

mod error;
mod events;
mod memory;
mod rest;

pub use error::{BackendError, BackendResult};
pub use events::{AuthBroadcaster, AuthEvent, AuthStateChange, DEFAULT_AUTH_EVENT_CAPACITY};
pub use memory::{MemoryBackend, Operation};
pub use rest::RestBackend;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::model::{Session, SettingsRow, SettingsUpsert, User, UserId};

/// Operations the sync layer needs from the backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Current session, if any
    ///
    /// An absent session is `Ok(None)`, not an error.
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    /// Subscribe to auth state changes
    ///
    /// Every call returns an independent receiver that sees changes emitted
    /// after the call, in emission order.
    fn auth_changes(&self) -> broadcast::Receiver<AuthStateChange>;

    /// Currently authenticated user, if any
    async fn get_user(&self) -> BackendResult<Option<User>>;

    /// Load the settings row owned by `user_id`
    async fn fetch_settings_row(&self, user_id: &UserId) -> BackendResult<Option<SettingsRow>>;

    /// Insert or merge a settings row
    async fn upsert_settings_row(&self, upsert: SettingsUpsert) -> BackendResult<()>;
}
