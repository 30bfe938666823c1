//! In-memory backend (non-persistent, for tests and demos)
//!
//! Holds registered accounts, the active session and the settings table in
//! process. Faults can be injected per operation and settings fetches can be
//! delayed per user, which is enough to reproduce every failure and
//! interleaving the sync layer has to handle.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{
    AuthBroadcaster, AuthEvent, AuthStateChange, BackendClient, BackendError, BackendResult,
};
use crate::model::{Session, SettingsRow, SettingsUpsert, User, UserId, UserSettings};

/// Backend operations that can be faulted and counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSession,
    GetUser,
    FetchSettings,
    UpsertSettings,
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    session: Option<Session>,
    rows: HashMap<UserId, UserSettings>,
    faults: HashMap<Operation, String>,
    fetch_delays: HashMap<UserId, Duration>,
    calls: HashMap<Operation, usize>,
}

impl MemoryState {
    /// Count the call and return the injected fault, if any
    fn enter(&mut self, op: Operation) -> BackendResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.faults.get(&op) {
            Some(message) => Err(BackendError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

/// In-process [`BackendClient`]
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<RwLock<MemoryState>>,
    events: AuthBroadcaster,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_capacity(super::DEFAULT_AUTH_EVENT_CAPACITY)
    }

    /// Create a backend whose auth change channel buffers `capacity` changes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            events: AuthBroadcaster::new(capacity),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account that can sign in with `password`
    ///
    /// The account is keyed by the user's email, falling back to its id.
    pub fn register(&self, user: User, password: impl Into<String>) {
        let login = user.email.clone().unwrap_or_else(|| user.id.to_string());
        self.write().accounts.insert(
            login,
            Account {
                user,
                password: password.into(),
            },
        );
    }

    /// Sign in and broadcast `SignedIn`
    pub fn sign_in_with_password(&self, login: &str, password: &str) -> BackendResult<Session> {
        let session = {
            let mut state = self.write();
            let account = state
                .accounts
                .get(login)
                .filter(|account| account.password == password)
                .ok_or(BackendError::InvalidCredentials)?;

            let mut session = Session::new(Uuid::new_v4().to_string(), account.user.clone());
            session.refresh_token = Some(Uuid::new_v4().to_string());
            state.session = Some(session.clone());
            session
        };

        tracing::debug!(user_id = %session.user.id, "memory backend: signed in");
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Drop the session and broadcast `SignedOut`
    pub fn sign_out(&self) {
        self.write().session = None;
        tracing::debug!("memory backend: signed out");
        self.emit(AuthEvent::SignedOut, None);
    }

    /// Rotate the access token and broadcast `TokenRefreshed`
    pub fn refresh_session(&self) -> BackendResult<Session> {
        let session = {
            let mut state = self.write();
            let session = state.session.as_mut().ok_or(BackendError::Unauthenticated)?;
            session.access_token = Uuid::new_v4().to_string();
            session.clone()
        };

        self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(session)
    }

    /// Broadcast an arbitrary auth change without touching the stored session
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) -> usize {
        self.events.emit(AuthStateChange::new(event, session))
    }

    /// Store a settings row directly
    pub fn put_row(&self, user_id: UserId, settings: UserSettings) {
        self.write().rows.insert(user_id, settings);
    }

    /// Read a settings row directly
    pub fn row(&self, user_id: &UserId) -> Option<UserSettings> {
        self.read().rows.get(user_id).cloned()
    }

    /// Make every call to `op` fail with `message` until cleared
    pub fn inject_fault(&self, op: Operation, message: impl Into<String>) {
        self.write().faults.insert(op, message.into());
    }

    pub fn clear_fault(&self, op: Operation) {
        self.write().faults.remove(&op);
    }

    /// Delay settings fetches for `user_id`
    pub fn set_fetch_delay(&self, user_id: UserId, delay: Duration) {
        self.write().fetch_delays.insert(user_id, delay);
    }

    /// How many times `op` has been called
    pub fn call_count(&self, op: Operation) -> usize {
        self.read().calls.get(&op).copied().unwrap_or(0)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn get_session(&self) -> BackendResult<Option<Session>> {
        let mut state = self.write();
        state.enter(Operation::GetSession)?;
        Ok(state.session.clone())
    }

    fn auth_changes(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn get_user(&self) -> BackendResult<Option<User>> {
        let mut state = self.write();
        state.enter(Operation::GetUser)?;
        Ok(state.session.as_ref().map(|session| session.user.clone()))
    }

    async fn fetch_settings_row(&self, user_id: &UserId) -> BackendResult<Option<SettingsRow>> {
        let delay = {
            let mut state = self.write();
            state.enter(Operation::FetchSettings)?;
            state.fetch_delays.get(user_id).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self.read().rows.get(user_id).map(|settings| SettingsRow {
            user_id: user_id.clone(),
            settings: settings.clone(),
        }))
    }

    async fn upsert_settings_row(&self, upsert: SettingsUpsert) -> BackendResult<()> {
        let mut state = self.write();
        state.enter(Operation::UpsertSettings)?;

        // Merge-on-conflict: untouched columns keep their stored or default value
        let row = state
            .rows
            .entry(upsert.user_id)
            .or_insert_with(UserSettings::defaults);
        row.apply(&upsert.patch);
        Ok(())
    }
}
