//! Identity store
//!
//! Holds the currently authenticated [`User`], or `None` when signed out.
//!
//! The value has exactly two writers:
//! - [`IdentityStore::initialize`], a one-shot session fetch at startup
//! - the auth change pump started by [`IdentityStore::connect`], which
//!   applies every backend auth change through [`IdentityStore::on_change`]
//!
//! Failing to read the session is not an error: it degrades to "signed out".

use metrics::counter;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::{AuthEvent, AuthStateChange, BackendClient};
use crate::model::{Session, User};
use crate::store::{Store, Subscription};

/// Observable current-user cell backed by the remote auth service
pub struct IdentityStore {
    cell: Store<Option<User>>,
    backend: Arc<dyn BackendClient>,
    pump: Option<JoinHandle<()>>,
}

impl IdentityStore {
    /// Create a signed-out store that is not yet listening for auth changes
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            cell: Store::new(None),
            backend,
            pump: None,
        }
    }

    /// Create a store, start following auth changes and load the session
    ///
    /// The auth change subscription is taken before the session fetch so no
    /// change emitted in between is missed.
    pub async fn connect(backend: Arc<dyn BackendClient>) -> Self {
        let mut store = Self::new(Arc::clone(&backend));
        let changes = backend.auth_changes();
        store.pump = Some(tokio::spawn(run_auth_pump(store.cell.clone(), changes)));
        store.initialize().await;
        store
    }

    /// Fetch the current session once and publish its user
    pub async fn initialize(&self) {
        let user = match self.backend.get_session().await {
            Ok(session) => session.map(|session| session.user),
            Err(err) => {
                warn!(error = %err, "failed to fetch initial session; treating as signed out");
                None
            }
        };

        debug!(user_id = ?user.as_ref().map(|u| &u.id), "identity initialized");
        self.cell.set(user);
    }

    /// Apply one auth state change
    ///
    /// Always overwrites the current value: the session's user if there is
    /// one, `None` otherwise.
    pub fn on_change(&self, event: AuthEvent, session: Option<&Session>) {
        apply_change(&self.cell, event, session);
    }

    /// Current user, if signed in
    pub fn get(&self) -> Option<User> {
        self.cell.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Observe identity changes; see [`Store::subscribe`]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Option<User>) + Send + Sync + 'static,
    {
        self.cell.subscribe(listener)
    }

    /// The underlying observable cell
    pub fn store(&self) -> &Store<Option<User>> {
        &self.cell
    }
}

impl Drop for IdentityStore {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

fn apply_change(cell: &Store<Option<User>>, event: AuthEvent, session: Option<&Session>) {
    let user = session.map(|session| session.user.clone());
    debug!(?event, user_id = ?user.as_ref().map(|u| &u.id), "auth state changed");
    counter!("tasksync_auth_changes_total").increment(1);
    cell.set(user);
}

async fn run_auth_pump(cell: Store<Option<User>>, mut changes: broadcast::Receiver<AuthStateChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => apply_change(&cell, change.event, change.session.as_ref()),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "auth change stream lagged; some transitions were skipped");
                counter!("tasksync_auth_changes_lagged_total").increment(skipped);
            }
            Err(RecvError::Closed) => {
                debug!("auth change stream closed");
                break;
            }
        }
    }
}
