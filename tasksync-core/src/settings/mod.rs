//! Settings store
//!
//! Holds the current [`UserSettings`] and keeps it in step with the identity
//! store:
//! - signed out: reset to [`UserSettings::defaults`] synchronously
//! - signed in: fetch the user's row in a spawned task; a row replaces the
//!   value, a missing row or a failed fetch falls back to the defaults
//!
//! While a fetch is pending the previous value stays visible. Reads never
//! fail past this boundary.
//!
//! Writes go through [`SettingsStore::update_settings`], which upserts the
//! change remotely first and only merges it into the local value once the
//! backend has accepted it. A failed write leaves the local value untouched
//! and is returned to the caller.

mod policy;

pub use policy::ReloadPolicy;

use metrics::counter;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::backend::BackendClient;
use crate::config::SyncConfig;
use crate::errors::{SyncError, SyncResult};
use crate::identity::IdentityStore;
use crate::model::{SettingsUpsert, User, UserId, UserSettings, UserSettingsPatch};
use crate::store::{Store, Subscription};

/// Decrements the in-flight reload count when dropped
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn start(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Reaction to identity changes, shared with the spawned reload tasks
#[derive(Clone)]
struct Reloader {
    cell: Store<UserSettings>,
    backend: Arc<dyn BackendClient>,
    policy: ReloadPolicy,
    /// Bumped on every identity change; reloads carry the value they started with
    generation: Arc<Mutex<u64>>,
    in_flight: Arc<watch::Sender<usize>>,
    runtime: Handle,
}

impl Reloader {
    fn on_identity_change(&self, user: Option<&User>) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation += 1;
        let ticket = *generation;

        match user {
            None => {
                debug!(ticket, "no user; settings reset to defaults");
                // Committed under the generation lock so no stale reload can land after it
                let pending = self.cell.commit(UserSettings::defaults());
                drop(generation);
                pending.notify();
            }
            Some(user) => {
                drop(generation);
                let in_flight = InFlight::start(&self.in_flight);
                let reloader = self.clone();
                let user_id = user.id.clone();
                self.runtime
                    .spawn(async move { reloader.reload(user_id, ticket, in_flight).await });
            }
        }
    }

    async fn reload(self, user_id: UserId, ticket: u64, _in_flight: InFlight) {
        debug!(%user_id, ticket, "loading settings");
        counter!("tasksync_settings_reloads_total").increment(1);

        let settings = match self.backend.fetch_settings_row(&user_id).await {
            Ok(Some(row)) => row.settings,
            Ok(None) => {
                debug!(%user_id, "no settings row; using defaults");
                UserSettings::defaults()
            }
            Err(err) => {
                error!(%user_id, error = %err, "failed to load settings; using defaults");
                counter!("tasksync_settings_reload_failures_total").increment(1);
                UserSettings::defaults()
            }
        };

        self.commit(ticket, settings);
    }

    fn commit(&self, ticket: u64, settings: UserSettings) {
        let generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if self.policy.drops_stale() && *generation != ticket {
            debug!(ticket, current = *generation, "dropping stale settings load");
            counter!("tasksync_settings_stale_loads_total").increment(1);
            return;
        }
        // Listeners run after the lock is released; they may change identity
        let pending = self.cell.commit(settings);
        drop(generation);
        pending.notify();
    }
}

/// Observable user settings, derived from an identity store
pub struct SettingsStore {
    reloader: Reloader,
    identity_subscription: Subscription,
}

impl SettingsStore {
    /// Attach a settings store to `identity`
    ///
    /// Must be called from within a Tokio runtime; reloads are spawned on it.
    pub fn new(
        identity: &IdentityStore,
        backend: Arc<dyn BackendClient>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        Self::attach(identity.store(), backend, config.reload_policy)
    }

    /// Attach a settings store to any identity cell
    ///
    /// The identity's current value is applied immediately: `None` resets
    /// to defaults, a user starts a reload.
    pub fn attach(
        identity: &Store<Option<User>>,
        backend: Arc<dyn BackendClient>,
        policy: ReloadPolicy,
    ) -> SyncResult<Self> {
        let runtime = Handle::try_current().map_err(|e| SyncError::NoRuntime(e.to_string()))?;
        let (in_flight, _) = watch::channel(0usize);

        let reloader = Reloader {
            cell: Store::new(UserSettings::defaults()),
            backend,
            policy,
            generation: Arc::new(Mutex::new(0)),
            in_flight: Arc::new(in_flight),
            runtime,
        };

        let reaction = reloader.clone();
        let identity_subscription =
            identity.subscribe(move |user: &Option<User>| reaction.on_identity_change(user.as_ref()));

        Ok(Self {
            reloader,
            identity_subscription,
        })
    }

    /// Current settings
    pub fn get(&self) -> UserSettings {
        self.reloader.cell.get()
    }

    /// Observe settings changes; see [`Store::subscribe`]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&UserSettings) + Send + Sync + 'static,
    {
        self.reloader.cell.subscribe(listener)
    }

    /// The underlying observable cell
    pub fn store(&self) -> &Store<UserSettings> {
        &self.reloader.cell
    }

    pub fn reload_policy(&self) -> ReloadPolicy {
        self.reloader.policy
    }

    /// Number of reloads started but not yet finished
    pub fn pending_reloads(&self) -> usize {
        *self.reloader.in_flight.borrow()
    }

    /// Wait until every reload started so far has finished
    pub async fn settled(&self) {
        let mut rx = self.reloader.in_flight.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    /// Persist a partial settings change for the current user
    ///
    /// Returns `Ok(None)` without touching anything when no user is signed
    /// in. On success the patch is shallow-merged into the local value and
    /// the merged settings are returned. On failure the error is logged and
    /// returned, and the local value is left exactly as it was.
    pub async fn update_settings(
        &self,
        patch: UserSettingsPatch,
    ) -> SyncResult<Option<UserSettings>> {
        let user = match self.reloader.backend.get_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("no authenticated user; settings update skipped");
                return Ok(None);
            }
            Err(err) => {
                warn!(error = %err, "could not resolve current user; settings update skipped");
                return Ok(None);
            }
        };

        let upsert = SettingsUpsert::new(user.id.clone(), patch.clone());
        if let Err(err) = self.reloader.backend.upsert_settings_row(upsert).await {
            error!(user_id = %user.id, error = %err, "failed to update settings");
            counter!("tasksync_settings_update_failures_total").increment(1);
            return Err(err.into());
        }

        let updated = self.reloader.cell.update(|current| current.merged(&patch));
        debug!(user_id = %user.id, task_age_days = updated.task_age_days, "settings updated");
        counter!("tasksync_settings_updates_total").increment(1);
        Ok(Some(updated))
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("value", &self.get())
            .field("policy", &self.reloader.policy)
            .field("pending_reloads", &self.pending_reloads())
            .field("identity_subscription", &self.identity_subscription)
            .finish()
    }
}
