//! Test fixtures for creating common test objects

use std::sync::Arc;

use crate::backend::MemoryBackend;
use crate::identity::IdentityStore;
use crate::model::{Session, User, UserId, UserSettings};
use crate::settings::{ReloadPolicy, SettingsStore};

/// Password used for every fixture account
pub const PASSWORD: &str = "correct horse battery staple";

/// Register `<id>` with email `<id>@example.com` and [`PASSWORD`]
pub fn registered_user(backend: &MemoryBackend, id: &str) -> User {
    let user = User::new(id).with_email(format!("{}@example.com", id));
    backend.register(user.clone(), PASSWORD);
    user
}

/// Sign in a fixture account by id
pub fn sign_in(backend: &MemoryBackend, id: &str) -> Session {
    backend
        .sign_in_with_password(&format!("{}@example.com", id), PASSWORD)
        .expect("fixture account should sign in")
}

/// A session wrapping `user` with a throwaway token
pub fn session_for(user: User) -> Session {
    Session::new(format!("token-{}", user.id), user)
}

/// Store a row with only `task_age_days` set
pub fn put_days(backend: &MemoryBackend, id: &str, days: u32) {
    backend.put_row(UserId::new(id), UserSettings::defaults().with_task_age_days(days));
}

/// Connect an identity store and attach a settings store to it
pub async fn connect_stores(
    backend: &Arc<MemoryBackend>,
    policy: ReloadPolicy,
) -> (IdentityStore, SettingsStore) {
    let identity = IdentityStore::connect(backend.clone()).await;
    let settings = SettingsStore::attach(identity.store(), backend.clone(), policy)
        .expect("tests run inside a tokio runtime");
    (identity, settings)
}
