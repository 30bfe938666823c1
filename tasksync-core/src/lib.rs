//! Reactive state sync for a task manager
//!
//! Two observable stores sit between the UI and a hosted auth + database
//! backend:
//!
//! - [`IdentityStore`] mirrors the authenticated user, seeded from the
//!   backend's session and updated on every auth state change
//! - [`SettingsStore`] derives the user's [`UserSettings`] from the identity
//!   store, reloading on sign-in and resetting to defaults on sign-out
//!
//! The backend is abstracted behind [`BackendClient`]; [`RestBackend`] talks
//! to a hosted instance over HTTP and [`MemoryBackend`] runs in process.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasksync_core::{Config, IdentityStore, RestBackend, SettingsStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let backend = Arc::new(RestBackend::new(&config.backend, config.sync.auth_event_capacity)?);
//! let identity = IdentityStore::connect(backend.clone()).await;
//! let settings = SettingsStore::new(&identity, backend, &config.sync)?;
//! println!("tasks archive after {} days", settings.get().task_age_days);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod settings;
pub mod store;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use backend::{BackendClient, BackendError, MemoryBackend, RestBackend};
pub use config::{Config, ConfigError};
pub use errors::{SyncError, SyncResult};
pub use identity::IdentityStore;
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use crate::metrics::init_metrics;
pub use model::{Session, User, UserId, UserSettings, UserSettingsPatch};
pub use settings::{ReloadPolicy, SettingsStore};
pub use store::{Store, Subscription};
