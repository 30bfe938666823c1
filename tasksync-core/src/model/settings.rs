//! Per-user settings
//!
//! `UserSettings` is always complete: it starts from [`UserSettings::defaults`]
//! and only ever changes by shallow-merging a [`UserSettingsPatch`] onto it.
//! A stored row that lacks a known column is completed with that column's
//! default while decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::user::UserId;

/// Default age threshold, in days, after which a task counts as old
pub const DEFAULT_TASK_AGE_DAYS: u32 = 3;

/// Column names of the `user_settings` table
pub struct SettingsFields;

impl SettingsFields {
    pub const USER_ID: &'static str = "user_id";
    pub const TASK_AGE_DAYS: &'static str = "task_age_days";

    /// Whether `key` names a typed column rather than an extension field
    pub fn is_reserved(key: &str) -> bool {
        key == Self::USER_ID || key == Self::TASK_AGE_DAYS
    }
}

fn default_task_age_days() -> u32 {
    DEFAULT_TASK_AGE_DAYS
}

/// Complete user preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Tasks older than this many days are considered old
    #[serde(default = "default_task_age_days")]
    pub task_age_days: u32,

    /// Additional setting-name to value entries
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserSettings {
    /// The fallback settings: `{ task_age_days: 3 }`
    pub fn defaults() -> Self {
        Self {
            task_age_days: DEFAULT_TASK_AGE_DAYS,
            extra: Map::new(),
        }
    }

    pub fn with_task_age_days(mut self, days: u32) -> Self {
        self.task_age_days = days;
        self
    }

    /// Look up an extension field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Shallow-merge `patch` onto these settings in place
    ///
    /// Only keys present in the patch are overwritten. Extension keys that
    /// collide with a typed column are ignored.
    pub fn apply(&mut self, patch: &UserSettingsPatch) {
        if let Some(days) = patch.task_age_days {
            self.task_age_days = days;
        }
        for (key, value) in &patch.extra {
            if SettingsFields::is_reserved(key) {
                continue;
            }
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Return a copy of these settings with `patch` merged on top
    pub fn merged(&self, patch: &UserSettingsPatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

impl Default for UserSettings {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Partial settings; absent fields are left untouched when applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_age_days: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserSettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_age_days(mut self, days: u32) -> Self {
        self.task_age_days = Some(days);
        self
    }

    /// Set an extension field
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.task_age_days.is_none() && self.extra.is_empty()
    }
}

/// A stored `user_settings` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub user_id: UserId,

    #[serde(flatten)]
    pub settings: UserSettings,
}

/// Body of an upsert: the owning user plus the changed columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpsert {
    pub user_id: UserId,

    #[serde(flatten)]
    pub patch: UserSettingsPatch,
}

impl SettingsUpsert {
    pub fn new(user_id: UserId, patch: UserSettingsPatch) -> Self {
        Self { user_id, patch }
    }
}
