//! Data model shared by the stores and the backends

mod settings;
mod task;
mod user;

pub use settings::{
    SettingsFields, SettingsRow, SettingsUpsert, UserSettings, UserSettingsPatch,
    DEFAULT_TASK_AGE_DAYS,
};
pub use task::Task;
pub use user::{Session, User, UserId};
