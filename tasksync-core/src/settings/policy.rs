//! Resolution of overlapping settings reloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// What to do when reloads for successive identities complete out of order
///
/// Every identity change starts its own fetch, so a slow fetch for an older
/// identity can finish after the fetch for a newer one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadPolicy {
    /// Each completion is committed as it arrives; a stale fetch can
    /// overwrite the settings of a newer identity.
    LastCompletionWins,

    /// Completions are tagged with the identity change that started them
    /// and dropped if a newer change has happened since.
    #[default]
    LatestIdentityWins,
}

impl ReloadPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadPolicy::LastCompletionWins => "last-completion-wins",
            ReloadPolicy::LatestIdentityWins => "latest-identity-wins",
        }
    }

    /// Whether stale completions are discarded
    pub fn drops_stale(&self) -> bool {
        matches!(self, ReloadPolicy::LatestIdentityWins)
    }
}

impl fmt::Display for ReloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReloadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "last-completion-wins" => Ok(ReloadPolicy::LastCompletionWins),
            "latest-identity-wins" => Ok(ReloadPolicy::LatestIdentityWins),
            other => Err(ConfigError::InvalidValue(format!(
                "Invalid reload policy: {}",
                other
            ))),
        }
    }
}
