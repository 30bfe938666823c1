//! Task rows and the age rule driven by `task_age_days`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::settings::UserSettings;
use super::user::UserId;

/// A task as stored in the `tasks` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub archived: Option<bool>,
}

impl Task {
    /// Whole days elapsed since the task was created
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether the task has reached the user's age threshold
    pub fn is_older_than(&self, settings: &UserSettings, now: DateTime<Utc>) -> bool {
        self.age_days(now) >= i64::from(settings.task_age_days)
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_archived(&self) -> bool {
        self.archived.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn task_created(created_at: DateTime<Utc>) -> Task {
        Task {
            id: "t1".to_string(),
            content: "water the plants".to_string(),
            created_at,
            completed_at: None,
            user_id: None,
            archived: None,
        }
    }

    #[test]
    fn test_age_threshold() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let settings = UserSettings::defaults();

        let fresh = task_created(now - Duration::days(2));
        assert_eq!(fresh.age_days(now), 2);
        assert!(!fresh.is_older_than(&settings, now));

        let old = task_created(now - Duration::days(3));
        assert!(old.is_older_than(&settings, now));
        assert!(!old.is_older_than(&settings.with_task_age_days(7), now));
    }

    #[test]
    fn test_parse_row_with_nulls() {
        let task: Task = serde_json::from_value(json!({
            "id": "t9",
            "content": "ship it",
            "created_at": "2024-05-01T08:00:00Z",
            "completed_at": null,
            "user_id": null,
            "archived": null
        }))
        .unwrap();

        assert!(!task.is_completed());
        assert!(!task.is_archived());
        assert!(task.user_id.is_none());
    }
}
