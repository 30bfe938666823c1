//! Metric descriptions
//!
//! Counters are recorded through the `metrics` facade; without an installed
//! recorder they are no-ops.

use ::metrics::describe_counter;

/// Register descriptions for every metric the sync layer records
pub fn init_metrics() {
    // Identity
    describe_counter!("tasksync_auth_changes_total", "Auth state changes applied to the identity store");
    describe_counter!("tasksync_auth_changes_lagged_total", "Auth state changes skipped because the pump lagged");

    // Settings reloads
    describe_counter!("tasksync_settings_reloads_total", "Settings fetches started by identity changes");
    describe_counter!("tasksync_settings_reload_failures_total", "Settings fetches that failed and fell back to defaults");
    describe_counter!("tasksync_settings_stale_loads_total", "Settings fetches dropped because a newer identity change superseded them");

    // Settings updates
    describe_counter!("tasksync_settings_updates_total", "Settings updates accepted by the backend");
    describe_counter!("tasksync_settings_update_failures_total", "Settings updates rejected by the backend");
}
