//! Test utilities and helpers for tasksync
//!
//! Fixtures for users, sessions and backends, plus async helpers for
//! waiting on store values with a timeout.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
