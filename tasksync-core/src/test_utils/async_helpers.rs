//! Async test helpers
//!
//! Utilities for testing asynchronous code: timeouts and waiting for a
//! store to reach a value.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    Elapsed,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Run a future with a timeout, returning Ok(result) or Err on timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed)
}

/// Wait until `store` holds a value matching `predicate`
///
/// Checks the current value first, then every subsequent write. Returns the
/// first matching value.
pub async fn wait_for_value<T, P>(
    store: &Store<T>,
    predicate: P,
    duration: Duration,
) -> Result<T, TimeoutError>
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&T) -> bool,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _subscription = store.subscribe(move |value: &T| {
        let _ = tx.send(value.clone());
    });

    let found = with_timeout(duration, async move {
        while let Some(value) = rx.recv().await {
            if predicate(&value) {
                return Some(value);
            }
        }
        None
    })
    .await?;

    found.ok_or(TimeoutError::Elapsed)
}

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that should fail fast (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_elapsed() {
        let result = with_timeout(SHORT_TEST_TIMEOUT, std::future::pending::<()>()).await;
        assert_eq!(result.unwrap_err(), TimeoutError::Elapsed);
    }

    #[tokio::test]
    async fn test_wait_for_current_value() {
        let store = Store::new(5);
        let value = wait_for_value(&store, |v| *v == 5, SHORT_TEST_TIMEOUT).await;
        assert_eq!(value.unwrap(), 5);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_later_value() {
        let store = Store::new(0);
        let writer = store.clone();
        tokio::spawn(async move {
            for i in 1..=3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                writer.set(i);
            }
        });

        let value = wait_for_value(&store, |v| *v == 3, DEFAULT_TEST_TIMEOUT).await;
        assert_eq!(value.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let store = Store::new(0);
        let result = wait_for_value(&store, |v| *v == 1, SHORT_TEST_TIMEOUT).await;
        assert_eq!(result.unwrap_err(), TimeoutError::Elapsed);
    }
}
