//! Polling waits with a single bounded timeout
//!
//! There is no retry policy anywhere in the harness: a condition gets one
//! budget and either becomes true inside it or the wait fails.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::error::{E2eError, E2eResult};

/// Interval between condition checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Re-evaluate `check` until it yields `true` or `timeout` elapses.
///
/// Driver errors raised by `check` abort the wait immediately. The
/// condition is always checked at least once, even with a zero timeout.
pub async fn poll_until<F, Fut>(what: &str, timeout: Duration, mut check: F) -> E2eResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(E2eError::timeout(what, timeout));
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Like [`poll_until`] but the check produces a value once ready
pub async fn poll_for<T, F, Fut>(what: &str, timeout: Duration, mut check: F) -> E2eResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(E2eError::timeout(what, timeout));
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_resolves_once_condition_holds() {
        let calls = &AtomicUsize::new(0);
        poll_until("third call", Duration::from_secs(5), move || async move {
            Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_after_timeout() {
        let start = Instant::now();
        let err = poll_until("never", Duration::from_secs(5), || async { Ok(false) })
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_checks_once() {
        let calls = &AtomicUsize::new(0);
        let result = poll_until("once", Duration::ZERO, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_abort_the_wait() {
        let err = poll_until("broken", Duration::from_secs(5), || async {
            Err(E2eError::Driver("page crashed".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, E2eError::Driver(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_for_returns_value() {
        let calls = &AtomicUsize::new(0);
        let value = poll_for("value", Duration::from_secs(1), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 1 { Some(n * 10) } else { None })
        })
        .await
        .unwrap();
        assert_eq!(value, 10);
    }
}
