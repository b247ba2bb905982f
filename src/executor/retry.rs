use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(2);

/// Retry a fallible async operation until it succeeds or `window` elapses.
///
/// Delays double from 100ms up to 2s. The last error is returned once the
/// next attempt would start after the window closes.
pub async fn retry_for<F, Fut, T, E>(window: Duration, operation_name: &str, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let deadline = Instant::now() + window;
    let mut delay = BASE_DELAY;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let now = Instant::now();
                if now + delay > deadline {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt,
                        window_ms = window.as_millis() as u64,
                        error = %e,
                        "Retry window exhausted"
                    );
                    return Err(e);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<u32, String> = retry_for(Duration::from_secs(5), "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {}", n))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn returns_last_error_when_window_closes() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), String> =
            retry_for(Duration::from_millis(250), "test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {}", n))
            })
            .await;
        // 100ms + 200ms of backoff would overshoot 250ms, so two attempts.
        assert_eq!(result, Err("attempt 2".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_window_tries_once() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: Result<(), &str> = retry_for(Duration::ZERO, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
