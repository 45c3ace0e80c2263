//! Retry loop: run a fetch until success or policy says stop.

use super::classify;
use super::error::FetchError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs `f` until it succeeds or the retry policy says to stop.
/// On retryable failure, sleeps for the backoff duration then tries again.
/// `what` names the resource in log lines.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, what: &str, mut f: F) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = d.as_millis() as u64,
                            "fetch {} failed: {}; retrying",
                            what,
                            e
                        );
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn retries_connection_errors_until_success() {
        let mut calls = 0;
        let out = run_with_retry(&fast_policy(5), "seg", || {
            calls += 1;
            if calls < 3 {
                Err(FetchError::Transport("reset".into()))
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(out, 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let res: Result<(), _> = run_with_retry(&fast_policy(3), "seg", || {
            calls += 1;
            Err(FetchError::Transport("reset".into()))
        });
        assert!(res.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn does_not_retry_not_found() {
        let mut calls = 0;
        let res: Result<(), _> = run_with_retry(&fast_policy(5), "seg", || {
            calls += 1;
            Err(FetchError::Http {
                url: "u".into(),
                status: 404,
            })
        });
        assert!(matches!(res, Err(FetchError::Http { status: 404, .. })));
        assert_eq!(calls, 1);
    }
}
