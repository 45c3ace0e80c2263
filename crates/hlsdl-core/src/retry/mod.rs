//! Retry and backoff policy for playlist, key and segment fetches.
//!
//! Classifies fetch failures (timeouts, throttling, connection failures) and
//! makes capped exponential backoff decisions so the resolver, the key
//! prefetch and the worker pool share one consistent policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
