//! In-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::retry::FetchError;
use crate::transport::Transport;

#[derive(Clone, Default)]
struct Route {
    body: Vec<u8>,
    delay: Duration,
    /// Permanent HTTP failure.
    status: Option<u32>,
    /// Connection failures returned before the body is served.
    transient_failures: usize,
}

/// Serves fixed bodies by exact URI. Unknown URIs answer HTTP 404.
/// Clones share routes and fetch counters.
#[derive(Clone, Default)]
pub(crate) struct MapTransport {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl MapTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn route(self, uri: &str, route: Route) -> Self {
        self.routes.lock().unwrap().insert(uri.to_string(), route);
        self
    }

    pub(crate) fn with(self, uri: &str, body: impl AsRef<[u8]>) -> Self {
        self.with_delay(uri, body, Duration::ZERO)
    }

    pub(crate) fn with_delay(self, uri: &str, body: impl AsRef<[u8]>, delay: Duration) -> Self {
        let route = Route {
            body: body.as_ref().to_vec(),
            delay,
            ..Route::default()
        };
        self.route(uri, route)
    }

    pub(crate) fn with_status(self, uri: &str, status: u32) -> Self {
        let route = Route {
            status: Some(status),
            ..Route::default()
        };
        self.route(uri, route)
    }

    pub(crate) fn with_transient_failures(
        self,
        uri: &str,
        body: impl AsRef<[u8]>,
        n: usize,
    ) -> Self {
        let route = Route {
            body: body.as_ref().to_vec(),
            transient_failures: n,
            ..Route::default()
        };
        self.route(uri, route)
    }

    pub(crate) fn fetch_count(&self, uri: &str) -> usize {
        self.counts.lock().unwrap().get(uri).copied().unwrap_or(0)
    }
}

impl Transport for MapTransport {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let attempt = {
            let mut counts = self.counts.lock().unwrap();
            let c = counts.entry(uri.to_string()).or_insert(0);
            *c += 1;
            *c
        };
        let route = self.routes.lock().unwrap().get(uri).cloned();
        let route = match route {
            Some(r) => r,
            None => {
                return Err(FetchError::Http {
                    url: uri.to_string(),
                    status: 404,
                })
            }
        };
        if !route.delay.is_zero() {
            std::thread::sleep(route.delay);
        }
        if let Some(status) = route.status {
            return Err(FetchError::Http {
                url: uri.to_string(),
                status,
            });
        }
        if attempt <= route.transient_failures {
            return Err(FetchError::Transport(format!("connection reset ({})", uri)));
        }
        Ok(route.body)
    }
}
