//! libcurl-backed transport: one Easy handle per request.

use std::collections::HashMap;
use std::time::Duration;

use super::Transport;
use crate::config::HlsdlConfig;
use crate::retry::FetchError;

/// Per-request curl settings.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort when throughput stays under 1 KiB/s for this long.
    pub low_speed_time: Duration,
    /// Hard cap for a single transfer.
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
            timeout: Duration::from_secs(600),
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

impl From<&HlsdlConfig> for CurlOptions {
    fn from(cfg: &HlsdlConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            user_agent: cfg.user_agent.clone(),
            headers: cfg.headers.clone(),
            ..Self::default()
        }
    }
}

/// HTTP(S) GET through libcurl.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    opts: CurlOptions,
}

impl CurlTransport {
    pub fn new(opts: CurlOptions) -> Self {
        Self { opts }
    }

    fn configure(&self, easy: &mut curl::easy::Easy, uri: &str) -> Result<(), curl::Error> {
        easy.url(uri)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.opts.connect_timeout)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(self.opts.low_speed_time)?;
        easy.timeout(self.opts.timeout)?;
        if let Some(ua) = &self.opts.user_agent {
            easy.useragent(ua)?;
        }
        if !self.opts.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.opts.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl Transport for CurlTransport {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        if !is_http(uri) {
            return Err(FetchError::InvalidUri(uri.to_string()));
        }
        let mut body = Vec::new();
        let mut easy = curl::easy::Easy::new();
        self.configure(&mut easy, uri)?;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        if !(200..300).contains(&status) {
            return Err(FetchError::Http {
                url: uri.to_string(),
                status,
            });
        }
        tracing::trace!(uri, bytes = body.len(), "fetched");
        Ok(body)
    }
}

fn is_http(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
