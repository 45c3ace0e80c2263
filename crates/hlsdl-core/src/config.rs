use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/hlsdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsdlConfig {
    /// Number of concurrent segment fetch workers.
    pub workers: usize,
    /// Pause after each finished segment, per worker, in milliseconds.
    pub worker_delay_ms: u64,
    /// How long the assembler waits for a completion signal before re-checking, in milliseconds.
    pub merge_poll_ms: u64,
    /// Bytes dropped from the start of every staged segment before it is appended.
    #[serde(default)]
    pub strip_leading_bytes: usize,
    /// Bytes dropped from the end of every staged segment before it is appended.
    #[serde(default)]
    pub strip_trailing_bytes: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Where finished files go (default: XDG data dir).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Root of per-download staging directories (default: XDG cache dir).
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// User-Agent sent with every request.
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Connect timeout for every request, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Extra request headers (e.g. Referer, Cookie).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for HlsdlConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            worker_delay_ms: 20,
            merge_poll_ms: 1000,
            strip_leading_bytes: 0,
            strip_trailing_bytes: 0,
            retry: None,
            output_dir: None,
            staging_dir: None,
            user_agent: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            headers: HashMap::new(),
        }
    }
}

impl HlsdlConfig {
    pub fn worker_delay(&self) -> Duration {
        Duration::from_millis(self.worker_delay_ms)
    }

    pub fn merge_poll(&self) -> Duration {
        Duration::from_millis(self.merge_poll_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Output directory: configured value or `~/.local/share/hlsdl/downloads`.
    pub fn resolved_output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsdl")?;
        Ok(xdg_dirs.get_data_home().join("downloads"))
    }

    /// Staging root: configured value or `~/.cache/hlsdl/staging`.
    pub fn resolved_staging_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.staging_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsdl")?;
        Ok(xdg_dirs.get_cache_home().join("staging"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HlsdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HlsdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HlsdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = HlsdlConfig::default();
        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.worker_delay(), Duration::from_millis(20));
        assert_eq!(cfg.merge_poll(), Duration::from_secs(1));
        assert_eq!(cfg.strip_leading_bytes, 0);
        assert_eq!(cfg.strip_trailing_bytes, 0);
        assert_eq!(cfg.connect_timeout_secs, 30);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = HlsdlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: HlsdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.workers, cfg.workers);
        assert_eq!(parsed.worker_delay_ms, cfg.worker_delay_ms);
        assert_eq!(parsed.merge_poll_ms, cfg.merge_poll_ms);
    }

    #[test]
    fn config_toml_minimal_uses_defaults() {
        let toml = r#"
            workers = 4
            worker_delay_ms = 0
            merge_poll_ms = 250
        "#;
        let cfg: HlsdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.merge_poll(), Duration::from_millis(250));
        assert!(cfg.retry.is_none());
        assert!(cfg.output_dir.is_none());
        assert!(cfg.headers.is_empty());
        assert_eq!(cfg.connect_timeout_secs, 30);
        assert_eq!(cfg.retry_config().max_attempts, 5);
    }

    #[test]
    fn config_toml_full() {
        let toml = r#"
            workers = 16
            worker_delay_ms = 5
            merge_poll_ms = 500
            strip_leading_bytes = 4
            strip_trailing_bytes = 2
            output_dir = "/srv/media"
            staging_dir = "/tmp/hlsdl"
            user_agent = "hlsdl/0.1"

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15

            [headers]
            Referer = "https://player.example/"
        "#;
        let cfg: HlsdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.strip_leading_bytes, 4);
        assert_eq!(cfg.strip_trailing_bytes, 2);
        assert_eq!(
            cfg.resolved_output_dir().unwrap(),
            PathBuf::from("/srv/media")
        );
        assert_eq!(
            cfg.resolved_staging_dir().unwrap(),
            PathBuf::from("/tmp/hlsdl")
        );
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 15);
        assert_eq!(
            cfg.headers.get("Referer").map(String::as_str),
            Some("https://player.example/")
        );
    }
}
