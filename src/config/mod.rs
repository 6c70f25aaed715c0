// src/config/mod.rs
//! Service configuration: TOML file + environment overrides.
//!
//! Lookup order for the file:
//! 1) $FEED_CONFIG_PATH (must exist when set)
//! 2) config/feed.toml
//! 3) built-in defaults
//!
//! Single values can then be overridden with `FEED_*` env vars.

pub mod summarizer;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::upstream::transport::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use summarizer::SummarizerConfig;

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

fn default_max_requests() -> usize {
    50
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_timeout_ms() -> u64 {
    15_000
}
fn default_fallback_source() -> String {
    "data".to_string()
}
fn default_limit() -> i64 {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_fallback_source")]
    pub fallback_source: String,
    #[serde(default = "default_limit")]
    pub default_limit: i64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            fallback_source: default_fallback_source(),
            default_limit: default_limit(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// File lookup (env path, then default path, then defaults) + env overrides.
    pub fn load() -> Result<Self> {
        let cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        Ok(cfg.with_env_overrides()?.sanitized())
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parse::<usize>("FEED_RATE_MAX_REQUESTS")? {
            self.rate_limit.max_requests = v;
        }
        if let Some(v) = env_parse::<u64>("FEED_RATE_WINDOW_MS")? {
            self.rate_limit.window_ms = v;
        }
        if let Some(v) = env_parse::<u64>("FEED_UPSTREAM_TIMEOUT_MS")? {
            self.upstream.timeout_ms = v;
        }
        if let Ok(v) = std::env::var("FEED_FALLBACK_SOURCE") {
            self.upstream.fallback_source = v;
        }
        if let Ok(v) = std::env::var("FEED_SUMMARY_DB_PATH") {
            self.summarizer.db_path = v;
        }
        Ok(self)
    }

    /// Replace zero/empty values with defaults.
    fn sanitized(mut self) -> Self {
        if self.rate_limit.max_requests == 0 {
            self.rate_limit.max_requests = default_max_requests();
        }
        if self.rate_limit.window_ms == 0 {
            self.rate_limit.window_ms = default_window_ms();
        }
        if self.upstream.timeout_ms == 0 {
            self.upstream.timeout_ms = default_timeout_ms();
        }
        if self.upstream.default_limit <= 0 {
            self.upstream.default_limit = default_limit();
        }
        if self.upstream.fallback_source.trim().is_empty() {
            self.upstream.fallback_source = default_fallback_source();
        }
        self.summarizer = self.summarizer.resolve();
        self
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("{key}={raw:?}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn partial_toml_fills_defaults_and_sanitizes_zeroes() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 0
            [upstream]
            fallback_source = "rust"
            "#,
        )
        .unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.rate_limit.max_requests, 50);
        assert_eq!(cfg.rate_limit.window_ms, 60_000);
        assert_eq!(cfg.upstream.fallback_source, "rust");
        assert_eq!(cfg.upstream.timeout_ms, 15_000);
        assert_eq!(cfg.upstream.default_limit, 12);
        assert_eq!(cfg.summarizer.model, "gpt-3.5-turbo");
    }

    #[serial_test::serial]
    #[test]
    fn env_path_then_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("feed.toml");
        fs::write(&p, "[rate_limit]\nmax_requests = 7\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var("FEED_RATE_WINDOW_MS", "1234");
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.rate_limit.max_requests, 7);
        assert_eq!(cfg.rate_limit.window_ms, 1234);

        env::set_var("FEED_RATE_WINDOW_MS", "soon");
        assert!(AppConfig::load().is_err());
        env::remove_var("FEED_RATE_WINDOW_MS");

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AppConfig::load().is_err());
        env::remove_var(ENV_CONFIG_PATH);
    }
}
