use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::orchestrator::Timeouts;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub profile_api_url: String,
    /// Session store backend. In-memory when unset.
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub scan_timeout_ms: u64,
    pub fill_timeout_ms: u64,
    pub network_timeout_secs: u64,
    pub profile_cache_ttl_secs: u64,
    /// Tabs unused for this long are dropped.
    pub tab_idle_secs: u64,
    pub max_tabs: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            profile_api_url: require_env("PROFILE_API_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            scan_timeout_ms: env_or("SCAN_TIMEOUT_MS", 5_000)?,
            fill_timeout_ms: env_or("FILL_TIMEOUT_MS", 5_000)?,
            network_timeout_secs: env_or("NETWORK_TIMEOUT_SECS", 10)?,
            profile_cache_ttl_secs: env_or("PROFILE_CACHE_TTL_SECS", 900)?,
            tab_idle_secs: env_or("TAB_IDLE_SECS", 30 * 60)?,
            max_tabs: env_or("MAX_TABS", 64)?,
        })
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn tab_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.tab_idle_secs)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            scan: Duration::from_millis(self.scan_timeout_ms),
            fill: Duration::from_millis(self.fill_timeout_ms),
            network: self.network_timeout(),
            profile_ttl: Duration::from_secs(self.profile_cache_ttl_secs),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}
