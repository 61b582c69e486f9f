use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::validation::BirthDateRule;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub storage_dir: PathBuf,
    pub http_timeout_secs: u64,

    pub poll_attempts: u32,
    pub poll_interval_ms: u64,

    pub carousel_breakpoint_px: u32,
    pub carousel_settle_ms: u64,

    pub birth_date_rule: BirthDateRule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".into(),
            storage_dir: default_storage_dir(),
            http_timeout_secs: 30,
            poll_attempts: 6,
            poll_interval_ms: 2000,
            carousel_breakpoint_px: 1024,
            carousel_settle_ms: 200,
            birth_date_rule: BirthDateRule::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env::var("MT_API_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.api_base_url),
            storage_dir: env::var("MT_STORAGE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            http_timeout_secs: parse_or("MT_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs),

            poll_attempts: parse_or("MT_POLL_ATTEMPTS", defaults.poll_attempts),
            poll_interval_ms: parse_or("MT_POLL_INTERVAL_MS", defaults.poll_interval_ms),

            carousel_breakpoint_px: parse_or(
                "MT_CAROUSEL_BREAKPOINT_PX",
                defaults.carousel_breakpoint_px,
            ),
            carousel_settle_ms: parse_or("MT_CAROUSEL_SETTLE_MS", defaults.carousel_settle_ms),

            birth_date_rule: parse_or("MT_BIRTH_DATE_RULE", defaults.birth_date_rule),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn carousel_settle_delay(&self) -> Duration {
        Duration::from_millis(self.carousel_settle_ms)
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mindtracking")
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Invalid configuration value, using default");
                default
            }
        },
        _ => default,
    }
}
