//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use crate::utils::LogLevel;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTRIG";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Worker pool width from TESTRIG_WORKERS
    pub workers: Option<usize>,
    /// Default timeout from TESTRIG_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// Retry override from TESTRIG_RETRIES
    pub retries: Option<u32>,
    /// Category switches from TESTRIG_CATEGORIES, e.g. `smoke,!slow`
    pub categories: Vec<(String, bool)>,
    /// Hang grace from TESTRIG_HANG_GRACE_MS
    pub hang_grace_ms: Option<u64>,
    /// Log level from TESTRIG_LOG
    pub log_level: Option<LogLevel>,
    /// Config file from TESTRIG_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            workers: get_env_parse("WORKERS"),
            timeout_ms: get_env_parse("TIMEOUT_MS"),
            retries: get_env_parse("RETRIES"),
            categories: get_env("CATEGORIES")
                .map(|v| parse_categories(&v))
                .unwrap_or_default(),
            hang_grace_ms: get_env_parse("HANG_GRACE_MS"),
            log_level: get_env("LOG").and_then(|v| LogLevel::parse(&v)),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.workers.is_some()
            || self.timeout_ms.is_some()
            || self.retries.is_some()
            || !self.categories.is_empty()
            || self.hang_grace_ms.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
    }
}

/// Parse `a,!b, c` into `[(a, true), (b, false), (c, true)]`
fn parse_categories(raw: &str) -> Vec<(String, bool)> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "!")
        .map(|s| match s.strip_prefix('!') {
            Some(tag) => (tag.trim().to_string(), false),
            None => (s.to_string(), true),
        })
        .collect()
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_WORKERS"), workers.to_string()));
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_TIMEOUT_MS"), timeout.to_string()));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_RETRIES"), retries.to_string()));
        self
    }

    pub fn categories(mut self, list: impl Into<String>) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_CATEGORIES"), list.into()));
        self
    }

    pub fn log(mut self, level: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_LOG"), level.into()));
        self
    }

    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_CONFIG"), path.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
