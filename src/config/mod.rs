//! Configuration module
//!
//! Engine options come from a config file (YAML or JSON), then environment
//! variables, then explicit builder calls, later sources winning.

mod env;
mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::EngineError;
use crate::models::Descriptor;
use crate::utils::{init_logger, LogLevel};

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker pool width
    pub workers: usize,

    /// Timeout for units that declare none
    pub default_timeout_ms: Option<u64>,

    /// Replaces every descriptor's retry limit when set
    pub retry_override: Option<u32>,

    /// Category tag -> enabled
    pub categories: BTreeMap<String, bool>,

    /// How long a timed-out body gets to observe cancellation
    pub hang_grace_ms: u64,

    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_timeout_ms: None,
            retry_override: None,
            categories: BTreeMap::new(),
            hang_grace_ms: 1000,
            log_level: LogLevel::Info,
        }
    }
}

/// Host parallelism hint, at least 1
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the discovered config file and the environment
    pub fn resolve() -> Result<Self> {
        let env = EnvConfig::load();
        let file = match env.config_file.as_deref() {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?,
        };

        let mut config = file.engine;
        config.apply_env(&env);
        config.validate()?;
        Ok(config)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_retry_override(mut self, retries: u32) -> Self {
        self.retry_override = Some(retries);
        self
    }

    pub fn with_category(mut self, tag: impl Into<String>, enabled: bool) -> Self {
        self.categories.insert(tag.into(), enabled);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_hang_grace(mut self, grace: Duration) -> Self {
        self.hang_grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    pub fn hang_grace(&self) -> Duration {
        Duration::from_millis(self.hang_grace_ms)
    }

    pub fn timeout_for(&self, descriptor: &Descriptor) -> Option<Duration> {
        descriptor.timeout.or_else(|| self.default_timeout())
    }

    pub fn retries_for(&self, descriptor: &Descriptor) -> u32 {
        self.retry_override.unwrap_or(descriptor.retry_limit)
    }

    /// Whether a unit with these tags takes part in the run
    ///
    /// A tag mapped to `false` excludes the unit. Once any tag is mapped to
    /// `true`, units must carry at least one enabled tag.
    pub fn is_included(&self, categories: &BTreeSet<String>) -> bool {
        if categories
            .iter()
            .any(|c| self.categories.get(c) == Some(&false))
        {
            return false;
        }

        let has_include_list = self.categories.values().any(|enabled| *enabled);
        !has_include_list
            || categories
                .iter()
                .any(|c| self.categories.get(c) == Some(&true))
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(workers) = env.workers {
            self.workers = workers;
        }
        if let Some(timeout) = env.timeout_ms {
            self.default_timeout_ms = Some(timeout);
        }
        if let Some(retries) = env.retries {
            self.retry_override = Some(retries);
        }
        if let Some(grace) = env.hang_grace_ms {
            self.hang_grace_ms = grace;
        }
        if let Some(level) = env.log_level {
            self.log_level = level;
        }
        for (tag, enabled) in &env.categories {
            self.categories.insert(tag.clone(), *enabled);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        if self.workers == 0 {
            return Err(EngineError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.default_timeout_ms == Some(0) {
            return Err(EngineError::InvalidConfig(
                "default_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Install the default subscriber at `log_level`; a no-op if one exists
    pub fn init_logging(&self) {
        init_logger(self.log_level);
    }
}
