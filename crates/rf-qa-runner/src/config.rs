//! Runner configuration
//!
//! YAML file or string, with `RF_QA_WORKERS` / `RF_QA_DEADLINE_MS`
//! environment overrides on top.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `num_workers`
pub const ENV_WORKERS: &str = "RF_QA_WORKERS";
/// Environment variable overriding `deadline_ms`
pub const ENV_DEADLINE_MS: &str = "RF_QA_DEADLINE_MS";

/// Orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Worker threads for per-file sub-pipelines
    pub num_workers: usize,
    /// Wall-clock budget for one run; files not started by then are skipped
    pub deadline_ms: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().min(4),
            deadline_ms: None,
        }
    }
}

impl RunnerConfig {
    /// Parse from YAML
    ///
    /// # Errors
    ///
    /// Malformed YAML or invalid values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Unreadable file, malformed YAML or invalid values.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Apply `RF_QA_WORKERS` and `RF_QA_DEADLINE_MS` from the process environment
    ///
    /// # Errors
    ///
    /// Values that are not positive integers.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, CLI, tests)
    ///
    /// # Errors
    ///
    /// Values that are not positive integers.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_WORKERS) {
            self.num_workers = parse_positive(ENV_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEADLINE_MS) {
            self.deadline_ms = Some(parse_positive(ENV_DEADLINE_MS, &raw)?);
        }
        self.validate()?;
        Ok(self)
    }

    /// Deadline as a [`Duration`]
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Zero workers or a zero deadline.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::Config("num_workers must be at least 1".to_string()));
        }
        if self.deadline_ms == Some(0) {
            return Err(Error::Config("deadline_ms must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::default() => Ok(v),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
    }
}
