//! Balancer configuration.
//!
//! Every field has a serde default so partial YAML files work. The retry,
//! backoff and monitor values default to 5 attempts, 3 seconds and 5 seconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BalancerError, ConfigError};

/// Default number of attempts for a failing task (first run included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between attempts of a failing task.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 3_000;

/// Default pause between monitor passes.
pub const DEFAULT_MONITOR_INTERVAL_MS: u64 = 5_000;

/// Configuration for a [`Balancer`](crate::balancer::Balancer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// Workers kept alive at all times.
    #[serde(default = "default_min_workers")]
    pub min_workers: usize,

    /// Upper bound reached through scale-up.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Seconds a worker's queue must stay empty before the worker may exit.
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,

    /// Attempts per task before it is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,

    /// Scale up when pending tasks exceed `workers * scale_up_factor`.
    #[serde(default = "default_scale_up_factor")]
    pub scale_up_factor: usize,

    /// Pause after every other worker created at startup.
    #[serde(default = "default_startup_stagger_ms")]
    pub startup_stagger_ms: u64,
}

fn default_min_workers() -> usize {
    1
}

fn default_max_workers() -> usize {
    10
}

fn default_idle_threshold_secs() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_monitor_interval_ms() -> u64 {
    DEFAULT_MONITOR_INTERVAL_MS
}

fn default_scale_up_factor() -> usize {
    3
}

fn default_startup_stagger_ms() -> u64 {
    100
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            min_workers: default_min_workers(),
            max_workers: default_max_workers(),
            idle_threshold_secs: default_idle_threshold_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL_MS,
            scale_up_factor: default_scale_up_factor(),
            startup_stagger_ms: default_startup_stagger_ms(),
        }
    }
}

impl BalancerConfig {
    /// Creates a configuration with the given worker bounds and idle threshold.
    pub fn new(min_workers: usize, max_workers: usize, idle_threshold_secs: u64) -> Self {
        Self {
            min_workers,
            max_workers,
            idle_threshold_secs,
            ..Default::default()
        }
    }

    /// Sets the attempt cap.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Sets the monitor poll interval.
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Sets the scale-up pressure factor.
    pub fn with_scale_up_factor(mut self, factor: usize) -> Self {
        self.scale_up_factor = factor;
        self
    }

    /// Sets the startup stagger.
    pub fn with_startup_stagger(mut self, stagger: Duration) -> Self {
        self.startup_stagger_ms = stagger.as_millis() as u64;
        self
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    pub fn startup_stagger(&self) -> Duration {
        Duration::from_millis(self.startup_stagger_ms)
    }

    /// Checks worker bounds and tuning values.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers < 1 {
            return Err(ConfigError::MinWorkersTooLow(self.min_workers));
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        if self.max_attempts < 1 {
            return Err(ConfigError::NoAttempts(self.max_attempts));
        }
        if self.monitor_interval_ms == 0 {
            return Err(ConfigError::ZeroMonitorInterval);
        }
        if self.scale_up_factor < 1 {
            return Err(ConfigError::ScaleUpFactorTooLow(self.scale_up_factor));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, BalancerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| BalancerError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| BalancerError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;

        info!(path = %path.display(), "Loaded balancer config");
        Ok(config)
    }
}
