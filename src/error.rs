//! Error types for task-balancer operations.
//!
//! Defines the error types surfaced by the pool:
//! - Configuration validation at construction time
//! - Worker thread spawning
//! - Task execution failures (recovered internally by retry)

use std::path::PathBuf;

use thiserror::Error;

use crate::balancer::WorkerId;

/// Errors that can occur when validating a balancer configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("min_workers must be at least 1, got {0}")]
    MinWorkersTooLow(usize),

    #[error("min_workers ({min}) must not exceed max_workers ({max})")]
    MinExceedsMax { min: usize, max: usize },

    #[error("max_attempts must be at least 1, got {0}")]
    NoAttempts(u32),

    #[error("monitor_interval_ms must be greater than zero")]
    ZeroMonitorInterval,

    #[error("scale_up_factor must be at least 1, got {0}")]
    ScaleUpFactorTooLow(usize),
}

/// Errors that can occur while building or growing the pool.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Invalid worker bounds or tuning values. The pool is not created.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to start a worker or monitor thread.
    #[error("Failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read config file '{path}': {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Failure of a single task attempt.
///
/// Never reaches the submitter: the worker retries and eventually drops the task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task returned an error: {0:#}")]
    Failed(#[from] anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Reasons a worker refused to leave the registry when idle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RetireRefused {
    #[error("queue of {0} still holds tasks")]
    Busy(WorkerId),

    #[error("pool is at its minimum size")]
    AtMinimum,

    #[error("{0} is not registered")]
    Unknown(WorkerId),
}
