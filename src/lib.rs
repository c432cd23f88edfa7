//! task-balancer: an elastic, self-healing worker pool.
//!
//! Tasks are balanced across per-worker queues. The pool grows under backlog
//! pressure, shrinks as workers go idle, retries failing tasks a bounded
//! number of times, and replaces workers whose threads die.

pub mod balancer;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;

pub use balancer::{Balancer, BalancerStats, LogSink, Task, TracingSink, WorkerId};
pub use config::BalancerConfig;
pub use error::{BalancerError, ConfigError, TaskError};
