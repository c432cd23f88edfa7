//! Prometheus metrics for the worker pool.
//!
//! # Example
//!
//! ```ignore
//! use task_balancer::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! // ... run a balancer ...
//! println!("{}", export_metrics());
//! ```

pub mod prometheus;

pub use self::prometheus::{export_metrics, init_metrics};
pub use self::prometheus::{
    FAILED_ATTEMPTS_TOTAL, PENDING_TASKS, REGISTRY, TASKS_TOTAL, TASK_DURATION, WORKERS,
    WORKER_EVENTS_TOTAL,
};

pub(crate) use self::prometheus::{
    record_failed_attempt, record_task, record_worker_event, set_pool_gauges,
};
