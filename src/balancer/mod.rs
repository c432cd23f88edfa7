//! Elastic worker pool.
//!
//! This module provides a thread pool that balances work across per-worker
//! queues and resizes itself between configured bounds:
//!
//! - **Balancer**: owns the worker registry and the `submit` entry point
//! - **Worker**: one thread per queue, retrying failed tasks
//! - **Monitor**: replaces crashed workers and adds workers under backlog
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │    submit    │
//!                      └──────┬───────┘
//!                             │ shortest queue
//!         ┌───────────────────┼───────────────────┐
//!         ▼                   ▼                   ▼
//!    ┌─────────┐         ┌─────────┐         ┌─────────┐
//!    │ Queue 0 │         │ Queue 1 │         │ Queue N │
//!    └────┬────┘         └────┬────┘         └────┬────┘
//!         ▼                   ▼                   ▼
//!    ┌─────────┐         ┌─────────┐         ┌─────────┐
//!    │ Worker 0│         │ Worker 1│         │ Worker N│
//!    └─────────┘         └─────────┘         └─────────┘
//!              ▲  respawn / scale up   ▲
//!              └────── Monitor ────────┘
//! ```
//!
//! # Reliability Features
//!
//! - **Bounded retry**: a failing task is re-run after a fixed backoff, then dropped
//! - **Panic isolation**: a panicking task counts as a failed attempt
//! - **Crash recovery**: a dead worker's replacement inherits its queue
//! - **Idle shrink**: workers above the minimum exit once idle long enough

mod monitor;
mod pool;
mod queue;
mod registry;
mod sink;
mod stats;
mod task;
mod worker;

pub use pool::Balancer;
pub use queue::TaskQueue;
pub use registry::WorkerId;
pub use sink::{LogLevel, LogSink, MemorySink, TracingSink};
pub use stats::BalancerStats;
pub use task::Task;
