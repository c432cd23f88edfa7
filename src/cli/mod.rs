//! Command-line interface for task-balancer.
//!
//! Provides commands for running synthetic workloads and inspecting the
//! pool configuration.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
