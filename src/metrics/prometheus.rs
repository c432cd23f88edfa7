//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by task-balancer and
//! provides functions for initializing, recording, and exporting them.
//! Recording before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

/// Global Prometheus registry for all task-balancer metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Number of registered workers, as of the last monitor cycle.
pub static WORKERS: OnceLock<Gauge> = OnceLock::new();

/// Tasks waiting across all queues, as of the last monitor cycle.
pub static PENDING_TASKS: OnceLock<Gauge> = OnceLock::new();

/// Tasks that reached a final outcome, labeled by outcome (completed/dropped).
pub static TASKS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Individual failed task attempts.
pub static FAILED_ATTEMPTS_TOTAL: OnceLock<Counter> = OnceLock::new();

/// Worker lifecycle events, labeled by event
/// (spawned/crashed/respawned/scaled_up/idle_exit).
pub static WORKER_EVENTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall time from first attempt to final outcome, in seconds.
pub static TASK_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls fail registration on a fresh registry
/// and leave the first set of metrics in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric creation or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let workers = Gauge::new("task_balancer_workers", "Number of registered workers")?;
    let pending_tasks = Gauge::new(
        "task_balancer_pending_tasks",
        "Number of tasks waiting across all queues",
    )?;

    let tasks_total = CounterVec::new(
        Opts::new("task_balancer_tasks_total", "Tasks that reached a final outcome"),
        &["outcome"],
    )?;

    let failed_attempts_total = Counter::new(
        "task_balancer_failed_attempts_total",
        "Total failed task attempts",
    )?;

    let worker_events_total = CounterVec::new(
        Opts::new("task_balancer_worker_events_total", "Worker lifecycle events"),
        &["event"],
    )?;

    let task_duration = Histogram::with_opts(
        HistogramOpts::new(
            "task_balancer_task_duration_seconds",
            "Task duration from first attempt to final outcome",
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
    )?;

    registry.register(Box::new(workers.clone()))?;
    registry.register(Box::new(pending_tasks.clone()))?;
    registry.register(Box::new(tasks_total.clone()))?;
    registry.register(Box::new(failed_attempts_total.clone()))?;
    registry.register(Box::new(worker_events_total.clone()))?;
    registry.register(Box::new(task_duration.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = WORKERS.set(workers);
    let _ = PENDING_TASKS.set(pending_tasks);
    let _ = TASKS_TOTAL.set(tasks_total);
    let _ = FAILED_ATTEMPTS_TOTAL.set(failed_attempts_total);
    let _ = WORKER_EVENTS_TOTAL.set(worker_events_total);
    let _ = TASK_DURATION.set(task_duration);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

pub(crate) fn set_pool_gauges(workers: usize, pending: usize) {
    if let Some(g) = WORKERS.get() {
        g.set(workers as f64);
    }
    if let Some(g) = PENDING_TASKS.get() {
        g.set(pending as f64);
    }
}

pub(crate) fn record_task(outcome: &str, duration: Duration) {
    if let Some(c) = TASKS_TOTAL.get() {
        c.with_label_values(&[outcome]).inc();
    }
    if let Some(h) = TASK_DURATION.get() {
        h.observe(duration.as_secs_f64());
    }
}

pub(crate) fn record_failed_attempt() {
    if let Some(c) = FAILED_ATTEMPTS_TOTAL.get() {
        c.inc();
    }
}

pub(crate) fn record_worker_event(event: &str) {
    if let Some(c) = WORKER_EVENTS_TOTAL.get() {
        c.with_label_values(&[event]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        // Global state: a previous test may already have initialized it.
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_metrics_not_empty() {
        let metrics = export_metrics();
        assert!(!metrics.is_empty());
    }

    #[test]
    fn test_metrics_after_init() {
        let _ = init_metrics();

        set_pool_gauges(3, 12);
        record_task("completed", Duration::from_millis(250));
        record_failed_attempt();
        record_worker_event("spawned");

        let metrics = export_metrics();
        assert!(metrics.contains("task_balancer_workers"));
        assert!(metrics.contains("task_balancer_tasks_total"));
        assert!(metrics.contains("task_balancer_failed_attempts_total"));
        assert!(metrics.contains("task_balancer_worker_events_total"));
        assert!(metrics.contains("task_balancer_task_duration_seconds"));
    }
}
