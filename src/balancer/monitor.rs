//! Background monitor: crash recovery and scale-up.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::error::BalancerError;
use crate::metrics;

use super::pool::Shared;
use super::registry::GrowOutcome;
use super::worker::spawn_worker;

/// Starts the monitor thread. It runs for the rest of the process.
pub(crate) fn spawn_monitor(shared: Arc<Shared>) -> Result<(), BalancerError> {
    let name = "task-balancer-monitor".to_string();
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || run(&shared))
        .map_err(|source| BalancerError::Spawn { name, source })?;
    Ok(())
}

fn run(shared: &Arc<Shared>) {
    let interval = shared.config.monitor_interval();
    info!(interval_ms = interval.as_millis() as u64, "Monitor started");

    loop {
        thread::sleep(interval);
        health_pass(shared);
        scale_pass(shared);

        let (workers, pending) = shared.registry.load();
        metrics::set_pool_gauges(workers, pending);
        debug!(workers, pending, "Monitor cycle complete");
    }
}

/// Replaces dead workers on the queues they left behind. Returns how many were
/// replaced.
pub(crate) fn health_pass(shared: &Arc<Shared>) -> usize {
    let report = shared
        .registry
        .replace_dead(|queue| spawn_worker(shared, queue));

    let mut replaced = 0;
    for respawn in report {
        shared.stats.record_crash();
        metrics::record_worker_event("crashed");
        shared.sink.error(&format!(
            "Task balancer's {} has failed, starting a new worker",
            respawn.dead
        ));

        match respawn.outcome {
            Ok(fresh) => {
                replaced += 1;
                metrics::record_worker_event("respawned");
                shared.sink.debug(&format!(
                    "Task balancer's {} took over the queue of {} ({} pending)",
                    fresh, respawn.dead, respawn.backlog
                ));
            }
            Err(e) => {
                shared.sink.error(&format!(
                    "Task balancer could not replace {}: {}",
                    respawn.dead, e
                ));
            }
        }
    }

    replaced
}

/// Adds at most one worker when backlog pressure is too high. Returns
/// whether the pool grew.
pub(crate) fn scale_pass(shared: &Arc<Shared>) -> bool {
    let config = &shared.config;
    let outcome = shared
        .registry
        .grow_if_pressured(config.max_workers, config.scale_up_factor, |queue| {
            spawn_worker(shared, queue)
        });

    match outcome {
        GrowOutcome::NotNeeded => false,
        GrowOutcome::AtMaximum => {
            debug!(max_workers = config.max_workers, "Backlog high but pool is at maximum");
            false
        }
        GrowOutcome::Grown {
            id,
            workers,
            pending,
        } => {
            shared.stats.record_scale_up();
            metrics::record_worker_event("scaled_up");
            info!(worker_id = %id, workers, pending, "Scaled up");
            true
        }
        GrowOutcome::Failed(e) => {
            shared
                .sink
                .error(&format!("Task balancer could not scale up: {}", e));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::queue::TaskQueue;
    use crate::balancer::sink::{LogLevel, MemorySink};
    use crate::balancer::task::Task;
    use crate::config::BalancerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn shared_with(config: BalancerConfig) -> (Arc<Shared>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let shared = Arc::new(Shared::new(config, sink.clone()));
        (shared, sink)
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn test_scale_pass_adds_one_worker_per_call() {
        let (shared, _sink) = shared_with(BalancerConfig::new(1, 3, 60));
        let slot = spawn_worker(&shared, Arc::new(TaskQueue::new())).unwrap();
        let queue = Arc::clone(&slot.queue);
        shared.registry.register(slot);

        // Park the worker so the backlog stays put.
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        queue.push(Task::new(move || {
            let _ = release_rx.recv();
            Ok(())
        }));
        assert!(wait_until(Duration::from_secs(5), || queue.is_empty()));

        for _ in 0..10 {
            queue.push(Task::new(|| Ok(())));
        }

        assert!(scale_pass(&shared));
        assert_eq!(shared.registry.len(), 2);
        // 10 pending > 2 * 3
        assert!(scale_pass(&shared));
        assert_eq!(shared.registry.len(), 3);
        // At maximum now.
        assert!(!scale_pass(&shared));
        assert_eq!(shared.registry.len(), 3);
        assert_eq!(shared.stats.snapshot(0, 0).scale_ups, 2);

        drop(release_tx);
    }

    #[test]
    fn test_scale_pass_ignores_light_backlog() {
        let (shared, _sink) = shared_with(BalancerConfig::new(1, 3, 60));
        let slot = spawn_worker(&shared, Arc::new(TaskQueue::new())).unwrap();
        shared.registry.register(slot);

        assert!(!scale_pass(&shared));
        assert_eq!(shared.registry.len(), 1);
    }

    #[test]
    fn test_health_pass_respawns_on_same_queue() {
        let (shared, sink) = shared_with(BalancerConfig::new(1, 1, 60));
        let slot = spawn_worker(&shared, Arc::new(TaskQueue::new())).unwrap();
        let original = slot.id;
        let queue = Arc::clone(&slot.queue);
        shared.registry.register(slot);

        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        queue.push(Task::new(move || {
            let _ = release_rx.recv();
            Ok(())
        }));
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            queue.push(Task::new(move || {
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        assert!(wait_until(Duration::from_secs(5), || queue.len() == 4));
        assert!(shared.registry.flag_crash(original));
        drop(release_tx);

        // The flagged worker ends before touching the remaining backlog.
        assert!(wait_until(Duration::from_secs(5), || health_pass(&shared) == 1));
        let ids = shared.registry.worker_ids();
        assert_eq!(ids.len(), 1);
        assert_ne!(ids[0], original);

        assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 4));
        assert_eq!(sink.count_matching(LogLevel::Error, "has failed"), 1);
        assert_eq!(sink.count_matching(LogLevel::Debug, "(4 pending)"), 1);
        assert_eq!(shared.stats.snapshot(0, 0).crashes_detected, 1);
    }
}
