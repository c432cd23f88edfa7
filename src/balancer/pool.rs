//! The balancer: pool construction, task submission and introspection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info};

use crate::config::BalancerConfig;
use crate::error::BalancerError;

use super::monitor::spawn_monitor;
use super::queue::TaskQueue;
use super::registry::{WorkerId, WorkerRegistry};
use super::sink::{LogSink, TracingSink};
use super::stats::{BalancerStats, SharedStats};
use super::task::Task;
use super::worker::spawn_worker;

/// State shared by the balancer handle, the workers and the monitor.
pub(crate) struct Shared {
    pub(crate) config: BalancerConfig,
    pub(crate) registry: WorkerRegistry,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) stats: SharedStats,
    next_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(config: BalancerConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            registry: WorkerRegistry::new(),
            sink,
            stats: SharedStats::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_worker_id(&self) -> WorkerId {
        WorkerId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Elastic pool of worker threads with per-worker queues.
///
/// Cloning yields another handle to the same pool. The pool has no shutdown:
/// its workers and monitor live for the rest of the process.
///
/// # Example
///
/// ```no_run
/// use task_balancer::{Balancer, BalancerConfig};
///
/// let balancer = Balancer::new(BalancerConfig::new(1, 10, 300))?;
/// balancer.submit(|| {
///     println!("Hello World!");
///     Ok(())
/// });
/// # Ok::<(), task_balancer::BalancerError>(())
/// ```
#[derive(Clone)]
pub struct Balancer {
    shared: Arc<Shared>,
}

impl Balancer {
    /// Creates a pool that reports failures through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `BalancerError::Config` for invalid bounds and
    /// `BalancerError::Spawn` if a thread cannot be started.
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Creates a pool that reports failures, retries and respawns to `sink`.
    ///
    /// Starts `min_workers` workers, pausing after every other one, then the
    /// monitor thread.
    pub fn with_sink(config: BalancerConfig, sink: Arc<dyn LogSink>) -> Result<Self, BalancerError> {
        config.validate()?;

        let shared = Arc::new(Shared::new(config, sink));
        let stagger = shared.config.startup_stagger();

        for i in 0..shared.config.min_workers {
            let slot = spawn_worker(&shared, Arc::new(TaskQueue::new()))?;
            shared.registry.register(slot);
            if i % 2 == 0 && !stagger.is_zero() {
                thread::sleep(stagger);
            }
        }

        spawn_monitor(Arc::clone(&shared))?;

        info!(
            min_workers = shared.config.min_workers,
            max_workers = shared.config.max_workers,
            idle_threshold_secs = shared.config.idle_threshold_secs,
            "Task balancer started"
        );

        Ok(Self { shared })
    }

    /// Queues a closure on the least loaded worker.
    ///
    /// Never waits for the task to run. Failures are retried and logged by
    /// the worker; the caller never sees them. Returns the worker whose queue
    /// received the task, or `None` if the pool had no worker to take it.
    pub fn submit<F>(&self, task: F) -> Option<WorkerId>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.submit_task(Task::new(task))
    }

    /// Queues an already built [`Task`].
    pub fn submit_task(&self, task: Task) -> Option<WorkerId> {
        self.shared.stats.record_submit();

        match self.shared.registry.dispatch(task) {
            Ok(id) => {
                debug!(worker_id = %id, "Task submitted");
                Some(id)
            }
            Err(_task) => {
                self.shared.stats.record_drop(std::time::Duration::ZERO);
                self.shared
                    .sink
                    .error("Task balancer has no registered worker, task dropped");
                None
            }
        }
    }

    /// Number of registered workers.
    pub fn worker_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Tasks waiting across all queues, not counting tasks being executed.
    pub fn pending_task_count(&self) -> usize {
        self.shared.registry.pending_tasks()
    }

    /// Registered worker ids in registry order.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.shared.registry.worker_ids()
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> BalancerStats {
        let (workers, pending) = self.shared.registry.load();
        self.shared.stats.snapshot(workers, pending)
    }

    /// Makes a worker's thread end outside the task boundary at its next
    /// wake-up, as an infrastructure failure would. Returns `false` if `id` is
    /// not registered.
    #[doc(hidden)]
    pub fn simulate_crash(&self, id: WorkerId) -> bool {
        self.shared.registry.flag_crash(id)
    }
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("config", &self.shared.config)
            .field("workers", &self.worker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::sink::MemorySink;
    use crate::error::ConfigError;
    use std::time::Duration;

    fn quiet(config: BalancerConfig) -> Result<Balancer, BalancerError> {
        Balancer::with_sink(config, Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_new_rejects_min_above_max() {
        let err = quiet(BalancerConfig::new(3, 2, 10)).unwrap_err();
        assert!(matches!(
            err,
            BalancerError::Config(ConfigError::MinExceedsMax { min: 3, max: 2 })
        ));
    }

    #[test]
    fn test_new_rejects_zero_min() {
        let err = quiet(BalancerConfig::new(0, 2, 10)).unwrap_err();
        assert!(matches!(err, BalancerError::Config(ConfigError::MinWorkersTooLow(0))));
    }

    #[test]
    fn test_new_starts_min_workers() {
        let balancer = quiet(BalancerConfig::new(3, 5, 60)).unwrap();

        assert_eq!(balancer.worker_count(), 3);
        assert_eq!(balancer.pending_task_count(), 0);
        assert_eq!(balancer.stats().workers_spawned, 3);
        assert_eq!(balancer.config().max_workers, 5);
    }

    #[test]
    fn test_startup_is_staggered() {
        let config = BalancerConfig::new(4, 4, 60).with_startup_stagger(Duration::from_millis(50));
        let start = std::time::Instant::now();
        let _balancer = quiet(config).unwrap();

        // Pauses after workers 0 and 2.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_worker_ids_are_unique() {
        let balancer = quiet(BalancerConfig::new(3, 3, 60)).unwrap();
        let mut ids = balancer.worker_ids();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_debug_output() {
        let balancer = quiet(BalancerConfig::new(1, 2, 60)).unwrap();
        let debug = format!("{balancer:?}");
        assert!(debug.contains("Balancer"));
        assert!(debug.contains("workers: 1"));
    }
}
