//! Worker threads.
//!
//! Each worker drains exactly one [`TaskQueue`]. A worker:
//!
//! - runs tasks in FIFO order, retrying a failing task with a fixed backoff
//! - drops a task once it has used up its attempts
//! - leaves the pool on its own once it has been idle long enough and the
//!   pool is above its minimum size
//!
//! Task panics are caught inside [`Task::invoke`], so only a failure outside
//! task execution ends a worker thread early. The monitor notices that
//! through the worker's liveness flag and starts a replacement on the same
//! queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::BalancerError;
use crate::metrics;

use super::pool::Shared;
use super::queue::TaskQueue;
use super::registry::{Liveness, WorkerId, WorkerSlot};
use super::task::Task;

/// Longest a waiting worker sleeps before re-checking its idle and crash state.
const IDLE_RECHECK: Duration = Duration::from_millis(250);

/// Starts a worker thread bound to `queue` and returns its registry slot.
///
/// The caller registers the slot.
pub(crate) fn spawn_worker(
    shared: &Arc<Shared>,
    queue: Arc<TaskQueue>,
) -> Result<WorkerSlot, BalancerError> {
    let id = shared.next_worker_id();
    let (liveness, guard) = Liveness::new();
    let crash = Arc::new(AtomicBool::new(false));

    let worker = Worker {
        id,
        queue: Arc::clone(&queue),
        shared: Arc::clone(shared),
        crash: Arc::clone(&crash),
    };

    let name = format!("task-balancer-{}", id);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _guard = guard;
            worker.run();
        })
        .map_err(|source| BalancerError::Spawn { name, source })?;

    shared.stats.record_spawn();
    metrics::record_worker_event("spawned");
    debug!(worker_id = %id, "Worker spawned");

    Ok(WorkerSlot::new(id, queue, liveness, crash))
}

/// A single worker draining one queue.
struct Worker {
    id: WorkerId,
    queue: Arc<TaskQueue>,
    shared: Arc<Shared>,
    /// Set by fault injection; the thread returns without deregistering.
    crash: Arc<AtomicBool>,
}

impl Worker {
    /// Main worker loop.
    fn run(self) {
        debug!(worker_id = %self.id, "Worker started");

        let idle_threshold = self.shared.config.idle_threshold();
        let min_workers = self.shared.config.min_workers;
        let mut last_activity = Instant::now();

        loop {
            if self.crash.load(Ordering::SeqCst) {
                warn!(worker_id = %self.id, "Worker thread ending abnormally");
                return;
            }

            let idle_for = last_activity.elapsed();
            if idle_for >= idle_threshold
                && self.queue.is_empty()
                && self.shared.registry.retire(self.id, min_workers).is_ok()
            {
                self.shared.stats.record_idle_exit();
                metrics::record_worker_event("idle_exit");
                self.shared.sink.debug(&format!(
                    "Task balancer's {} was idle for {:?}, shutting down",
                    self.id, idle_for
                ));
                info!(worker_id = %self.id, idle_ms = idle_for.as_millis() as u64, "Idle worker exited");
                return;
            }

            let wait = match idle_threshold.saturating_sub(idle_for) {
                remaining if remaining.is_zero() => IDLE_RECHECK,
                remaining => remaining.min(IDLE_RECHECK),
            };

            if let Some(task) = self.queue.pop_timeout(wait) {
                self.execute(task);
                last_activity = Instant::now();
            }
        }
    }

    /// Runs a task, retrying failed attempts after the configured backoff.
    fn execute(&self, mut task: Task) {
        let max_attempts = self.shared.config.max_attempts;
        let backoff = self.shared.config.retry_backoff();
        let started = Instant::now();

        debug!(
            worker_id = %self.id,
            queued_ms = started.duration_since(task.submitted_at()).as_millis() as u64,
            "Processing task"
        );

        for attempt in 1..=max_attempts {
            match task.invoke() {
                Ok(()) => {
                    let duration = started.elapsed();
                    self.shared.stats.record_completion(duration);
                    metrics::record_task("completed", duration);
                    debug!(
                        worker_id = %self.id,
                        attempt,
                        duration_ms = duration.as_millis() as u64,
                        "Task completed"
                    );
                    return;
                }
                Err(e) => {
                    self.shared.stats.record_failed_attempt();
                    metrics::record_failed_attempt();
                    self.shared.sink.error(&format!(
                        "Task balancer's {} failed on attempt {}/{} with error: {}",
                        self.id, attempt, max_attempts, e
                    ));

                    if attempt < max_attempts {
                        self.shared.sink.debug(&format!(
                            "Task balancer's {} will retry the task after {:?}",
                            self.id, backoff
                        ));
                        thread::sleep(backoff);
                    }
                }
            }
        }

        let duration = started.elapsed();
        self.shared.stats.record_drop(duration);
        metrics::record_task("dropped", duration);
        self.shared.sink.error(&format!(
            "Task balancer's {} dropped a task after {} failed attempts",
            self.id, max_attempts
        ));
    }
}
