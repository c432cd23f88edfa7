//! Pool statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Point-in-time statistics about a balancer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalancerStats {
    /// Workers currently registered.
    pub workers: usize,
    /// Tasks waiting across all queues.
    pub pending_tasks: usize,
    pub tasks_submitted: u64,
    /// Tasks that eventually succeeded.
    pub tasks_completed: u64,
    /// Tasks dropped after exhausting their attempts.
    pub tasks_dropped: u64,
    /// Individual failed attempts, retried or not.
    pub failed_attempts: u64,
    pub workers_spawned: u64,
    pub crashes_detected: u64,
    pub scale_ups: u64,
    pub idle_exits: u64,
    /// Average wall time of a finished task, all attempts and backoffs included.
    #[serde(with = "duration_ms")]
    pub average_task_duration: Duration,
}

impl BalancerStats {
    /// Tasks that reached a final outcome.
    pub fn total_processed(&self) -> u64 {
        self.tasks_completed + self.tasks_dropped
    }

    /// Completed tasks as a percentage of processed tasks.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.tasks_completed as f64 / total as f64) * 100.0
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

/// Counters shared by the balancer, its workers and the monitor.
#[derive(Debug, Default)]
pub(crate) struct SharedStats {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_dropped: AtomicU64,
    failed_attempts: AtomicU64,
    total_duration_ms: AtomicU64,
    workers_spawned: AtomicU64,
    crashes_detected: AtomicU64,
    scale_ups: AtomicU64,
    idle_exits: AtomicU64,
}

impl SharedStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submit(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_completion(&self, duration: Duration) {
        self.tasks_completed.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn record_drop(&self, duration: Duration) {
        self.tasks_dropped.fetch_add(1, Ordering::SeqCst);
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_spawn(&self) {
        self.workers_spawned.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_crash(&self) {
        self.crashes_detected.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_scale_up(&self) {
        self.scale_ups.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_idle_exit(&self) {
        self.idle_exits.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self, workers: usize, pending_tasks: usize) -> BalancerStats {
        let completed = self.tasks_completed.load(Ordering::SeqCst);
        let dropped = self.tasks_dropped.load(Ordering::SeqCst);
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);

        let finished = completed + dropped;
        let average_task_duration = if finished > 0 {
            Duration::from_millis(total_duration_ms / finished)
        } else {
            Duration::ZERO
        };

        BalancerStats {
            workers,
            pending_tasks,
            tasks_submitted: self.tasks_submitted.load(Ordering::SeqCst),
            tasks_completed: completed,
            tasks_dropped: dropped,
            failed_attempts: self.failed_attempts.load(Ordering::SeqCst),
            workers_spawned: self.workers_spawned.load(Ordering::SeqCst),
            crashes_detected: self.crashes_detected.load(Ordering::SeqCst),
            scale_ups: self.scale_ups.load(Ordering::SeqCst),
            idle_exits: self.idle_exits.load(Ordering::SeqCst),
            average_task_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = BalancerStats::default();

        assert_eq!(stats.total_processed(), 0);
        assert!((stats.success_rate() - 0.0).abs() < f64::EPSILON);
        assert_eq!(stats.average_task_duration, Duration::ZERO);
    }

    #[test]
    fn test_shared_stats_snapshot() {
        let stats = SharedStats::new();

        stats.record_submit();
        stats.record_submit();
        stats.record_submit();
        stats.record_completion(Duration::from_millis(100));
        stats.record_completion(Duration::from_millis(200));
        stats.record_failed_attempt();
        stats.record_drop(Duration::from_millis(300));

        let snapshot = stats.snapshot(2, 0);
        assert_eq!(snapshot.workers, 2);
        assert_eq!(snapshot.tasks_submitted, 3);
        assert_eq!(snapshot.tasks_completed, 2);
        assert_eq!(snapshot.tasks_dropped, 1);
        assert_eq!(snapshot.failed_attempts, 1);
        assert_eq!(snapshot.average_task_duration, Duration::from_millis(200));
        assert!((snapshot.success_rate() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_serialize_duration_as_millis() {
        let stats = BalancerStats {
            average_task_duration: Duration::from_millis(1500),
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["average_task_duration"], 1500);
    }
}
