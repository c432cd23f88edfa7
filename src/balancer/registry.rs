//! Registry of live (worker, queue) slots.
//!
//! Every decision that depends on the set of workers (picking the shortest
//! queue, counting, idle retirement, crash replacement, scale-up) runs with the
//! registry lock held, so the balancer, the monitor and the workers themselves
//! never observe a half-applied change.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{BalancerError, RetireRefused};

use super::queue::TaskQueue;
use super::task::Task;

/// Stable identity of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(pub(crate) u64);

impl WorkerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Observer side of a worker's liveness flag.
#[derive(Debug, Clone)]
pub(crate) struct Liveness(Arc<AtomicBool>);

/// Owned by the worker thread; clears the flag when the thread ends, whether
/// it returns or unwinds.
#[derive(Debug)]
pub(crate) struct LivenessGuard(Arc<AtomicBool>);

impl Liveness {
    pub(crate) fn new() -> (Self, LivenessGuard) {
        let flag = Arc::new(AtomicBool::new(true));
        (Self(Arc::clone(&flag)), LivenessGuard(flag))
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A registered worker and the queue it drains.
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    pub(crate) id: WorkerId,
    pub(crate) queue: Arc<TaskQueue>,
    liveness: Liveness,
    crash: Arc<AtomicBool>,
}

impl WorkerSlot {
    pub(crate) fn new(
        id: WorkerId,
        queue: Arc<TaskQueue>,
        liveness: Liveness,
        crash: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            queue,
            liveness,
            crash,
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }
}

/// A dead worker found by [`WorkerRegistry::replace_dead`].
#[derive(Debug)]
pub(crate) struct Respawn {
    pub(crate) dead: WorkerId,
    /// Tasks left in the inherited queue.
    pub(crate) backlog: usize,
    pub(crate) outcome: Result<WorkerId, BalancerError>,
}

/// Result of a scale-up check.
#[derive(Debug)]
pub(crate) enum GrowOutcome {
    /// Backlog is within bounds.
    NotNeeded,
    /// Backlog is high but the pool is already at `max_workers`.
    AtMaximum,
    Grown {
        id: WorkerId,
        workers: usize,
        pending: usize,
    },
    Failed(BalancerError),
}

/// Ordered set of live worker slots behind a single lock.
#[derive(Debug, Default)]
pub(crate) struct WorkerRegistry {
    slots: Mutex<Vec<WorkerSlot>>,
}

impl WorkerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, slot: WorkerSlot) {
        self.slots.lock().push(slot);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub(crate) fn pending_tasks(&self) -> usize {
        self.slots.lock().iter().map(|s| s.queue.len()).sum()
    }

    /// Worker count and pending tasks read under one lock.
    pub(crate) fn load(&self) -> (usize, usize) {
        let slots = self.slots.lock();
        (slots.len(), slots.iter().map(|s| s.queue.len()).sum())
    }

    pub(crate) fn worker_ids(&self) -> Vec<WorkerId> {
        self.slots.lock().iter().map(|s| s.id).collect()
    }

    /// Pushes `task` onto the shortest queue, first slot winning ties.
    ///
    /// Hands the task back if no worker is registered.
    pub(crate) fn dispatch(&self, task: Task) -> Result<WorkerId, Task> {
        let slots = self.slots.lock();
        match slots.iter().min_by_key(|s| s.queue.len()) {
            Some(slot) => {
                slot.queue.push(task);
                Ok(slot.id)
            }
            None => Err(task),
        }
    }

    /// Removes an idle worker, re-checking its queue under the lock.
    ///
    /// `dispatch` pushes under the same lock, so once this returns `Ok` no
    /// task can reach the retired worker's queue.
    pub(crate) fn retire(&self, id: WorkerId, min_workers: usize) -> Result<(), RetireRefused> {
        let mut slots = self.slots.lock();
        let index = slots
            .iter()
            .position(|s| s.id == id)
            .ok_or(RetireRefused::Unknown(id))?;

        if !slots[index].queue.is_empty() {
            return Err(RetireRefused::Busy(id));
        }
        if slots.len() <= min_workers {
            return Err(RetireRefused::AtMinimum);
        }

        slots.remove(index);
        Ok(())
    }

    /// Replaces every dead worker in place with a fresh one bound to the same
    /// queue. A slot whose respawn fails stays registered and is retried on
    /// the next call.
    pub(crate) fn replace_dead<F>(&self, mut respawn: F) -> Vec<Respawn>
    where
        F: FnMut(Arc<TaskQueue>) -> Result<WorkerSlot, BalancerError>,
    {
        let mut slots = self.slots.lock();
        let mut report = Vec::new();

        for slot in slots.iter_mut().filter(|s| !s.is_alive()) {
            let dead = slot.id;
            let backlog = slot.queue.len();
            let outcome = respawn(Arc::clone(&slot.queue)).map(|fresh| {
                let id = fresh.id;
                *slot = fresh;
                id
            });
            report.push(Respawn {
                dead,
                backlog,
                outcome,
            });
        }

        report
    }

    /// Adds one worker with a fresh queue when pending tasks exceed
    /// `workers * factor` and the pool is below `max_workers`.
    pub(crate) fn grow_if_pressured<F>(&self, max_workers: usize, factor: usize, spawn: F) -> GrowOutcome
    where
        F: FnOnce(Arc<TaskQueue>) -> Result<WorkerSlot, BalancerError>,
    {
        let mut slots = self.slots.lock();
        let workers = slots.len();
        let pending: usize = slots.iter().map(|s| s.queue.len()).sum();

        if pending <= workers.saturating_mul(factor) {
            return GrowOutcome::NotNeeded;
        }
        if workers >= max_workers {
            return GrowOutcome::AtMaximum;
        }

        match spawn(Arc::new(TaskQueue::new())) {
            Ok(slot) => {
                let id = slot.id;
                slots.push(slot);
                GrowOutcome::Grown {
                    id,
                    workers: workers + 1,
                    pending,
                }
            }
            Err(e) => GrowOutcome::Failed(e),
        }
    }

    /// Marks a worker so its thread ends at its next wake-up.
    pub(crate) fn flag_crash(&self, id: WorkerId) -> bool {
        let slots = self.slots.lock();
        match slots.iter().find(|s| s.id == id) {
            Some(slot) => {
                slot.crash.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}
