//! Per-worker task queue.
//!
//! An unbounded FIFO backed by a `crossbeam-channel`. The queue keeps both
//! channel ends alive, so it outlives any one worker: a replacement worker
//! picks up the same instance and everything still buffered in it.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::task::Task;

/// Unbounded FIFO of pending tasks, owned by exactly one worker at a time.
#[derive(Debug)]
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Appends a task. Never blocks.
    pub fn push(&self, task: Task) {
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(task);
    }

    /// Waits up to `timeout` for the next task.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Task> {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes the next task if one is ready.
    pub fn try_pop(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    /// Number of tasks waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
