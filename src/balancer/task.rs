//! Task definitions for the balancer.
//!
//! A `Task` is an opaque, zero-argument unit of work. It may be invoked more
//! than once when it fails, so callers must make re-invocation safe.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::error::TaskError;

type TaskFn = Box<dyn FnMut() -> anyhow::Result<()> + Send + 'static>;

/// A unit of work queued on a worker.
pub struct Task {
    run: TaskFn,
    submitted_at: Instant,
}

impl Task {
    /// Wraps a closure as a task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            run: Box::new(f),
            submitted_at: Instant::now(),
        }
    }

    /// Runs one attempt.
    ///
    /// Panics raised by the closure are caught here and reported as
    /// [`TaskError::Panicked`], so a faulty task never unwinds the worker.
    pub fn invoke(&mut self) -> Result<(), TaskError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.run)())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TaskError::Failed(e)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// When the task was created.
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
