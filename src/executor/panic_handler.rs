//! Containment for panics raised by task bodies.
//!
//! A task's execute and cleanup steps are guarded separately, so a panicking
//! execute never skips its cleanup and the worker thread survives either way
//! unless the runner is configured to abort.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the runner does when a task panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Log and abort the process.
    Abort,
    /// Swallow the panic silently.
    Isolate,
    /// Log the panic and keep running.
    #[default]
    LogAndContinue,
}

/// The step of a task that was running when it panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskPhase {
    Execute,
    Cleanup,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Execute => f.write_str("execute"),
            TaskPhase::Cleanup => f.write_str("cleanup"),
        }
    }
}

/// A panic caught while running one phase of a task.
#[derive(Debug, Clone)]
pub(crate) struct TaskPanic {
    pub phase: TaskPhase,
    pub message: String,
}

impl TaskPanic {
    fn new(phase: TaskPhase, payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast_ref::<&str>() {
                Some(s) => (*s).to_owned(),
                None => "non-string panic payload".to_owned(),
            },
        };
        Self { phase, message }
    }
}

impl fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} panicked: {}", self.phase, self.message)
    }
}

/// Runs task phases under `catch_unwind` and applies the runner's
/// [`PanicStrategy`] to whatever escapes.
#[derive(Debug)]
pub(crate) struct PanicHandler {
    strategy: PanicStrategy,
    caught: AtomicUsize,
}

impl PanicHandler {
    pub(crate) fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            caught: AtomicUsize::new(0),
        }
    }

    pub(crate) fn guard<F, R>(&self, runner: &str, phase: TaskPhase, f: F) -> Result<R, TaskPanic>
    where
        F: FnOnce() -> R,
    {
        let payload = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => return Ok(result),
            Err(payload) => payload,
        };

        self.caught.fetch_add(1, Ordering::Relaxed);
        let caught = TaskPanic::new(phase, payload);

        match self.strategy {
            PanicStrategy::Abort => {
                tracing::error!(runner, %phase, message = %caught.message, "task panicked, aborting");
                std::process::abort();
            }
            PanicStrategy::Isolate => {}
            PanicStrategy::LogAndContinue => {
                tracing::warn!(runner, %phase, message = %caught.message, "task panicked");
            }
        }

        Err(caught)
    }

    /// Panics caught so far, across both phases.
    pub(crate) fn caught(&self) -> usize {
        self.caught.load(Ordering::Relaxed)
    }

    pub(crate) fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}
