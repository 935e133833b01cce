//! Task representation and execution.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a submitted task, used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A unit of work executed by a [`Runner`](crate::Runner).
///
/// Ownership moves into the engine when the task is pushed. The engine calls
/// [`execute`](Task::execute) at most once and then [`cleanup`](Task::cleanup)
/// exactly once, on the same thread, before dropping the task.
pub trait Task: Send + 'static {
    /// Run the task.
    fn execute(&mut self);

    /// Called right after `execute`, even if `execute` panicked.
    fn cleanup(&mut self) {}
}

/// Wrap a closure as a task with no cleanup step.
pub fn from_fn<F>(f: F) -> FnTask<F, fn()>
where
    F: FnOnce() + Send + 'static,
{
    FnTask {
        func: Some(f),
        cleanup: None,
    }
}

/// Wrap a closure as a task with a cleanup step.
pub fn with_cleanup<F, C>(f: F, cleanup: C) -> FnTask<F, C>
where
    F: FnOnce() + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    FnTask {
        func: Some(f),
        cleanup: Some(cleanup),
    }
}

/// Closure-backed task built by [`from_fn`] or [`with_cleanup`].
pub struct FnTask<F, C> {
    func: Option<F>,
    cleanup: Option<C>,
}

impl<F, C> Task for FnTask<F, C>
where
    F: FnOnce() + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    fn execute(&mut self) {
        if let Some(f) = self.func.take() {
            f();
        }
    }

    fn cleanup(&mut self) {
        if let Some(c) = self.cleanup.take() {
            c();
        }
    }
}

impl<F, C> std::fmt::Debug for FnTask<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("pending", &self.func.is_some())
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Internal queued representation: a boxed task tagged with its id.
pub(crate) struct Job {
    pub(crate) id: TaskId,
    pub(crate) task: Box<dyn Task>,
    // engine bookkeeping (strand pumps); left out of execution metrics
    pub(crate) internal: bool,
}

impl Job {
    pub fn new<T: Task>(task: T) -> Self {
        Self::from_boxed(Box::new(task))
    }

    pub fn from_boxed(task: Box<dyn Task>) -> Self {
        Job {
            id: TaskId::next(),
            task,
            internal: false,
        }
    }

    pub fn internal<T: Task>(task: T) -> Self {
        Job {
            internal: true,
            ..Self::new(task)
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("internal", &self.internal)
            .finish()
    }
}
