//! The shared task runner.
//!
//! A [`Runner`] owns one shared queue guarded by a mutex, a pending counter
//! and a condition variable. It never spawns threads: callers drive it by
//! calling [`Runner::run`] or [`Runner::run_one`] from as many threads as
//! they like.

use super::local::{self, LocalGuard};
use super::panic_handler::{PanicHandler, TaskPhase};
use super::queue::TaskQueue;
use super::task::{self, Job, Task};
use crate::config::Config;
use crate::error::Result;
use crate::telemetry::Metrics;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static RUNNER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity used to key thread-local buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RunnerId(u64);

impl RunnerId {
    fn next() -> Self {
        RunnerId(RUNNER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

// state behind the runner mutex
#[derive(Debug)]
struct State {
    queue: TaskQueue,
    pending: usize,
    closed: bool,
}

/// Shared half of a runner. Strands keep an `Arc` to it so their pump can
/// be resubmitted from any worker thread.
pub(crate) struct RunnerCore {
    id: RunnerId,
    state: Mutex<State>,
    cond: Condvar,
    config: Config,
    panic_handler: PanicHandler,
    metrics: Arc<Metrics>,
}

impl RunnerCore {
    pub fn id(&self) -> RunnerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Queue a job. Goes to the calling thread's buffer when it is inside
    /// this runner's run loop, otherwise to the shared queue.
    pub fn submit(&self, job: Job) {
        let job = if self.config.local_fast_path {
            match local::try_push(self.id, job) {
                Ok(()) => {
                    self.metrics.record_local_push();
                    return;
                }
                Err(job) => job,
            }
        } else {
            job
        };

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            tracing::warn!(runner = %self.config.name, task = ?job.id, "push after runner was dropped, discarding task");
            return;
        }
        state.queue.push(job);
        state.pending += 1;
        self.cond.notify_one();
        drop(state);

        self.metrics.record_shared_push();
    }

    /// Move a thread-local batch into the shared queue under one lock.
    pub fn flush(&self, batch: &mut TaskQueue) {
        let mut state = self.state.lock();
        let moved = state.queue.append(batch);
        state.pending += moved;
        for _ in 0..moved {
            self.cond.notify_one();
        }
        drop(state);

        tracing::trace!(runner = %self.config.name, moved, "flushed thread-local buffer");
        self.metrics.record_flush(moved);
    }

    /// Run a job's execute step then its cleanup step on this thread.
    /// Internal jobs are not recorded as executed tasks.
    pub fn execute(&self, mut job: Job) {
        let tid = job.id;
        let internal = job.internal;
        let start = Instant::now();

        let name = self.config.name.as_str();
        let executed = self.panic_handler.guard(name, TaskPhase::Execute, || job.task.execute());
        let cleaned = self.panic_handler.guard(name, TaskPhase::Cleanup, || job.task.cleanup());
        for caught in [executed.err(), cleaned.err()].into_iter().flatten() {
            self.metrics.record_task_panic();
            tracing::debug!(runner = name, task = ?tid, "{}", caught);
        }
        drop(job);

        if !internal {
            self.metrics
                .record_task_execution(start.elapsed().as_nanos() as u64);
        }
    }

    // Pop the next job, waiting while work is accounted for but not yet
    // visible in the shared queue. None once the pending counter hits zero.
    fn next_job(&self, state: &mut MutexGuard<'_, State>) -> Option<Job> {
        while state.pending > 0 {
            if let Some(job) = state.queue.pop() {
                state.pending -= 1;
                return Some(job);
            }
            debug_assert!(state.queue.is_empty());
            self.metrics.record_wait();
            tracing::trace!(runner = %self.config.name, pending = state.pending, "waiting for work");
            self.cond.wait(state);
        }
        None
    }

    fn run_job(&self, job: Job) {
        self.execute(job);
        if self.config.local_fast_path {
            let mut batch = local::take(self.id);
            if !batch.is_empty() {
                self.flush(&mut batch);
            }
        }
    }

    fn enter(&self) -> Result<Option<LocalGuard<'_>>> {
        if self.config.local_fast_path {
            LocalGuard::enter(self).map(Some)
        } else {
            Ok(None)
        }
    }

    fn run(&self) -> Result<()> {
        let _local = self.enter()?;

        let mut state = self.state.lock();
        while let Some(job) = self.next_job(&mut state) {
            MutexGuard::unlocked(&mut state, || self.run_job(job));
        }
        Ok(())
    }

    fn run_one(&self) -> Result<()> {
        let _local = self.enter()?;

        let mut state = self.state.lock();
        if let Some(job) = self.next_job(&mut state) {
            MutexGuard::unlocked(&mut state, || self.run_job(job));
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.state.lock().pending
    }

    // Refuse further pushes and hand back whatever is still queued.
    fn close(&self) -> TaskQueue {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending = 0;
        state.queue.take()
    }
}

impl std::fmt::Debug for RunnerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerCore")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("local_fast_path", &self.config.local_fast_path)
            .field("panic_strategy", &self.panic_handler.strategy())
            .field("panics_caught", &self.panic_handler.caught())
            .finish()
    }
}

/// A multi-threaded task runner driven by caller-supplied threads.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use tq_rs::Runner;
///
/// let runner = Runner::new().unwrap();
/// let count = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let count = count.clone();
///     runner.push_fn(move || {
///         count.fetch_add(1, Ordering::Relaxed);
///     });
/// }
///
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| runner.run().unwrap());
///     }
/// });
/// assert_eq!(count.load(Ordering::Relaxed), 10);
/// ```
#[derive(Debug)]
pub struct Runner {
    core: Arc<RunnerCore>,
}

impl Runner {
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;

        let queue = TaskQueue::with_capacity(config.queue_capacity)?;
        let metrics = Arc::new(Metrics::new()?);
        let panic_handler = PanicHandler::new(config.panic_strategy);

        let core = RunnerCore {
            id: RunnerId::next(),
            state: Mutex::new(State {
                queue,
                pending: 0,
                closed: false,
            }),
            cond: Condvar::new(),
            config,
            panic_handler,
            metrics,
        };

        tracing::debug!(
            runner = %core.config.name,
            local_fast_path = core.config.local_fast_path,
            panic_strategy = ?core.panic_handler.strategy(),
            "runner created"
        );

        Ok(Self {
            core: Arc::new(core),
        })
    }

    /// Submit a task. Ownership moves into the runner.
    pub fn push<T: Task>(&self, task: T) {
        self.core.submit(Job::new(task));
    }

    pub fn push_boxed(&self, task: Box<dyn Task>) {
        self.core.submit(Job::from_boxed(task));
    }

    /// Submit a closure as a task.
    pub fn push_fn<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(task::from_fn(f));
    }

    /// Execute queued tasks until the pending counter reaches zero.
    ///
    /// Any number of threads may call this at once. It returns as soon as
    /// there is nothing left to do; it is not a long-lived service loop.
    pub fn run(&self) -> Result<()> {
        self.core.run()
    }

    /// Execute at most one task. Returns immediately if nothing is pending.
    pub fn run_one(&self) -> Result<()> {
        self.core.run_one()
    }

    /// Number of tasks currently accounted for in the shared queue.
    pub fn pending(&self) -> usize {
        self.core.pending()
    }

    /// Whether the calling thread is currently inside this runner's run loop
    /// with a registered thread-local buffer.
    pub fn in_run_loop(&self) -> bool {
        local::is_registered(self.core.id)
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.core.metrics.clone()
    }

    pub(crate) fn core(&self) -> &Arc<RunnerCore> {
        &self.core
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        // Queued tasks are dropped without running. Strand pumps hold the
        // core alive, so dropping them here also breaks that cycle.
        let leftover = self.core.close();
        tracing::debug!(runner = %self.core.config.name, discarded = leftover.len(), "runner dropped");
        drop(leftover);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PanicStrategy;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counting(count: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_run_empty_returns_immediately() {
        let runner = Runner::new().unwrap();
        assert!(runner.run().is_ok());
        assert!(runner.run_one().is_ok());
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn test_push_counts_pending() {
        let runner = Runner::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            runner.push_fn(counting(&count));
        }
        assert_eq!(runner.pending(), 3);

        runner.run_one().unwrap();
        assert_eq!(runner.pending(), 2);
        assert_eq!(count.load(Ordering::Relaxed), 1);

        runner.run().unwrap();
        assert_eq!(runner.pending(), 0);
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_fifo_on_single_thread() {
        let runner = Runner::new().unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let order = order.clone();
            runner.push_fn(move || order.lock().push(i));
        }
        runner.run().unwrap();
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_self_resubmission_uses_local_buffer() {
        let runner = Arc::new(Runner::new().unwrap());
        let count = Arc::new(AtomicUsize::new(0));

        fn chain(runner: Arc<Runner>, count: Arc<AtomicUsize>, left: usize) {
            assert!(runner.in_run_loop());
            count.fetch_add(1, Ordering::Relaxed);
            if left > 0 {
                let r = runner.clone();
                runner.push_fn(move || chain(r, count, left - 1));
            }
        }

        let (r, c) = (runner.clone(), count.clone());
        runner.push_fn(move || chain(r, c, 9));
        runner.run().unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 10);
        assert!(!runner.in_run_loop());
        let snapshot = runner.metrics().snapshot();
        if cfg!(feature = "telemetry") {
            assert_eq!(snapshot.shared_pushes, 1);
            assert_eq!(snapshot.local_pushes, 9);
        }
    }

    #[test]
    fn test_self_resubmission_without_fast_path() {
        let config = Config::builder().local_fast_path(false).build().unwrap();
        let runner = Arc::new(Runner::with_config(config).unwrap());
        let count = Arc::new(AtomicUsize::new(0));

        let (r, c) = (runner.clone(), count.clone());
        runner.push_fn(move || {
            assert!(!r.in_run_loop());
            for _ in 0..5 {
                r.push_fn(counting(&c));
            }
        });
        runner.run().unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 5);
        if cfg!(feature = "telemetry") {
            assert_eq!(runner.metrics().snapshot().local_pushes, 0);
        }
    }

    #[test]
    fn test_nested_run_keeps_buffer() {
        let runner = Arc::new(Runner::new().unwrap());
        let count = Arc::new(AtomicUsize::new(0));

        let (r, c) = (runner.clone(), count.clone());
        runner.push_fn(move || {
            r.push_fn(counting(&c));
            // the inner loop flushes our buffered push and drains it along with the queued task
            r.run().unwrap();
            assert!(r.in_run_loop());
        });
        runner.push_fn(counting(&count));
        runner.run().unwrap();

        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_cleanup_runs_on_execute_thread() {
        let runner = Runner::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..20 {
            let (a, b) = (seen.clone(), seen.clone());
            runner.push(task::with_cleanup(
                move || a.lock().push(("execute", thread::current().id())),
                move || b.lock().push(("cleanup", thread::current().id())),
            ));
        }

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| runner.run().unwrap());
            }
        });

        let seen = seen.lock();
        assert_eq!(seen.len(), 40);
        // each cleanup entry is preceded, on its own thread, by its execute entry
        for (i, (kind, tid)) in seen.iter().enumerate() {
            if *kind == "cleanup" {
                let prior = seen[..i].iter().rev().find(|(_, t)| t == tid);
                assert_eq!(prior.map(|(k, _)| *k), Some("execute"));
            }
        }
    }

    #[test]
    fn test_panicking_task_still_cleaned_up() {
        let config = Config::builder()
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let runner = Runner::with_config(config).unwrap();
        let cleaned = Arc::new(AtomicUsize::new(0));
        let count = Arc::new(AtomicUsize::new(0));

        let c = cleaned.clone();
        runner.push(task::with_cleanup(
            || panic!("boom"),
            move || {
                c.fetch_add(1, Ordering::Relaxed);
            },
        ));
        runner.push_fn(counting(&count));
        runner.run().unwrap();

        assert_eq!(cleaned.load(Ordering::Relaxed), 1);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        if cfg!(feature = "telemetry") {
            assert_eq!(runner.metrics().snapshot().tasks_panicked, 1);
        }
    }

    #[test]
    fn test_panics_in_both_phases_are_counted() {
        let config = Config::builder()
            .panic_strategy(PanicStrategy::Isolate)
            .build()
            .unwrap();
        let runner = Runner::with_config(config).unwrap();
        runner.push(task::with_cleanup(|| panic!("execute"), || panic!("cleanup")));
        runner.run().unwrap();

        let core = runner.core();
        assert_eq!(core.panic_handler.caught(), 2);
        assert_eq!(core.panic_handler.strategy(), PanicStrategy::Isolate);
        assert!(format!("{:?}", core).contains("panics_caught: 2"));
    }

    #[test]
    fn test_drop_discards_without_running() {
        let runner = Runner::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let cleaned = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let c = cleaned.clone();
            runner.push(task::with_cleanup(counting(&count), move || {
                c.fetch_add(1, Ordering::Relaxed);
            }));
        }
        drop(runner);

        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert_eq!(cleaned.load(Ordering::Relaxed), 0);
        assert_eq!(Arc::strong_count(&count), 1);
    }

    #[test]
    fn test_capacity_overflow_is_oom() {
        let config = Config::builder().queue_capacity(usize::MAX).build().unwrap();
        let err = Runner::with_config(config).unwrap_err();
        assert!(matches!(err, crate::Error::OutOfMemory));
    }

    #[test]
    fn test_waiting_runner_is_woken_by_push() {
        let runner = Runner::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        // Account for a task before it is visible so run() has to wait on the condvar.
        runner.core.state.lock().pending += 1;

        thread::scope(|s| {
            let worker = s.spawn(|| runner.run().unwrap());
            thread::sleep(std::time::Duration::from_millis(20));
            {
                let mut state = runner.core.state.lock();
                state.queue.push(Job::new(task::from_fn(counting(&count))));
                runner.core.cond.notify_one();
            }
            worker.join().unwrap();
        });

        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(runner.pending(), 0);
    }
}
