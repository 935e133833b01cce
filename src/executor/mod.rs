//! Task execution infrastructure.
//!
//! This module provides the task abstraction, the shared [`Runner`], the
//! per-thread push buffers it uses while running, and [`Strand`]s for
//! ordered execution on top of a runner.

mod local;
pub mod panic_handler;
mod queue;
pub mod runner;
pub mod strand;
pub mod task;

pub use panic_handler::PanicStrategy;
pub use runner::Runner;
pub use strand::Strand;
pub use task::{FnTask, Task};
