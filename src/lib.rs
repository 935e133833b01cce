//! tq - a small multi-threaded task runner with strands
//!
//! A [`Runner`] is a shared work queue that caller-supplied threads drain by
//! calling [`Runner::run`]. A [`Strand`] layered on a runner guarantees that
//! the tasks pushed through it never run concurrently and always run in push
//! order, without dedicating a thread to it.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use tq_rs::prelude::*;
//!
//! let runner = Runner::new().unwrap();
//! let strand = Strand::new(&runner).unwrap();
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! for i in 0..100 {
//!     let log = log.clone();
//!     strand.push_fn(move || log.lock().push(i));
//! }
//!
//! std::thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| runner.run().unwrap());
//!     }
//! });
//!
//! assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());
//! ```
//!
//! # Features
//!
//! - **No owned threads**: the runner is driven entirely by its callers
//! - **Lock-free self-scheduling**: pushes made from inside the run loop go
//!   to a thread-local buffer that is flushed once per executed task
//! - **Strands**: ordered, non-concurrent execution across worker threads
//! - **Telemetry**: push/flush/wait counters and latency (optional)

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{task, PanicStrategy, Runner, Strand, Task};
