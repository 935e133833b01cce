//! Splits a range sum across tasks and drains them on several threads.
//!
//! Run with `cargo run --release --example range_sum -- [END] [TASKS]`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tq_rs::prelude::*;

struct SumTask {
    start: u64,
    end: u64,
    slot: usize,
    results: Arc<Mutex<Vec<u64>>>,
}

impl Task for SumTask {
    fn execute(&mut self) {
        let sum = (self.start..self.end).fold(0u64, |acc, v| acc.wrapping_add(v));
        self.results.lock()[self.slot] = sum;
    }
}

fn main() -> tq_rs::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let end: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(1_000_000_000);
    let num_tasks: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or_else(num_cpus::get);

    let runner = Runner::new()?;
    let results = Arc::new(Mutex::new(vec![0u64; num_tasks]));

    let range = end / num_tasks as u64;
    for i in 0..num_tasks {
        let start = i as u64 * range;
        let stop = if i + 1 == num_tasks { end } else { start + range };
        runner.push(SumTask {
            start,
            end: stop,
            slot: i,
            results: results.clone(),
        });
    }

    let started = Instant::now();
    thread::scope(|s| {
        let workers: Vec<_> = (0..num_tasks).map(|_| s.spawn(|| runner.run())).collect();
        workers.into_iter().try_for_each(|worker| {
            worker
                .join()
                .map_err(|_| tq_rs::Error::Other("worker thread panicked".into()))?
        })
    })?;

    let sum = results
        .lock()
        .iter()
        .fold(0u64, |acc, v| acc.wrapping_add(*v));
    let elapsed = started.elapsed();

    println!("Sum: {}", sum);
    println!("Time Elapsed: {:?}", elapsed);

    #[cfg(feature = "telemetry")]
    {
        let snapshot = runner.metrics().snapshot();
        println!(
            "Tasks executed: {}, p99 latency: {}ns",
            snapshot.tasks_executed, snapshot.p99_latency_ns
        );
    }

    Ok(())
}
