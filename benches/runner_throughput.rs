//! Benchmarks for runner and strand throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tq_rs::prelude::*;

const TASKS: usize = 10_000;

fn drain(runner: &Runner, threads: usize) {
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| runner.run().unwrap());
        }
    });
}

fn bench_runner(c: &mut Criterion) {
    let threads = num_cpus::get().min(8);

    c.bench_function("runner_push_run", |b| {
        let runner = Runner::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        b.iter(|| {
            for _ in 0..TASKS {
                let count = count.clone();
                runner.push_fn(move || {
                    black_box(count.fetch_add(1, Ordering::Relaxed));
                });
            }
            drain(&runner, threads);
        });
    });
}

fn bench_strand(c: &mut Criterion) {
    let threads = num_cpus::get().min(8);

    for fast in [true, false] {
        let name = if fast {
            "strand_fast_path"
        } else {
            "strand_locked_path"
        };

        c.bench_function(name, |b| {
            let config = Config::builder().local_fast_path(fast).build().unwrap();
            let runner = Runner::with_config(config).unwrap();
            let strand = Strand::new(&runner).unwrap();
            let count = Arc::new(AtomicUsize::new(0));
            b.iter(|| {
                for _ in 0..TASKS {
                    let count = count.clone();
                    strand.push_fn(move || {
                        black_box(count.fetch_add(1, Ordering::Relaxed));
                    });
                }
                drain(&runner, threads);
            });
        });
    }
}

criterion_group!(benches, bench_runner, bench_strand);
criterion_main!(benches);
