//! Benchmarks for the tracking engine
//!
//! Run with: cargo bench

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::{defer_effects, effect, Dep, DirtyLevel, Tracker};

fn bench_tracked_read(c: &mut Criterion) {
    let dep = Dep::new();
    let tracker = Tracker::new(|| {});

    c.bench_function("tracked_read", |b| {
        b.iter(|| {
            tracker.run(|| {
                black_box(&dep).track();
            })
        })
    });
}

fn bench_run_with_ten_reads(c: &mut Criterion) {
    let deps: Vec<Dep> = (0..10).map(|_| Dep::new()).collect();
    let tracker = Tracker::new(|| {});

    c.bench_function("run_with_ten_reads", |b| {
        b.iter(|| {
            tracker.run(|| {
                for dep in &deps {
                    dep.track();
                }
            })
        })
    });
}

fn bench_trigger_no_observers(c: &mut Criterion) {
    let dep = Dep::new();

    c.bench_function("trigger_no_observers", |b| {
        b.iter(|| {
            black_box(&dep).trigger(DirtyLevel::Dirty);
        })
    });
}

fn bench_trigger_one_effect(c: &mut Criterion) {
    let dep = Dep::new();
    let runs = Arc::new(AtomicUsize::new(0));

    let dep_clone = dep.clone();
    let runs_clone = Arc::clone(&runs);
    let handle = effect(move || {
        dep_clone.track();
        runs_clone.fetch_add(1, Ordering::Relaxed);
    });

    c.bench_function("trigger_one_effect", |b| {
        b.iter(|| {
            dep.trigger(DirtyLevel::Dirty);
        })
    });

    handle.dispose();
}

fn bench_deferred_trigger_burst(c: &mut Criterion) {
    let deps: Vec<Dep> = (0..10).map(|_| Dep::new()).collect();
    let runs = Arc::new(AtomicUsize::new(0));

    let deps_clone = deps.clone();
    let runs_clone = Arc::clone(&runs);
    let handle = effect(move || {
        for dep in &deps_clone {
            dep.track();
        }
        runs_clone.fetch_add(1, Ordering::Relaxed);
    });

    c.bench_function("deferred_trigger_burst", |b| {
        b.iter(|| {
            defer_effects(|| {
                for dep in &deps {
                    dep.trigger(DirtyLevel::Dirty);
                }
            })
        })
    });

    handle.dispose();
}

criterion_group!(
    benches,
    bench_tracked_read,
    bench_run_with_ten_reads,
    bench_trigger_no_observers,
    bench_trigger_one_effect,
    bench_deferred_trigger_burst,
);
criterion_main!(benches);
