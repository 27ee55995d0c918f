use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::SeedableRng;
use rand_distr::{Distribution, Pareto};
use sparse_quantile::Sketch;

fn insert_single_and_query(ns: &[f64]) {
    let mut sketch: Sketch = Sketch::default();
    for i in ns {
        sketch.insert(*i);
    }

    black_box(sketch.quantile(0.99));
}

fn insert_many_and_query(ns: &[f64]) {
    let mut sketch: Sketch = Sketch::default();
    sketch.insert_many(ns);

    black_box(sketch.quantile(0.99));
}

fn make_points(size: usize, seed: u64) -> Vec<f64> {
    // Generate a set of samples that roughly correspond to the latency of a
    // typical web service, in microseconds, with a gamma distribution: big hump
    // at the beginning with a long tail.  We limit this so the samples
    // represent latencies that bottom out at 15 milliseconds and tail off all
    // the way up to 10 seconds.
    let distribution = Pareto::new(1.0, 1.0).expect("pareto distribution should be valid");

    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    distribution
        .sample_iter(&mut rng)
        // Scale by 10,000 to get microseconds.
        .map(|n| n * 10_000.0)
        .filter(|n| *n > 15_000.0 && *n < 10_000_000.0)
        .take(size)
        .collect::<Vec<_>>()
}

fn bench_sketch(c: &mut Criterion) {
    let sizes = [1, 10, 100, 1_000, 10_000];
    let seed = 0xC0FFEE;

    let mut group = c.benchmark_group("Sketch/insert-single");
    for size in sizes.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let vals = make_points(size, seed);
            b.iter(|| insert_single_and_query(&vals));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("Sketch/insert-many");
    for size in sizes.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let vals = make_points(size, seed);
            b.iter(|| insert_many_and_query(&vals));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("Sketch/merge");
    for size in sizes.iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut left: Sketch = Sketch::default();
            left.insert_many(&make_points(size, seed));

            let mut right: Sketch = Sketch::default();
            right.insert_many(&make_points(size, seed + 1));

            b.iter(|| {
                let mut merged = left.copy();
                merged.merge(&right);
                black_box(merged.count());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sketch);
criterion_main!(benches);
