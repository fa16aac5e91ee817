//! Timing aggregation benchmarks
//!
//! Measures `TimingStats::from_timings` from a quick-profile run up to very
//! long timing sequences.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inference_bench::stats::TimingStats;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn bench_from_timings(c: &mut Criterion) {
    let mut group = c.benchmark_group("timing_stats");
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    for n in [10usize, 1_000, 100_000] {
        let timings: Vec<f64> = (0..n).map(|_| rng.gen_range(0.5..25.0)).collect();
        group.bench_with_input(BenchmarkId::new("from_timings", n), &timings, |bencher, t| {
            bencher.iter(|| TimingStats::from_timings(black_box(t)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_from_timings);
criterion_main!(benches);
