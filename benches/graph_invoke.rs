//! Graph backend invoke benchmarks
//!
//! Measures the reference backend on the generated demo models so harness
//! overhead can be compared against raw invocation cost.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use inference_bench::artifact_gen::{image_classifier, text_classifier, GenerateConfig};
use inference_bench::backend::graph::LoadedGraph;
use inference_bench::backend::LoadedArtifact;
use inference_bench::synth::{InputSynthesizer, WildcardPolicy};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn bench_image_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_image_classifier");

    for size in [16usize, 32, 64] {
        let config = GenerateConfig {
            image_size: size,
            ..Default::default()
        };
        let mut graph = LoadedGraph::new(image_classifier(&config));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let inputs = InputSynthesizer::default()
            .synthesize_all(&graph.describe_inputs(), &mut rng)
            .unwrap();

        group.bench_with_input(BenchmarkId::new("invoke", size), &inputs, |bencher, inputs| {
            bencher.iter(|| black_box(graph.invoke(black_box(inputs)).unwrap()))
        });
    }

    group.finish();
}

fn bench_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_batch_sizes");
    let mut graph = LoadedGraph::new(image_classifier(&GenerateConfig::default()));

    for batch_size in [1usize, 4, 16] {
        let synth = InputSynthesizer {
            policy: WildcardPolicy {
                batch_size,
                dynamic_dim: None,
            },
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let inputs = synth
            .synthesize_all(&graph.describe_inputs(), &mut rng)
            .unwrap();

        group.bench_with_input(
            BenchmarkId::new("invoke", batch_size),
            &inputs,
            |bencher, inputs| bencher.iter(|| black_box(graph.invoke(black_box(inputs)).unwrap())),
        );
    }

    group.finish();
}

fn bench_text_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_text_classifier");

    for seq_len in [32usize, 128, 512] {
        let config = GenerateConfig {
            seq_len,
            ..Default::default()
        };
        let mut graph = LoadedGraph::new(text_classifier(&config));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let inputs = InputSynthesizer::default()
            .synthesize_all(&graph.describe_inputs(), &mut rng)
            .unwrap();

        group.bench_with_input(BenchmarkId::new("invoke", seq_len), &inputs, |bencher, inputs| {
            bencher.iter(|| black_box(graph.invoke(black_box(inputs)).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_image_classifier,
    bench_batch_sizes,
    bench_text_classifier
);
criterion_main!(benches);
