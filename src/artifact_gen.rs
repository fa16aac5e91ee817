//! Deterministic demo artifacts for trying the harness without a toolchain.
//!
//! Writes an image-like classifier (`[-1, S, S, 3]` float input) and a
//! text-like classifier (`[1, L]` int32 token ids) in both graph encodings.
//! Weights are drawn per row from seeds derived from the master seed, so the
//! output is identical for a given seed regardless of thread count.

use crate::backend::graph::{
    ActivationKind, GraphArtifact, Op, BINARY_EXTENSION, FORMAT_VERSION, JSON_EXTENSION,
};
use crate::tensor::{ElementType, TensorSpec, WILDCARD_DIM};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

const TEXT_VOCAB: usize = 256;
const TEXT_EMBED_DIM: usize = 32;

/// Configuration for demo artifact generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    pub seed: u64,
    /// Height and width of the image input.
    pub image_size: usize,
    /// Token count of the text input.
    pub seq_len: usize,
    pub hidden: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            image_size: 32,
            seq_len: 64,
            hidden: 32,
        }
    }
}

fn per_row_seed(master_seed: u64, layer: u64, row: usize) -> u64 {
    master_seed
        .wrapping_add(layer.wrapping_mul(0x9e3779b97f4a7c15))
        .wrapping_add(row as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

/// Row-major `[rows, cols]` matrix with values in `[-scale, scale)`.
fn random_matrix(seed: u64, layer: u64, rows: usize, cols: usize, scale: f32) -> Vec<f32> {
    (0..rows)
        .into_par_iter()
        .flat_map_iter(|r| {
            let mut rng = ChaCha8Rng::seed_from_u64(per_row_seed(seed, layer, r));
            (0..cols)
                .map(move |_| rng.gen_range(-scale..scale))
                .collect::<Vec<f32>>()
        })
        .collect()
}

fn dense(
    seed: u64,
    layer: u64,
    in_features: usize,
    out_features: usize,
    activation: Option<ActivationKind>,
) -> Op {
    // Glorot-style bound keeps activations in a sane range.
    let scale = (6.0 / (in_features + out_features) as f32).sqrt();
    Op::Dense {
        in_features,
        out_features,
        weights: random_matrix(seed, layer, out_features, in_features, scale),
        bias: vec![0.0; out_features],
        activation,
    }
}

pub fn image_classifier(config: &GenerateConfig) -> GraphArtifact {
    let s = config.image_size;
    let features = s * s * 3;
    GraphArtifact {
        format_version: FORMAT_VERSION,
        name: "image_classifier".to_string(),
        inputs: vec![TensorSpec::new(
            "image",
            vec![WILDCARD_DIM, s as i64, s as i64, 3],
            ElementType::F32,
        )],
        outputs: vec![TensorSpec::new(
            "probabilities",
            vec![WILDCARD_DIM, 10],
            ElementType::F32,
        )],
        ops: vec![
            dense(config.seed, 0, features, config.hidden, Some(ActivationKind::Relu)),
            dense(config.seed, 1, config.hidden, 10, None),
            Op::Softmax,
        ],
    }
}

pub fn text_classifier(config: &GenerateConfig) -> GraphArtifact {
    GraphArtifact {
        format_version: FORMAT_VERSION,
        name: "text_classifier".to_string(),
        inputs: vec![TensorSpec::new(
            "input_ids",
            vec![1, config.seq_len as i64],
            ElementType::I32,
        )],
        outputs: vec![TensorSpec::new("logits", vec![1, 4], ElementType::F32)],
        ops: vec![
            Op::Embedding {
                vocab: TEXT_VOCAB,
                dim: TEXT_EMBED_DIM,
                table: random_matrix(config.seed, 10, TEXT_VOCAB, TEXT_EMBED_DIM, 0.5),
            },
            dense(
                config.seed,
                11,
                TEXT_EMBED_DIM,
                config.hidden,
                Some(ActivationKind::Tanh),
            ),
            dense(config.seed, 12, config.hidden, 4, None),
            Op::Softmax,
        ],
    }
}

/// Write the demo set into `output`, returning the written paths.
pub fn write_demo_artifacts(
    output: &Path,
    config: &GenerateConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    anyhow::ensure!(
        config.image_size > 0 && config.seq_len > 0 && config.hidden > 0,
        "image size, sequence length and hidden size must be positive"
    );
    std::fs::create_dir_all(output)?;

    let image = image_classifier(config);
    let text = text_classifier(config);
    let targets = [
        (&image, JSON_EXTENSION),
        (&text, JSON_EXTENSION),
        (&text, BINARY_EXTENSION),
    ];

    let mut written = Vec::with_capacity(targets.len());
    for (graph, ext) in targets {
        let path = output.join(format!("{}.{ext}", graph.name));
        graph.write(&path)?;
        tracing::info!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, graph::GraphBackend};
    use tempfile::tempdir;

    fn small() -> GenerateConfig {
        GenerateConfig {
            seed: 3,
            image_size: 4,
            seq_len: 8,
            hidden: 6,
        }
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(image_classifier(&small()), image_classifier(&small()));
        let other = GenerateConfig {
            seed: 4,
            ..small()
        };
        assert_ne!(text_classifier(&small()), text_classifier(&other));
    }

    #[test]
    fn generated_graphs_validate() {
        image_classifier(&small()).validate().unwrap();
        text_classifier(&small()).validate().unwrap();
    }

    #[test]
    fn demo_set_loads_back() {
        let dir = tempdir().unwrap();
        let written = write_demo_artifacts(dir.path(), &small()).unwrap();
        assert_eq!(written.len(), 3);
        for path in &written {
            let loaded = GraphBackend.load(path).unwrap();
            assert_eq!(loaded.describe_outputs().len(), 1);
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let dir = tempdir().unwrap();
        let config = GenerateConfig {
            seq_len: 0,
            ..small()
        };
        assert!(write_demo_artifacts(dir.path(), &config).is_err());
    }
}
