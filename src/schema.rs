use crate::stats::TimingStats;
use crate::tensor::TensorSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub model_dir: PathBuf,
    pub iterations: usize,
    pub warmup: usize,
    pub seed: u64,
    pub memory_tracked: bool,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

/// Measurements for one successfully benchmarked artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub artifact: String,
    pub path: PathBuf,
    pub sha256: String,

    /// Inputs as actually fed, with wildcards resolved.
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,

    pub timings_ms: Vec<f64>,
    pub stats: TimingStats,
    pub peak_memory_delta_bytes: u64,
}

impl BenchmarkResult {
    pub fn peak_memory_mb(&self) -> f64 {
        bytes_to_mb(self.peak_memory_delta_bytes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub artifact: String,
    pub path: PathBuf,
    pub error: String,
}

/// Document written by `--out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub run: RunMeta,
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<FailureRecord>,
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}
