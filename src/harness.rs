//! Per-artifact benchmark pipeline.
//!
//! Artifacts are benchmarked strictly one after another. Each gets a fresh
//! execution-ready instance that is dropped before the next one loads, and a
//! failure in one artifact is recorded against it without stopping the run.

use crate::backend::BackendRegistry;
use crate::error::{BenchError, Result};
use crate::locator::{artifact_name, locate_artifacts};
use crate::profiler::MemoryProfiler;
use crate::runner::{InferenceRunner, ProgressSink};
use crate::schema::{BenchmarkResult, FailureRecord, ResultsFile, RunMeta};
use crate::stats::TimingStats;
use crate::synth::{InputSynthesizer, WildcardPolicy, DEFAULT_MAX_INPUT_BYTES};
use crate::tensor::{Tensor, TensorSpec};

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Quick,
    Full,
}

impl Profile {
    pub fn warmup_iters(&self) -> usize {
        match self {
            Profile::Quick => 3,
            Profile::Full => 10,
        }
    }

    pub fn iters(&self) -> usize {
        match self {
            Profile::Quick => 10,
            Profile::Full => 100,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub iterations: usize,
    pub warmup: usize,
    pub seed: u64,
    pub batch_size: usize,
    pub dynamic_dim: Option<usize>,
    /// Exclusive upper bound for synthetic integer ids.
    pub int_high: i64,
    /// Largest synthetic input, in bytes, before an artifact is refused.
    pub max_input_bytes: u64,
    pub max_invoke_ms: Option<u64>,
    /// Overrides the extensions claimed by the registered backends.
    pub extensions: Option<Vec<String>>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Quick)
    }
}

impl BenchConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            iterations: profile.iters(),
            warmup: profile.warmup_iters(),
            seed: 0,
            batch_size: 1,
            dynamic_dim: None,
            int_high: 256,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_invoke_ms: None,
            extensions: None,
        }
    }

    /// Reject settings that would make a run meaningless.
    ///
    /// Zero iterations would leave nothing to aggregate, so it is refused here
    /// instead of surfacing as an empty-input failure for every artifact.
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(BenchError::Config("iterations must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch size must be at least 1".into()));
        }
        if self.dynamic_dim == Some(0) {
            return Err(BenchError::Config("dynamic dim must be at least 1".into()));
        }
        if self.int_high < 1 {
            return Err(BenchError::Config("int high must be at least 1".into()));
        }
        if self.max_input_bytes == 0 {
            return Err(BenchError::Config("max input size must be at least 1 byte".into()));
        }
        if self.max_invoke_ms == Some(0) {
            return Err(BenchError::Config("max invoke ms must be at least 1".into()));
        }
        if let Some(exts) = &self.extensions {
            if exts.is_empty() || exts.iter().any(|e| e.trim_start_matches('.').is_empty()) {
                return Err(BenchError::Config("extensions must be non-empty".into()));
            }
        }
        Ok(())
    }

    /// Independent, reproducible stream for the artifact at `index`.
    pub fn rng_for(&self, index: usize) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(per_artifact_seed(self.seed, index))
    }

    pub fn synthesizer(&self) -> InputSynthesizer {
        InputSynthesizer {
            policy: WildcardPolicy {
                batch_size: self.batch_size,
                dynamic_dim: self.dynamic_dim,
            },
            int_high: self.int_high,
            max_input_bytes: self.max_input_bytes,
        }
    }

    pub fn runner(&self) -> InferenceRunner {
        InferenceRunner {
            warmup: self.warmup,
            iterations: self.iterations,
            max_invoke: self.max_invoke_ms.map(Duration::from_millis),
        }
    }
}

fn per_artifact_seed(master_seed: u64, index: usize) -> u64 {
    master_seed
        .wrapping_add(index as u64)
        .wrapping_mul(0x517cc1b727220a95)
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    let mut s = String::with_capacity(64);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    Ok(s)
}

/// The attempt at one artifact, successful or not.
#[derive(Debug)]
pub struct ArtifactOutcome {
    pub artifact: String,
    pub path: PathBuf,
    pub result: Result<BenchmarkResult>,
}

/// Everything one invocation of the harness produced.
#[derive(Debug)]
pub struct RunReport {
    pub model_dir: PathBuf,
    pub iterations: usize,
    pub warmup: usize,
    pub seed: u64,
    pub memory_tracked: bool,
    pub outcomes: Vec<ArtifactOutcome>,
}

impl RunReport {
    /// No artifacts were found at all.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &BenchmarkResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ArtifactOutcome, &BenchError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn to_results_file(&self, timestamp_utc: String, git_sha: Option<String>) -> ResultsFile {
        ResultsFile {
            run: RunMeta {
                schema_version: 1,
                bench_version: env!("CARGO_PKG_VERSION").to_string(),
                model_dir: self.model_dir.clone(),
                iterations: self.iterations,
                warmup: self.warmup,
                seed: self.seed,
                memory_tracked: self.memory_tracked,
                timestamp_utc,
                git_sha,
            },
            results: self.successes().cloned().collect(),
            failures: self
                .failures()
                .map(|(o, e)| FailureRecord {
                    artifact: o.artifact.clone(),
                    path: o.path.clone(),
                    error: e.to_string(),
                })
                .collect(),
        }
    }
}

/// Artifact-level events on top of invocation progress.
pub trait RunObserver: ProgressSink {
    fn run_started(&mut self, _model_dir: &Path, _artifacts: usize) {}

    fn artifact_started(&mut self, _index: usize, _total: usize, _name: &str) {}

    fn inputs_ready(&mut self, _declared: &[TensorSpec], _inputs: &[Tensor]) {}

    fn artifact_finished(&mut self, _outcome: &ArtifactOutcome) {}

    fn run_finished(&mut self, _report: &RunReport) {}
}

pub struct Harness {
    config: BenchConfig,
    registry: BackendRegistry,
}

impl Harness {
    /// Validates the configuration up front.
    pub fn new(config: BenchConfig, registry: BackendRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    fn extensions(&self) -> Vec<String> {
        match &self.config.extensions {
            Some(exts) => exts
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            None => self.registry.extensions(),
        }
    }

    /// Benchmark every artifact in `model_dir`.
    ///
    /// Only a missing directory fails the whole run; per-artifact failures are
    /// kept in the returned report.
    pub fn run<O: RunObserver + ?Sized>(
        &self,
        model_dir: &Path,
        observer: &mut O,
    ) -> Result<RunReport> {
        let paths = locate_artifacts(model_dir, &self.extensions())?;
        tracing::info!(dir = %model_dir.display(), artifacts = paths.len(), "starting run");
        observer.run_started(model_dir, paths.len());

        let mut outcomes = Vec::with_capacity(paths.len());
        for (index, path) in paths.iter().enumerate() {
            let name = artifact_name(path);
            observer.artifact_started(index, paths.len(), &name);

            let result = self.bench_artifact(index, path, &name, observer);
            if let Err(e) = &result {
                tracing::warn!(artifact = %name, error = %e, "artifact failed");
            }

            let outcome = ArtifactOutcome {
                artifact: name,
                path: path.clone(),
                result,
            };
            observer.artifact_finished(&outcome);
            outcomes.push(outcome);
        }

        let report = RunReport {
            model_dir: model_dir.to_path_buf(),
            iterations: self.config.iterations,
            warmup: self.config.warmup,
            seed: self.config.seed,
            memory_tracked: MemoryProfiler::is_tracking(),
            outcomes,
        };
        observer.run_finished(&report);
        Ok(report)
    }

    fn bench_artifact<O: RunObserver + ?Sized>(
        &self,
        index: usize,
        path: &Path,
        name: &str,
        observer: &mut O,
    ) -> Result<BenchmarkResult> {
        let sha256 = sha256_file(path).map_err(|e| BenchError::inference(name, e))?;

        let runner = self.config.runner();
        let mut artifact = runner.load(&self.registry, path, name)?;

        let declared = artifact.describe_inputs();
        let mut rng = self.config.rng_for(index);
        let inputs = self.config.synthesizer().synthesize_all(&declared, &mut rng)?;
        observer.inputs_ready(&declared, &inputs);

        let run = runner.run(name, artifact.as_mut(), &inputs, observer)?;
        drop(artifact);

        let stats = TimingStats::from_timings(&run.timings_ms)?;
        Ok(BenchmarkResult {
            artifact: name.to_string(),
            path: path.to_path_buf(),
            sha256,
            inputs: inputs.iter().map(Tensor::spec).collect(),
            outputs: run.outputs,
            timings_ms: run.timings_ms,
            stats,
            peak_memory_delta_bytes: run.peak_memory_delta_bytes,
        })
    }
}
