use crate::backend::{BackendRegistry, LoadedArtifact};
use crate::error::{BenchError, Result};
use crate::profiler::MemoryProfiler;
use crate::tensor::{Tensor, TensorSpec};
use anyhow::anyhow;
use std::hint::black_box;
use std::path::Path;
use std::time::{Duration, Instant};

/// Receives invocation progress as it happens.
pub trait ProgressSink {
    fn warmup_started(&mut self, _count: usize) {}

    fn timed_started(&mut self, _count: usize) {}

    /// `index` is zero-based; `total` is the configured iteration count.
    fn iteration_completed(&mut self, _index: usize, _total: usize, _elapsed_ms: f64) {}
}

/// Discards all progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Raw output of one benchmark pass.
#[derive(Clone, Debug)]
pub struct TimedRun {
    /// One entry per timed invocation, in invocation order.
    pub timings_ms: Vec<f64>,
    /// Peak heap growth over the timed invocations only.
    pub peak_memory_delta_bytes: u64,
    /// Resolved outputs of the last invocation.
    pub outputs: Vec<TensorSpec>,
}

#[derive(Clone, Copy, Debug)]
pub struct InferenceRunner {
    pub warmup: usize,
    pub iterations: usize,
    /// Abort the artifact once a single invocation runs longer than this.
    pub max_invoke: Option<Duration>,
}

impl InferenceRunner {
    /// Load `path` through the registry, tagging failures with `name`.
    pub fn load(
        &self,
        registry: &BackendRegistry,
        path: &Path,
        name: &str,
    ) -> Result<Box<dyn LoadedArtifact>> {
        registry
            .load(path)
            .map_err(|e| BenchError::inference(name, e))
    }

    fn invoke_once(
        &self,
        name: &str,
        artifact: &mut dyn LoadedArtifact,
        inputs: &[Tensor],
    ) -> Result<(Duration, Vec<Tensor>)> {
        let start = Instant::now();
        let outputs = artifact
            .invoke(black_box(inputs))
            .map_err(|e| BenchError::inference(name, e))?;
        let elapsed = start.elapsed();

        if let Some(limit) = self.max_invoke {
            if elapsed > limit {
                return Err(BenchError::inference(
                    name,
                    anyhow!(
                        "invocation took {:.2} ms, over the {} ms limit",
                        elapsed.as_secs_f64() * 1000.0,
                        limit.as_millis()
                    ),
                ));
            }
        }
        Ok((elapsed, black_box(outputs)))
    }

    /// Warm up, then time `iterations` invocations inside a memory window.
    ///
    /// Warm-up results are discarded and never timed. The memory window opens
    /// after the last warm-up call and is closed on every exit path.
    pub fn run<P: ProgressSink + ?Sized>(
        &self,
        name: &str,
        artifact: &mut dyn LoadedArtifact,
        inputs: &[Tensor],
        progress: &mut P,
    ) -> Result<TimedRun> {
        progress.warmup_started(self.warmup);
        for _ in 0..self.warmup {
            self.invoke_once(name, artifact, inputs)?;
        }
        tracing::debug!(artifact = name, warmup = self.warmup, "warm-up done");

        progress.timed_started(self.iterations);
        let mut timings_ms = Vec::with_capacity(self.iterations);
        let mut outputs = Vec::new();

        let window = MemoryProfiler::start()?;
        for i in 0..self.iterations {
            let (elapsed, out) = self.invoke_once(name, artifact, inputs)?;
            let ms = elapsed.as_secs_f64() * 1000.0;
            timings_ms.push(ms);
            if i + 1 == self.iterations {
                outputs = out.iter().map(Tensor::spec).collect();
            }
            // Release outputs before the sink formats its line.
            drop(out);
            progress.iteration_completed(i, self.iterations, ms);
        }
        let peak_memory_delta_bytes = window.finish();

        tracing::debug!(
            artifact = name,
            iterations = self.iterations,
            peak_memory_delta_bytes,
            "timed run done"
        );

        Ok(TimedRun {
            timings_ms,
            peak_memory_delta_bytes,
            outputs,
        })
    }
}
