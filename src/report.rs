//! Human-readable output: a live per-artifact trace and a summary table.

use crate::harness::{ArtifactOutcome, RunObserver, RunReport};
use crate::profiler::MemoryProfiler;
use crate::runner::ProgressSink;
use crate::schema::BenchmarkResult;
use crate::tensor::{format_shape, Tensor, TensorSpec};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

const NAME_WIDTH: usize = 25;

/// Streams the run to a writer (normally stdout) as it progresses.
pub struct ConsoleReport<W: Write> {
    out: W,
    /// Print one line per timed iteration.
    pub show_iterations: bool,
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_iterations: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            tracing::debug!(error = %e, "report write failed");
        }
    }
}

impl<W: Write> ProgressSink for ConsoleReport<W> {
    fn warmup_started(&mut self, count: usize) {
        self.emit(&format!("Performing {count} warm-up runs...\n"));
    }

    fn timed_started(&mut self, count: usize) {
        self.emit(&format!("Benchmarking with {count} iterations...\n"));
    }

    fn iteration_completed(&mut self, index: usize, total: usize, elapsed_ms: f64) {
        if self.show_iterations {
            self.emit(&format!(
                "  Iteration {}/{}: {:.2} ms\n",
                index + 1,
                total,
                elapsed_ms
            ));
        }
    }
}

impl<W: Write> RunObserver for ConsoleReport<W> {
    fn run_started(&mut self, model_dir: &Path, artifacts: usize) {
        if artifacts == 0 {
            return;
        }
        self.emit(&format!(
            "Found {artifacts} artifacts to benchmark in {}\n",
            model_dir.display()
        ));
    }

    fn artifact_started(&mut self, index: usize, total: usize, name: &str) {
        self.emit(&format!(
            "\n[{}/{}] Benchmarking artifact: {name}\n",
            index + 1,
            total
        ));
    }

    fn inputs_ready(&mut self, declared: &[TensorSpec], inputs: &[Tensor]) {
        let mut s = String::new();
        for (spec, tensor) in declared.iter().zip(inputs) {
            let _ = writeln!(s, "Input `{}`: {}", spec.name, spec.kind_label());
            if spec.has_wildcard() {
                let _ = writeln!(s, "  Declared shape: {}", format_shape(&spec.shape));
            }
            let _ = writeln!(s, "  Input shape: {}", format_shape(&tensor.shape));
            let _ = writeln!(s, "  Input dtype: {}", tensor.dtype());
            let _ = writeln!(s, "  Input size: {} bytes", tensor.size_bytes());
        }
        self.emit(&s);
    }

    fn artifact_finished(&mut self, outcome: &ArtifactOutcome) {
        let text = match &outcome.result {
            Ok(result) => render_result(result, MemoryProfiler::is_tracking()),
            Err(e) => format!("Error benchmarking {}: {e}\n", outcome.artifact),
        };
        self.emit(&text);
    }

    fn run_finished(&mut self, report: &RunReport) {
        self.emit(&render_summary(report));
    }
}

fn memory_cell(result: &BenchmarkResult, tracked: bool) -> String {
    if tracked {
        format!("{:.2}", result.peak_memory_mb())
    } else {
        "n/a".to_string()
    }
}

/// Result block printed once an artifact's timed calls complete.
pub fn render_result(result: &BenchmarkResult, memory_tracked: bool) -> String {
    let s = &result.stats;
    let mut out = String::new();
    let _ = writeln!(out, "\nResults:");
    let _ = writeln!(out, "  Average inference time: {:.2} ms", s.mean);
    let _ = writeln!(out, "  Standard deviation: {:.2} ms", s.stddev);
    let _ = writeln!(out, "  Min inference time: {:.2} ms", s.min);
    let _ = writeln!(out, "  Max inference time: {:.2} ms", s.max);
    let _ = writeln!(out, "  Median (p50): {:.2} ms", s.p50);
    let _ = writeln!(out, "  p95: {:.2} ms", s.p95);
    let _ = writeln!(
        out,
        "  Peak memory usage: {} MB",
        memory_cell(result, memory_tracked)
    );
    for output in &result.outputs {
        let _ = writeln!(
            out,
            "  Output `{}`: {} {}",
            output.name,
            format_shape(&output.shape),
            output.dtype
        );
    }
    out
}

fn fit_name(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        name.to_string()
    } else {
        let head: String = name.chars().take(NAME_WIDTH - 1).collect();
        format!("{head}~")
    }
}

/// Cross-artifact table over successful artifacts, or a notice when the
/// directory held none.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    if report.is_empty() {
        let _ = writeln!(
            out,
            "No artifacts found in directory: {}",
            report.model_dir.display()
        );
        return out;
    }

    let results: Vec<&BenchmarkResult> = report.successes().collect();
    if results.is_empty() {
        let _ = writeln!(out, "\nNo artifacts were benchmarked successfully.");
    } else {
        let _ = writeln!(out, "\nBenchmark Summary:");
        let _ = writeln!(out, "-----------------");
        let _ = writeln!(
            out,
            "{:<w$} | {:>13} | {:>13} | {:>13} | {:>13} | {:>11}",
            "Model",
            "Avg Time (ms)",
            "Std Dev (ms)",
            "Min (ms)",
            "Max (ms)",
            "Memory (MB)",
            w = NAME_WIDTH
        );
        let _ = writeln!(
            out,
            "{}|{}|{}|{}|{}|{}",
            "-".repeat(NAME_WIDTH + 1),
            "-".repeat(15),
            "-".repeat(15),
            "-".repeat(15),
            "-".repeat(15),
            "-".repeat(12)
        );
        for r in &results {
            let _ = writeln!(
                out,
                "{:<w$} | {:>13.2} | {:>13.2} | {:>13.2} | {:>13.2} | {:>11}",
                fit_name(&r.artifact),
                r.stats.mean,
                r.stats.stddev,
                r.stats.min,
                r.stats.max,
                memory_cell(r, report.memory_tracked),
                w = NAME_WIDTH
            );
        }
    }

    let failed: Vec<&str> = report.failures().map(|(o, _)| o.artifact.as_str()).collect();
    if !failed.is_empty() {
        let _ = writeln!(
            out,
            "\n{} of {} artifacts failed: {}",
            failed.len(),
            report.outcomes.len(),
            failed.join(", ")
        );
    }
    out
}
