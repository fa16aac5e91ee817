//! Error types for the benchmark harness.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the harness.
///
/// `NotFound` and `Config` abort the whole run. `Shape` and `Inference` are
/// scoped to one artifact and recorded against it while the run continues.
/// `EmptyInput` only fires when aggregation is handed zero timings, which
/// configuration validation rules out.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("artifact directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot synthesize input `{input}` with shape {shape:?}: {reason}")]
    Shape {
        input: String,
        shape: Vec<i64>,
        reason: String,
    },

    #[error("{artifact}: {source:#}")]
    Inference {
        artifact: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot aggregate an empty timing sequence")]
    EmptyInput,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Profiler(#[from] ProfilerError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BenchError {
    pub fn inference(artifact: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        BenchError::Inference {
            artifact: artifact.into(),
            source: source.into(),
        }
    }
}

/// Failures acquiring the process-wide memory window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfilerError {
    #[error("a memory window is already open")]
    AlreadyActive,
}

pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inference_error_carries_artifact_and_cause() {
        let err = BenchError::inference("mobilenet.igraph", anyhow::anyhow!("bad magic"));
        let msg = err.to_string();
        assert!(msg.contains("mobilenet.igraph"));
        assert!(msg.contains("bad magic"));
    }

    #[test]
    fn directory_errors_are_fatal() {
        let err = BenchError::NotFound {
            path: PathBuf::from("/nope"),
        };
        assert!(err.to_string().contains("/nope"));
    }
}
