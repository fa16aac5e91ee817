//! Inference backend seam.
//!
//! The harness never names a concrete runtime. A [`Backend`] claims file
//! extensions and turns a path into a [`LoadedArtifact`], which answers
//! capability queries about its tensor contract and executes invocations.

use crate::tensor::{Tensor, TensorSpec};
use anyhow::{anyhow, Context};
use std::path::Path;

pub mod graph;

/// A binding to one inference runtime.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extensions (without the dot) this backend can load.
    fn extensions(&self) -> &[&'static str];

    /// Load an artifact into an execution-ready state.
    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn LoadedArtifact>>;
}

/// An artifact that is ready to be invoked.
///
/// Implementations may keep arbitrary internal state between calls (bound
/// tensors, scratch arenas); the harness never resets it.
pub trait LoadedArtifact {
    fn describe_inputs(&self) -> Vec<TensorSpec>;

    fn describe_outputs(&self) -> Vec<TensorSpec>;

    /// Submit inputs, run once, and return the outputs.
    fn invoke(&mut self, inputs: &[Tensor]) -> anyhow::Result<Vec<Tensor>>;
}

/// Backends known to the harness, looked up by file extension.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(graph::GraphBackend));
        registry
    }
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Add a backend. Later registrations win on extension clashes.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Every extension some backend can load.
    pub fn extensions(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .backends
            .iter()
            .flat_map(|b| b.extensions().iter().map(|e| e.to_ascii_lowercase()))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn backend_for(&self, path: &Path) -> Option<&dyn Backend> {
        let ext = path.extension()?.to_str()?;
        self.backends
            .iter()
            .rev()
            .find(|b| b.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .map(|b| b.as_ref())
    }

    pub fn load(&self, path: &Path) -> anyhow::Result<Box<dyn LoadedArtifact>> {
        let backend = self
            .backend_for(path)
            .ok_or_else(|| anyhow!("no backend handles {}", path.display()))?;
        tracing::debug!(backend = backend.name(), path = %path.display(), "loading artifact");
        backend
            .load(path)
            .with_context(|| format!("{} backend failed to load artifact", backend.name()))
    }
}
