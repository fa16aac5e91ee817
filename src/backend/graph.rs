//! Reference backend for graph artifacts.
//!
//! A graph artifact is a small feed-forward network stored either as JSON
//! (`.igraph`) or bincode (`.igraphb`). Both encodings carry the same
//! [`GraphArtifact`] document:
//!
//! ```text
//! format_version: u32        = 1
//! name: String
//! inputs: [TensorSpec]       declared inputs; input 0 feeds the op chain
//! outputs: [TensorSpec]      exactly one declared output
//! ops: [Op]                  applied in order to a [batch, features] buffer
//! ```
//!
//! The leading dimension of input 0 is the batch; the remaining dimensions are
//! flattened into the feature row.

use super::{Backend, LoadedArtifact};
use crate::tensor::{ElementType, Tensor, TensorData, TensorSpec};
use anyhow::{anyhow, bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current document version.
pub const FORMAT_VERSION: u32 = 1;

pub const JSON_EXTENSION: &str = "igraph";
pub const BINARY_EXTENSION: &str = "igraphb";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Identity,
    Relu,
    Sigmoid,
    Tanh,
}

impl ActivationKind {
    #[inline]
    fn apply(self, x: f32) -> f32 {
        match self {
            ActivationKind::Identity => x,
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationKind::Tanh => x.tanh(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Row-major `[out_features, in_features]` weights plus bias.
    Dense {
        in_features: usize,
        out_features: usize,
        weights: Vec<f32>,
        bias: Vec<f32>,
        #[serde(default)]
        activation: Option<ActivationKind>,
    },
    Activation {
        kind: ActivationKind,
    },
    /// Numerically stable softmax over each row.
    Softmax,
    /// Mean of the embedding rows selected by integer ids in each row.
    Embedding {
        vocab: usize,
        dim: usize,
        table: Vec<f32>,
    },
    Scale {
        factor: f32,
    },
}

impl Op {
    fn kind(&self) -> &'static str {
        match self {
            Op::Dense { .. } => "dense",
            Op::Activation { .. } => "activation",
            Op::Softmax => "softmax",
            Op::Embedding { .. } => "embedding",
            Op::Scale { .. } => "scale",
        }
    }

    /// Features produced from `features_in`, where `None` means not known yet.
    fn output_features(
        &self,
        index: usize,
        features_in: Option<usize>,
    ) -> anyhow::Result<Option<usize>> {
        match self {
            Op::Dense {
                in_features,
                out_features,
                weights,
                bias,
                ..
            } => {
                ensure!(
                    *in_features > 0 && *out_features > 0,
                    "op {index} (dense): feature sizes must be positive"
                );
                let expected = checked_area(index, "dense", *out_features, *in_features)?;
                ensure!(
                    weights.len() == expected,
                    "op {index} (dense): expected {expected} weights, found {}",
                    weights.len()
                );
                ensure!(
                    bias.len() == *out_features,
                    "op {index} (dense): expected {out_features} bias values, found {}",
                    bias.len()
                );
                if let Some(f) = features_in {
                    ensure!(
                        f == *in_features,
                        "op {index} (dense): takes {in_features} features but receives {f}"
                    );
                }
                Ok(Some(*out_features))
            }
            Op::Embedding { vocab, dim, table } => {
                ensure!(
                    *vocab > 0 && *dim > 0,
                    "op {index} (embedding): vocab and dim must be positive"
                );
                let expected = checked_area(index, "embedding", *vocab, *dim)?;
                ensure!(
                    table.len() == expected,
                    "op {index} (embedding): expected {expected} table values, found {}",
                    table.len()
                );
                Ok(Some(*dim))
            }
            Op::Activation { .. } | Op::Softmax | Op::Scale { .. } => Ok(features_in),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphArtifact {
    pub format_version: u32,
    pub name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub ops: Vec<Op>,
}

impl GraphArtifact {
    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        serde_json::from_slice(bytes).context("malformed graph artifact (json)")
    }

    pub fn from_bincode(bytes: &[u8]) -> anyhow::Result<Self> {
        bincode::deserialize(bytes).context("malformed graph artifact (bincode)")
    }

    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn to_bincode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a file, choosing the encoding from its extension.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some(JSON_EXTENSION) => Self::from_json(&bytes),
            Some(BINARY_EXTENSION) => Self::from_bincode(&bytes),
            _ => bail!("unsupported graph artifact extension: {}", path.display()),
        }
    }

    /// Write a file, choosing the encoding from its extension.
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let bytes = match ext.as_deref() {
            Some(JSON_EXTENSION) => self.to_json()?,
            Some(BINARY_EXTENSION) => self.to_bincode()?,
            _ => bail!("unsupported graph artifact extension: {}", path.display()),
        };
        fs::write(path, bytes).with_context(|| format!("cannot write {}", path.display()))
    }

    /// Check the document is internally consistent.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.format_version == FORMAT_VERSION,
            "unsupported format version {} (expected {FORMAT_VERSION})",
            self.format_version
        );
        ensure!(!self.inputs.is_empty(), "graph declares no inputs");
        ensure!(
            self.outputs.len() == 1,
            "graph must declare exactly one output, found {}",
            self.outputs.len()
        );
        ensure!(!self.ops.is_empty(), "graph has no ops");

        let primary = &self.inputs[0];
        if let Some(Op::Embedding { .. }) = self.ops.first() {
            ensure!(
                !primary.dtype.is_float(),
                "embedding input `{}` must be an integer tensor, found {}",
                primary.name,
                primary.dtype
            );
        }

        let mut features = declared_row_features(primary)?;
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 && matches!(op, Op::Embedding { .. }) {
                bail!("op {i} (embedding) must be the first op");
            }
            features = op.output_features(i, features)?;
        }

        let output = &self.outputs[0];
        if let (Some(f), Some(declared)) = (features, declared_row_features(output)?) {
            ensure!(
                f == declared,
                "ops produce {f} features but output `{}` declares {declared}",
                output.name
            );
        }
        Ok(())
    }
}

/// Product of the non-batch dimensions, if all are fixed.
fn declared_row_features(spec: &TensorSpec) -> anyhow::Result<Option<usize>> {
    let mut acc = 1usize;
    for &d in spec.shape.iter().skip(1) {
        if d <= 0 {
            return Ok(None);
        }
        acc = usize::try_from(d)
            .ok()
            .and_then(|d| acc.checked_mul(d))
            .ok_or_else(|| anyhow!("`{}` declares too many features: {spec}", spec.name))?;
    }
    Ok(Some(acc))
}

fn checked_area(index: usize, kind: &str, rows: usize, cols: usize) -> anyhow::Result<usize> {
    rows.checked_mul(cols)
        .ok_or_else(|| anyhow!("op {index} ({kind}): {rows} x {cols} overflows"))
}

fn to_f32(data: &TensorData) -> Vec<f32> {
    match data {
        TensorData::F32(v) => v.clone(),
        TensorData::F64(v) => v.iter().map(|&x| x as f32).collect(),
        TensorData::U8(v) => v.iter().map(|&x| x as f32).collect(),
        TensorData::I8(v) => v.iter().map(|&x| x as f32).collect(),
        TensorData::I32(v) => v.iter().map(|&x| x as f32).collect(),
        TensorData::I64(v) => v.iter().map(|&x| x as f32).collect(),
        TensorData::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
    }
}

fn ids_of(data: &TensorData) -> anyhow::Result<Vec<i64>> {
    Ok(match data {
        TensorData::U8(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I8(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I32(v) => v.iter().map(|&x| x as i64).collect(),
        TensorData::I64(v) => v.clone(),
        TensorData::Bool(v) => v.iter().map(|&x| x as i64).collect(),
        other => bail!("embedding ids must be integers, found {}", other.dtype()),
    })
}

/// Loads `.igraph` / `.igraphb` files.
pub struct GraphBackend;

impl Backend for GraphBackend {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn extensions(&self) -> &[&'static str] {
        &[JSON_EXTENSION, BINARY_EXTENSION]
    }

    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn LoadedArtifact>> {
        let graph = GraphArtifact::read(path)?;
        graph.validate()?;
        Ok(Box::new(LoadedGraph::new(graph)))
    }
}

/// An execution-ready graph with reusable activation buffers.
pub struct LoadedGraph {
    graph: GraphArtifact,
    front: Vec<f32>,
    back: Vec<f32>,
}

impl LoadedGraph {
    pub fn new(graph: GraphArtifact) -> Self {
        Self {
            graph,
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    fn check_inputs(&self, inputs: &[Tensor]) -> anyhow::Result<()> {
        ensure!(
            inputs.len() == self.graph.inputs.len(),
            "expected {} inputs, got {}",
            self.graph.inputs.len(),
            inputs.len()
        );
        for (tensor, spec) in inputs.iter().zip(&self.graph.inputs) {
            ensure!(
                tensor.matches(spec),
                "input `{}` does not match declared {spec}",
                tensor.name
            );
            ensure!(
                tensor.data.len() == tensor.element_count(),
                "input `{}` holds {} values for shape {:?}",
                tensor.name,
                tensor.data.len(),
                tensor.shape
            );
        }
        Ok(())
    }

    fn run_ops(&mut self, input: &Tensor) -> anyhow::Result<(usize, usize)> {
        let batch = input.shape.first().copied().unwrap_or(1).max(1);
        let mut width = input.element_count() / batch;

        let ops = &self.graph.ops;
        let mut first = 0;
        if let Some(Op::Embedding { vocab, dim, table }) = ops.first() {
            let ids = ids_of(&input.data)?;
            self.front.clear();
            self.front.resize(batch * dim, 0.0);
            for (row, out) in ids.chunks(width.max(1)).zip(self.front.chunks_mut(*dim)) {
                for &id in row {
                    let id = usize::try_from(id)
                        .ok()
                        .filter(|&i| i < *vocab)
                        .ok_or_else(|| anyhow!("token id {id} outside vocab of {vocab}"))?;
                    for (o, &t) in out.iter_mut().zip(&table[id * dim..(id + 1) * dim]) {
                        *o += t;
                    }
                }
                let n = row.len().max(1) as f32;
                out.iter_mut().for_each(|o| *o /= n);
            }
            width = *dim;
            first = 1;
        } else {
            self.front.clear();
            self.front.extend(to_f32(&input.data));
        }

        for (index, op) in ops.iter().enumerate().skip(first) {
            match op {
                Op::Dense {
                    in_features,
                    out_features,
                    weights,
                    bias,
                    activation,
                } => {
                    ensure!(
                        width == *in_features,
                        "op {index} (dense): takes {in_features} features but receives {width}"
                    );
                    self.back.clear();
                    self.back.resize(batch * out_features, 0.0);
                    let rows = self.front.chunks(width).zip(self.back.chunks_mut(*out_features));
                    for (x, y) in rows {
                        for ((out, row), &b) in y.iter_mut().zip(weights.chunks(width)).zip(bias) {
                            let mut sum = b;
                            for (&w, &v) in row.iter().zip(x) {
                                sum += w * v;
                            }
                            *out = match activation {
                                Some(act) => act.apply(sum),
                                None => sum,
                            };
                        }
                    }
                    std::mem::swap(&mut self.front, &mut self.back);
                    width = *out_features;
                }
                Op::Activation { kind } => {
                    self.front.iter_mut().for_each(|x| *x = kind.apply(*x));
                }
                Op::Softmax => {
                    for row in self.front.chunks_mut(width.max(1)) {
                        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                        let mut sum = 0.0;
                        for x in row.iter_mut() {
                            *x = (*x - max).exp();
                            sum += *x;
                        }
                        if sum > 0.0 {
                            row.iter_mut().for_each(|x| *x /= sum);
                        }
                    }
                }
                Op::Scale { factor } => {
                    self.front.iter_mut().for_each(|x| *x *= factor);
                }
                Op::Embedding { .. } => bail!("op {index} (embedding) must be the first op"),
            }
            tracing::trace!(op = op.kind(), index, width, "op done");
        }

        Ok((batch, width))
    }

    fn output_shape(&self, batch: usize, width: usize) -> anyhow::Result<Vec<usize>> {
        let spec = &self.graph.outputs[0];
        let shape: Vec<usize> = spec
            .shape
            .iter()
            .enumerate()
            .map(|(axis, &d)| match d {
                d if d > 0 => d as usize,
                _ if axis == 0 => batch,
                _ => width,
            })
            .collect();
        let produced = batch.checked_mul(width);
        let declared = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        ensure!(
            declared.is_some() && declared == produced,
            "output `{}` {:?} cannot hold {} values",
            spec.name,
            shape,
            self.front.len()
        );
        Ok(shape)
    }
}

impl LoadedArtifact for LoadedGraph {
    fn describe_inputs(&self) -> Vec<TensorSpec> {
        self.graph.inputs.clone()
    }

    fn describe_outputs(&self) -> Vec<TensorSpec> {
        self.graph.outputs.clone()
    }

    fn invoke(&mut self, inputs: &[Tensor]) -> anyhow::Result<Vec<Tensor>> {
        self.check_inputs(inputs)?;
        let (batch, width) = self.run_ops(&inputs[0])?;
        let shape = self.output_shape(batch, width)?;
        let spec = &self.graph.outputs[0];
        let data = match spec.dtype {
            ElementType::F32 => TensorData::F32(self.front.clone()),
            ElementType::F64 => TensorData::F64(self.front.iter().map(|&x| x as f64).collect()),
            other => bail!("output `{}` has unsupported dtype {other}", spec.name),
        };
        Ok(vec![Tensor {
            name: spec.name.clone(),
            shape,
            data,
        }])
    }
}
