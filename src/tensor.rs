//! Tensor contracts and values exchanged between the harness and backends.
//!
//! Declared shapes are signed: backends report dimensions the way compiled
//! artifacts store them, where `-1` marks a dimension left open at compile
//! time. Concrete tensors always carry resolved (positive) dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker used in declared shapes for a dimension with no fixed size.
pub const WILDCARD_DIM: i64 = -1;

/// Element type of a declared tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    F32,
    F64,
    U8,
    I8,
    I32,
    I64,
    Bool,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::U8 => "uint8",
            ElementType::I8 => "int8",
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::Bool => "bool",
        }
    }

    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            ElementType::F32 | ElementType::I32 => 4,
            ElementType::F64 | ElementType::I64 => 8,
            ElementType::U8 | ElementType::I8 | ElementType::Bool => 1,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ElementType::F32 | ElementType::F64)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A tensor as declared by an artifact: name, possibly-open shape, element type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
    pub dtype: ElementType,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<i64>, dtype: ElementType) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn has_wildcard(&self) -> bool {
        self.shape.iter().any(|&d| d == WILDCARD_DIM)
    }

    /// Rough input category used only for diagnostics.
    pub fn kind_label(&self) -> &'static str {
        if self.rank() == 4 {
            "image (NHWC)"
        } else {
            "text/other"
        }
    }
}

impl fmt::Display for TensorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, format_shape(&self.shape), self.dtype)
    }
}

/// Render a shape as `[1, 224, 224, 3]`.
pub fn format_shape<T: fmt::Display>(shape: &[T]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("[{}]", dims.join(", "))
}

/// Element storage of a concrete tensor.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    U8(Vec<u8>),
    I8(Vec<i8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::I8(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ElementType {
        match self {
            TensorData::F32(_) => ElementType::F32,
            TensorData::F64(_) => ElementType::F64,
            TensorData::U8(_) => ElementType::U8,
            TensorData::I8(_) => ElementType::I8,
            TensorData::I32(_) => ElementType::I32,
            TensorData::I64(_) => ElementType::I64,
            TensorData::Bool(_) => ElementType::Bool,
        }
    }
}

/// A concrete tensor value with a fully resolved shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl Tensor {
    pub fn dtype(&self) -> ElementType {
        self.data.dtype()
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len() * self.dtype().size_bytes()
    }

    /// The resolved spec this tensor satisfies.
    pub fn spec(&self) -> TensorSpec {
        TensorSpec::new(
            self.name.clone(),
            self.shape.iter().map(|&d| d as i64).collect(),
            self.dtype(),
        )
    }

    /// Whether this tensor fits a declared spec (wildcards match any size).
    pub fn matches(&self, spec: &TensorSpec) -> bool {
        self.dtype() == spec.dtype
            && self.shape.len() == spec.shape.len()
            && self
                .shape
                .iter()
                .zip(&spec.shape)
                .all(|(&have, &want)| want == WILDCARD_DIM || have as i64 == want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_dims_match_any_size() {
        let spec = TensorSpec::new("x", vec![WILDCARD_DIM, 4], ElementType::F32);
        let t = Tensor {
            name: "x".into(),
            shape: vec![3, 4],
            data: TensorData::F32(vec![0.0; 12]),
        };
        assert!(t.matches(&spec));

        let wrong = TensorSpec::new("x", vec![3, 5], ElementType::F32);
        assert!(!t.matches(&wrong));

        let wrong_dtype = TensorSpec::new("x", vec![3, 4], ElementType::I32);
        assert!(!t.matches(&wrong_dtype));
    }

    #[test]
    fn kind_label_follows_rank() {
        let image = TensorSpec::new("img", vec![1, 224, 224, 3], ElementType::F32);
        let text = TensorSpec::new("ids", vec![1, 128], ElementType::I32);
        assert_eq!(image.kind_label(), "image (NHWC)");
        assert_eq!(text.kind_label(), "text/other");
    }

    #[test]
    fn display_formats() {
        let spec = TensorSpec::new("ids", vec![-1, 128], ElementType::I32);
        assert_eq!(spec.to_string(), "ids [-1, 128] int32");
        assert_eq!(format_shape::<usize>(&[]), "[]");
    }
}
