//! Synthetic input generation.
//!
//! The harness measures performance only, so inputs are random values that
//! satisfy an artifact's declared contract and nothing more. Image-like
//! (rank-4 NHWC) and sequence-like inputs are filled the same way.
//!
//! Value domains per element type:
//! - `float32`/`float64`: uniform in `[0, 1)`
//! - `uint8`: uniform over `[0, 255]`, `int8` over `[-128, 127]`
//! - `int32`/`int64`: uniform in `[0, int_high)` (token ids)
//! - `bool`: fair coin

use crate::error::{BenchError, Result};
use crate::tensor::{ElementType, Tensor, TensorData, TensorSpec, WILDCARD_DIM};
use rand::Rng;

/// Default cap on the bytes of one synthesized input (1 GiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 1 << 30;

/// How open (`-1`) dimensions are turned into concrete sizes.
///
/// A leading wildcard is the batch dimension and always resolves to
/// `batch_size` (1 unless configured). Wildcards elsewhere resolve to
/// `dynamic_dim` when set; without it they are a shape error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WildcardPolicy {
    pub batch_size: usize,
    pub dynamic_dim: Option<usize>,
}

impl Default for WildcardPolicy {
    fn default() -> Self {
        Self {
            batch_size: 1,
            dynamic_dim: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct InputSynthesizer {
    pub policy: WildcardPolicy,
    /// Exclusive upper bound for integer token ids.
    pub int_high: i64,
    /// Inputs larger than this are a shape error instead of an allocation.
    pub max_input_bytes: u64,
}

impl Default for InputSynthesizer {
    fn default() -> Self {
        Self {
            policy: WildcardPolicy::default(),
            int_high: 256,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl InputSynthesizer {
    /// Resolve a declared shape to concrete dimensions.
    pub fn resolve_shape(&self, spec: &TensorSpec) -> Result<Vec<usize>> {
        let shape_error = |reason: String| BenchError::Shape {
            input: spec.name.clone(),
            shape: spec.shape.clone(),
            reason,
        };

        spec.shape
            .iter()
            .enumerate()
            .map(|(axis, &dim)| match dim {
                d if d > 0 => usize::try_from(d)
                    .map_err(|_| shape_error(format!("dimension {axis} is too large"))),
                WILDCARD_DIM if axis == 0 => Ok(self.policy.batch_size),
                WILDCARD_DIM => self.policy.dynamic_dim.ok_or_else(|| {
                    shape_error(format!(
                        "dimension {axis} is unknown and no dynamic size is configured"
                    ))
                }),
                d => Err(shape_error(format!("dimension {axis} is non-positive ({d})"))),
            })
            .collect()
    }

    /// Element count of `shape`, refusing overflow and anything over the byte cap.
    fn checked_len(&self, spec: &TensorSpec, shape: &[usize]) -> Result<usize> {
        let too_large = || BenchError::Shape {
            input: spec.name.clone(),
            shape: spec.shape.clone(),
            reason: format!(
                "resolved shape {shape:?} exceeds the {} byte input limit",
                self.max_input_bytes
            ),
        };
        let n = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(too_large)?;
        let bytes = n
            .checked_mul(spec.dtype.size_bytes())
            .and_then(|b| u64::try_from(b).ok())
            .ok_or_else(too_large)?;
        if bytes > self.max_input_bytes {
            return Err(too_large());
        }
        Ok(n)
    }

    /// Build one random tensor matching `spec`.
    pub fn synthesize<R: Rng + ?Sized>(&self, spec: &TensorSpec, rng: &mut R) -> Result<Tensor> {
        let shape = self.resolve_shape(spec)?;
        let n = self.checked_len(spec, &shape)?;
        let high = self.int_high.max(1);

        let data = match spec.dtype {
            ElementType::F32 => TensorData::F32((0..n).map(|_| rng.gen::<f32>()).collect()),
            ElementType::F64 => TensorData::F64((0..n).map(|_| rng.gen::<f64>()).collect()),
            ElementType::U8 => TensorData::U8((0..n).map(|_| rng.gen::<u8>()).collect()),
            ElementType::I8 => TensorData::I8((0..n).map(|_| rng.gen::<i8>()).collect()),
            ElementType::I32 => {
                let high = i32::try_from(high).unwrap_or(i32::MAX);
                TensorData::I32((0..n).map(|_| rng.gen_range(0..high)).collect())
            }
            ElementType::I64 => TensorData::I64((0..n).map(|_| rng.gen_range(0..high)).collect()),
            ElementType::Bool => TensorData::Bool((0..n).map(|_| rng.gen::<bool>()).collect()),
        };

        Ok(Tensor {
            name: spec.name.clone(),
            shape,
            data,
        })
    }

    /// Build one tensor per declared input, in declaration order.
    pub fn synthesize_all<R: Rng + ?Sized>(
        &self,
        specs: &[TensorSpec],
        rng: &mut R,
    ) -> Result<Vec<Tensor>> {
        specs.iter().map(|s| self.synthesize(s, rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn image_input_shape_matches_declaration() {
        let spec = TensorSpec::new("image", vec![1, 8, 8, 3], ElementType::F32);
        let t = InputSynthesizer::default().synthesize(&spec, &mut rng()).unwrap();
        assert_eq!(t.shape, vec![1, 8, 8, 3]);
        match t.data {
            TensorData::F32(v) => {
                assert_eq!(v.len(), 192);
                assert!(v.iter().all(|x| (0.0..1.0).contains(x)));
            }
            other => panic!("unexpected dtype {:?}", other.dtype()),
        }
    }

    #[test]
    fn token_ids_stay_below_int_high() {
        let spec = TensorSpec::new("ids", vec![2, 50], ElementType::I32);
        let synth = InputSynthesizer {
            int_high: 10,
            ..Default::default()
        };
        let t = synth.synthesize(&spec, &mut rng()).unwrap();
        assert_eq!(t.shape, vec![2, 50]);
        match t.data {
            TensorData::I32(v) => assert!(v.iter().all(|&x| (0..10).contains(&x))),
            other => panic!("unexpected dtype {:?}", other.dtype()),
        }
    }

    #[test]
    fn leading_wildcard_uses_batch_size() {
        let spec = TensorSpec::new("image", vec![-1, 4, 4, 3], ElementType::U8);
        let synth = InputSynthesizer::default();
        assert_eq!(synth.resolve_shape(&spec).unwrap(), vec![1, 4, 4, 3]);

        let batched = InputSynthesizer {
            policy: WildcardPolicy {
                batch_size: 8,
                dynamic_dim: None,
            },
            ..Default::default()
        };
        assert_eq!(batched.resolve_shape(&spec).unwrap(), vec![8, 4, 4, 3]);
    }

    #[test]
    fn inner_wildcard_needs_dynamic_dim() {
        let spec = TensorSpec::new("ids", vec![1, -1], ElementType::I64);
        let err = InputSynthesizer::default().resolve_shape(&spec).unwrap_err();
        assert!(matches!(err, BenchError::Shape { .. }));

        let synth = InputSynthesizer {
            policy: WildcardPolicy {
                batch_size: 1,
                dynamic_dim: Some(16),
            },
            ..Default::default()
        };
        assert_eq!(synth.resolve_shape(&spec).unwrap(), vec![1, 16]);
    }

    #[test]
    fn non_positive_dims_are_rejected() {
        let synth = InputSynthesizer::default();
        for shape in [vec![1, 0, 3], vec![1, -2], vec![0]] {
            let spec = TensorSpec::new("x", shape, ElementType::F32);
            assert!(matches!(
                synth.resolve_shape(&spec),
                Err(BenchError::Shape { .. })
            ));
        }
    }

    #[test]
    fn huge_shapes_are_refused_before_allocating() {
        let synth = InputSynthesizer::default();
        let spec = TensorSpec::new("image", vec![1, 1 << 20, 1 << 20, 64], ElementType::F32);
        assert!(matches!(
            synth.synthesize(&spec, &mut rng()),
            Err(BenchError::Shape { .. })
        ));

        let spec = TensorSpec::new("x", vec![1 << 40, 1 << 40, 1 << 40], ElementType::U8);
        assert!(matches!(
            synth.synthesize(&spec, &mut rng()),
            Err(BenchError::Shape { .. })
        ));

        let tight = InputSynthesizer {
            max_input_bytes: 64,
            ..Default::default()
        };
        let spec = TensorSpec::new("x", vec![1, 16], ElementType::F32);
        assert!(tight.synthesize(&spec, &mut rng()).is_ok());
        let spec = TensorSpec::new("x", vec![1, 17], ElementType::F32);
        let err = tight.synthesize(&spec, &mut rng()).unwrap_err();
        assert!(err.to_string().contains("byte input limit"));
    }

    #[test]
    fn scalar_input_has_one_element() {
        let spec = TensorSpec::new("flag", vec![], ElementType::Bool);
        let t = InputSynthesizer::default().synthesize(&spec, &mut rng()).unwrap();
        assert!(t.shape.is_empty());
        assert_eq!(t.data.len(), 1);
    }

    #[test]
    fn same_seed_same_input() {
        let spec = TensorSpec::new("x", vec![1, 16], ElementType::F64);
        let synth = InputSynthesizer::default();
        let a = synth.synthesize(&spec, &mut rng()).unwrap();
        let b = synth.synthesize(&spec, &mut rng()).unwrap();
        assert_eq!(a, b);
    }
}
