//! Estimator layer kernels.
//!
//! The pipeline is a flat sequence of these operations. Dispatch is a plain
//! match on the tag; no virtual calls on the hot path.

use crate::error::ModelError;
use crate::tensor::Tensor;

/// One layer of the estimator graph.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOp {
    /// `out = x · W^T`, weights shaped `(out, in)` row-major, no bias.
    Dense { weights: Tensor },
    /// `out += b`, broadcast along the batch.
    Bias { bias: Vec<f32> },
    /// Per-row L2 normalization.
    L2Norm,
    /// Element-wise logistic sigmoid.
    Sigmoid,
    /// k-nearest-neighbour head: inner products against every stored
    /// reference row, mean of the `k` best target values per batch row.
    Knn {
        refs: Tensor,
        targets: Vec<f32>,
        k: u32,
    },
}

impl LayerOp {
    /// Output width for a given input width, or a shape-chaining error.
    pub fn output_cols(&self, input_cols: usize) -> Result<usize, ModelError> {
        match self {
            LayerOp::Dense { weights } => {
                if weights.cols != input_cols {
                    return Err(ModelError::ShapeMismatch {
                        layer: "Dense",
                        expected: weights.cols,
                        got: input_cols,
                    });
                }
                Ok(weights.rows)
            }
            LayerOp::Bias { bias } => {
                if bias.len() != input_cols {
                    return Err(ModelError::ShapeMismatch {
                        layer: "Bias",
                        expected: bias.len(),
                        got: input_cols,
                    });
                }
                Ok(input_cols)
            }
            LayerOp::L2Norm | LayerOp::Sigmoid => Ok(input_cols),
            LayerOp::Knn { refs, targets, k } => {
                if refs.cols != input_cols {
                    return Err(ModelError::ShapeMismatch {
                        layer: "Knn",
                        expected: refs.cols,
                        got: input_cols,
                    });
                }
                if targets.len() != refs.rows || *k == 0 || (*k as usize) > refs.rows {
                    return Err(ModelError::BadKnnHead {
                        refs: refs.rows,
                        targets: targets.len(),
                        k: *k,
                    });
                }
                Ok(1)
            }
        }
    }

    /// Evaluate the layer over a batch.
    pub fn run(&self, input: Tensor) -> Tensor {
        match self {
            LayerOp::Dense { weights } => input.matmul_transpose(weights),
            LayerOp::Bias { bias } => {
                let mut out = input;
                out.add_bias(bias);
                out
            }
            LayerOp::L2Norm => {
                let mut out = input;
                out.l2_normalize_rows();
                out
            }
            LayerOp::Sigmoid => {
                let mut out = input;
                out.sigmoid_inplace();
                out
            }
            LayerOp::Knn { refs, targets, k } => {
                let mut out = Tensor::zeros(input.rows, 1);
                for r in 0..input.rows {
                    out.data[r] = knn_row(input.row(r), refs, targets, *k as usize);
                }
                out
            }
        }
    }
}

/// Mean target value of the `k` references with the largest inner product
/// against `row`.
fn knn_row(row: &[f32], refs: &Tensor, targets: &[f32], k: usize) -> f32 {
    let mut scored: Vec<(f32, f32)> = (0..refs.rows)
        .map(|i| {
            let r = refs.row(i);
            let score: f32 = row.iter().zip(r.iter()).map(|(a, b)| a * b).sum();
            (score, targets[i])
        })
        .collect();
    // Descending by score; ties resolved by reference order for
    // determinism.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let take = k.min(scored.len()).max(1);
    scored[..take].iter().map(|(_, t)| t).sum::<f32>() / take as f32
}
