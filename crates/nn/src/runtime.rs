//! Batch inference over a loaded model.
//!
//! The runtime owns the activation buffers. Inputs are copied in row by
//! row; `predict` walks the layer stack once; outputs stay in the runtime
//! until the next prediction. Everything is deterministic: the same inputs
//! against the same model produce bit-identical outputs.

use crate::error::ModelError;
use crate::model::NnModel;
use crate::tensor::Tensor;

/// Inference state for one model at a fixed batch size.
#[derive(Debug, Clone)]
pub struct InferenceRuntime {
    model: NnModel,
    batch: usize,
    input: Tensor,
    output: Tensor,
}

impl InferenceRuntime {
    /// Wrap a loaded model. `batch` rows are evaluated per `predict` call.
    pub fn new(model: NnModel, batch: usize) -> Self {
        let batch = batch.max(1);
        let input = Tensor::zeros(batch, model.input_dim());
        let output = Tensor::zeros(batch, model.output_dim());
        InferenceRuntime {
            model,
            batch,
            input,
            output,
        }
    }

    pub fn model(&self) -> &NnModel {
        &self.model
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn input_dim(&self) -> usize {
        self.model.input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.model.output_dim()
    }

    /// Copy up to `batch_size` rows into the input buffer. Rows beyond the
    /// provided ones keep their previous contents; callers pad the batch
    /// themselves with neutral descriptors.
    pub fn set_inputs(&mut self, rows: &[Vec<f32>]) -> Result<(), ModelError> {
        if rows.len() > self.batch {
            return Err(ModelError::ShapeMismatch {
                layer: "input",
                expected: self.batch,
                got: rows.len(),
            });
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != self.model.input_dim() {
                return Err(ModelError::ShapeMismatch {
                    layer: "input",
                    expected: self.model.input_dim(),
                    got: row.len(),
                });
            }
            self.input.row_mut(i).copy_from_slice(row);
        }
        Ok(())
    }

    /// Evaluate the layer stack over the whole batch.
    pub fn predict(&mut self) {
        let mut act = self.input.clone();
        for layer in self.model.layers() {
            act = layer.run(act);
        }
        self.output = act;
    }

    /// Flattened outputs of the last prediction, `batch * output_dim`
    /// long.
    pub fn outputs(&self) -> &[f32] {
        &self.output.data
    }

    /// Output row for one batch entry.
    pub fn output_row(&self, row: usize) -> &[f32] {
        self.output.row(row)
    }

    /// `(batch, input_dim)` of the input activation buffer.
    pub fn input_shape(&self) -> (usize, usize) {
        (self.input.rows, self.input.cols)
    }

    /// `(batch, output_dim)` of the output buffer.
    pub fn output_shape(&self) -> (usize, usize) {
        (self.batch, self.model.output_dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerOp;
    use crate::model::encode_model;

    fn identity_ish_model() -> NnModel {
        // Dense picks [x0+x1, x2]; bias shifts; sigmoid squashes.
        let layers = vec![
            LayerOp::Dense {
                weights: Tensor::from_slice(&[1.0, 1.0, 0.0, 0.0, 0.0, 1.0], 2, 3),
            },
            LayerOp::Bias {
                bias: vec![0.0, 0.0],
            },
            LayerOp::Sigmoid,
        ];
        NnModel::from_bytes(&encode_model("t-10-1", &layers)).unwrap()
    }

    #[test]
    fn batched_predict_matches_single_rows() {
        let model = identity_ish_model();
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![-1.0, 0.5, 2.0];

        let mut batched = InferenceRuntime::new(model.clone(), 2);
        batched.set_inputs(&[a.clone(), b.clone()]).unwrap();
        batched.predict();
        let batch_out = batched.outputs().to_vec();

        for (i, row) in [a, b].into_iter().enumerate() {
            let mut single = InferenceRuntime::new(model.clone(), 1);
            single.set_inputs(&[row]).unwrap();
            single.predict();
            assert_eq!(single.outputs(), &batch_out[i * 2..(i + 1) * 2]);
        }
    }

    #[test]
    fn padded_rows_do_not_disturb_real_rows() {
        let model = identity_ish_model();
        let real = vec![0.5, 0.5, 0.5];

        let mut padded = InferenceRuntime::new(model.clone(), 4);
        padded.set_inputs(&[real.clone()]).unwrap();
        padded.predict();

        let mut exact = InferenceRuntime::new(model, 1);
        exact.set_inputs(&[real]).unwrap();
        exact.predict();

        assert_eq!(padded.output_row(0), exact.output_row(0));
    }

    #[test]
    fn wrong_width_rejected() {
        let model = identity_ish_model();
        let mut rt = InferenceRuntime::new(model, 1);
        assert!(rt.set_inputs(&[vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn too_many_rows_rejected() {
        let model = identity_ish_model();
        let mut rt = InferenceRuntime::new(model, 1);
        let row = vec![0.0, 0.0, 0.0];
        assert!(rt.set_inputs(&[row.clone(), row]).is_err());
    }

    #[test]
    fn repeated_prediction_is_deterministic() {
        let model = identity_ish_model();
        let mut rt = InferenceRuntime::new(model, 2);
        rt.set_inputs(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]])
            .unwrap();
        rt.predict();
        let first = rt.outputs().to_vec();
        rt.predict();
        assert_eq!(rt.outputs(), &first[..]);
    }

    #[test]
    fn shapes_report_model_dims() {
        let model = identity_ish_model();
        let rt = InferenceRuntime::new(model, 8);
        assert_eq!(rt.input_shape(), (8, 3));
        assert_eq!(rt.output_shape(), (8, 2));
    }
}
