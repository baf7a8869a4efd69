//! Flat-model buffer parsing.
//!
//! The trained estimator arrives as an opaque little-endian byte buffer:
//!
//! ```text
//! offset 0   magic  b"VPUN"
//! offset 4   u32    name length, then the name bytes ("<arch>-<VI>-<VO>")
//!            u32    layer count
//! per layer: u32    kind (0 Dense, 1 Bias, 2 L2Norm, 3 Sigmoid, 4 Knn)
//!            Dense: u32 out, u32 in, out*in f32 row-major
//!            Bias:  u32 len, len f32
//!            Knn:   u32 k, u32 refs, u32 dim, refs*dim f32, refs f32
//! ```
//!
//! The buffer may be handed over owned or borrowed; weights are decoded
//! into the model's own f32 storage either way, so the borrow constructor
//! only saves the upfront byte copy. Parsing failures are the one place the
//! engine raises real errors, strictly at construction time.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::error::ModelError;
use crate::layers::LayerOp;
use crate::tensor::Tensor;
use crate::version::ModelVersion;

const MAGIC: &[u8; 4] = b"VPUN";
/// Upper bound on any single declared count, to reject corrupt headers
/// before allocating.
const MAX_DECLARED: u64 = 64 * 1024 * 1024;

/// The serialized model bytes, owned or borrowed.
#[derive(Debug, Clone)]
pub enum ModelBlob<'a> {
    /// Deep copy taken at construction.
    Owned(Vec<u8>),
    /// Caller-owned bytes; the compiler holds the caller to the lifetime.
    Borrowed(&'a [u8]),
}

impl<'a> ModelBlob<'a> {
    /// Copying constructor: the blob outlives the caller's buffer.
    pub fn copied(bytes: &[u8]) -> ModelBlob<'static> {
        ModelBlob::Owned(bytes.to_vec())
    }

    /// Borrowing constructor: zero-copy handoff.
    pub fn borrowed(bytes: &'a [u8]) -> ModelBlob<'a> {
        ModelBlob::Borrowed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ModelBlob::Owned(v) => v,
            ModelBlob::Borrowed(b) => b,
        }
    }
}

/// A loaded, immutable estimator graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NnModel {
    name: String,
    version: ModelVersion,
    layers: Vec<LayerOp>,
    input_dim: usize,
    output_dim: usize,
}

impl NnModel {
    /// Parse a model from its serialized blob.
    pub fn load(blob: &ModelBlob<'_>) -> Result<Self, ModelError> {
        let bytes = blob.as_bytes();
        let mut r = Reader::new(bytes);

        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ModelError::BadMagic);
        }

        let name_len = r.read_count()?;
        let mut name_bytes = vec![0u8; name_len as usize];
        r.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes).map_err(|_| ModelError::BadName)?;
        let version = ModelVersion::parse(&name);

        let layer_count = r.read_count()?;
        let mut layers = Vec::with_capacity(layer_count as usize);
        for _ in 0..layer_count {
            layers.push(r.read_layer()?);
        }

        let (input_dim, output_dim) = chain_shapes(&layers)?;
        debug!(
            target: "vpucost::nn",
            name = %name,
            layers = layers.len(),
            input_dim,
            output_dim,
            "model loaded"
        );
        Ok(NnModel {
            name,
            version,
            layers,
            input_dim,
            output_dim,
        })
    }

    /// Convenience borrow-and-parse.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        Self::load(&ModelBlob::borrowed(bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    pub fn layers(&self) -> &[LayerOp] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

/// Validate the layer sequence and return `(input_dim, output_dim)`.
fn chain_shapes(layers: &[LayerOp]) -> Result<(usize, usize), ModelError> {
    let input_dim = match layers.first() {
        Some(LayerOp::Dense { weights }) => weights.cols,
        Some(LayerOp::Knn { refs, .. }) => refs.cols,
        Some(LayerOp::Bias { bias }) => bias.len(),
        // A model of only shape-preserving layers pins no width.
        Some(LayerOp::L2Norm) | Some(LayerOp::Sigmoid) | None => return Err(ModelError::Empty),
    };
    let mut dim = input_dim;
    for layer in layers {
        dim = layer.output_cols(dim)?;
    }
    Ok((input_dim, dim))
}

/// Serialize a layer stack into the flat wire format. Fixture and tooling
/// support; the production exporter lives in the training pipeline.
pub fn encode_model(name: &str, layers: &[LayerOp]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    put_u32(&mut out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
    put_u32(&mut out, layers.len() as u32);
    for layer in layers {
        match layer {
            LayerOp::Dense { weights } => {
                put_u32(&mut out, 0);
                put_u32(&mut out, weights.rows as u32);
                put_u32(&mut out, weights.cols as u32);
                put_f32s(&mut out, &weights.data);
            }
            LayerOp::Bias { bias } => {
                put_u32(&mut out, 1);
                put_u32(&mut out, bias.len() as u32);
                put_f32s(&mut out, bias);
            }
            LayerOp::L2Norm => put_u32(&mut out, 2),
            LayerOp::Sigmoid => put_u32(&mut out, 3),
            LayerOp::Knn { refs, targets, k } => {
                put_u32(&mut out, 4);
                put_u32(&mut out, *k);
                put_u32(&mut out, refs.rows as u32);
                put_u32(&mut out, refs.cols as u32);
                put_f32s(&mut out, &refs.data);
                put_f32s(&mut out, targets);
            }
        }
    }
    out
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32s(out: &mut Vec<u8>, vs: &[f32]) {
    for v in vs {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Cursor wrapper translating IO errors into positioned parse errors.
struct Reader<'a> {
    inner: io::Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader {
            inner: io::Cursor::new(bytes),
        }
    }

    fn offset(&self) -> usize {
        self.inner.position() as usize
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ModelError> {
        let offset = self.offset();
        self.inner
            .read_exact(buf)
            .map_err(|_| ModelError::Truncated { offset })
    }

    fn read_u32(&mut self) -> Result<u32, ModelError> {
        let offset = self.offset();
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(|_| ModelError::Truncated { offset })
    }

    /// A declared element count, bounds-checked.
    fn read_count(&mut self) -> Result<u32, ModelError> {
        let v = self.read_u32()?;
        if v as u64 > MAX_DECLARED {
            return Err(ModelError::Oversized { declared: v as u64 });
        }
        Ok(v)
    }

    fn read_f32s(&mut self, count: usize) -> Result<Vec<f32>, ModelError> {
        let offset = self.offset();
        let mut out = vec![0.0f32; count];
        self.inner
            .read_f32_into::<LittleEndian>(&mut out)
            .map_err(|_| ModelError::Truncated { offset })?;
        Ok(out)
    }

    fn read_layer(&mut self) -> Result<LayerOp, ModelError> {
        let kind = self.read_u32()?;
        match kind {
            0 => {
                let rows = self.read_count()? as usize;
                let cols = self.read_count()? as usize;
                if (rows as u64) * (cols as u64) > MAX_DECLARED {
                    return Err(ModelError::Oversized {
                        declared: rows as u64 * cols as u64,
                    });
                }
                let data = self.read_f32s(rows * cols)?;
                Ok(LayerOp::Dense {
                    weights: Tensor::from_slice(&data, rows, cols),
                })
            }
            1 => {
                let len = self.read_count()? as usize;
                Ok(LayerOp::Bias {
                    bias: self.read_f32s(len)?,
                })
            }
            2 => Ok(LayerOp::L2Norm),
            3 => Ok(LayerOp::Sigmoid),
            4 => {
                let k = self.read_u32()?;
                let refs = self.read_count()? as usize;
                let dim = self.read_count()? as usize;
                if (refs as u64) * (dim as u64) > MAX_DECLARED {
                    return Err(ModelError::Oversized {
                        declared: refs as u64 * dim as u64,
                    });
                }
                let data = self.read_f32s(refs * dim)?;
                let targets = self.read_f32s(refs)?;
                Ok(LayerOp::Knn {
                    refs: Tensor::from_slice(&data, refs, dim),
                    targets,
                    k,
                })
            }
            other => Err(ModelError::UnknownLayerKind { kind: other }),
        }
    }
}
