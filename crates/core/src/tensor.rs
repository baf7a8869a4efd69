//! Tensor value type.
//!
//! A [`VpuTensor`] is a pure description (shape, element type, layout and
//! sparsity flag), not a data buffer. Strides derive from shape and layout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DataType, Layout};

/// Construction-time tensor errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TensorError {
    #[error("tensor dimension {axis} is zero")]
    ZeroDimension { axis: &'static str },
    #[error("datatype change {from:?} -> {to:?} alters element width")]
    WidthChange { from: DataType, to: DataType },
    #[error("layout change {from:?} -> {to:?} crosses the legacy/permutation boundary")]
    LayoutClass { from: Layout, to: Layout },
}

/// Shape, element type, layout and sparsity of one operand.
///
/// Dimensions are width (`x`), height (`y`), channels (`z`) and batch (`b`),
/// all strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VpuTensor {
    shape: [u32; 4],
    dtype: DataType,
    layout: Layout,
    sparsity: bool,
}

impl VpuTensor {
    /// Build a tensor, rejecting zero dimensions.
    pub fn new(
        shape: [u32; 4],
        dtype: DataType,
        layout: Layout,
        sparsity: bool,
    ) -> Result<Self, TensorError> {
        const AXES: [&str; 4] = ["x", "y", "z", "b"];
        for (i, &d) in shape.iter().enumerate() {
            if d == 0 {
                return Err(TensorError::ZeroDimension { axis: AXES[i] });
            }
        }
        Ok(VpuTensor {
            shape,
            dtype,
            layout,
            sparsity,
        })
    }

    /// Dense uint8 helper used all over the tests.
    pub fn dense(shape: [u32; 4], dtype: DataType, layout: Layout) -> Result<Self, TensorError> {
        Self::new(shape, dtype, layout, false)
    }

    pub fn x(&self) -> u32 {
        self.shape[0]
    }

    pub fn y(&self) -> u32 {
        self.shape[1]
    }

    pub fn z(&self) -> u32 {
        self.shape[2]
    }

    pub fn b(&self) -> u32 {
        self.shape[3]
    }

    pub fn shape(&self) -> [u32; 4] {
        self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_sparse(&self) -> bool {
        self.sparsity
    }

    /// Total element count.
    pub fn elements(&self) -> u64 {
        self.shape.iter().map(|&d| d as u64).product()
    }

    /// Dense storage size.
    pub fn size_bytes(&self) -> u64 {
        self.elements() * self.dtype.bytes() as u64
    }

    /// Element strides for `[x, y, z, b]`, derived from the layout
    /// permutation. The innermost dimension has stride 1; batch is always
    /// outermost.
    pub fn strides_elements(&self) -> [u64; 4] {
        let perm = self.layout.permutation();
        let dims = [self.x() as u64, self.y() as u64, self.z() as u64];
        let mut strides = [0u64; 4];
        let mut acc = 1u64;
        for &axis in &perm {
            strides[axis] = acc;
            acc *= dims[axis];
        }
        strides[3] = acc;
        strides
    }

    /// Same tensor with a different element type of identical width.
    pub fn with_dtype(&self, dtype: DataType) -> Result<Self, TensorError> {
        if dtype.bytes() != self.dtype.bytes() {
            return Err(TensorError::WidthChange {
                from: self.dtype,
                to: dtype,
            });
        }
        Ok(VpuTensor { dtype, ..*self })
    }

    /// Same tensor with a different layout of the same class (legacy stays
    /// legacy, permutation stays permutation).
    pub fn with_layout(&self, layout: Layout) -> Result<Self, TensorError> {
        if layout.is_legacy() != self.layout.is_legacy() {
            return Err(TensorError::LayoutClass {
                from: self.layout,
                to: layout,
            });
        }
        Ok(VpuTensor { layout, ..*self })
    }

    /// Canonicalized copy: legacy layout names replaced by their
    /// permutation equivalents. Used by the sanitizer.
    pub fn canonicalized(&self) -> Self {
        VpuTensor {
            layout: self.layout.canonical(),
            ..*self
        }
    }
}
