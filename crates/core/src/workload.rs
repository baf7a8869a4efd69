//! Workload value types.
//!
//! Workloads are plain data, copied freely. A [`DpuWorkload`] is the
//! smallest unit the cost model prices: one DPU invocation. DMA and SHAVE
//! workloads describe transfers and vector-processor kernels.

use serde::{Deserialize, Serialize};

use crate::device::VpuDevice;
use crate::tensor::VpuTensor;
use crate::types::{
    ActivationFunction, DataType, ExecutionMode, IsiStrategy, Layout, MemoryLocation, Operation,
    Swizzling,
};

/// Height/width pair for kernels and strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dim2 {
    pub h: u32,
    pub w: u32,
}

impl Dim2 {
    pub fn square(v: u32) -> Self {
        Dim2 { h: v, w: v }
    }
}

/// Spatial padding in elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Padding {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// Byte offsets of the operands inside their backing tensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorOffsets {
    pub input_0: u64,
    pub input_1: u64,
    pub output_0: u64,
}

/// Spatial output size from the convolution output formula:
/// `ceil((input + pad_lo + pad_hi - kernel) / stride) + 1`.
pub fn output_extent(input: u32, pad_lo: u32, pad_hi: u32, kernel: u32, stride: u32) -> u32 {
    debug_assert!(stride > 0);
    let span = (input + pad_lo + pad_hi).saturating_sub(kernel);
    (span + stride - 1) / stride + 1
}

/// Inverse of [`output_extent`]: the input extent a given output requires.
pub fn input_extent_for_output(
    output: u32,
    kernel: u32,
    stride: u32,
    pad_lo: u32,
    pad_hi: u32,
) -> u32 {
    ((output - 1) * stride + kernel).saturating_sub(pad_lo + pad_hi)
}

/// One DPU invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpuWorkload {
    pub device: VpuDevice,
    pub op: Operation,
    /// Activation inputs: one tensor, or two for ELTWISE.
    pub inputs: Vec<VpuTensor>,
    /// Exactly one output tensor.
    pub outputs: Vec<VpuTensor>,
    pub kernel: Dim2,
    pub stride: Dim2,
    pub padding: Padding,
    pub execution_mode: ExecutionMode,
    pub activation: ActivationFunction,
    /// Activation sparsity ratio in `[0, 1]`.
    pub act_sparsity: f32,
    /// Weight sparsity ratio in `[0, 1]`; meaningful only when enabled.
    pub weight_sparsity: f32,
    pub weight_sparsity_enabled: bool,
    pub input_swizzling: [Swizzling; 2],
    pub output_swizzling: Swizzling,
    /// Number of tiles this workload's output is broadcast to.
    pub output_write_tiles: u32,
    pub offsets: TensorOffsets,
    pub isi_strategy: IsiStrategy,
}

impl DpuWorkload {
    /// A workload with every optional knob at its quiet value. Callers fill
    /// in the geometry they care about.
    pub fn with_tensors(
        device: VpuDevice,
        op: Operation,
        inputs: Vec<VpuTensor>,
        output: VpuTensor,
    ) -> Self {
        DpuWorkload {
            device,
            op,
            inputs,
            outputs: vec![output],
            kernel: Dim2::square(1),
            stride: Dim2::square(1),
            padding: Padding::default(),
            execution_mode: ExecutionMode::Cuboid16x16,
            activation: ActivationFunction::None,
            act_sparsity: 0.0,
            weight_sparsity: 0.0,
            weight_sparsity_enabled: false,
            input_swizzling: [Swizzling::Key0, Swizzling::Key0],
            output_swizzling: Swizzling::Key0,
            output_write_tiles: 1,
            offsets: TensorOffsets::default(),
            isi_strategy: IsiStrategy::Clustering,
        }
    }

    /// The neutral workload used to right-pad NN batches. Its cost is
    /// computed and discarded; it only has to encode cleanly under every
    /// descriptor schema.
    pub fn neutral(device: VpuDevice) -> Self {
        let t = VpuTensor::new([1, 1, 16, 1], DataType::Uint8, Layout::Zxy, false)
            .expect("neutral tensor shape is static");
        let mut wl = Self::with_tensors(device, Operation::Convolution, vec![t], t);
        wl.execution_mode = ExecutionMode::Matrix;
        wl
    }

    pub fn input_0(&self) -> &VpuTensor {
        &self.inputs[0]
    }

    pub fn output_0(&self) -> &VpuTensor {
        &self.outputs[0]
    }

    pub fn input_channels(&self) -> u32 {
        self.input_0().z()
    }

    pub fn output_channels(&self) -> u32 {
        self.output_0().z()
    }

    /// Output width implied by the input geometry.
    pub fn expected_output_width(&self) -> u32 {
        output_extent(
            self.input_0().x(),
            self.padding.left,
            self.padding.right,
            self.kernel.w,
            self.stride.w,
        )
    }

    /// Output height implied by the input geometry.
    pub fn expected_output_height(&self) -> u32 {
        output_extent(
            self.input_0().y(),
            self.padding.top,
            self.padding.bottom,
            self.kernel.h,
            self.stride.h,
        )
    }

    /// MAC operations needed per output element, before sparsity.
    ///
    /// Channel-preserving operations reduce over a single input channel;
    /// ELTWISE is one op per element.
    pub fn macs_per_output(&self) -> u64 {
        let k = self.kernel.h as u64 * self.kernel.w as u64;
        match self.op {
            Operation::Convolution | Operation::CmConvolution => k * self.input_channels() as u64,
            Operation::DwConvolution | Operation::Maxpool | Operation::Avepool => k,
            Operation::Eltwise => 1,
        }
    }

    /// Weight sparsity that is actually in effect.
    pub fn effective_weight_sparsity(&self) -> f32 {
        if self.weight_sparsity_enabled {
            self.weight_sparsity.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// One DMA transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DmaWorkload {
    pub device: VpuDevice,
    pub input: VpuTensor,
    pub output: VpuTensor,
    pub input_location: MemoryLocation,
    pub output_location: MemoryLocation,
    pub output_write_tiles: u32,
    /// Activation decompression enabled on the transfer.
    pub compression: bool,
    /// Layout permutation performed during the transfer.
    pub permute: bool,
}

impl DmaWorkload {
    pub fn new(
        device: VpuDevice,
        input: VpuTensor,
        output: VpuTensor,
        input_location: MemoryLocation,
        output_location: MemoryLocation,
    ) -> Self {
        DmaWorkload {
            device,
            input,
            output,
            input_location,
            output_location,
            output_write_tiles: 1,
            compression: false,
            permute: false,
        }
    }
}

/// One SHAVE kernel invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaveWorkload {
    /// Kernel name, resolved against the SHAVE kernel table.
    pub name: String,
    pub device: VpuDevice,
    pub inputs: Vec<VpuTensor>,
    pub outputs: Vec<VpuTensor>,
}

impl ShaveWorkload {
    pub fn new(
        name: impl Into<String>,
        device: VpuDevice,
        inputs: Vec<VpuTensor>,
        outputs: Vec<VpuTensor>,
    ) -> Self {
        ShaveWorkload {
            name: name.into(),
            device,
            inputs,
            outputs,
        }
    }

    /// Bytes written by the kernel.
    pub fn output_bytes(&self) -> u64 {
        self.outputs.iter().map(|t| t.size_bytes()).sum()
    }
}
