//! Closed-set enumerations used throughout the cost model.
//!
//! Every enum carries a bidirectional name map: `name()` gives the canonical
//! string, `from_name()` the inverse. Registries and converters look values
//! up by name, never by numeric position. Positions only matter inside one
//! descriptor schema's one-hot blocks, where the schema pins its own tables.

use serde::{Deserialize, Serialize};

/// Contract shared by the closed-set enums.
///
/// `ALL` lists every real value in declaration order; `COUNT` is the
/// cardinality (the index one past the last real value).
pub trait NamedEnum: Sized + Copy + PartialEq + 'static {
    /// Every value, in declaration order.
    const ALL: &'static [Self];

    /// Cardinality of the enum.
    const COUNT: usize = Self::ALL.len();

    /// Canonical name of this value.
    fn name(&self) -> &'static str;

    /// Inverse of [`NamedEnum::name`]. `None` when the name is unknown.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.name() == name)
    }

    /// Position of this value within [`NamedEnum::ALL`].
    fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|v| v == self)
            .expect("value missing from ALL")
    }
}

/// DPU operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Convolution,
    DwConvolution,
    CmConvolution,
    Eltwise,
    Maxpool,
    Avepool,
}

impl NamedEnum for Operation {
    const ALL: &'static [Self] = &[
        Operation::Convolution,
        Operation::DwConvolution,
        Operation::CmConvolution,
        Operation::Eltwise,
        Operation::Maxpool,
        Operation::Avepool,
    ];

    fn name(&self) -> &'static str {
        match self {
            Operation::Convolution => "CONVOLUTION",
            Operation::DwConvolution => "DW_CONVOLUTION",
            Operation::CmConvolution => "CM_CONVOLUTION",
            Operation::Eltwise => "ELTWISE",
            Operation::Maxpool => "MAXPOOL",
            Operation::Avepool => "AVEPOOL",
        }
    }
}

impl Operation {
    /// Operations whose input channel count must equal the output channel
    /// count (depthwise and pooling family).
    pub fn is_channel_preserving(&self) -> bool {
        matches!(
            self,
            Operation::DwConvolution | Operation::Maxpool | Operation::Avepool
        )
    }

    /// Operations that carry a weights operand.
    pub fn has_weights(&self) -> bool {
        matches!(
            self,
            Operation::Convolution | Operation::DwConvolution | Operation::CmConvolution
        )
    }

    /// Number of activation input tensors the operation consumes.
    pub fn activation_inputs(&self) -> usize {
        if *self == Operation::Eltwise {
            2
        } else {
            1
        }
    }
}

/// Tensor element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Uint8,
    Int8,
    Float16,
    Bfloat16,
}

impl NamedEnum for DataType {
    const ALL: &'static [Self] = &[
        DataType::Uint8,
        DataType::Int8,
        DataType::Float16,
        DataType::Bfloat16,
    ];

    fn name(&self) -> &'static str {
        match self {
            DataType::Uint8 => "UINT8",
            DataType::Int8 => "INT8",
            DataType::Float16 => "FLOAT16",
            DataType::Bfloat16 => "BFLOAT16",
        }
    }
}

impl DataType {
    /// Storage size of one element.
    pub fn bytes(&self) -> u32 {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Float16 | DataType::Bfloat16 => 2,
        }
    }

    /// Whether the type runs on the float datapath.
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::Float16 | DataType::Bfloat16)
    }
}

/// Tensor memory layout.
///
/// `Zmajor`/`Cmajor` are the legacy names; the rest are explicit inner-to-
/// outer dimension permutations. The sanitizer maps the legacy names onto
/// their permutation equivalents before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layout {
    Zmajor,
    Cmajor,
    Zxy,
    Xzy,
    Yxz,
    Yzx,
    Zyx,
    Xyz,
}

impl NamedEnum for Layout {
    const ALL: &'static [Self] = &[
        Layout::Zmajor,
        Layout::Cmajor,
        Layout::Zxy,
        Layout::Xzy,
        Layout::Yxz,
        Layout::Yzx,
        Layout::Zyx,
        Layout::Xyz,
    ];

    fn name(&self) -> &'static str {
        match self {
            Layout::Zmajor => "ZMAJOR",
            Layout::Cmajor => "CMAJOR",
            Layout::Zxy => "ZXY",
            Layout::Xzy => "XZY",
            Layout::Yxz => "YXZ",
            Layout::Yzx => "YZX",
            Layout::Zyx => "ZYX",
            Layout::Xyz => "XYZ",
        }
    }
}

impl Layout {
    /// The permutation equivalent of a legacy layout name. Permutation
    /// layouts map to themselves.
    pub fn canonical(&self) -> Layout {
        match self {
            Layout::Zmajor => Layout::Zxy,
            Layout::Cmajor => Layout::Xyz,
            other => *other,
        }
    }

    /// Inner-to-outer dimension order as indices into `[x, y, z]`.
    pub fn permutation(&self) -> [usize; 3] {
        match self.canonical() {
            Layout::Zxy => [2, 0, 1],
            Layout::Xzy => [0, 2, 1],
            Layout::Yxz => [1, 0, 2],
            Layout::Yzx => [1, 2, 0],
            Layout::Zyx => [2, 1, 0],
            Layout::Xyz => [0, 1, 2],
            _ => unreachable!("canonical() never returns a legacy layout"),
        }
    }

    /// Whether this is one of the legacy (pre-permutation) names.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Layout::Zmajor | Layout::Cmajor)
    }
}

/// Shape of the MPE grid used inside a DPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    Vector,
    Matrix,
    VectorFp16,
    Cuboid16x16,
    Cuboid8x16,
    Cuboid4x16,
}

impl NamedEnum for ExecutionMode {
    const ALL: &'static [Self] = &[
        ExecutionMode::Vector,
        ExecutionMode::Matrix,
        ExecutionMode::VectorFp16,
        ExecutionMode::Cuboid16x16,
        ExecutionMode::Cuboid8x16,
        ExecutionMode::Cuboid4x16,
    ];

    fn name(&self) -> &'static str {
        match self {
            ExecutionMode::Vector => "VECTOR",
            ExecutionMode::Matrix => "MATRIX",
            ExecutionMode::VectorFp16 => "VECTOR_FP16",
            ExecutionMode::Cuboid16x16 => "CUBOID_16x16",
            ExecutionMode::Cuboid8x16 => "CUBOID_8x16",
            ExecutionMode::Cuboid4x16 => "CUBOID_4x16",
        }
    }
}

/// MPE grid extents in output space: `x` (width), `y` (height), `z`
/// (channels) produced concurrently per grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpeGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ExecutionMode {
    /// Grid shape of this mode.
    pub fn grid(&self) -> MpeGrid {
        match self {
            ExecutionMode::Vector => MpeGrid { x: 16, y: 1, z: 16 },
            ExecutionMode::Matrix => MpeGrid { x: 4, y: 4, z: 16 },
            ExecutionMode::VectorFp16 => MpeGrid { x: 4, y: 1, z: 16 },
            ExecutionMode::Cuboid16x16 => MpeGrid { x: 16, y: 16, z: 8 },
            ExecutionMode::Cuboid8x16 => MpeGrid { x: 8, y: 16, z: 16 },
            ExecutionMode::Cuboid4x16 => MpeGrid { x: 4, y: 16, z: 32 },
        }
    }
}

/// Activation function fused after the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationFunction {
    None,
    Relu,
    Lrelu,
    Add,
    Sub,
    Mult,
}

impl NamedEnum for ActivationFunction {
    const ALL: &'static [Self] = &[
        ActivationFunction::None,
        ActivationFunction::Relu,
        ActivationFunction::Lrelu,
        ActivationFunction::Add,
        ActivationFunction::Sub,
        ActivationFunction::Mult,
    ];

    fn name(&self) -> &'static str {
        match self {
            ActivationFunction::None => "NONE",
            ActivationFunction::Relu => "RELU",
            ActivationFunction::Lrelu => "LRELU",
            ActivationFunction::Add => "ADD",
            ActivationFunction::Sub => "SUB",
            ActivationFunction::Mult => "MULT",
        }
    }
}

/// Memory-tile interleaving key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Swizzling {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
}

impl NamedEnum for Swizzling {
    const ALL: &'static [Self] = &[
        Swizzling::Key0,
        Swizzling::Key1,
        Swizzling::Key2,
        Swizzling::Key3,
        Swizzling::Key4,
        Swizzling::Key5,
    ];

    fn name(&self) -> &'static str {
        match self {
            Swizzling::Key0 => "KEY_0",
            Swizzling::Key1 => "KEY_1",
            Swizzling::Key2 => "KEY_2",
            Swizzling::Key3 => "KEY_3",
            Swizzling::Key4 => "KEY_4",
            Swizzling::Key5 => "KEY_5",
        }
    }
}

/// Memory pool a DMA endpoint lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLocation {
    Dram,
    Cmx,
    Csram,
    Upa,
}

impl NamedEnum for MemoryLocation {
    const ALL: &'static [Self] = &[
        MemoryLocation::Dram,
        MemoryLocation::Cmx,
        MemoryLocation::Csram,
        MemoryLocation::Upa,
    ];

    fn name(&self) -> &'static str {
        match self {
            MemoryLocation::Dram => "DRAM",
            MemoryLocation::Cmx => "CMX",
            MemoryLocation::Csram => "CSRAM",
            MemoryLocation::Upa => "UPA",
        }
    }
}

/// How a workload relates to its siblings on other tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IsiStrategy {
    Clustering,
    SplitOverH,
    SplitOverK,
}

impl NamedEnum for IsiStrategy {
    const ALL: &'static [Self] = &[
        IsiStrategy::Clustering,
        IsiStrategy::SplitOverH,
        IsiStrategy::SplitOverK,
    ];

    fn name(&self) -> &'static str {
        match self {
            IsiStrategy::Clustering => "CLUSTERING",
            IsiStrategy::SplitOverH => "SPLIT_OVER_H",
            IsiStrategy::SplitOverK => "SPLIT_OVER_K",
        }
    }
}

/// Layer-level inter-tile partitioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TilingStrategy {
    Clustering,
    SplitOverH,
    SohOverlapped,
    SplitOverK,
    SplitOverW,
    SplitOverHW,
    SplitOverHK,
}

impl NamedEnum for TilingStrategy {
    const ALL: &'static [Self] = &[
        TilingStrategy::Clustering,
        TilingStrategy::SplitOverH,
        TilingStrategy::SohOverlapped,
        TilingStrategy::SplitOverK,
        TilingStrategy::SplitOverW,
        TilingStrategy::SplitOverHW,
        TilingStrategy::SplitOverHK,
    ];

    fn name(&self) -> &'static str {
        match self {
            TilingStrategy::Clustering => "CLUSTERING",
            TilingStrategy::SplitOverH => "SOH",
            TilingStrategy::SohOverlapped => "SOH_OVERLAPPED",
            TilingStrategy::SplitOverK => "SOK",
            TilingStrategy::SplitOverW => "SOW",
            TilingStrategy::SplitOverHW => "SOHW",
            TilingStrategy::SplitOverHK => "SOHK",
        }
    }
}
