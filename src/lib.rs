//! vpucost: cost-estimation engine for VPU inference accelerators.
//!
//! Given an abstract description of work placed on the device (a DPU
//! workload, a DMA transfer, a SHAVE kernel, or a whole layer to be split
//! across tiles), the engine returns an estimated execution time in device
//! cycles, plus derived quantities: energy, activity factor, memory
//! footprint, validity diagnostics.
//!
//! Workload problems never raise Rust errors: results are error-banded
//! cycle values, tested with [`is_error_code`]. Only construction (loading
//! a serialized estimator) can fail with a real error.
//!
//! A [`VpuCostModel`] instance is not safe for concurrent use; wrap it in
//! external synchronization if several threads must share one.
//!
//! ```no_run
//! use vpucost::{
//!     DataType, Dim2, DpuWorkload, ExecutionMode, Layout, Operation, Padding, VpuCostModel,
//!     VpuDevice, VpuTensor,
//! };
//!
//! let activations =
//!     VpuTensor::dense([56, 56, 64, 1], DataType::Uint8, Layout::Zmajor).unwrap();
//! let mut wl = DpuWorkload::with_tensors(
//!     VpuDevice::Vpu2_7,
//!     Operation::Convolution,
//!     vec![activations],
//!     activations,
//! );
//! wl.kernel = Dim2::square(3);
//! wl.padding = Padding { top: 1, bottom: 1, left: 1, right: 1 };
//! wl.execution_mode = ExecutionMode::Cuboid16x16;
//!
//! let model = VpuCostModel::analytical();
//! let cycles = model.dpu(wl);
//! assert!(!vpucost::is_error_code(cycles));
//! ```

// ============================================================================
// Public API types - re-exported from the internal crates
// ============================================================================

// Core value types
pub use vpucost_core::{
    ActivationFunction, DataType, Dim2, DmaWorkload, DpuLayer, DpuWorkload, ExecutionMode,
    IsiStrategy, Layout, MemoryLocation, MpeGrid, NamedEnum, Operation, Padding, SanityReport,
    ShaveWorkload, Swizzling, TensorOffsets, TilingStrategy, VpuTensor,
};

// Device generations and constants
pub use vpucost_core::{DeviceProfile, VpuDevice};

// Error-banded cycles
pub use vpucost_core::{
    cost_adder, cycles_from_f32, CyclesError, CyclesInterfaceType, ERROR_THRESHOLD,
    MAX_VALID_CYCLES,
};

/// Whether a cycle-typed result encodes an error rather than a duration.
pub use vpucost_core::is_error as is_error_code;

// Validity rules, sanitation and memory accounting
pub use vpucost_rules::{
    workload_memory, DeviceRules, MemoryUsage, OutputAccounting, RuleLevel, Sanitizer,
};

// Estimator loading
pub use vpucost_nn::{ModelBlob, ModelError, ModelVersion, NnModel, PostProcessing};

// The cost-model facade and the layer tiler
pub use vpucost_model::{
    CostModelConfig, CostModelError, DpuInfo, LayerSplitDetail, LayerTiler, TileDetail,
    TilingOptions, VpuCostModel,
};

// Analytical primitives, usable without a loaded estimator
pub use vpucost_model::{
    dma_theoretical_cycles, ideal_cycles_efficiency, ideal_cycles_power, power_factor,
    shave_theoretical_cycles, theoretical_cycles,
};
