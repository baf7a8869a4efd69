//! Core types for the VPU cost model.
//!
//! Everything here is pure data: device generations and their constant
//! profiles, the closed-set enums with their name maps, frozen historical
//! enum tables for old serialized models, tensors, workloads, the layer
//! with its inter-tile split geometry, and the error-banded cycle type.
//! No pricing happens in this crate.

pub mod cycles;
pub mod device;
pub mod layer;
pub mod legacy;
pub mod sanity;
pub mod tensor;
pub mod types;
pub mod workload;

pub use cycles::{
    cost_adder, cycles_from_f32, is_error, is_valid_cycles, CyclesError, CyclesInterfaceType,
    ERROR_THRESHOLD, MAX_VALID_CYCLES,
};
pub use device::{DeviceProfile, VpuDevice};
pub use layer::DpuLayer;
pub use sanity::SanityReport;
pub use tensor::{TensorError, VpuTensor};
pub use types::{
    ActivationFunction, DataType, ExecutionMode, IsiStrategy, Layout, MemoryLocation, MpeGrid,
    NamedEnum, Operation, Swizzling, TilingStrategy,
};
pub use workload::{
    input_extent_for_output, output_extent, Dim2, DmaWorkload, DpuWorkload, Padding, ShaveWorkload,
    TensorOffsets,
};

#[cfg(test)]
mod prop_tests {
    use proptest::prelude::*;

    use crate::cycles::{cost_adder, is_error, CyclesError, ERROR_THRESHOLD};
    use crate::workload::{input_extent_for_output, output_extent};

    proptest! {
        #[test]
        fn cost_adder_zero_is_identity(a in 0u32..ERROR_THRESHOLD) {
            prop_assert_eq!(cost_adder(a, 0), a);
            prop_assert_eq!(cost_adder(0, a), a);
        }

        #[test]
        fn cost_adder_never_leaves_errors(a in any::<u32>(), b in any::<u32>()) {
            let sum = cost_adder(a, b);
            if is_error(a) {
                prop_assert_eq!(sum, a);
            } else if is_error(b) {
                prop_assert_eq!(sum, b);
            } else if (a as u64 + b as u64) >= ERROR_THRESHOLD as u64 {
                prop_assert_eq!(sum, CyclesError::SumTooLarge.as_cycles());
            } else {
                prop_assert_eq!(sum, a + b);
            }
        }

        #[test]
        fn output_formula_inverse_bounds(
            input in 1u32..4096,
            kernel in 1u32..12,
            stride in 1u32..4,
            pad in 0u32..4,
        ) {
            prop_assume!(kernel <= input + 2 * pad);
            let out = output_extent(input, pad, pad, kernel, stride);
            prop_assert!(out >= 1);
            // The input recomputed from the output never exceeds what the
            // receptive field of that output actually needs.
            let needed = input_extent_for_output(out, kernel, stride, pad, pad);
            prop_assert!(needed <= input + stride);
        }
    }
}
