//! Device validity rules, workload sanitation and CMX accounting.
//!
//! The registry answers "what is legal on this device", the sanitizer
//! canonicalizes workloads and applies the registry in a fixed order, and
//! the memory calculator prices the CMX footprint the sanitizer's final
//! check compares against.

pub mod memory;
pub mod registry;
pub mod sanitizer;

pub use memory::{workload_memory, MemoryUsage, OutputAccounting};
pub use registry::{DeviceRules, RuleLevel};
pub use sanitizer::Sanitizer;

#[cfg(test)]
mod prop_tests {
    use proptest::prelude::*;

    use crate::sanitizer::Sanitizer;
    use vpucost_core::{
        DataType, Dim2, DpuWorkload, ExecutionMode, Layout, NamedEnum, Operation, Padding,
        VpuDevice, VpuTensor,
    };

    fn arb_workload() -> impl Strategy<Value = DpuWorkload> {
        (
            prop::sample::select(VpuDevice::ALL.to_vec()),
            prop::sample::select(Operation::ALL.to_vec()),
            prop::sample::select(DataType::ALL.to_vec()),
            prop::sample::select(Layout::ALL.to_vec()),
            1u32..64,
            1u32..64,
            prop::sample::select(vec![16u32, 32, 48, 60, 64]),
            1u32..4,
            0u32..3,
            prop::sample::select(ExecutionMode::ALL.to_vec()),
        )
            .prop_map(
                |(device, op, dtype, layout, x, y, z, kernel, pad, mode)| {
                    let input = VpuTensor::new([x, y, z, 1], dtype, layout, false).unwrap();
                    let out_z = if op.is_channel_preserving() { z } else { 64 };
                    let output = VpuTensor::new([x, y, out_z, 1], dtype, layout, false).unwrap();
                    let mut wl = DpuWorkload::with_tensors(device, op, vec![input], output);
                    if op == Operation::Eltwise {
                        wl.inputs.push(input);
                    }
                    wl.kernel = Dim2::square(kernel);
                    wl.padding = Padding {
                        top: pad,
                        bottom: pad,
                        left: pad,
                        right: pad,
                    };
                    wl.execution_mode = mode;
                    wl
                },
            )
    }

    proptest! {
        /// sanitize(sanitize(w)) == sanitize(w): both the rewritten
        /// workload and the report are stable under a second pass.
        #[test]
        fn sanitizer_is_idempotent(wl in arb_workload()) {
            let s = Sanitizer::new();
            let mut first = wl;
            let r1 = s.check_and_sanitize(&mut first);
            let mut second = first.clone();
            let r2 = s.check_and_sanitize(&mut second);
            prop_assert_eq!(first, second);
            prop_assert_eq!(r1, r2);
        }

        /// Sanitation never reintroduces legacy layouts or unsigned 8-bit.
        #[test]
        fn sanitized_workloads_are_canonical(wl in arb_workload()) {
            let s = Sanitizer::new();
            let mut wl = wl;
            let _ = s.check_and_sanitize(&mut wl);
            for t in wl.inputs.iter().chain(wl.outputs.iter()) {
                prop_assert!(!t.layout().is_legacy());
                prop_assert!(t.dtype() != DataType::Uint8);
                prop_assert!(t.dtype() != DataType::Bfloat16);
            }
        }
    }
}
