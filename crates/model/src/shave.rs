//! Piecewise-linear SHAVE kernel model.
//!
//! Every kernel is a first-degree equation in output bytes, corrected for
//! the vector/unroll block structure of the inner loop: full unrolled
//! blocks run at the steady-state slope, a partial block pays an unroll
//! prologue plus per-vector cycles, and the sub-vector tail finishes on the
//! scalar unit. Constants live in one data table; dispatch is a name
//! lookup, not a type per kernel.
//!
//! Constants are calibrated in DPU cycles on the reference generation
//! (SHAVE at 975 MHz against a 1300 MHz DPU clock); queries rescale to the
//! target device's DPU frequency.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use vpucost_core::{cycles_from_f32, CyclesError, CyclesInterfaceType, ShaveWorkload};

/// DPU clock the table constants were calibrated against.
pub const REF_DPU_FREQ_MHZ: f32 = 1300.0;

/// Piecewise-linear constants of one kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaveKernelSpec {
    pub name: &'static str,
    /// Steady-state cycles per output byte.
    pub slope: f32,
    /// Fixed startup cost.
    pub intercept: f32,
    /// Bytes consumed by one vector operation.
    pub vector_bytes: u32,
    /// Vector operations per unrolled block.
    pub unroll: u32,
    /// Cycles per vector operation outside the unrolled steady state.
    pub vector_cycles: f32,
    /// One-time cost of entering a partial block.
    pub unroll_prologue: f32,
    /// Cycles per scalar tail byte.
    pub scalar_cycles: f32,
}

/// The kernel table. Externalized data, not template parameters: adding a
/// kernel is one new row.
pub const KERNELS: &[ShaveKernelSpec] = &[
    ShaveKernelSpec { name: "sigmoid", slope: 0.214, intercept: 1804.0, vector_bytes: 32, unroll: 8, vector_cycles: 8.4, unroll_prologue: 26.0, scalar_cycles: 3.6 },
    ShaveKernelSpec { name: "relu", slope: 0.056, intercept: 1412.0, vector_bytes: 32, unroll: 8, vector_cycles: 2.3, unroll_prologue: 14.0, scalar_cycles: 1.1 },
    ShaveKernelSpec { name: "tanh", slope: 0.232, intercept: 1863.0, vector_bytes: 32, unroll: 8, vector_cycles: 9.1, unroll_prologue: 27.0, scalar_cycles: 3.9 },
    ShaveKernelSpec { name: "hswish", slope: 0.128, intercept: 1540.0, vector_bytes: 32, unroll: 8, vector_cycles: 5.0, unroll_prologue: 19.0, scalar_cycles: 2.2 },
    ShaveKernelSpec { name: "elu", slope: 0.245, intercept: 1890.0, vector_bytes: 32, unroll: 8, vector_cycles: 9.6, unroll_prologue: 28.0, scalar_cycles: 4.1 },
    ShaveKernelSpec { name: "gelu", slope: 0.302, intercept: 1952.0, vector_bytes: 32, unroll: 8, vector_cycles: 11.8, unroll_prologue: 31.0, scalar_cycles: 5.0 },
    ShaveKernelSpec { name: "add", slope: 0.087, intercept: 1460.0, vector_bytes: 32, unroll: 16, vector_cycles: 3.1, unroll_prologue: 16.0, scalar_cycles: 1.4 },
    ShaveKernelSpec { name: "sub", slope: 0.087, intercept: 1460.0, vector_bytes: 32, unroll: 16, vector_cycles: 3.1, unroll_prologue: 16.0, scalar_cycles: 1.4 },
    ShaveKernelSpec { name: "mult", slope: 0.091, intercept: 1472.0, vector_bytes: 32, unroll: 16, vector_cycles: 3.3, unroll_prologue: 16.0, scalar_cycles: 1.5 },
    ShaveKernelSpec { name: "softmax", slope: 0.486, intercept: 2213.0, vector_bytes: 32, unroll: 4, vector_cycles: 17.2, unroll_prologue: 42.0, scalar_cycles: 7.3 },
    ShaveKernelSpec { name: "mvn", slope: 0.412, intercept: 2105.0, vector_bytes: 32, unroll: 4, vector_cycles: 14.9, unroll_prologue: 38.0, scalar_cycles: 6.4 },
    ShaveKernelSpec { name: "interpolate", slope: 0.648, intercept: 2480.0, vector_bytes: 16, unroll: 4, vector_cycles: 12.1, unroll_prologue: 45.0, scalar_cycles: 9.8 },
];

static KERNEL_INDEX: Lazy<HashMap<&'static str, &'static ShaveKernelSpec>> =
    Lazy::new(|| KERNELS.iter().map(|k| (k.name, k)).collect());

/// Look a kernel up by name.
pub fn kernel_spec(name: &str) -> Option<&'static ShaveKernelSpec> {
    KERNEL_INDEX.get(name).copied()
}

/// Every kernel name the model prices.
pub fn kernel_names() -> Vec<&'static str> {
    KERNELS.iter().map(|k| k.name).collect()
}

impl ShaveKernelSpec {
    /// Cycles at the reference clock for a given output byte count.
    pub fn cycles_at_ref(&self, output_bytes: u64) -> f32 {
        let block_bytes = (self.vector_bytes * self.unroll) as u64;
        let full_blocks = output_bytes / block_bytes;
        let rem = output_bytes % block_bytes;
        let rem_vectors = rem / self.vector_bytes as u64;
        let rem_scalars = rem % self.vector_bytes as u64;

        let mut cycles = self.intercept + self.slope * (full_blocks * block_bytes) as f32;
        if rem > 0 {
            cycles += self.unroll_prologue;
            cycles += rem_vectors as f32 * self.vector_cycles;
            cycles += rem_scalars as f32 * self.scalar_cycles;
        }
        cycles
    }
}

/// Cycles for one SHAVE workload on its device, at that device's DPU
/// clock. An unknown kernel name is an invalid configuration.
pub fn shave_theoretical_cycles(wl: &ShaveWorkload) -> CyclesInterfaceType {
    let spec = match kernel_spec(&wl.name) {
        Some(s) => s,
        None => return CyclesError::InvalidInputConfiguration.as_cycles(),
    };
    let at_ref = spec.cycles_at_ref(wl.output_bytes());
    let scale = wl.device.profile().dpu_freq_mhz as f32 / REF_DPU_FREQ_MHZ;
    cycles_from_f32(at_ref * scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpucost_core::{DataType, Layout, VpuDevice, VpuTensor};

    fn shave(name: &str, bytes: u32) -> ShaveWorkload {
        let t = VpuTensor::dense([bytes.max(1), 1, 1, 1], DataType::Uint8, Layout::Zmajor)
            .unwrap();
        ShaveWorkload::new(name, VpuDevice::Vpu2_7, vec![t], vec![t])
    }

    #[test]
    fn unknown_kernel_is_invalid_configuration() {
        let wl = shave("definitely_not_a_kernel", 64);
        assert_eq!(
            shave_theoretical_cycles(&wl),
            CyclesError::InvalidInputConfiguration.as_cycles()
        );
    }

    #[test]
    fn zero_remainder_runs_at_steady_state() {
        let spec = kernel_spec("sigmoid").unwrap();
        let block = (spec.vector_bytes * spec.unroll) as u64;
        // Exactly 4 blocks: no prologue, no scalar tail.
        let c = spec.cycles_at_ref(4 * block);
        assert_eq!(c, spec.intercept + spec.slope * (4 * block) as f32);
    }

    #[test]
    fn partial_block_pays_prologue() {
        let spec = kernel_spec("sigmoid").unwrap();
        let block = (spec.vector_bytes * spec.unroll) as u64;
        let exact = spec.cycles_at_ref(block);
        let plus_vec = spec.cycles_at_ref(block + spec.vector_bytes as u64);
        assert!(
            plus_vec
                >= exact + spec.unroll_prologue + spec.vector_cycles - 1e-3,
            "one extra vector must pay the prologue"
        );
        let plus_scalar = spec.cycles_at_ref(block + 3);
        assert!(plus_scalar >= exact + spec.unroll_prologue + 3.0 * spec.scalar_cycles - 1e-3);
    }

    #[test]
    fn block_boundaries_form_a_bounded_sawtooth() {
        // Within a block the cost climbs with the remainder machinery and
        // drops back to the steady-state line at the next block edge. The
        // full block must never cost more than its own partial fill.
        let spec = kernel_spec("softmax").unwrap();
        let block = (spec.vector_bytes * spec.unroll) as u64;
        for blocks in 1..5u64 {
            let edge = spec.cycles_at_ref(blocks * block);
            let just_below = spec.cycles_at_ref(blocks * block - 1);
            assert!(edge <= just_below, "full block dearer than partial at {}", blocks);
            // And steady state keeps growing block over block.
            assert!(edge > spec.cycles_at_ref((blocks - 1) * block));
        }
    }

    #[test]
    fn reference_device_yields_unscaled_intercept() {
        // On 2.7 the scale is exactly 1.0, so a kernel invoked with zero
        // output bytes costs precisely its intercept.
        let t = VpuTensor::dense([1, 1, 1, 1], DataType::Uint8, Layout::Zmajor).unwrap();
        let mut wl = ShaveWorkload::new("relu", VpuDevice::Vpu2_7, vec![t], vec![]);
        assert_eq!(wl.output_bytes(), 0);
        let spec = kernel_spec("relu").unwrap();
        assert_eq!(shave_theoretical_cycles(&wl), spec.intercept as u32);
        // A slower DPU clock scales the same prologue down.
        wl.device = VpuDevice::Vpu2_0;
        let expected = (spec.intercept * 700.0 / 1300.0).round() as u32;
        assert_eq!(shave_theoretical_cycles(&wl), expected);
    }

    #[test]
    fn frequency_scaling_tracks_device_clock() {
        let on27 = shave("add", 4096);
        let mut on40 = on27.clone();
        on40.device = VpuDevice::Vpu4_0;
        let c27 = shave_theoretical_cycles(&on27) as f32;
        let c40 = shave_theoretical_cycles(&on40) as f32;
        let ratio = 1700.0 / 1300.0;
        assert!((c40 / c27 - ratio).abs() < 0.01);
    }

    #[test]
    fn every_table_row_is_self_consistent() {
        for spec in KERNELS {
            assert!(spec.slope > 0.0, "{}", spec.name);
            assert!(spec.intercept > 0.0, "{}", spec.name);
            assert!(spec.vector_bytes > 0 && spec.unroll > 0, "{}", spec.name);
            // Remainder handling must cost at least the steady state, or
            // the piecewise function would dip downward at block edges.
            assert!(
                spec.vector_cycles >= spec.slope * spec.vector_bytes as f32,
                "{}",
                spec.name
            );
        }
    }
}
