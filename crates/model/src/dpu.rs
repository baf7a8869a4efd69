//! Analytical DPU cycle models.
//!
//! Independent of the NN: these serve as the fallback estimate and as the
//! `ideal` denominator for overhead-style post-processors. Ceiling
//! semantics throughout, so the estimate never undershoots the hardware.

use vpucost_core::{CyclesError, CyclesInterfaceType, DpuWorkload, ERROR_THRESHOLD};

/// Clamp a u64 cycle estimate into the non-error band.
fn to_cycles(value: u64) -> CyclesInterfaceType {
    if value >= ERROR_THRESHOLD as u64 {
        CyclesError::SumTooLarge.as_cycles()
    } else {
        value as CyclesInterfaceType
    }
}

fn ceil_div(a: u64, b: u64) -> u64 {
    debug_assert!(b > 0);
    (a + b - 1) / b
}

/// Dense MAC count of the workload: every output element pays its full
/// reduction. Saturates instead of wrapping on absurd geometries.
pub fn dense_macs(wl: &DpuWorkload) -> u64 {
    let macs = wl.output_0().elements() as u128 * wl.macs_per_output() as u128;
    macs.min(u64::MAX as u128) as u64
}

/// MAC count after weight sparsity skips its share.
pub fn sparse_macs(wl: &DpuWorkload) -> u64 {
    let dense = dense_macs(wl) as f64;
    let kept = dense * (1.0 - wl.effective_weight_sparsity() as f64);
    kept.ceil() as u64
}

/// Cycles assuming every MAC is busy every cycle and no sparsity.
pub fn ideal_cycles_efficiency(wl: &DpuWorkload) -> CyclesInterfaceType {
    let macs = wl.device.profile().macs_per_dpu as u64;
    to_cycles(ceil_div(dense_macs(wl), macs))
}

/// Cycles the device actually spends switching: weight sparsity removes
/// work, so this never exceeds the efficiency ideal.
pub fn ideal_cycles_power(wl: &DpuWorkload) -> CyclesInterfaceType {
    let macs = wl.device.profile().macs_per_dpu as u64;
    to_cycles(ceil_div(sparse_macs(wl), macs))
}

/// Grid-aware cycle estimate.
///
/// The MPE grid quantizes the output volume; float halves MAC throughput;
/// the CMX read ports bound how fast operands can arrive. The estimate is
/// the larger of the compute and the read-bandwidth term.
pub fn theoretical_cycles(wl: &DpuWorkload) -> CyclesInterfaceType {
    let profile = wl.device.profile();
    let out = wl.output_0();
    let grid = wl.execution_mode.grid();

    let steps = ceil_div(out.x() as u64, grid.x as u64)
        * ceil_div(out.y() as u64, grid.y as u64)
        * ceil_div(out.z() as u64, grid.z as u64);
    let reduction = wl.macs_per_output();
    let dtype_factor = if wl.input_0().dtype().is_float() { 2 } else { 1 };
    let compute = steps * reduction * dtype_factor;

    // Operand bytes must cross the CMX read ports once.
    let read_bytes: u64 = wl.inputs.iter().map(|t| t.size_bytes()).sum();
    let port_bytes_per_cycle =
        profile.cmx_read_ports as u64 * profile.cmx_word_bytes as u64;
    let bandwidth = ceil_div(read_bytes, port_bytes_per_cycle);

    to_cycles(compute.max(bandwidth))
}

/// Fraction of the MAC array the workload keeps busy under the grid
/// quantization, in `(0, 1]`.
pub fn mac_utilization(wl: &DpuWorkload) -> f32 {
    let ideal = ideal_cycles_efficiency(wl) as f64;
    let actual = theoretical_cycles(wl) as f64;
    if actual <= 0.0 {
        return 0.0;
    }
    (ideal / actual).clamp(0.0, 1.0) as f32
}
