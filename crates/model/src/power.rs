//! Activity-factor lookup table.
//!
//! Activity factors are expressed relative to the power-virus workload
//! (dense convolution saturating the MAC array), which defines 1.0. The
//! table maps operation and input-channel count to an adjustment factor;
//! untabulated channel counts interpolate linearly between neighbours and
//! clamp at the ends. A per-device scalar converts from the int reference
//! to the float datapath.

use vpucost_core::{DpuWorkload, Operation};

/// `(input_channels, adjustment)` rows, ascending by channels.
type LutRow = &'static [(u32, f32)];

const CONVOLUTION_LUT: LutRow = &[
    (16, 0.70),
    (32, 0.80),
    (64, 0.90),
    (128, 1.00),
    (2048, 1.00),
];

const CM_CONVOLUTION_LUT: LutRow = &[(1, 0.40), (4, 0.50), (15, 0.60)];

const DW_CONVOLUTION_LUT: LutRow = &[(16, 0.30), (64, 0.35), (256, 0.40)];

const ELTWISE_LUT: LutRow = &[(16, 0.20), (256, 0.25)];

const POOLING_LUT: LutRow = &[(16, 0.25), (256, 0.30)];

fn lut_for(op: Operation) -> LutRow {
    match op {
        Operation::Convolution => CONVOLUTION_LUT,
        Operation::CmConvolution => CM_CONVOLUTION_LUT,
        Operation::DwConvolution => DW_CONVOLUTION_LUT,
        Operation::Eltwise => ELTWISE_LUT,
        Operation::Maxpool | Operation::Avepool => POOLING_LUT,
    }
}

/// Linear interpolation with clamping at both ends.
fn interpolate(rows: LutRow, channels: u32) -> f32 {
    debug_assert!(!rows.is_empty());
    if channels <= rows[0].0 {
        return rows[0].1;
    }
    if channels >= rows[rows.len() - 1].0 {
        return rows[rows.len() - 1].1;
    }
    for window in rows.windows(2) {
        let (c0, f0) = window[0];
        let (c1, f1) = window[1];
        if channels <= c1 {
            let t = (channels - c0) as f32 / (c1 - c0) as f32;
            return f0 + t * (f1 - f0);
        }
    }
    rows[rows.len() - 1].1
}

/// Activity-factor adjustment for a workload relative to the power virus.
///
/// Applies the operation/channel table, then the device's float/int power
/// ratio when the workload runs on the float datapath.
pub fn power_factor(wl: &DpuWorkload) -> f32 {
    let base = interpolate(lut_for(wl.op), wl.input_channels());
    if wl.input_0().dtype().is_float() {
        base * wl.device.profile().fp_to_int_power_ratio
    } else {
        base
    }
}
