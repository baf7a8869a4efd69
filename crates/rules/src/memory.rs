//! CMX memory accounting for DPU workloads.
//!
//! Sizes are aligned up to the device CMX word. The weights operand
//! (`input_1`) is derived from the operation: convolutions carry a weights
//! tensor plus a per-output-channel weight table; pooling and eltwise carry
//! none (the second ELTWISE operand is an activation and is counted with
//! the activations).

use serde::{Deserialize, Serialize};

use crate::registry::DeviceRules;
use vpucost_core::{DpuWorkload, Operation};

/// Bytes of weight-table entry per output channel.
const WEIGHT_TABLE_BYTES_PER_CHANNEL: u64 = 16;

/// How the output operand is accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputAccounting {
    /// Output occupies its own CMX region.
    #[default]
    Separate,
    /// Output overwrites an input region. Only honoured for ELTWISE with
    /// matching element widths; everything else silently falls back to
    /// separate accounting.
    InPlace,
}

/// Memory demand of one workload, independently queryable per operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Aligned bytes of all activation inputs.
    pub input_0_bytes: u64,
    /// Aligned bytes of the weights operand plus weight table.
    pub input_1_bytes: u64,
    /// Aligned bytes of the output operand (zero when written in place).
    pub output_0_bytes: u64,
    /// Fixed per-device overhead charged at workload level.
    pub overhead_bytes: u64,
}

impl MemoryUsage {
    /// Total CMX demand.
    pub fn total_cmx_bytes(&self) -> u64 {
        self.input_0_bytes + self.input_1_bytes + self.output_0_bytes + self.overhead_bytes
    }
}

/// Round `bytes` up to the CMX word.
fn align_up(bytes: u64, word: u64) -> u64 {
    debug_assert!(word > 0);
    (bytes + word - 1) / word * word
}

/// Compute the CMX demand of a workload under the given rules.
pub fn workload_memory(
    wl: &DpuWorkload,
    rules: &DeviceRules,
    output: OutputAccounting,
) -> MemoryUsage {
    let word = wl.device.profile().cmx_word_bytes as u64;

    let input_0_bytes = wl
        .inputs
        .iter()
        .map(|t| align_up(t.size_bytes(), word))
        .sum();

    let input_1_bytes = align_up(weights_bytes(wl), word);

    let in_place_ok = output == OutputAccounting::InPlace
        && wl.op == Operation::Eltwise
        && wl.output_0().dtype().bytes() == wl.input_0().dtype().bytes();
    let output_0_bytes = if in_place_ok {
        0
    } else {
        align_up(wl.output_0().size_bytes(), word)
    };

    MemoryUsage {
        input_0_bytes,
        input_1_bytes,
        output_0_bytes,
        overhead_bytes: rules.cmx_overhead_bytes() as u64,
    }
}

/// Raw (unaligned) weights bytes for the operation, weight table included.
fn weights_bytes(wl: &DpuWorkload) -> u64 {
    let k = wl.kernel.h as u64 * wl.kernel.w as u64;
    let c_in = wl.input_channels() as u64;
    let c_out = wl.output_channels() as u64;
    let elem = wl.input_0().dtype().bytes() as u64;
    let table = c_out * WEIGHT_TABLE_BYTES_PER_CHANNEL;
    match wl.op {
        Operation::Convolution | Operation::CmConvolution => k * c_in * c_out * elem + table,
        Operation::DwConvolution => k * c_out * elem + table,
        Operation::Eltwise | Operation::Maxpool | Operation::Avepool => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpucost_core::{DataType, Dim2, Layout, VpuDevice, VpuTensor};

    fn tensor(shape: [u32; 4], dtype: DataType) -> VpuTensor {
        VpuTensor::dense(shape, dtype, Layout::Zmajor).unwrap()
    }

    fn rules() -> DeviceRules {
        DeviceRules::workload(VpuDevice::Vpu2_7)
    }

    #[test]
    fn conv_weights_include_table() {
        let mut wl = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Convolution,
            vec![tensor([8, 8, 64, 1], DataType::Uint8)],
            tensor([8, 8, 32, 1], DataType::Uint8),
        );
        wl.kernel = Dim2::square(3);
        let m = workload_memory(&wl, &rules(), OutputAccounting::Separate);
        // 3*3*64*32 weights + 32 * 16 table bytes, both word-aligned.
        assert_eq!(m.input_1_bytes, 9 * 64 * 32 + 32 * 16);
        assert_eq!(m.input_0_bytes, 8 * 8 * 64);
        assert_eq!(m.output_0_bytes, 8 * 8 * 32);
        assert_eq!(m.overhead_bytes, 16 * 1024);
    }

    #[test]
    fn eltwise_has_no_weights_operand() {
        let t = tensor([128, 128, 16, 1], DataType::Float16);
        let wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Eltwise, vec![t, t], t);
        let m = workload_memory(&wl, &rules(), OutputAccounting::Separate);
        assert_eq!(m.input_1_bytes, 0);
        // Both activations counted.
        assert_eq!(m.input_0_bytes, 2 * 128 * 128 * 16 * 2);
    }

    #[test]
    fn maxpool_has_no_weights() {
        let t = tensor([16, 16, 64, 1], DataType::Uint8);
        let mut wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Maxpool, vec![t], t);
        wl.kernel = Dim2::square(2);
        let m = workload_memory(&wl, &rules(), OutputAccounting::Separate);
        assert_eq!(m.input_1_bytes, 0);
    }

    #[test]
    fn in_place_zeroes_output_for_eltwise_only() {
        let t = tensor([64, 64, 16, 1], DataType::Uint8);
        let wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Eltwise, vec![t, t], t);
        let m = workload_memory(&wl, &rules(), OutputAccounting::InPlace);
        assert_eq!(m.output_0_bytes, 0);

        let conv = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Convolution, vec![t], t);
        let m = workload_memory(&conv, &rules(), OutputAccounting::InPlace);
        assert!(m.output_0_bytes > 0);
    }

    #[test]
    fn layer_rules_suppress_overhead() {
        let t = tensor([16, 16, 16, 1], DataType::Uint8);
        let wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Maxpool, vec![t], t);
        let layer_rules = DeviceRules::layer(VpuDevice::Vpu2_7);
        let m = workload_memory(&wl, &layer_rules, OutputAccounting::Separate);
        assert_eq!(m.overhead_bytes, 0);
    }

    #[test]
    fn odd_sizes_align_to_cmx_word() {
        // 3x3x3 uint8 = 27 bytes -> aligned to 32.
        let t = tensor([3, 3, 3, 1], DataType::Uint8);
        let wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Avepool, vec![t], t);
        let m = workload_memory(&wl, &rules(), OutputAccounting::Separate);
        assert_eq!(m.input_0_bytes, 32);
        assert_eq!(m.output_0_bytes, 32);
    }
}
