//! Per-device validity rules.
//!
//! Two rule levels exist over the same tables: `Workload` rules apply to an
//! already-split workload destined for one DPU invocation; `Layer` rules are
//! the relaxed variant used before intra-tile splitting, where channel and
//! spatial extents need not yet respect the MPE grid.
//!
//! All membership checks go through canonical names, never numeric enum
//! positions, so appending values at the tail of an enum cannot shift a
//! lookup.

use std::ops::RangeInclusive;

use vpucost_core::{
    DataType, DpuWorkload, ExecutionMode, IsiStrategy, Layout, MemoryLocation, NamedEnum,
    Operation, Swizzling, VpuDevice,
};

/// Strictness level of a rules query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleLevel {
    /// Strict: one DPU invocation, grid-aligned.
    Workload,
    /// Relaxed: a layer that will still be split.
    Layer,
}

/// Rules handle for one device at one strictness level.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRules {
    device: VpuDevice,
    level: RuleLevel,
}

impl DeviceRules {
    pub fn workload(device: VpuDevice) -> Self {
        DeviceRules {
            device,
            level: RuleLevel::Workload,
        }
    }

    pub fn layer(device: VpuDevice) -> Self {
        DeviceRules {
            device,
            level: RuleLevel::Layer,
        }
    }

    pub fn device(&self) -> VpuDevice {
        self.device
    }

    pub fn level(&self) -> RuleLevel {
        self.level
    }

    /// Devices the cost model knows at all.
    pub fn supported_device_names() -> &'static [&'static str] {
        &["VPU_2_0", "VPU_2_7", "VPU_4_0"]
    }

    /// Operations the device can execute.
    pub fn valid_operation_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &[
                "CONVOLUTION",
                "DW_CONVOLUTION",
                "ELTWISE",
                "MAXPOOL",
                "AVEPOOL",
            ],
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => &[
                "CONVOLUTION",
                "DW_CONVOLUTION",
                "CM_CONVOLUTION",
                "ELTWISE",
                "MAXPOOL",
                "AVEPOOL",
            ],
        }
    }

    /// MPE grid modes the device implements.
    pub fn valid_execution_mode_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &["VECTOR", "MATRIX", "VECTOR_FP16"],
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => {
                &["CUBOID_16x16", "CUBOID_8x16", "CUBOID_4x16"]
            }
        }
    }

    pub fn valid_datatype_names(&self) -> &'static [&'static str] {
        &["UINT8", "INT8", "FLOAT16", "BFLOAT16"]
    }

    /// Layouts, including the legacy aliases of the permutations the device
    /// accepts.
    pub fn valid_layout_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &["ZMAJOR", "CMAJOR", "ZXY", "XYZ"],
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => {
                &["ZMAJOR", "CMAJOR", "ZXY", "XZY", "YXZ", "YZX", "ZYX", "XYZ"]
            }
        }
    }

    pub fn valid_swizzling_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &["KEY_0"],
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => {
                &["KEY_0", "KEY_1", "KEY_2", "KEY_3", "KEY_4", "KEY_5"]
            }
        }
    }

    pub fn valid_memory_location_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &["DRAM", "CMX", "CSRAM", "UPA"],
            VpuDevice::Vpu2_7 => &["DRAM", "CMX", "CSRAM"],
            VpuDevice::Vpu4_0 => &["DRAM", "CMX"],
        }
    }

    pub fn valid_isi_strategy_names(&self) -> &'static [&'static str] {
        match self.device {
            VpuDevice::Vpu2_0 => &["CLUSTERING"],
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => {
                &["CLUSTERING", "SPLIT_OVER_H", "SPLIT_OVER_K"]
            }
        }
    }

    /// Broadcast targets a workload output may address.
    pub fn output_write_tiles_range(&self) -> RangeInclusive<u32> {
        match self.device {
            VpuDevice::Vpu2_0 => 1..=4,
            VpuDevice::Vpu2_7 => 1..=2,
            VpuDevice::Vpu4_0 => 1..=6,
        }
    }

    pub fn cmx_size_bytes(&self) -> u32 {
        self.device.cmx_size_bytes()
    }

    /// CMX overhead charged on a query at this level. Layer-level queries
    /// suppress it: the layer is not yet resident.
    pub fn cmx_overhead_bytes(&self) -> u32 {
        match self.level {
            RuleLevel::Workload => self.device.profile().cmx_overhead_bytes,
            RuleLevel::Layer => 0,
        }
    }

    /// Output-channel alignment for the operation. Layer rules waive
    /// alignment entirely.
    pub fn channel_alignment(&self, _op: Operation) -> u32 {
        match self.level {
            RuleLevel::Workload => self.device.channel_alignment(),
            RuleLevel::Layer => 1,
        }
    }

    /// Valid output-channel counts for the operation.
    pub fn output_channels_range(&self, _op: Operation) -> RangeInclusive<u32> {
        match self.level {
            RuleLevel::Workload => 1..=8192,
            RuleLevel::Layer => 1..=65536,
        }
    }

    /// Valid input-channel counts for the operation.
    ///
    /// Channel-major convolution exists precisely for inputs thinner than
    /// one alignment unit; MAXPOOL on the first generation caps its input
    /// depth.
    pub fn input_channels_range(&self, op: Operation) -> RangeInclusive<u32> {
        match op {
            Operation::CmConvolution => 1..=(self.device.channel_alignment() - 1),
            Operation::Maxpool if self.device == VpuDevice::Vpu2_0 => 1..=64,
            _ => self.output_channels_range(op),
        }
    }

    pub fn kernel_range(&self, op: Operation) -> RangeInclusive<u32> {
        match op {
            Operation::Eltwise => 1..=1,
            _ => 1..=11,
        }
    }

    pub fn stride_range(&self, op: Operation) -> RangeInclusive<u32> {
        match op {
            Operation::Eltwise => 1..=1,
            _ => 1..=8,
        }
    }

    /// Padding must stay below the kernel extent on its axis.
    pub fn max_padding(&self, kernel: u32) -> u32 {
        kernel.saturating_sub(1)
    }

    /// Whether activation sparsity is available for the operation.
    pub fn activation_sparsity_allowed(&self, op: Operation) -> bool {
        match self.device {
            VpuDevice::Vpu2_0 => false,
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => {
                matches!(op, Operation::Convolution | Operation::Eltwise)
            }
        }
    }

    /// Whether weight sparsity is available for the operation.
    pub fn weight_sparsity_allowed(&self, op: Operation) -> bool {
        match self.device {
            VpuDevice::Vpu2_0 => false,
            VpuDevice::Vpu2_7 | VpuDevice::Vpu4_0 => op == Operation::Convolution,
        }
    }

    /// Dynamic ISI constraints against a partially-validated workload.
    pub fn isi_allowed(&self, wl: &DpuWorkload) -> bool {
        if !self
            .valid_isi_strategy_names()
            .contains(&wl.isi_strategy.name())
        {
            return false;
        }
        match wl.isi_strategy {
            IsiStrategy::SplitOverK => wl.output_write_tiles > 1,
            _ => true,
        }
    }

    pub fn operation_valid(&self, op: Operation) -> bool {
        self.valid_operation_names().contains(&op.name())
    }

    pub fn execution_mode_valid(&self, mode: ExecutionMode) -> bool {
        self.valid_execution_mode_names().contains(&mode.name())
    }

    pub fn datatype_valid(&self, dtype: DataType) -> bool {
        self.valid_datatype_names().contains(&dtype.name())
    }

    pub fn layout_valid(&self, layout: Layout) -> bool {
        self.valid_layout_names().contains(&layout.name())
    }

    pub fn swizzling_valid(&self, swizzling: Swizzling) -> bool {
        self.valid_swizzling_names().contains(&swizzling.name())
    }

    pub fn memory_location_valid(&self, location: MemoryLocation) -> bool {
        self.valid_memory_location_names().contains(&location.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cm_convolution_arrives_with_gen_2_7() {
        assert!(!DeviceRules::workload(VpuDevice::Vpu2_0).operation_valid(Operation::CmConvolution));
        assert!(DeviceRules::workload(VpuDevice::Vpu2_7).operation_valid(Operation::CmConvolution));
        assert!(DeviceRules::workload(VpuDevice::Vpu4_0).operation_valid(Operation::CmConvolution));
    }

    #[test]
    fn execution_modes_switch_per_generation() {
        let r20 = DeviceRules::workload(VpuDevice::Vpu2_0);
        assert!(r20.execution_mode_valid(ExecutionMode::Matrix));
        assert!(!r20.execution_mode_valid(ExecutionMode::Cuboid16x16));

        let r27 = DeviceRules::workload(VpuDevice::Vpu2_7);
        assert!(r27.execution_mode_valid(ExecutionMode::Cuboid16x16));
        assert!(!r27.execution_mode_valid(ExecutionMode::Matrix));
    }

    #[test]
    fn layer_level_waives_alignment_and_overhead() {
        let wl = DeviceRules::workload(VpuDevice::Vpu2_7);
        let layer = DeviceRules::layer(VpuDevice::Vpu2_7);
        assert_eq!(wl.channel_alignment(Operation::Convolution), 16);
        assert_eq!(layer.channel_alignment(Operation::Convolution), 1);
        assert!(wl.cmx_overhead_bytes() > 0);
        assert_eq!(layer.cmx_overhead_bytes(), 0);
    }

    #[test]
    fn cm_convolution_needs_thin_input() {
        let r = DeviceRules::workload(VpuDevice::Vpu2_7);
        assert_eq!(r.input_channels_range(Operation::CmConvolution), 1..=15);
        assert!(r
            .input_channels_range(Operation::Convolution)
            .contains(&2048));
    }

    #[test]
    fn maxpool_on_2_0_caps_input_depth() {
        let r = DeviceRules::workload(VpuDevice::Vpu2_0);
        assert_eq!(r.input_channels_range(Operation::Maxpool), 1..=64);
        let r27 = DeviceRules::workload(VpuDevice::Vpu2_7);
        assert!(r27.input_channels_range(Operation::Maxpool).contains(&512));
    }

    #[test]
    fn eltwise_is_pointwise_only() {
        let r = DeviceRules::workload(VpuDevice::Vpu2_7);
        assert_eq!(r.kernel_range(Operation::Eltwise), 1..=1);
        assert_eq!(r.stride_range(Operation::Eltwise), 1..=1);
        assert_eq!(r.kernel_range(Operation::Convolution), 1..=11);
    }

    #[test]
    fn split_over_k_requires_broadcast() {
        use vpucost_core::{DataType, Layout, VpuTensor};
        let t = VpuTensor::dense([8, 8, 32, 1], DataType::Uint8, Layout::Zmajor).unwrap();
        let mut wl = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Convolution,
            vec![t],
            t,
        );
        wl.isi_strategy = IsiStrategy::SplitOverK;
        wl.output_write_tiles = 1;
        let r = DeviceRules::workload(VpuDevice::Vpu2_7);
        assert!(!r.isi_allowed(&wl));
        wl.output_write_tiles = 2;
        assert!(r.isi_allowed(&wl));
    }

    #[test]
    fn memory_locations_shrink_over_generations() {
        assert!(DeviceRules::workload(VpuDevice::Vpu2_0).memory_location_valid(MemoryLocation::Upa));
        assert!(!DeviceRules::workload(VpuDevice::Vpu2_7).memory_location_valid(MemoryLocation::Upa));
        assert!(!DeviceRules::workload(VpuDevice::Vpu4_0).memory_location_valid(MemoryLocation::Csram));
    }
}
