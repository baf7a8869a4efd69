//! VPU device generations and their fixed hardware constants.
//!
//! Every quantity the analytical models and validity rules need is queryable
//! from a [`DeviceProfile`]. Values are fixed per generation; they never
//! change at runtime.

use serde::{Deserialize, Serialize};

use crate::types::NamedEnum;

/// VPU device generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VpuDevice {
    /// First-generation device (2.0).
    Vpu2_0,
    /// Second-generation device (2.7).
    Vpu2_7,
    /// Third-generation device (4.0).
    Vpu4_0,
}

impl NamedEnum for VpuDevice {
    const ALL: &'static [Self] = &[VpuDevice::Vpu2_0, VpuDevice::Vpu2_7, VpuDevice::Vpu4_0];

    fn name(&self) -> &'static str {
        match self {
            VpuDevice::Vpu2_0 => "VPU_2_0",
            VpuDevice::Vpu2_7 => "VPU_2_7",
            VpuDevice::Vpu4_0 => "VPU_4_0",
        }
    }
}

/// Fixed hardware constants for one device generation.
///
/// All frequencies are in MHz, sizes in bytes, bandwidth in MB/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// DPU clock frequency.
    pub dpu_freq_mhz: u32,
    /// CMX clock frequency.
    pub cmx_freq_mhz: u32,
    /// CMX word size; allocations are rounded up to this.
    pub cmx_word_bytes: u32,
    /// Number of CMX read ports available to one DPU.
    pub cmx_read_ports: u32,
    /// Usable CMX scratchpad size per tile.
    pub cmx_size_bytes: u32,
    /// Runtime-reserved CMX overhead, charged on workload-level queries.
    pub cmx_overhead_bytes: u32,
    /// Sustained DRAM bandwidth.
    pub dram_bandwidth_mbps: u32,
    /// Parallel DMA channels.
    pub dma_channels: u32,
    /// MAC units in one DPU.
    pub macs_per_dpu: u32,
    /// Post-processing elements in one DPU.
    pub ppe_per_dpu: u32,
    /// DPUs per compute tile.
    pub dpus_per_tile: u32,
    /// Output-channel alignment requirement.
    pub channel_alignment: u32,
    /// DMA start latency when the source is DRAM, in DPU cycles.
    pub dma_latency_dram_cycles: u32,
    /// DMA start latency when the source is on-chip (CMX/CSRAM/UPA).
    pub dma_latency_cmx_cycles: u32,
    /// Power ratio of float datapath relative to the int reference.
    pub fp_to_int_power_ratio: f32,
}

const PROFILE_2_0: DeviceProfile = DeviceProfile {
    dpu_freq_mhz: 700,
    cmx_freq_mhz: 700,
    cmx_word_bytes: 16,
    cmx_read_ports: 4,
    cmx_size_bytes: 1024 * 1024,
    cmx_overhead_bytes: 16 * 1024,
    dram_bandwidth_mbps: 20_000,
    dma_channels: 1,
    macs_per_dpu: 256,
    ppe_per_dpu: 16,
    dpus_per_tile: 1,
    channel_alignment: 16,
    dma_latency_dram_cycles: 100,
    dma_latency_cmx_cycles: 16,
    fp_to_int_power_ratio: 1.0,
};

const PROFILE_2_7: DeviceProfile = DeviceProfile {
    dpu_freq_mhz: 1300,
    cmx_freq_mhz: 975,
    cmx_word_bytes: 16,
    cmx_read_ports: 8,
    cmx_size_bytes: 2 * 1024 * 1024,
    cmx_overhead_bytes: 16 * 1024,
    dram_bandwidth_mbps: 27_000,
    dma_channels: 2,
    macs_per_dpu: 2048,
    ppe_per_dpu: 64,
    dpus_per_tile: 1,
    channel_alignment: 16,
    dma_latency_dram_cycles: 956,
    dma_latency_cmx_cycles: 16,
    fp_to_int_power_ratio: 0.87,
};

const PROFILE_4_0: DeviceProfile = DeviceProfile {
    dpu_freq_mhz: 1700,
    cmx_freq_mhz: 975,
    cmx_word_bytes: 16,
    cmx_read_ports: 8,
    cmx_size_bytes: 2 * 1024 * 1024,
    cmx_overhead_bytes: 16 * 1024,
    dram_bandwidth_mbps: 45_000,
    dma_channels: 2,
    macs_per_dpu: 2048,
    ppe_per_dpu: 64,
    dpus_per_tile: 2,
    channel_alignment: 16,
    dma_latency_dram_cycles: 1242,
    dma_latency_cmx_cycles: 16,
    fp_to_int_power_ratio: 0.87,
};

impl VpuDevice {
    /// The constant hardware profile of this generation.
    pub fn profile(&self) -> &'static DeviceProfile {
        match self {
            VpuDevice::Vpu2_0 => &PROFILE_2_0,
            VpuDevice::Vpu2_7 => &PROFILE_2_7,
            VpuDevice::Vpu4_0 => &PROFILE_4_0,
        }
    }

    /// Output-channel alignment for this generation.
    pub fn channel_alignment(&self) -> u32 {
        self.profile().channel_alignment
    }

    /// Usable CMX bytes per tile.
    pub fn cmx_size_bytes(&self) -> u32 {
        self.profile().cmx_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_are_distinct_and_plausible() {
        let p20 = VpuDevice::Vpu2_0.profile();
        let p27 = VpuDevice::Vpu2_7.profile();
        let p40 = VpuDevice::Vpu4_0.profile();

        assert!(p20.macs_per_dpu < p27.macs_per_dpu);
        assert_eq!(p27.macs_per_dpu, p40.macs_per_dpu);
        assert!(p20.dram_bandwidth_mbps < p27.dram_bandwidth_mbps);
        assert!(p27.dram_bandwidth_mbps < p40.dram_bandwidth_mbps);
        assert_eq!(p27.channel_alignment, 16);
    }

    #[test]
    fn device_names_round_trip() {
        for d in VpuDevice::ALL {
            assert_eq!(VpuDevice::from_name(d.name()), Some(*d));
        }
        assert_eq!(VpuDevice::from_name("VPU_9_9"), None);
    }

    #[test]
    fn cmx_accessors_match_profile() {
        assert_eq!(VpuDevice::Vpu2_7.cmx_size_bytes(), 2 * 1024 * 1024);
        assert_eq!(VpuDevice::Vpu2_0.channel_alignment(), 16);
    }
}
