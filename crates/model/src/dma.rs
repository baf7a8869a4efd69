//! Analytical DMA bandwidth model.
//!
//! A transfer pays a fixed start latency that depends on where the source
//! lives, then moves bytes at the bandwidth of the slowest pool involved.
//! All cycles are expressed at the device's DPU clock.

use vpucost_core::{
    cycles_from_f32, CyclesInterfaceType, DeviceProfile, DmaWorkload, MemoryLocation,
};

/// Bandwidth halving applied when the transfer permutes the layout.
const PERMUTE_FACTOR: f32 = 0.5;
/// Byte reduction applied when activation compression is on.
const COMPRESSION_FACTOR: f32 = 0.5;

/// Bytes one DPU cycle can move between the two pools.
fn bytes_per_cycle(profile: &DeviceProfile, src: MemoryLocation, dst: MemoryLocation) -> f32 {
    let dram_involved = src == MemoryLocation::Dram || dst == MemoryLocation::Dram;
    if dram_involved {
        // MB/s over MHz collapses to bytes per cycle.
        profile.dram_bandwidth_mbps as f32 / profile.dpu_freq_mhz as f32
    } else {
        // On-chip pools run at the CMX port bandwidth, rescaled from the
        // CMX clock to DPU cycles.
        let port_bytes = (profile.cmx_read_ports * profile.cmx_word_bytes) as f32;
        port_bytes * profile.cmx_freq_mhz as f32 / profile.dpu_freq_mhz as f32
    }
}

/// Start latency in DPU cycles for a given source pool.
fn latency_cycles(profile: &DeviceProfile, src: MemoryLocation) -> u32 {
    match src {
        MemoryLocation::Dram => profile.dma_latency_dram_cycles,
        MemoryLocation::Cmx | MemoryLocation::Csram | MemoryLocation::Upa => {
            profile.dma_latency_cmx_cycles
        }
    }
}

/// Cycles for one DMA transfer.
pub fn dma_theoretical_cycles(wl: &DmaWorkload) -> CyclesInterfaceType {
    dma_cycles_with_channels(wl, 1)
}

/// Cycles for one DMA transfer when `channels` engines share the job.
/// Latency is paid once; the byte stream is divided.
pub fn dma_cycles_with_channels(wl: &DmaWorkload, channels: u32) -> CyclesInterfaceType {
    let profile = wl.device.profile();
    let mut bytes = wl.input.size_bytes() as f32;
    if wl.compression {
        bytes *= COMPRESSION_FACTOR;
    }
    let mut rate = bytes_per_cycle(profile, wl.input_location, wl.output_location);
    if wl.permute {
        rate *= PERMUTE_FACTOR;
    }
    let channels = channels.max(1).min(profile.dma_channels) as f32;
    let transfer = (bytes / (rate * channels)).ceil();
    cycles_from_f32(latency_cycles(profile, wl.input_location) as f32 + transfer)
}
