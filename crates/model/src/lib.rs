//! Pricing side of the cost model: analytical DPU/DMA/SHAVE estimates, the
//! activity-factor table, the cost-model facade and the layer tiler.

pub mod dma;
pub mod dpu;
pub mod facade;
pub mod power;
pub mod shave;
pub mod tiler;

pub use dma::{dma_cycles_with_channels, dma_theoretical_cycles};
pub use dpu::{
    dense_macs, ideal_cycles_efficiency, ideal_cycles_power, mac_utilization, sparse_macs,
    theoretical_cycles,
};
pub use facade::{
    CostModelConfig, CostModelError, DpuInfo, VpuCostModel, DEFAULT_BATCH, DEFAULT_CACHE_CAPACITY,
};
pub use power::power_factor;
pub use shave::{
    kernel_names, kernel_spec, shave_theoretical_cycles, ShaveKernelSpec, KERNELS,
    REF_DPU_FREQ_MHZ,
};
pub use tiler::{
    LayerSplitDetail, LayerTiler, TileDetail, TilingOptions, DEFAULT_MAX_WORKLOADS_PER_TILE,
};
