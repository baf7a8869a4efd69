//! Layer tiling and pricing.
//!
//! The tiler turns one [`DpuLayer`] into priced workload lists: an
//! inter-tile split (the named strategy), then for each sub-layer an
//! enumeration of execution modes and intra-tile partitions, each candidate
//! priced through the cost-model facade. Tiles execute concurrently, so the
//! layer compute cost is the most expensive tile; DMA fetch and spill costs
//! are added on top. Error codes sit at the top of the cycle range, so
//! taking a maximum bubbles the first unusable sub-layer up to the caller.

use tracing::debug;

use crate::dma::dma_cycles_with_channels;
use crate::facade::VpuCostModel;
use vpucost_core::{
    cost_adder, is_error, CyclesError, CyclesInterfaceType, DmaWorkload, DpuLayer, DpuWorkload,
    ExecutionMode, MemoryLocation, NamedEnum, TilingStrategy, VpuTensor,
};
use vpucost_rules::{DeviceRules, Sanitizer};

/// Default bound on workloads enumerated per tile.
pub const DEFAULT_MAX_WORKLOADS_PER_TILE: u32 = 50;

/// Tiling request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingOptions {
    pub n_tiles: u32,
    pub n_dpu_per_tile: u32,
    pub input_in_ddr: bool,
    pub output_in_ddr: bool,
    /// Weights are already resident; no per-tile weight fetch is added.
    pub prefetching: bool,
}

impl Default for TilingOptions {
    fn default() -> Self {
        TilingOptions {
            n_tiles: 1,
            n_dpu_per_tile: 1,
            input_in_ddr: false,
            output_in_ddr: false,
            prefetching: true,
        }
    }
}

/// Chosen split for one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDetail {
    pub sub_layer: DpuLayer,
    pub execution_mode: ExecutionMode,
    pub workloads: Vec<DpuWorkload>,
    pub cycles: CyclesInterfaceType,
}

/// Winning split of the whole layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSplitDetail {
    pub strategy: TilingStrategy,
    pub tiles: Vec<TileDetail>,
    /// Compute-only cost (max over tiles).
    pub compute_cycles: CyclesInterfaceType,
    /// Final cost including DMA overheads.
    pub total_cycles: CyclesInterfaceType,
}

/// Intra-tile coverage bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoverState {
    Empty,
    PartialCover,
    FullCover,
    Invalid,
}

/// Tracks whether a candidate workload list covers the sub-layer output
/// exactly once.
struct CoverageTracker {
    target_elements: u64,
    accumulated: u64,
    state: CoverState,
}

impl CoverageTracker {
    fn new(output: &VpuTensor) -> Self {
        CoverageTracker {
            target_elements: output.elements(),
            accumulated: 0,
            state: CoverState::Empty,
        }
    }

    fn add(&mut self, wl: &DpuWorkload) {
        if self.state == CoverState::Invalid || self.state == CoverState::FullCover {
            self.state = CoverState::Invalid;
            return;
        }
        self.accumulated += wl.output_0().elements();
        self.state = if self.accumulated > self.target_elements {
            CoverState::Invalid
        } else if self.accumulated == self.target_elements {
            CoverState::FullCover
        } else {
            CoverState::PartialCover
        };
    }

    fn accepted(&self) -> bool {
        self.state == CoverState::FullCover
    }
}

/// Prices layer splits against a borrowed cost model.
pub struct LayerTiler<'a> {
    model: &'a VpuCostModel,
    max_workloads_per_tile: u32,
}

impl<'a> LayerTiler<'a> {
    pub fn new(model: &'a VpuCostModel) -> Self {
        LayerTiler {
            model,
            max_workloads_per_tile: DEFAULT_MAX_WORKLOADS_PER_TILE,
        }
    }

    pub fn with_max_workloads(mut self, max: u32) -> Self {
        self.max_workloads_per_tile = max.max(1);
        self
    }

    /// Cheapest cost of the layer under the strategy.
    pub fn layer_cycles(
        &self,
        layer: DpuLayer,
        strategy: TilingStrategy,
        options: TilingOptions,
    ) -> CyclesInterfaceType {
        self.layer_cycles_detailed(layer, strategy, options).0
    }

    /// Cheapest cost plus the winning split.
    pub fn layer_cycles_detailed(
        &self,
        mut layer: DpuLayer,
        strategy: TilingStrategy,
        options: TilingOptions,
    ) -> (CyclesInterfaceType, Option<LayerSplitDetail>) {
        let report = Sanitizer::new().check_layer(&mut layer);
        if report.is_error() {
            debug!(target: "vpucost::tiler", code = %report, "layer rejected before tiling");
            return (report.value(), None);
        }

        let sub_layers = layer.split(strategy, options.n_tiles);
        debug!(
            target: "vpucost::tiler",
            layer = %layer.describe(strategy),
            tiles = sub_layers.len(),
            "inter-tile split"
        );
        let (compute, tiles) = self.price_tiles(&sub_layers, options.n_dpu_per_tile);
        if is_error(compute) {
            return (compute, None);
        }

        let total = self.add_dma_overhead(&layer, &sub_layers, compute, options);
        let detail = LayerSplitDetail {
            strategy,
            tiles,
            compute_cycles: compute,
            total_cycles: total,
        };
        (total, Some(detail))
    }

    /// Price sub-layers the caller already split across tiles.
    pub fn layers_pre_split_cycles(
        &self,
        sub_layers: &[DpuLayer],
        n_dpu_per_tile: u32,
    ) -> CyclesInterfaceType {
        if sub_layers.is_empty() {
            return CyclesError::InvalidLayerConfiguration.as_cycles();
        }
        self.price_tiles(sub_layers, n_dpu_per_tile).0
    }

    /// Best intra-tile split per sub-layer; compute cost is the max over
    /// tiles (they run concurrently).
    fn price_tiles(
        &self,
        sub_layers: &[DpuLayer],
        n_dpu: u32,
    ) -> (CyclesInterfaceType, Vec<TileDetail>) {
        let mut worst: CyclesInterfaceType = 0;
        let mut tiles = Vec::with_capacity(sub_layers.len());
        for sub in sub_layers {
            match self.best_tile_split(sub, n_dpu) {
                Some(detail) => {
                    worst = worst.max(detail.cycles);
                    tiles.push(detail);
                }
                None => {
                    return (CyclesError::TileOutput.as_cycles(), Vec::new());
                }
            }
        }
        (worst, tiles)
    }

    /// Enumerate execution modes and partitions for one sub-layer; keep the
    /// cheapest candidate that covers the output exactly and prices clean.
    fn best_tile_split(&self, sub: &DpuLayer, n_dpu: u32) -> Option<TileDetail> {
        let rules = DeviceRules::workload(sub.device);
        let mut best: Option<TileDetail> = None;

        for mode_name in rules.valid_execution_mode_names() {
            let mode = match ExecutionMode::from_name(mode_name) {
                Some(m) => m,
                None => continue,
            };
            for workloads in self.candidate_partitions(sub, mode) {
                let mut tracker = CoverageTracker::new(sub.output_0());
                for wl in &workloads {
                    tracker.add(wl);
                }
                if !tracker.accepted() {
                    continue;
                }

                let costs = self.model.dpu_batch(&workloads);
                if costs.iter().any(|c| is_error(*c)) {
                    continue;
                }
                let cycles = schedule_lpt(&costs, n_dpu);
                if is_error(cycles) {
                    continue;
                }
                let better = best
                    .as_ref()
                    .map(|b| cycles < b.cycles)
                    .unwrap_or(true);
                if better {
                    best = Some(TileDetail {
                        sub_layer: sub.clone(),
                        execution_mode: mode,
                        workloads,
                        cycles,
                    });
                }
            }
        }
        best
    }

    /// Candidate partitions of a sub-layer into workloads: whole, split
    /// over height, and split over aligned channel groups, at increasing
    /// granularity up to the per-tile bound.
    ///
    /// Pieces stay on one tile, so the sub-layer's inter-tile ISI fields
    /// are reapplied after the geometric split.
    fn candidate_partitions(&self, sub: &DpuLayer, mode: ExecutionMode) -> Vec<Vec<DpuWorkload>> {
        let mut candidates = Vec::new();
        let mut push = |pieces: Vec<DpuLayer>| {
            if pieces.is_empty() || pieces.len() as u32 > self.max_workloads_per_tile {
                return;
            }
            let workloads: Vec<DpuWorkload> = pieces
                .into_iter()
                .map(|p| {
                    let mut wl = p.into_workload();
                    wl.execution_mode = mode;
                    wl.isi_strategy = sub.isi_strategy;
                    wl.output_write_tiles = sub.output_write_tiles;
                    wl
                })
                .collect();
            candidates.push(workloads);
        };

        push(vec![sub.clone()]);
        let mut n = 2u32;
        while n <= self.max_workloads_per_tile {
            let by_h = sub.split_over_h(n, true);
            if by_h.len() > 1 {
                push(by_h);
            }
            let alignment = sub.device.channel_alignment();
            if sub.output_0().z() >= alignment * n {
                let by_k = sub.split_over_k(n);
                if by_k.len() > 1 {
                    push(by_k);
                }
            }
            n *= 2;
        }
        candidates
    }

    /// DMA fetch/spill overheads per the request flags.
    fn add_dma_overhead(
        &self,
        layer: &DpuLayer,
        sub_layers: &[DpuLayer],
        compute: CyclesInterfaceType,
        options: TilingOptions,
    ) -> CyclesInterfaceType {
        let profile = layer.device.profile();
        let mut total = compute;

        if options.input_in_ddr {
            let fetch = DmaWorkload::new(
                layer.device,
                *layer.input_0(),
                *layer.input_0(),
                MemoryLocation::Dram,
                MemoryLocation::Cmx,
            );
            total = cost_adder(
                total,
                dma_cycles_with_channels(&fetch, profile.dma_channels),
            );
        }

        if !options.prefetching {
            // Weight tensors stream per tile, sharing the DMA channels;
            // tiles fetch concurrently so the worst tile bounds the cost.
            let mut worst_fetch = 0u32;
            for sub in sub_layers {
                if let Some(weights) = weights_proxy_tensor(sub) {
                    let fetch = DmaWorkload::new(
                        sub.device,
                        weights,
                        weights,
                        MemoryLocation::Dram,
                        MemoryLocation::Cmx,
                    );
                    let cycles = dma_cycles_with_channels(&fetch, profile.dma_channels);
                    worst_fetch = worst_fetch.max(cycles);
                }
            }
            total = cost_adder(total, worst_fetch);
        }

        if options.output_in_ddr {
            let spill = DmaWorkload::new(
                layer.device,
                *layer.output_0(),
                *layer.output_0(),
                MemoryLocation::Cmx,
                MemoryLocation::Dram,
            );
            total = cost_adder(
                total,
                dma_cycles_with_channels(&spill, profile.dma_channels),
            );
        }
        total
    }
}

/// Greedy longest-processing-time assignment of workload costs onto
/// `n_dpu` engines; the tile finishes with its busiest engine.
fn schedule_lpt(costs: &[CyclesInterfaceType], n_dpu: u32) -> CyclesInterfaceType {
    let n = n_dpu.max(1) as usize;
    let mut sorted: Vec<CyclesInterfaceType> = costs.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut loads = vec![0u32; n];
    for cost in sorted {
        let idx = loads
            .iter()
            .enumerate()
            .min_by_key(|(_, l)| **l)
            .map(|(i, _)| i)
            .unwrap_or(0);
        loads[idx] = cost_adder(loads[idx], cost);
    }
    loads.into_iter().max().unwrap_or(0)
}

/// A tensor standing in for the sub-layer's weight bytes in DMA pricing.
fn weights_proxy_tensor(sub: &DpuLayer) -> Option<VpuTensor> {
    if !sub.op.has_weights() {
        return None;
    }
    let k = sub.kernel.h * sub.kernel.w;
    let c_in = if sub.op.is_channel_preserving() {
        1
    } else {
        sub.input_channels()
    };
    let c_out = sub.output_channels();
    VpuTensor::new(
        [k.max(1), c_in.max(1), c_out.max(1), 1],
        sub.input_0().dtype(),
        sub.input_0().layout(),
        false,
    )
    .ok()
}
