//! Layer-level workload and its inter-tile splits.
//!
//! A [`DpuLayer`] carries the same fields as a [`DpuWorkload`] but describes
//! one logical operation that may still be partitioned across tiles. The
//! split methods here are pure geometry: they produce sub-layers, one per
//! tile, and never price anything.
//!
//! When a split cannot produce the requested tile count (not enough rows,
//! columns or channel groups), it returns fewer tiles; ISI strategy and
//! output-write-tiles reflect what was actually produced, never the request.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::tensor::VpuTensor;
use crate::types::{IsiStrategy, NamedEnum, TilingStrategy};
use crate::workload::DpuWorkload;

/// One logical operation before tiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DpuLayer(DpuWorkload);

impl DpuLayer {
    pub fn new(workload: DpuWorkload) -> Self {
        DpuLayer(workload)
    }

    pub fn into_workload(self) -> DpuWorkload {
        self.0
    }

    pub fn workload(&self) -> &DpuWorkload {
        &self.0
    }

    /// Apply an inter-tile strategy.
    pub fn split(&self, strategy: TilingStrategy, n_tiles: u32) -> Vec<DpuLayer> {
        match strategy {
            TilingStrategy::Clustering => self.split_clustering(n_tiles),
            TilingStrategy::SplitOverH => self.split_over_h(n_tiles, false),
            TilingStrategy::SohOverlapped => self.split_over_h(n_tiles, true),
            TilingStrategy::SplitOverK => self.split_over_k(n_tiles),
            TilingStrategy::SplitOverW => self.split_over_w(n_tiles),
            TilingStrategy::SplitOverHW => self.split_over_hw(n_tiles),
            TilingStrategy::SplitOverHK => self.split_over_hk(n_tiles),
        }
    }

    /// Replicate the whole layer into every tile.
    pub fn split_clustering(&self, n_tiles: u32) -> Vec<DpuLayer> {
        let mut wl = self.0.clone();
        wl.isi_strategy = IsiStrategy::Clustering;
        (0..n_tiles.max(1)).map(|_| DpuLayer(wl.clone())).collect()
    }

    /// Split the output height across tiles.
    ///
    /// Every tile's input height is recomputed through the inverse of the
    /// output formula, so cut lines carry their kernel halo and no padding.
    /// Plain SOH marks the tiles SPLIT_OVER_H (the halo rows are read from
    /// the neighbour tile's CMX); the overlapped variant duplicates the
    /// halo into both tiles and keeps ISI at CLUSTERING.
    pub fn split_over_h(&self, n_tiles: u32, overlapped: bool) -> Vec<DpuLayer> {
        let wl = &self.0;
        let out_h = wl.expected_output_height();
        let heights = split_extents(out_h, n_tiles);
        let in_h = wl.input_0().y() as i64;
        let stride = wl.stride.h as i64;
        let kernel = wl.kernel.h as i64;
        let pad_top = wl.padding.top as i64;

        let n = heights.len();
        let mut out = Vec::with_capacity(n);
        let mut o_lo: i64 = 0;
        for (i, &h) in heights.iter().enumerate() {
            let o_hi = o_lo + h as i64;
            // Receptive field of output rows [o_lo, o_hi) in input space.
            let field_lo = o_lo * stride - pad_top;
            let field_hi = (o_hi - 1) * stride - pad_top + kernel;
            let slice_lo = field_lo.max(0);
            let slice_hi = field_hi.min(in_h).max(slice_lo + 1);

            let mut sub = wl.clone();
            sub.padding.top = if i == 0 { (-field_lo).max(0) as u32 } else { 0 };
            sub.padding.bottom = if i == n - 1 {
                (field_hi - in_h).max(0) as u32
            } else {
                0
            };
            let new_in_h = (slice_hi - slice_lo) as u32;
            for t in sub.inputs.iter_mut() {
                *t = with_height(t, new_in_h);
            }
            sub.outputs[0] = with_height(&sub.outputs[0], h);
            sub.isi_strategy = if overlapped || n == 1 {
                IsiStrategy::Clustering
            } else {
                IsiStrategy::SplitOverH
            };
            out.push(DpuLayer(sub));
            o_lo = o_hi;
        }
        out
    }

    /// Split the output width across tiles. Width has no inter-slice read
    /// path, so cut columns carry their halo in both tiles (CLUSTERING).
    pub fn split_over_w(&self, n_tiles: u32) -> Vec<DpuLayer> {
        let wl = &self.0;
        let out_w = wl.expected_output_width();
        let widths = split_extents(out_w, n_tiles);
        let in_w = wl.input_0().x() as i64;
        let stride = wl.stride.w as i64;
        let kernel = wl.kernel.w as i64;
        let pad_left = wl.padding.left as i64;

        let n = widths.len();
        let mut out = Vec::with_capacity(n);
        let mut o_lo: i64 = 0;
        for (i, &w) in widths.iter().enumerate() {
            let o_hi = o_lo + w as i64;
            let field_lo = o_lo * stride - pad_left;
            let field_hi = (o_hi - 1) * stride - pad_left + kernel;
            let slice_lo = field_lo.max(0);
            let slice_hi = field_hi.min(in_w);

            let mut sub = wl.clone();
            sub.padding.left = if i == 0 { (-field_lo).max(0) as u32 } else { 0 };
            sub.padding.right = if i == n - 1 {
                (field_hi - in_w).max(0) as u32
            } else {
                0
            };
            let new_in_w = (slice_hi - slice_lo) as u32;
            for t in sub.inputs.iter_mut() {
                *t = with_width(t, new_in_w);
            }
            sub.outputs[0] = with_width(&sub.outputs[0], w);
            sub.isi_strategy = IsiStrategy::Clustering;
            out.push(DpuLayer(sub));
            o_lo = o_hi;
        }
        out
    }

    /// Split the output channels across tiles, each tile rounded to the
    /// device channel alignment. Output-write-tiles becomes the number of
    /// tiles actually produced.
    pub fn split_over_k(&self, n_tiles: u32) -> Vec<DpuLayer> {
        let wl = &self.0;
        let alignment = wl.device.channel_alignment();
        let k = wl.output_channels();
        let units = k / alignment;
        if units <= 1 || n_tiles <= 1 {
            // Nothing to distribute: the layer stays whole and unsplit.
            let mut sub = wl.clone();
            sub.isi_strategy = IsiStrategy::Clustering;
            return vec![DpuLayer(sub)];
        }
        let unit_counts = split_extents(units, n_tiles);
        let n = unit_counts.len() as u32;
        let mut produced = Vec::with_capacity(unit_counts.len());
        let mut remaining = k;
        for (i, &u) in unit_counts.iter().enumerate() {
            // The tail tile absorbs any channels beyond the aligned units.
            let tile_k = if i == unit_counts.len() - 1 {
                remaining
            } else {
                u * alignment
            };
            remaining -= tile_k;

            let mut sub = wl.clone();
            sub.outputs[0] = with_channels(&sub.outputs[0], tile_k);
            if wl.op.is_channel_preserving() {
                for t in sub.inputs.iter_mut() {
                    *t = with_channels(t, tile_k);
                }
            }
            sub.isi_strategy = IsiStrategy::SplitOverK;
            sub.output_write_tiles = n;
            produced.push(DpuLayer(sub));
        }
        produced
    }

    /// Two-dimensional split: overlapped height, then width.
    pub fn split_over_hw(&self, n_tiles: u32) -> Vec<DpuLayer> {
        let (nh, nw) = balanced_factors(n_tiles);
        self.split_over_h(nh, true)
            .iter()
            .flat_map(|sub| sub.split_over_w(nw))
            .collect()
    }

    /// Height-and-channels split: channel groups first (they set ISI and
    /// output-write-tiles), then overlapped height inside each group.
    pub fn split_over_hk(&self, n_tiles: u32) -> Vec<DpuLayer> {
        let (nh, nk) = balanced_factors(n_tiles);
        self.split_over_k(nk)
            .iter()
            .flat_map(|sub| {
                let owt = sub.0.output_write_tiles;
                let isi = sub.0.isi_strategy;
                sub.split_over_h(nh, true).into_iter().map(move |mut piece| {
                    piece.0.isi_strategy = isi;
                    piece.0.output_write_tiles = owt;
                    piece
                })
            })
            .collect()
    }

    /// Diagnostic label used in split summaries.
    pub fn describe(&self, strategy: TilingStrategy) -> String {
        format!(
            "{} {} {}x{}x{}",
            strategy.name(),
            self.0.op.name(),
            self.0.output_0().x(),
            self.0.output_0().y(),
            self.0.output_0().z()
        )
    }
}

impl Deref for DpuLayer {
    type Target = DpuWorkload;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DpuLayer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<DpuWorkload> for DpuLayer {
    fn from(wl: DpuWorkload) -> Self {
        DpuLayer(wl)
    }
}

/// Distribute `total` into at most `parts` chunks, largest first.
/// Produces fewer chunks when `total < parts`.
fn split_extents(total: u32, parts: u32) -> Vec<u32> {
    let parts = parts.max(1);
    let chunk = (total + parts - 1) / parts;
    let mut out = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let take = chunk.min(remaining);
        out.push(take);
        remaining -= take;
    }
    if out.is_empty() {
        out.push(total);
    }
    out
}

/// Factor `n` into `(a, b)` with `a * b == n` and the pair as square as
/// possible. Falls back to `(n, 1)` for primes.
fn balanced_factors(n: u32) -> (u32, u32) {
    let n = n.max(1);
    let mut a = (n as f64).sqrt() as u32;
    while a > 1 && n % a != 0 {
        a -= 1;
    }
    (a.max(1), n / a.max(1))
}

fn with_height(t: &VpuTensor, h: u32) -> VpuTensor {
    VpuTensor::new([t.x(), h, t.z(), t.b()], t.dtype(), t.layout(), t.is_sparse())
        .expect("split heights are positive")
}

fn with_width(t: &VpuTensor, w: u32) -> VpuTensor {
    VpuTensor::new([w, t.y(), t.z(), t.b()], t.dtype(), t.layout(), t.is_sparse())
        .expect("split widths are positive")
}

fn with_channels(t: &VpuTensor, z: u32) -> VpuTensor {
    VpuTensor::new([t.x(), t.y(), z, t.b()], t.dtype(), t.layout(), t.is_sparse())
        .expect("split channels are positive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::VpuDevice;
    use crate::tensor::VpuTensor;
    use crate::types::{DataType, Layout, Operation};
    use crate::workload::{Dim2, Padding};

    fn conv_layer(in_shape: [u32; 4], out_shape: [u32; 4]) -> DpuLayer {
        let t = |s| VpuTensor::dense(s, DataType::Uint8, Layout::Zmajor).unwrap();
        let mut wl = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Convolution,
            vec![t(in_shape)],
            t(out_shape),
        );
        wl.kernel = Dim2::square(3);
        wl.padding = Padding {
            top: 1,
            bottom: 1,
            left: 1,
            right: 1,
        };
        DpuLayer::new(wl)
    }

    #[test]
    fn clustering_replicates() {
        let layer = conv_layer([56, 56, 64, 1], [56, 56, 64, 1]);
        let tiles = layer.split_clustering(4);
        assert_eq!(tiles.len(), 4);
        for t in &tiles {
            assert_eq!(t.output_0().y(), 56);
            assert_eq!(t.isi_strategy, IsiStrategy::Clustering);
        }
    }

    #[test]
    fn soh_partitions_output_height_exactly() {
        let layer = conv_layer([112, 112, 32, 1], [112, 112, 32, 1]);
        let tiles = layer.split_over_h(4, false);
        assert_eq!(tiles.len(), 4);
        let total: u32 = tiles.iter().map(|t| t.output_0().y()).sum();
        assert_eq!(total, 112);
        for t in &tiles {
            assert_eq!(t.isi_strategy, IsiStrategy::SplitOverH);
            // The inverse output formula holds tile-locally.
            assert_eq!(t.expected_output_height(), t.output_0().y());
        }
        // Boundary padding stays only at the real edges.
        assert_eq!(tiles[0].padding.top, 1);
        assert_eq!(tiles[0].padding.bottom, 0);
        assert_eq!(tiles[3].padding.top, 0);
        assert_eq!(tiles[3].padding.bottom, 1);
        // Interior cut lines carry the kernel halo instead of padding.
        assert_eq!(tiles[1].padding.top, 0);
        assert!(tiles[1].input_0().y() > tiles[1].output_0().y());
    }

    #[test]
    fn soh_overlapped_duplicates_halo() {
        let layer = conv_layer([112, 112, 32, 1], [112, 112, 32, 1]);
        let tiles = layer.split_over_h(4, true);
        assert_eq!(tiles.len(), 4);
        let out_total: u32 = tiles.iter().map(|t| t.output_0().y()).sum();
        assert_eq!(out_total, 112);
        // Halo rows appear in more than one tile.
        let in_total: u32 = tiles.iter().map(|t| t.input_0().y()).sum();
        assert!(in_total > 112);
        for t in &tiles {
            assert_eq!(t.isi_strategy, IsiStrategy::Clustering);
        }
    }

    #[test]
    fn soh_with_more_tiles_than_rows_shrinks() {
        let layer = conv_layer([4, 4, 16, 1], [4, 4, 16, 1]);
        let tiles = layer.split_over_h(8, false);
        assert!(tiles.len() <= 4);
        let total: u32 = tiles.iter().map(|t| t.output_0().y()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn sok_rounds_to_alignment_and_sets_owt() {
        let layer = conv_layer([28, 28, 64, 1], [28, 28, 64, 1]);
        let tiles = layer.split_over_k(4);
        assert_eq!(tiles.len(), 4);
        let total: u32 = tiles.iter().map(|t| t.output_0().z()).sum();
        assert_eq!(total, 64);
        for t in &tiles {
            assert_eq!(t.output_0().z() % 16, 0);
            assert_eq!(t.isi_strategy, IsiStrategy::SplitOverK);
            assert_eq!(t.output_write_tiles, 4);
            // Convolution keeps the full input depth.
            assert_eq!(t.input_0().z(), 64);
        }
    }

    #[test]
    fn sok_produces_fewer_tiles_when_channels_run_out() {
        let layer = conv_layer([28, 28, 32, 1], [28, 28, 32, 1]);
        let tiles = layer.split_over_k(4);
        assert_eq!(tiles.len(), 2);
        for t in &tiles {
            // Not inflated to the request.
            assert_eq!(t.output_write_tiles, 2);
        }
    }

    #[test]
    fn sohw_covers_both_axes() {
        let layer = conv_layer([56, 56, 64, 1], [56, 56, 64, 1]);
        let tiles = layer.split_over_hw(4);
        assert_eq!(tiles.len(), 4);
        // 2x2 grid: heights and widths both sum to 2x the extent.
        let out_area: u64 = tiles
            .iter()
            .map(|t| t.output_0().x() as u64 * t.output_0().y() as u64)
            .sum();
        assert_eq!(out_area, 56 * 56);
    }

    #[test]
    fn sohk_keeps_channel_group_isi() {
        let layer = conv_layer([56, 56, 64, 1], [56, 56, 64, 1]);
        let tiles = layer.split_over_hk(4);
        assert_eq!(tiles.len(), 4);
        for t in &tiles {
            assert_eq!(t.isi_strategy, IsiStrategy::SplitOverK);
            assert_eq!(t.output_write_tiles, 2);
        }
        let out_volume: u64 = tiles
            .iter()
            .map(|t| t.output_0().y() as u64 * t.output_0().z() as u64)
            .sum();
        assert_eq!(out_volume, 56 * 64);
    }

    #[test]
    fn describe_names_strategy_op_and_output() {
        let layer = conv_layer([56, 56, 64, 1], [56, 56, 64, 1]);
        assert_eq!(
            layer.describe(TilingStrategy::SplitOverH),
            "SOH CONVOLUTION 56x56x64"
        );
        assert_eq!(
            layer.describe(TilingStrategy::Clustering),
            "CLUSTERING CONVOLUTION 56x56x64"
        );
    }

    #[test]
    fn strategy_dispatch_matches_direct_calls() {
        let layer = conv_layer([112, 112, 32, 1], [112, 112, 32, 1]);
        assert_eq!(
            layer.split(TilingStrategy::SplitOverH, 4),
            layer.split_over_h(4, false)
        );
        assert_eq!(
            layer.split(TilingStrategy::Clustering, 2),
            layer.split_clustering(2)
        );
    }
}
