//! The cost-model facade.
//!
//! One [`VpuCostModel`] owns a sanitizer, at most one loaded estimator with
//! its cache, and the analytical fallbacks. The public entry points return
//! error-banded cycle values; after construction nothing here raises a
//! Rust error for workload problems.
//!
//! A cost model is not safe for concurrent use: one `parking_lot::Mutex`
//! serializes the NN scratch buffers and the cache, which keeps the `&self`
//! API coherent for single-threaded callers, but callers wanting real
//! multi-threading must wrap the whole instance.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dma::dma_theoretical_cycles;
use crate::dpu::{
    dense_macs, ideal_cycles_efficiency, ideal_cycles_power, sparse_macs, theoretical_cycles,
};
use crate::power::power_factor;
use crate::shave::shave_theoretical_cycles;
use vpucost_core::{
    cycles_from_f32, is_error, is_valid_cycles, CyclesError, CyclesInterfaceType, DmaWorkload,
    DpuWorkload, SanityReport, ShaveWorkload,
};
use vpucost_nn::{
    DescriptorKey, EncodeError, InferenceRuntime, LruCache, ModelBlob, ModelError, NnModel,
    PostProcessing, Preprocessor,
};
use vpucost_rules::Sanitizer;

/// Default bound on cached NN outputs.
pub const DEFAULT_CACHE_CAPACITY: usize = 16_384;
/// Default NN batch size.
pub const DEFAULT_BATCH: usize = 1;

/// Construction-time configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModelConfig {
    /// Rows evaluated per NN forward pass.
    pub batch: usize,
    /// LRU capacity; zero disables caching.
    pub cache_capacity: usize,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        CostModelConfig {
            batch: DEFAULT_BATCH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Errors possible only while building a cost model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostModelError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Interface(#[from] EncodeError),
    #[error("schema descriptor length {descriptor} does not match model input width {model}")]
    DescriptorMismatch { descriptor: usize, model: usize },
    #[error("model output width {0} is not scalar")]
    NonScalarOutput(usize),
}

/// Everything that must stay coherent across one NN evaluation.
#[derive(Debug)]
struct NnState {
    runtime: InferenceRuntime,
    preprocessor: Preprocessor,
    post: PostProcessing,
    cache: LruCache,
}

/// Per-workload result bundle of [`VpuCostModel::dpu_info`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpuInfo {
    /// Final cycle estimate (or error code).
    pub dpu_cycles: CyclesInterfaceType,
    /// Decoded error, when `dpu_cycles` is in the error band.
    pub error: Option<CyclesError>,
    /// Diagnostics text from validation.
    pub info: String,
    pub dense_macs: u64,
    pub sparse_macs: u64,
    pub power_ideal_cycles: CyclesInterfaceType,
    pub efficiency_ideal_cycles: CyclesInterfaceType,
    pub theoretical_cycles: CyclesInterfaceType,
    /// Power activity relative to the power virus, clamped to `[0, 1]`.
    pub activity_factor: f32,
    /// MAC array occupancy implied by the final estimate.
    pub mac_utilization: f32,
    /// `activity_factor * cycles`, in device-normalized units.
    pub energy: f32,
}

/// The cost-estimation engine.
#[derive(Debug)]
pub struct VpuCostModel {
    sanitizer: Sanitizer,
    nn: Option<Mutex<NnState>>,
}

impl VpuCostModel {
    /// A model with no estimator: every DPU query uses the analytical
    /// path.
    pub fn analytical() -> Self {
        VpuCostModel {
            sanitizer: Sanitizer::new(),
            nn: None,
        }
    }

    /// Build around a serialized estimator blob.
    pub fn with_model(blob: &ModelBlob<'_>, config: CostModelConfig) -> Result<Self, CostModelError> {
        let model = NnModel::load(blob)?;
        let preprocessor = Preprocessor::for_interface(model.version().input_version)?;
        if model.input_dim() != preprocessor.descriptor_length() {
            return Err(CostModelError::DescriptorMismatch {
                descriptor: preprocessor.descriptor_length(),
                model: model.input_dim(),
            });
        }
        if model.output_dim() != 1 {
            return Err(CostModelError::NonScalarOutput(model.output_dim()));
        }
        let post = model.version().post_processing();
        if let PostProcessing::Unknown(vo) = post {
            warn!(
                target: "vpucost::model",
                output_version = vo,
                "unknown output schema: every NN query will report an invalid output range"
            );
        }
        let runtime = InferenceRuntime::new(model, config.batch);
        Ok(VpuCostModel {
            sanitizer: Sanitizer::new(),
            nn: Some(Mutex::new(NnState {
                runtime,
                preprocessor,
                post,
                cache: LruCache::new(config.cache_capacity),
            })),
        })
    }

    /// Convenience constructor from raw bytes. `copy` selects the owning
    /// blob; `false` parses straight out of the caller's buffer.
    pub fn from_model_bytes(
        bytes: &[u8],
        copy: bool,
        config: CostModelConfig,
    ) -> Result<Self, CostModelError> {
        if copy {
            Self::with_model(&ModelBlob::copied(bytes), config)
        } else {
            Self::with_model(&ModelBlob::borrowed(bytes), config)
        }
    }

    pub fn has_model(&self) -> bool {
        self.nn.is_some()
    }

    /// Name embedded in the loaded model, if any.
    pub fn model_name(&self) -> Option<String> {
        self.nn
            .as_ref()
            .map(|m| m.lock().runtime.model().name().to_string())
    }

    /// Drop all cached NN outputs. Results do not change, only latency.
    pub fn clear_cache(&self) {
        if let Some(m) = &self.nn {
            m.lock().cache.clear();
        }
    }

    /// Cycle estimate for one DPU workload.
    pub fn dpu(&self, wl: DpuWorkload) -> CyclesInterfaceType {
        self.price_dpu(wl).0
    }

    /// Cycle estimate plus validation diagnostics.
    pub fn dpu_with_diagnostics(
        &self,
        wl: DpuWorkload,
        info: &mut String,
    ) -> CyclesInterfaceType {
        let (cycles, report, _) = self.price_dpu(wl);
        info.clear();
        info.push_str(report.info());
        cycles
    }

    /// Batched estimate: NN-eligible misses are evaluated through the
    /// runtime in batch-size chunks, the last chunk right-padded with the
    /// neutral workload. Padded rows are computed and discarded.
    pub fn dpu_batch(&self, wls: &[DpuWorkload]) -> Vec<CyclesInterfaceType> {
        let mut results = vec![0u32; wls.len()];
        // (index, sanitized workload, descriptor)
        let mut pending: Vec<(usize, DpuWorkload, Vec<f32>)> = Vec::new();

        for (i, original) in wls.iter().enumerate() {
            let mut wl = original.clone();
            let report = self.sanitizer.check_and_sanitize(&mut wl);
            if report.is_error() {
                results[i] = report.value();
                continue;
            }
            match &self.nn {
                None => results[i] = theoretical_cycles(&wl),
                Some(m) => {
                    let mut state = m.lock();
                    if let PostProcessing::Unknown(_) = state.post {
                        results[i] = CyclesError::InvalidOutputRange.as_cycles();
                        continue;
                    }
                    match state.preprocessor.encode(&wl) {
                        Err(e) => {
                            debug!(target: "vpucost::model", error = %e, "descriptor encoding failed, using analytical fallback");
                            results[i] = theoretical_cycles(&wl);
                        }
                        Ok(desc) => {
                            let key = DescriptorKey::from_floats(&desc);
                            if let Some(raw) = state.cache.get(&key) {
                                results[i] = post_process(raw, &wl, state.post);
                            } else {
                                pending.push((i, wl, desc));
                            }
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            let m = self.nn.as_ref().expect("pending implies a model");
            let mut state = m.lock();
            let batch = state.runtime.batch_size();
            for chunk_start in (0..pending.len()).step_by(batch) {
                let chunk = &pending[chunk_start..(chunk_start + batch).min(pending.len())];
                let mut rows: Vec<Vec<f32>> =
                    chunk.iter().map(|(_, _, d)| d.clone()).collect();
                if rows.len() < batch {
                    let pad = neutral_descriptor(&state, &chunk[0].1);
                    rows.resize(batch, pad);
                }
                if state.runtime.set_inputs(&rows).is_err() {
                    for entry in chunk {
                        results[entry.0] = CyclesError::InvalidOutputRange.as_cycles();
                    }
                    continue;
                }
                state.runtime.predict();
                for (j, (i, wl, desc)) in chunk.iter().enumerate() {
                    let raw = state.runtime.output_row(j)[0];
                    state.cache.add(DescriptorKey::from_floats(desc), raw);
                    results[*i] = post_process(raw, wl, state.post);
                }
            }
        }
        results
    }

    /// Cycle estimate for a DMA transfer. Bypasses the NN.
    pub fn dma(&self, wl: &DmaWorkload) -> CyclesInterfaceType {
        let report = self.sanitizer.check_dma(wl);
        if report.is_error() {
            return report.value();
        }
        dma_theoretical_cycles(wl)
    }

    /// Cycle estimate for a SHAVE kernel. Bypasses the NN.
    pub fn shave(&self, wl: &ShaveWorkload) -> CyclesInterfaceType {
        shave_theoretical_cycles(wl)
    }

    /// Full derived bundle for one workload, computed in one pass.
    pub fn dpu_info(&self, wl: &DpuWorkload) -> DpuInfo {
        let (cycles, report, sanitized) = self.price_dpu(wl.clone());
        if is_error(cycles) {
            return DpuInfo {
                dpu_cycles: cycles,
                error: CyclesError::from_cycles(cycles),
                info: report.info().to_string(),
                dense_macs: 0,
                sparse_macs: 0,
                power_ideal_cycles: 0,
                efficiency_ideal_cycles: 0,
                theoretical_cycles: 0,
                activity_factor: 0.0,
                mac_utilization: 0.0,
                energy: 0.0,
            };
        }

        let power_ideal = ideal_cycles_power(&sanitized);
        let efficiency_ideal = ideal_cycles_efficiency(&sanitized);
        let theoretical = theoretical_cycles(&sanitized);
        let utilization = ratio_clamped(efficiency_ideal, cycles);
        let af = ratio_clamped(power_ideal, cycles) * power_factor(&sanitized);
        DpuInfo {
            dpu_cycles: cycles,
            error: None,
            info: report.info().to_string(),
            dense_macs: dense_macs(&sanitized),
            sparse_macs: sparse_macs(&sanitized),
            power_ideal_cycles: power_ideal,
            efficiency_ideal_cycles: efficiency_ideal,
            theoretical_cycles: theoretical,
            activity_factor: af,
            mac_utilization: utilization,
            energy: af * cycles as f32,
        }
    }

    /// Activity factor alone. Zero for unusable workloads.
    pub fn dpu_activity_factor(&self, wl: &DpuWorkload) -> f32 {
        self.dpu_info(wl).activity_factor
    }

    /// Energy alone, in device-normalized units. Zero for unusable
    /// workloads.
    pub fn dpu_energy(&self, wl: &DpuWorkload) -> f32 {
        self.dpu_info(wl).energy
    }

    /// The shared pipeline: sanitize, then NN (with cache) or analytical.
    fn price_dpu(&self, mut wl: DpuWorkload) -> (CyclesInterfaceType, SanityReport, DpuWorkload) {
        let report = self.sanitizer.check_and_sanitize(&mut wl);
        if report.is_error() {
            return (report.value(), report, wl);
        }
        let cycles = match &self.nn {
            None => theoretical_cycles(&wl),
            Some(m) => {
                let mut state = m.lock();
                self.nn_cycles(&mut state, &wl)
                    .unwrap_or_else(|| theoretical_cycles(&wl))
            }
        };
        (cycles, report, wl)
    }

    /// NN estimate for a sanitized workload; `None` requests the
    /// analytical fallback.
    fn nn_cycles(&self, state: &mut NnState, wl: &DpuWorkload) -> Option<CyclesInterfaceType> {
        if let PostProcessing::Unknown(_) = state.post {
            return Some(CyclesError::InvalidOutputRange.as_cycles());
        }
        let desc = match state.preprocessor.encode(wl) {
            Ok(d) => d,
            Err(e) => {
                debug!(target: "vpucost::model", error = %e, "descriptor encoding failed, using analytical fallback");
                return None;
            }
        };
        let key = DescriptorKey::from_floats(&desc);
        let raw = if let Some(hit) = state.cache.get(&key) {
            hit
        } else {
            let batch = state.runtime.batch_size();
            let mut rows = vec![desc.clone()];
            if batch > 1 {
                rows.resize(batch, neutral_descriptor(state, wl));
            }
            if state.runtime.set_inputs(&rows).is_err() {
                return Some(CyclesError::InvalidOutputRange.as_cycles());
            }
            state.runtime.predict();
            let raw = state.runtime.output_row(0)[0];
            state.cache.add(key, raw);
            raw
        };
        Some(post_process(raw, wl, state.post))
    }
}

/// Descriptor used to right-pad partial batches. Falls back to the real
/// row when even the neutral workload cannot encode (the padded output is
/// discarded either way).
fn neutral_descriptor(state: &NnState, like: &DpuWorkload) -> Vec<f32> {
    let mut neutral = DpuWorkload::neutral(like.device);
    // The neutral workload is already canonical, but sanitize anyway so the
    // descriptor matches what a real query would produce.
    let _ = Sanitizer::new().check_and_sanitize(&mut neutral);
    state
        .preprocessor
        .encode(&neutral)
        .unwrap_or_else(|_| vec![0.0; state.preprocessor.descriptor_length()])
}

/// Raw NN output to cycles, per the model's output schema, with the final
/// range gate.
fn post_process(raw: f32, wl: &DpuWorkload, post: PostProcessing) -> CyclesInterfaceType {
    let invalid = CyclesError::InvalidOutputRange.as_cycles();
    let cycles = match post {
        PostProcessing::Cycles => cycles_from_f32(raw),
        PostProcessing::HwOverheadBounded => {
            if !(raw > 0.0 && raw <= 1.0) {
                return invalid;
            }
            cycles_from_f32(ideal_cycles_efficiency(wl) as f32 / raw)
        }
        PostProcessing::HwOverheadUnbounded => {
            if raw <= 0.0 || !raw.is_finite() {
                return invalid;
            }
            cycles_from_f32(ideal_cycles_efficiency(wl) as f32 / raw)
        }
        PostProcessing::Unknown(_) => return invalid,
    };
    if is_error(cycles) || !is_valid_cycles(cycles) {
        invalid
    } else {
        cycles
    }
}

fn ratio_clamped(numerator: u32, denominator: u32) -> f32 {
    if denominator == 0 {
        return 0.0;
    }
    (numerator as f64 / denominator as f64).clamp(0.0, 1.0) as f32
}
