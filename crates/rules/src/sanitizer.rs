//! Workload sanitation and validation.
//!
//! [`Sanitizer::check_and_sanitize`] first rewrites the workload into its
//! canonical form (one 8-bit integer class, one 16-bit float class, legacy
//! layouts replaced by their permutations), then runs the ordered device
//! checks. The first failing check decides the report; later checks never
//! run. Workload problems are never Rust errors: the result is always a
//! [`SanityReport`].
//!
//! Running the sanitizer twice on the same workload yields the same
//! workload and the same report.

use tracing::debug;

use crate::memory::{workload_memory, OutputAccounting};
use crate::registry::{DeviceRules, RuleLevel};
use vpucost_core::{
    CyclesError, DataType, DmaWorkload, DpuLayer, DpuWorkload, NamedEnum, Operation, SanityReport,
};

/// Stateless workload checker.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sanitizer;

impl Sanitizer {
    pub fn new() -> Self {
        Sanitizer
    }

    /// Canonicalize and validate a single-DPU workload against the strict
    /// rules.
    pub fn check_and_sanitize(&self, wl: &mut DpuWorkload) -> SanityReport {
        sanitize(wl);
        let rules = DeviceRules::workload(wl.device);
        let report = validate(wl, &rules);
        if report.is_error() {
            debug!(target: "vpucost::sanitize", code = %report, "workload rejected");
        }
        report
    }

    /// Canonicalize and validate a layer against the relaxed pre-tiling
    /// rules. Generic configuration failures are reported as layer
    /// configuration errors.
    pub fn check_layer(&self, layer: &mut DpuLayer) -> SanityReport {
        sanitize(layer);
        let rules = DeviceRules::layer(layer.device);
        let report = validate(layer, &rules);
        match report.code() {
            Some(CyclesError::InvalidInputConfiguration) => {
                SanityReport::error(CyclesError::InvalidLayerConfiguration, report.info())
            }
            _ => report,
        }
    }

    /// Validate a DMA transfer: matching element counts and per-device
    /// memory locations.
    pub fn check_dma(&self, wl: &DmaWorkload) -> SanityReport {
        let rules = DeviceRules::workload(wl.device);
        for location in [wl.input_location, wl.output_location] {
            if !rules.memory_location_valid(location) {
                return SanityReport::error(
                    CyclesError::InvalidInputConfiguration,
                    format!(
                        "memory location {} not available on {}",
                        location.name(),
                        wl.device.name()
                    ),
                );
            }
        }
        if wl.input.elements() != wl.output.elements() {
            return SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                format!(
                    "element count mismatch: {} in, {} out",
                    wl.input.elements(),
                    wl.output.elements()
                ),
            );
        }
        if wl.output_write_tiles == 0
            || !rules
                .output_write_tiles_range()
                .contains(&wl.output_write_tiles)
        {
            return SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                format!("output_write_tiles {} out of range", wl.output_write_tiles),
            );
        }
        SanityReport::ok()
    }
}

/// Rewrite a workload into canonical form. Idempotent.
fn sanitize(wl: &mut DpuWorkload) {
    for t in wl.inputs.iter_mut().chain(wl.outputs.iter_mut()) {
        let canonical_dtype = match t.dtype() {
            DataType::Uint8 => DataType::Int8,
            DataType::Bfloat16 => DataType::Float16,
            other => other,
        };
        // Same width by construction.
        *t = t
            .with_dtype(canonical_dtype)
            .expect("canonical dtype preserves width")
            .canonicalized();
    }
}

/// Ordered checks. First failure wins.
fn validate(wl: &DpuWorkload, rules: &DeviceRules) -> SanityReport {
    if !DeviceRules::supported_device_names().contains(&wl.device.name()) {
        return SanityReport::error(
            CyclesError::InvalidInputDevice,
            format!("device {} unknown", wl.device.name()),
        );
    }

    if !rules.operation_valid(wl.op) {
        return SanityReport::error(
            CyclesError::InvalidInputOperation,
            format!("{} not supported on {}", wl.op.name(), wl.device.name()),
        );
    }

    if wl.inputs.len() != wl.op.activation_inputs() || wl.outputs.len() != 1 {
        return SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!(
                "{} expects {} input tensor(s) and one output, got {}/{}",
                wl.op.name(),
                wl.op.activation_inputs(),
                wl.inputs.len(),
                wl.outputs.len()
            ),
        );
    }

    for t in wl.inputs.iter().chain(wl.outputs.iter()) {
        if !rules.datatype_valid(t.dtype()) {
            return SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                format!("datatype {} not valid", t.dtype().name()),
            );
        }
        if !rules.layout_valid(t.layout()) {
            return SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                format!("layout {} not valid", t.layout().name()),
            );
        }
    }

    for s in wl
        .input_swizzling
        .iter()
        .copied()
        .chain(std::iter::once(wl.output_swizzling))
    {
        if !rules.swizzling_valid(s) {
            return SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                format!("swizzling {} not valid", s.name()),
            );
        }
    }

    if rules.level() == RuleLevel::Workload && !rules.execution_mode_valid(wl.execution_mode) {
        return SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("execution mode {} not valid", wl.execution_mode.name()),
        );
    }

    if let Some(report) = check_channels(wl, rules) {
        return report;
    }
    if let Some(report) = check_geometry(wl, rules) {
        return report;
    }
    if let Some(report) = check_sparsity(wl, rules) {
        return report;
    }

    if !rules.isi_allowed(wl) {
        return SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("ISI strategy {} not permitted", wl.isi_strategy.name()),
        );
    }
    if wl.output_write_tiles == 0
        || !rules
            .output_write_tiles_range()
            .contains(&wl.output_write_tiles)
    {
        return SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("output_write_tiles {} out of range", wl.output_write_tiles),
        );
    }

    if rules.level() == RuleLevel::Workload {
        let usage = workload_memory(wl, rules, OutputAccounting::Separate);
        let cmx = rules.cmx_size_bytes() as u64;
        if usage.total_cmx_bytes() > cmx {
            return SanityReport::error(
                CyclesError::InputTooBig,
                format!("needs {} CMX bytes, device has {}", usage.total_cmx_bytes(), cmx),
            );
        }
    }

    SanityReport::ok()
}

fn check_channels(wl: &DpuWorkload, rules: &DeviceRules) -> Option<SanityReport> {
    let c_in = wl.input_channels();
    let c_out = wl.output_channels();

    if !rules.output_channels_range(wl.op).contains(&c_out) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("output channels {} out of range", c_out),
        ));
    }
    if !rules.input_channels_range(wl.op).contains(&c_in) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("input channels {} out of range for {}", c_in, wl.op.name()),
        ));
    }

    let alignment = rules.channel_alignment(wl.op);
    let needs_alignment = matches!(
        wl.op,
        Operation::Convolution | Operation::DwConvolution | Operation::Maxpool | Operation::Avepool
    );
    if needs_alignment && c_out % alignment != 0 {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("output channels {} not a multiple of {}", c_out, alignment),
        ));
    }

    if wl.op.is_channel_preserving() && c_in != c_out {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("{} must preserve channels ({} != {})", wl.op.name(), c_in, c_out),
        ));
    }
    None
}

fn check_geometry(wl: &DpuWorkload, rules: &DeviceRules) -> Option<SanityReport> {
    let kernel_range = rules.kernel_range(wl.op);
    if !kernel_range.contains(&wl.kernel.h) || !kernel_range.contains(&wl.kernel.w) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("kernel {}x{} out of range", wl.kernel.h, wl.kernel.w),
        ));
    }
    let stride_range = rules.stride_range(wl.op);
    if !stride_range.contains(&wl.stride.h) || !stride_range.contains(&wl.stride.w) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("stride {}x{} out of range", wl.stride.h, wl.stride.w),
        ));
    }
    let p = wl.padding;
    if p.top > rules.max_padding(wl.kernel.h)
        || p.bottom > rules.max_padding(wl.kernel.h)
        || p.left > rules.max_padding(wl.kernel.w)
        || p.right > rules.max_padding(wl.kernel.w)
    {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            "padding exceeds kernel extent",
        ));
    }

    if wl.op == Operation::Eltwise {
        let a = wl.input_0();
        let b = &wl.inputs[1];
        if a.shape() != b.shape() || a.dtype() != b.dtype() || a.layout() != b.layout() {
            return Some(SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                "eltwise inputs must match in shape, dtype and layout",
            ));
        }
        if p != vpucost_core::Padding::default() {
            return Some(SanityReport::error(
                CyclesError::InvalidInputConfiguration,
                "eltwise takes no padding",
            ));
        }
    }

    let out = wl.output_0();
    if out.x() != wl.expected_output_width() || out.y() != wl.expected_output_height() {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!(
                "output {}x{} inconsistent with expected {}x{}",
                out.x(),
                out.y(),
                wl.expected_output_width(),
                wl.expected_output_height()
            ),
        ));
    }
    if out.b() != wl.input_0().b() {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            "batch must be preserved",
        ));
    }
    None
}

fn check_sparsity(wl: &DpuWorkload, rules: &DeviceRules) -> Option<SanityReport> {
    if !(0.0..=1.0).contains(&wl.act_sparsity) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("activation sparsity {} outside [0,1]", wl.act_sparsity),
        ));
    }
    if wl.act_sparsity > 0.0 && !rules.activation_sparsity_allowed(wl.op) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!(
                "activation sparsity not available for {} on {}",
                wl.op.name(),
                wl.device.name()
            ),
        ));
    }
    if !(0.0..=1.0).contains(&wl.weight_sparsity) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!("weight sparsity {} outside [0,1]", wl.weight_sparsity),
        ));
    }
    if !wl.weight_sparsity_enabled && wl.weight_sparsity != 0.0 {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            "weight sparsity value set while disabled",
        ));
    }
    if wl.weight_sparsity_enabled && !rules.weight_sparsity_allowed(wl.op) {
        return Some(SanityReport::error(
            CyclesError::InvalidInputConfiguration,
            format!(
                "weight sparsity not available for {} on {}",
                wl.op.name(),
                wl.device.name()
            ),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpucost_core::{
        DataType, Dim2, ExecutionMode, Layout, MemoryLocation, Padding, VpuDevice, VpuTensor,
    };

    fn tensor(shape: [u32; 4], dtype: DataType) -> VpuTensor {
        VpuTensor::dense(shape, dtype, Layout::Zmajor).unwrap()
    }

    /// The reference valid workload: 3x3 stride-1 CONV, 56x56x64 uint8.
    fn conv_3x3() -> DpuWorkload {
        let mut wl = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Convolution,
            vec![tensor([56, 56, 64, 1], DataType::Uint8)],
            tensor([56, 56, 64, 1], DataType::Uint8),
        );
        wl.kernel = Dim2::square(3);
        wl.padding = Padding {
            top: 1,
            bottom: 1,
            left: 1,
            right: 1,
        };
        wl.execution_mode = ExecutionMode::Cuboid16x16;
        wl
    }

    #[test]
    fn reference_conv_passes() {
        let mut wl = conv_3x3();
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert!(report.is_usable(), "{}", report);
        // Canonical dtypes after sanitation.
        assert_eq!(wl.input_0().dtype(), DataType::Int8);
        assert_eq!(wl.input_0().layout(), Layout::Zxy);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let mut once = conv_3x3();
        let s = Sanitizer::new();
        let r1 = s.check_and_sanitize(&mut once);
        let mut twice = once.clone();
        let r2 = s.check_and_sanitize(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(r1, r2);
    }

    #[test]
    fn cm_convolution_rejected_on_2_0() {
        let mut wl = conv_3x3();
        wl.device = VpuDevice::Vpu2_0;
        wl.op = Operation::CmConvolution;
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert_eq!(report.code(), Some(CyclesError::InvalidInputOperation));
    }

    #[test]
    fn unaligned_channels_rejected() {
        let mut wl = conv_3x3();
        wl.outputs[0] = tensor([56, 56, 60, 1], DataType::Uint8);
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert_eq!(report.code(), Some(CyclesError::InvalidInputConfiguration));
    }

    #[test]
    fn cmx_overflow_reports_input_too_big() {
        let mut wl = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Maxpool,
            vec![tensor([1024, 1024, 1024, 1], DataType::Uint8)],
            tensor([1024, 1024, 1024, 1], DataType::Uint8),
        );
        wl.kernel = Dim2::square(1);
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert_eq!(report.code(), Some(CyclesError::InputTooBig));
    }

    #[test]
    fn cmx_boundary_is_inclusive() {
        // MAXPOOL 1x1: input + output + overhead. Shapes chosen so the
        // footprint lands exactly on the 2 MiB CMX size.
        let t = tensor([127, 128, 64, 1], DataType::Uint8);
        let mut wl = DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Maxpool, vec![t], t);
        wl.kernel = Dim2::square(1);

        let rules = DeviceRules::workload(VpuDevice::Vpu2_7);
        let usage = workload_memory(&wl, &rules, OutputAccounting::Separate);
        assert_eq!(usage.total_cmx_bytes(), 2 * 1024 * 1024);

        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert!(report.is_usable(), "{}", report);

        // One more row of input pushes it over.
        let bigger = tensor([127, 129, 64, 1], DataType::Uint8);
        let mut over = DpuWorkload::with_tensors(
            VpuDevice::Vpu2_7,
            Operation::Maxpool,
            vec![bigger],
            bigger,
        );
        over.kernel = Dim2::square(1);
        let report = Sanitizer::new().check_and_sanitize(&mut over);
        assert_eq!(report.code(), Some(CyclesError::InputTooBig));
    }

    #[test]
    fn eltwise_requires_matching_inputs() {
        let a = tensor([128, 128, 16, 1], DataType::Float16);
        let b = tensor([128, 128, 16, 1], DataType::Uint8);
        let mut wl =
            DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Eltwise, vec![a, b], a);
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        // Uint8 vs Float16 differ even after canonicalization.
        assert_eq!(report.code(), Some(CyclesError::InvalidInputConfiguration));
    }

    #[test]
    fn eltwise_uint8_and_int8_unify_under_sanitation() {
        let a = tensor([128, 128, 16, 1], DataType::Uint8);
        let b = tensor([128, 128, 16, 1], DataType::Int8);
        let mut wl =
            DpuWorkload::with_tensors(VpuDevice::Vpu2_7, Operation::Eltwise, vec![a, b], a);
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert!(report.is_usable(), "{}", report);
    }

    #[test]
    fn disabled_weight_sparsity_must_be_zero() {
        let mut wl = conv_3x3();
        wl.weight_sparsity = 0.3;
        wl.weight_sparsity_enabled = false;
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert_eq!(report.code(), Some(CyclesError::InvalidInputConfiguration));
    }

    #[test]
    fn depthwise_must_preserve_channels() {
        let mut wl = conv_3x3();
        wl.op = Operation::DwConvolution;
        wl.outputs[0] = tensor([56, 56, 32, 1], DataType::Uint8);
        let report = Sanitizer::new().check_and_sanitize(&mut wl);
        assert_eq!(report.code(), Some(CyclesError::InvalidInputConfiguration));
    }

    #[test]
    fn layer_level_relaxes_alignment() {
        let mut wl = conv_3x3();
        wl.inputs[0] = tensor([56, 17, 60, 1], DataType::Uint8);
        wl.outputs[0] = tensor([56, 17, 60, 1], DataType::Uint8);
        // Unaligned channels and odd height: invalid as a workload...
        let as_workload = Sanitizer::new().check_and_sanitize(&mut wl.clone());
        assert!(as_workload.is_error());
        // ...but fine as a layer.
        let mut layer = DpuLayer::new(wl);
        let report = Sanitizer::new().check_layer(&mut layer);
        assert!(report.is_usable(), "{}", report);
    }

    #[test]
    fn layer_errors_use_layer_code() {
        let mut wl = conv_3x3();
        wl.stride = Dim2::square(20);
        let mut layer = DpuLayer::new(wl);
        let report = Sanitizer::new().check_layer(&mut layer);
        assert_eq!(report.code(), Some(CyclesError::InvalidLayerConfiguration));
    }

    #[test]
    fn dma_location_rules_per_device() {
        let t = tensor([64, 64, 16, 1], DataType::Uint8);
        let wl = DmaWorkload::new(
            VpuDevice::Vpu4_0,
            t,
            t,
            MemoryLocation::Csram,
            MemoryLocation::Cmx,
        );
        let report = Sanitizer::new().check_dma(&wl);
        assert_eq!(report.code(), Some(CyclesError::InvalidInputConfiguration));

        let ok = DmaWorkload::new(
            VpuDevice::Vpu2_7,
            t,
            t,
            MemoryLocation::Dram,
            MemoryLocation::Cmx,
        );
        assert!(Sanitizer::new().check_dma(&ok).is_usable());
    }

    #[test]
    fn dma_element_counts_must_match() {
        let a = tensor([64, 64, 16, 1], DataType::Uint8);
        let b = tensor([64, 64, 8, 1], DataType::Uint8);
        let wl = DmaWorkload::new(
            VpuDevice::Vpu2_7,
            a,
            b,
            MemoryLocation::Dram,
            MemoryLocation::Cmx,
        );
        let report = Sanitizer::new().check_dma(&wl);
        assert!(report.is_error());
    }
}
