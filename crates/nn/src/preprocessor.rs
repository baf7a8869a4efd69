//! Descriptor encoders.
//!
//! A descriptor is the fixed-length f32 vector the estimator consumes.
//! Three schemas co-exist; the factory picks one from the model's input
//! interface version. Every encoder is a pure function of the sanitized
//! workload: identical workloads produce bit-identical descriptors, which
//! is what makes descriptors usable as cache keys.
//!
//! The two legacy-facing rules: one-hot blocks use the *schema's own*
//! cardinalities, and categorical values resolve through the frozen name
//! tables: a name the old schema never knew is an encoding error, not a
//! silent zero.

use vpucost_core::{legacy, DpuWorkload, Layout, NamedEnum};

use crate::error::EncodeError;

/// Fixed descriptor length of the v01 and v10 schemas.
const LEN_V01: usize = 71;
const LEN_V10: usize = 71;
/// Fixed descriptor length of the v11 schema.
const LEN_V11: usize = 125;

/// Sparsity ratios are quantized to 1/256 steps so equal workloads meet as
/// equal bit patterns.
fn quantize_ratio(v: f32) -> f32 {
    (v * 256.0).round() / 256.0
}

/// One descriptor schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preprocessor {
    V01,
    V10,
    V11,
}

impl Preprocessor {
    /// Factory keyed by the model's input interface version.
    pub fn for_interface(input_version: u32) -> Result<Self, EncodeError> {
        match input_version {
            1 => Ok(Preprocessor::V01),
            10 => Ok(Preprocessor::V10),
            11 => Ok(Preprocessor::V11),
            other => Err(EncodeError::UnknownInterface(other)),
        }
    }

    pub fn interface_version(&self) -> u32 {
        match self {
            Preprocessor::V01 => 1,
            Preprocessor::V10 => 10,
            Preprocessor::V11 => 11,
        }
    }

    /// Length of every descriptor this schema produces.
    pub fn descriptor_length(&self) -> usize {
        match self {
            Preprocessor::V01 => LEN_V01,
            Preprocessor::V10 => LEN_V10,
            Preprocessor::V11 => LEN_V11,
        }
    }

    /// Encode a sanitized workload.
    pub fn encode(&self, wl: &DpuWorkload) -> Result<Vec<f32>, EncodeError> {
        let mut out = Vec::with_capacity(self.descriptor_length());
        match self {
            Preprocessor::V01 => encode_v01(wl, &mut out)?,
            Preprocessor::V10 => encode_v10(wl, &mut out)?,
            Preprocessor::V11 => encode_v11(wl, &mut out)?,
        }
        debug_assert!(out.len() <= self.descriptor_length());
        out.resize(self.descriptor_length(), 0.0);
        Ok(out)
    }
}

fn one_hot(out: &mut Vec<f32>, cardinality: usize, index: usize) {
    debug_assert!(index < cardinality);
    for i in 0..cardinality {
        out.push(if i == index { 1.0 } else { 0.0 });
    }
}

/// One-hot through a frozen table, failing when the name is absent.
fn legacy_one_hot(
    out: &mut Vec<f32>,
    table: legacy::Table,
    name: &'static str,
    table_name: &'static str,
    schema: u32,
) -> Result<(), EncodeError> {
    let code = legacy::code(table, name).ok_or(EncodeError::NameAbsent {
        name,
        table: table_name,
        schema,
    })?;
    one_hot(out, legacy::cardinality(table), code as usize);
    Ok(())
}

/// One-hot through the modern enum's own declaration order.
fn modern_one_hot<E: NamedEnum>(out: &mut Vec<f32>, value: E) {
    one_hot(out, E::COUNT, value.index());
}

/// The legacy spelling of a canonical layout, for v01 lookups.
fn legacy_layout_name(layout: Layout) -> &'static str {
    match layout.canonical() {
        Layout::Zxy => "ZMAJOR",
        Layout::Xyz => "CMAJOR",
        other => other.name(),
    }
}

/// Spatial, kernel, stride, pad and sparsity scalars shared by every
/// schema, in fixed order.
fn push_scalars(wl: &DpuWorkload, out: &mut Vec<f32>) {
    let input = wl.input_0();
    let output = wl.output_0();
    out.extend_from_slice(&[
        input.x() as f32,
        input.y() as f32,
        input.z() as f32,
        output.x() as f32,
        output.y() as f32,
        output.z() as f32,
        wl.kernel.h as f32,
        wl.kernel.w as f32,
        wl.stride.h as f32,
        wl.stride.w as f32,
        wl.padding.top as f32,
        wl.padding.bottom as f32,
        wl.padding.left as f32,
        wl.padding.right as f32,
        quantize_ratio(wl.act_sparsity),
    ]);
}

fn encode_v01(wl: &DpuWorkload, out: &mut Vec<f32>) -> Result<(), EncodeError> {
    const V: u32 = 1;
    legacy_one_hot(out, legacy::v01::DEVICE, wl.device.name(), "device", V)?;
    legacy_one_hot(out, legacy::v01::OPERATION, wl.op.name(), "operation", V)?;
    legacy_one_hot(
        out,
        legacy::v01::DATATYPE,
        wl.input_0().dtype().name(),
        "datatype",
        V,
    )?;
    legacy_one_hot(
        out,
        legacy::v01::DATATYPE,
        wl.output_0().dtype().name(),
        "datatype",
        V,
    )?;
    legacy_one_hot(
        out,
        legacy::v01::EXECUTION_MODE,
        wl.execution_mode.name(),
        "execution_mode",
        V,
    )?;
    legacy_one_hot(
        out,
        legacy::v01::ACTIVATION,
        wl.activation.name(),
        "activation",
        V,
    )?;
    legacy_one_hot(
        out,
        legacy::v01::LAYOUT,
        legacy_layout_name(wl.input_0().layout()),
        "layout",
        V,
    )?;
    legacy_one_hot(
        out,
        legacy::v01::LAYOUT,
        legacy_layout_name(wl.output_0().layout()),
        "layout",
        V,
    )?;
    push_scalars(wl, out);
    Ok(())
}

fn encode_v10(wl: &DpuWorkload, out: &mut Vec<f32>) -> Result<(), EncodeError> {
    modern_one_hot(out, wl.device);
    modern_one_hot(out, wl.op);
    modern_one_hot(out, wl.input_0().dtype());
    modern_one_hot(out, wl.output_0().dtype());
    modern_one_hot(out, wl.execution_mode);
    modern_one_hot(out, wl.activation);
    modern_one_hot(out, wl.input_0().layout());
    modern_one_hot(out, wl.output_0().layout());
    push_scalars(wl, out);
    Ok(())
}

fn encode_v11(wl: &DpuWorkload, out: &mut Vec<f32>) -> Result<(), EncodeError> {
    encode_v10(wl, out)?;
    modern_one_hot(out, wl.isi_strategy);
    out.push(wl.output_write_tiles as f32);
    out.push(quantize_ratio(wl.weight_sparsity));
    out.push(if wl.weight_sparsity_enabled { 1.0 } else { 0.0 });
    modern_one_hot(out, wl.input_swizzling[0]);
    modern_one_hot(out, wl.input_swizzling[1]);
    modern_one_hot(out, wl.output_swizzling);
    Ok(())
}
