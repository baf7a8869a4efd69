//! Error-banded cycle counts.
//!
//! Cost results travel as plain `u32` cycle counts. The top of the range is
//! reserved for error codes so that invalid workloads never need a separate
//! result channel: callers test [`is_error`] before treating a value as a
//! duration. Error codes sit at `u32::MAX` downward; everything at or above
//! [`ERROR_THRESHOLD`] is an error.

use serde::{Deserialize, Serialize};

/// Cycle count or error code.
pub type CyclesInterfaceType = u32;

/// Values at or above this are error codes, not cycle counts.
pub const ERROR_THRESHOLD: CyclesInterfaceType = u32::MAX - 1024;

/// Largest value the NN path may legally produce. Anything at or above this
/// is mapped to [`CyclesError::InvalidOutputRange`].
pub const MAX_VALID_CYCLES: CyclesInterfaceType = 2_000_000_000;

/// The fixed error taxonomy. Discriminants are the wire values carried in
/// cycle results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum CyclesError {
    /// Workload does not fit in CMX.
    InputTooBig = u32::MAX,
    /// Unknown or unsupported device.
    InvalidInputDevice = u32::MAX - 1,
    /// Operation not supported on the device.
    InvalidInputOperation = u32::MAX - 2,
    /// Workload fields violate the device rules.
    InvalidInputConfiguration = u32::MAX - 3,
    /// NN produced a value outside the representable cycle band.
    InvalidOutputRange = u32::MAX - 4,
    /// Layer fails the relaxed pre-tiling rules.
    InvalidLayerConfiguration = u32::MAX - 5,
    /// No valid intra-tile split exists.
    TileOutput = u32::MAX - 6,
    /// Saturating addition overflowed into the error band.
    SumTooLarge = u32::MAX - 7,
    /// Negative or non-finite source value in a float conversion.
    InvalidConversionToCycles = u32::MAX - 8,
}

impl CyclesError {
    /// The wire value of this code.
    pub fn as_cycles(self) -> CyclesInterfaceType {
        self as u32
    }

    /// Decode a wire value back into a code. `None` for cycle counts and
    /// for reserved-but-unassigned values.
    pub fn from_cycles(value: CyclesInterfaceType) -> Option<Self> {
        match value {
            v if v == CyclesError::InputTooBig as u32 => Some(CyclesError::InputTooBig),
            v if v == CyclesError::InvalidInputDevice as u32 => Some(CyclesError::InvalidInputDevice),
            v if v == CyclesError::InvalidInputOperation as u32 => {
                Some(CyclesError::InvalidInputOperation)
            }
            v if v == CyclesError::InvalidInputConfiguration as u32 => {
                Some(CyclesError::InvalidInputConfiguration)
            }
            v if v == CyclesError::InvalidOutputRange as u32 => Some(CyclesError::InvalidOutputRange),
            v if v == CyclesError::InvalidLayerConfiguration as u32 => {
                Some(CyclesError::InvalidLayerConfiguration)
            }
            v if v == CyclesError::TileOutput as u32 => Some(CyclesError::TileOutput),
            v if v == CyclesError::SumTooLarge as u32 => Some(CyclesError::SumTooLarge),
            v if v == CyclesError::InvalidConversionToCycles as u32 => {
                Some(CyclesError::InvalidConversionToCycles)
            }
            _ => None,
        }
    }

    /// Canonical name, matching the taxonomy in the public documentation.
    pub fn name(&self) -> &'static str {
        match self {
            CyclesError::InputTooBig => "ERROR_INPUT_TOO_BIG",
            CyclesError::InvalidInputDevice => "ERROR_INVALID_INPUT_DEVICE",
            CyclesError::InvalidInputOperation => "ERROR_INVALID_INPUT_OPERATION",
            CyclesError::InvalidInputConfiguration => "ERROR_INVALID_INPUT_CONFIGURATION",
            CyclesError::InvalidOutputRange => "ERROR_INVALID_OUTPUT_RANGE",
            CyclesError::InvalidLayerConfiguration => "ERROR_INVALID_LAYER_CONFIGURATION",
            CyclesError::TileOutput => "ERROR_TILE_OUTPUT",
            CyclesError::SumTooLarge => "ERROR_SUM_TOO_LARGE",
            CyclesError::InvalidConversionToCycles => "ERROR_INVALID_CONVERSION_TO_CYCLES",
        }
    }
}

impl std::fmt::Display for CyclesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a cycle value encodes an error.
pub fn is_error(value: CyclesInterfaceType) -> bool {
    value >= ERROR_THRESHOLD
}

/// Whether a cycle value is a usable duration for the NN output band.
pub fn is_valid_cycles(value: CyclesInterfaceType) -> bool {
    value > 0 && value < MAX_VALID_CYCLES
}

/// Saturating error-preserving addition.
///
/// An error operand wins (left first); a sum that reaches the error band
/// collapses to [`CyclesError::SumTooLarge`].
pub fn cost_adder(a: CyclesInterfaceType, b: CyclesInterfaceType) -> CyclesInterfaceType {
    if is_error(a) {
        return a;
    }
    if is_error(b) {
        return b;
    }
    match a.checked_add(b) {
        Some(sum) if !is_error(sum) => sum,
        _ => CyclesError::SumTooLarge.as_cycles(),
    }
}

/// Convert a float cycle estimate to the wire type.
///
/// Negative, NaN and infinite sources, and values that would land in the
/// error band, become [`CyclesError::InvalidConversionToCycles`].
pub fn cycles_from_f32(value: f32) -> CyclesInterfaceType {
    if !value.is_finite() || value < 0.0 {
        return CyclesError::InvalidConversionToCycles.as_cycles();
    }
    let rounded = value.round();
    if rounded >= ERROR_THRESHOLD as f32 {
        return CyclesError::InvalidConversionToCycles.as_cycles();
    }
    rounded as CyclesInterfaceType
}
