//! Construction-time errors of the inference stack.
//!
//! These are the only errors the engine ever raises as Rust errors; after a
//! model is loaded, workload problems surface as report codes, never as
//! `Err`.

use thiserror::Error;

/// Flat-model parsing and shape-chaining failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("bad magic: expected \"VPUN\"")]
    BadMagic,
    #[error("model buffer truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("unknown layer kind {kind}")]
    UnknownLayerKind { kind: u32 },
    #[error("model has no layers")]
    Empty,
    #[error("{layer} layer expects {expected} input columns, got {got}")]
    ShapeMismatch {
        layer: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid kNN head: {refs} references, {targets} targets, k={k}")]
    BadKnnHead { refs: usize, targets: usize, k: u32 },
    #[error("embedded name is not valid UTF-8")]
    BadName,
    #[error("declared size {declared} exceeds sane limit")]
    Oversized { declared: u64 },
}

/// Descriptor-encoding failures: a workload field has no representation in
/// the schema the loaded model was trained with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("name {name} absent from {table} table of schema v{schema}")]
    NameAbsent {
        name: &'static str,
        table: &'static str,
        schema: u32,
    },
    #[error("input interface version {0} has no preprocessor")]
    UnknownInterface(u32),
}
