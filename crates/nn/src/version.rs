//! Model-version triple parsing.
//!
//! The trained model embeds a name of the form `"<arch>-<VI>-<VO>"`. The
//! architecture is free-form, `<VI>` selects the descriptor schema and
//! `<VO>` selects how the raw output becomes cycles. Missing or empty
//! segments take defaults; trailing extra segments are ignored.

use serde::{Deserialize, Serialize};

/// Default interface version when a segment is missing or unreadable.
const DEFAULT_VERSION: u32 = 1;

/// Parsed model identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub arch: String,
    pub input_version: u32,
    pub output_version: u32,
}

impl ModelVersion {
    /// Parse an embedded name. Never fails: absent pieces default
    /// (`arch` -> "none", versions -> 1).
    pub fn parse(name: &str) -> Self {
        let mut parts = name.split('-');
        let arch = match parts.next() {
            Some("") | None => "none".to_string(),
            Some(a) => a.to_string(),
        };
        let input_version = parts
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_VERSION);
        let output_version = parts
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_VERSION);
        ModelVersion {
            arch,
            input_version,
            output_version,
        }
    }

    /// The post-processor this model's output requires.
    pub fn post_processing(&self) -> PostProcessing {
        PostProcessing::from_output_version(self.output_version)
    }
}

/// How a raw NN output becomes a cycle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostProcessing {
    /// Raw output is cycles.
    Cycles,
    /// Raw output is an overhead factor in `(0, 1]`;
    /// `cycles = ideal / raw`.
    HwOverheadBounded,
    /// Same formula, unbounded positive factor.
    HwOverheadUnbounded,
    /// Output schema this engine does not understand: every query against
    /// the model reports an invalid output range.
    Unknown(u32),
}

impl PostProcessing {
    pub fn from_output_version(vo: u32) -> Self {
        match vo {
            1 => PostProcessing::Cycles,
            2 => PostProcessing::HwOverheadBounded,
            3 => PostProcessing::HwOverheadUnbounded,
            other => PostProcessing::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_triple() {
        let v = ModelVersion::parse("vpu27-11-2");
        assert_eq!(v.arch, "vpu27");
        assert_eq!(v.input_version, 11);
        assert_eq!(v.output_version, 2);
        assert_eq!(v.post_processing(), PostProcessing::HwOverheadBounded);
    }

    #[test]
    fn missing_segments_default() {
        let v = ModelVersion::parse("vpu27");
        assert_eq!(v.input_version, 1);
        assert_eq!(v.output_version, 1);
        assert_eq!(v.post_processing(), PostProcessing::Cycles);

        let v = ModelVersion::parse("");
        assert_eq!(v.arch, "none");
        assert_eq!(v.input_version, 1);
    }

    #[test]
    fn trailing_segments_ignored() {
        let v = ModelVersion::parse("vpu-10-3-trained-on-tuesday");
        assert_eq!(v.arch, "vpu");
        assert_eq!(v.input_version, 10);
        assert_eq!(v.output_version, 3);
        assert_eq!(v.post_processing(), PostProcessing::HwOverheadUnbounded);
    }

    #[test]
    fn unknown_output_version_is_preserved() {
        let v = ModelVersion::parse("x-11-9");
        assert_eq!(v.post_processing(), PostProcessing::Unknown(9));
    }

    #[test]
    fn unreadable_version_falls_back() {
        let v = ModelVersion::parse("arch-abc-1");
        assert_eq!(v.input_version, 1);
    }
}
