//! Validation outcome reporting.

use serde::{Deserialize, Serialize};

use crate::cycles::{self, CyclesError, CyclesInterfaceType};

/// Outcome of validating one workload or layer.
///
/// Exactly one code per report: `0` means usable, anything in the error
/// band identifies the first failed check. The text is informational only;
/// error identity is carried by the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanityReport {
    value: CyclesInterfaceType,
    info: String,
}

impl Default for SanityReport {
    fn default() -> Self {
        Self::ok()
    }
}

impl SanityReport {
    /// A passing report.
    pub fn ok() -> Self {
        SanityReport {
            value: 0,
            info: String::new(),
        }
    }

    /// A failing report with the given code and diagnostics text.
    pub fn error(code: CyclesError, info: impl Into<String>) -> Self {
        SanityReport {
            value: code.as_cycles(),
            info: info.into(),
        }
    }

    /// Whether the validated object may be priced.
    pub fn is_usable(&self) -> bool {
        !cycles::is_error(self.value)
    }

    /// Whether a hard failure was recorded.
    pub fn is_error(&self) -> bool {
        cycles::is_error(self.value)
    }

    /// The raw code value (`0` when usable).
    pub fn value(&self) -> CyclesInterfaceType {
        self.value
    }

    /// The decoded error code, if any.
    pub fn code(&self) -> Option<CyclesError> {
        CyclesError::from_cycles(self.value)
    }

    /// Human-readable diagnostics.
    pub fn info(&self) -> &str {
        &self.info
    }
}

impl std::fmt::Display for SanityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{}: {}", code, self.info),
            None => f.write_str("NO_ERROR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_report_is_usable() {
        let r = SanityReport::ok();
        assert!(r.is_usable());
        assert!(!r.is_error());
        assert_eq!(r.value(), 0);
        assert_eq!(r.code(), None);
        assert_eq!(r.to_string(), "NO_ERROR");
    }

    #[test]
    fn error_report_carries_code_and_text() {
        let r = SanityReport::error(CyclesError::InputTooBig, "needs 3 MiB, CMX is 2 MiB");
        assert!(!r.is_usable());
        assert_eq!(r.code(), Some(CyclesError::InputTooBig));
        assert_eq!(r.value(), CyclesError::InputTooBig.as_cycles());
        assert!(r.to_string().contains("ERROR_INPUT_TOO_BIG"));
    }

    #[test]
    fn serde_round_trip() {
        let r = SanityReport::error(CyclesError::TileOutput, "no split covers 7 rows");
        let json = serde_json::to_string(&r).unwrap();
        let back: SanityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
