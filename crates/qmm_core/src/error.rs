//! Error taxonomy (§7): `thiserror`-based fatal errors that propagate as `Result`, and
//! non-fatal input warnings that flow through an injected [`WarningSink`] instead.

use crate::geometry::Shape;
use thiserror::Error;

/// Fatal errors raised by the multiply driver (§4.7, §7). All are terminal: the driver
/// recovers nothing locally and the multiply produces no result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MultiplyError {
    #[error("dimension mismatch: a.ncols={a_cols} != b.nrows={b_rows}")]
    DimensionMismatch { a_cols: i64, b_rows: i64 },

    #[error("destination shape {shape:?} has a non-positive dimension")]
    NonPositiveShape { shape: Shape },

    #[error("future (pending-subtree) node encountered; not supported by multiplication")]
    FutureNodeEncountered,

    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

/// A single non-fatal input problem (e.g. an out-of-range Matrix Market index). Carries
/// enough context for a caller-supplied sink to report it meaningfully.
#[derive(Debug, Clone, PartialEq)]
pub struct InputWarning {
    pub message: String,
}

impl InputWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Injected collaborator that receives non-fatal warnings without affecting control flow.
pub trait WarningSink {
    fn warn(&mut self, warning: InputWarning);
}

/// Discards every warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreWarnings;

impl WarningSink for IgnoreWarnings {
    fn warn(&mut self, _warning: InputWarning) {}
}

/// Collects warnings in arrival order, for callers that want to inspect or count them.
#[derive(Debug, Default, Clone)]
pub struct CollectWarnings {
    pub warnings: Vec<InputWarning>,
}

impl WarningSink for CollectWarnings {
    fn warn(&mut self, warning: InputWarning) {
        self.warnings.push(warning);
    }
}

impl<F: FnMut(InputWarning)> WarningSink for F {
    fn warn(&mut self, warning: InputWarning) {
        self(warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_sink_preserves_order() {
        let mut sink = CollectWarnings::default();
        sink.warn(InputWarning::new("first"));
        sink.warn(InputWarning::new("second"));
        assert_eq!(sink.warnings.len(), 2);
        assert_eq!(sink.warnings[0].message, "first");
    }

    #[test]
    fn ignore_sink_drops_everything() {
        let mut sink = IgnoreWarnings;
        sink.warn(InputWarning::new("whatever"));
    }
}
