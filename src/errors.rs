//! Error and warning types shared by every module in the crate.
//!
//! The seven error kinds below mirror the contract a caller needs regardless
//! of which entropy parser variant or marker is involved: malformed/truncated
//! input, coder resync loss, API misuse, and resource limits.
use std::collections::VecDeque;

use thiserror::Error;

/// Bound on the number of [`Warning`]s retained per scan/frame.
///
/// Warnings are a diagnostic channel on the object that produced them, never
/// a global sink (see the "Global warning/throw channel" design note).
pub const MAX_WARNINGS: usize = 64;

/// Every fallible operation in the crate returns this.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A marker's payload violates its declared length or field constraints.
    #[error("malformed stream: {0}")]
    MalformedStream(String),
    /// The byte stream ended inside a marker or entropy-coded segment.
    #[error("unexpected end of stream: {0}")]
    UnexpectedEof(String),
    /// The entropy coder lost restart alignment.
    #[error("entropy coder out of sync: {0}")]
    OutOfSync(String),
    /// A parameter combination the standard rejects.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Encoder API misuse: installing something that is already there.
    #[error("object already exists: {0}")]
    ObjectExists(String),
    /// Encoder API misuse: referencing something that was never installed.
    #[error("object does not exist: {0}")]
    ObjectDoesntExist(String),
    /// A size limit was exceeded.
    #[error("overflow: {0}")]
    Overflow(String),
    /// An optional feature this build does not implement.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::UnexpectedEof(e.to_string())
    }
}

/// Non-fatal diagnostics raised while parsing a well-formed-enough stream.
///
/// Kept as a bounded ring on the parser/frame object that produced them
/// rather than thrown, so decoding can proceed past recoverable trouble
/// (spec.md §7 "Propagation").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A marker byte the parser does not recognise; its segment was skipped.
    StrayMarker(u8),
    /// More than the expected number of 0xFF fill bytes preceded a marker.
    OverlongFill(usize),
    /// A restart interval was abandoned and resumed at the next RSTn.
    RestartResync { expected: u8, found: u8 },
    /// DNL was observed somewhere other than immediately when expected.
    UnexpectedDnl,
}

/// A bounded FIFO of [`Warning`]s.
#[derive(Debug, Default, Clone)]
pub struct WarningSink {
    warnings: VecDeque<Warning>,
}

impl WarningSink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            warnings: VecDeque::with_capacity(8),
        }
    }

    pub fn push(&mut self, warning: Warning) {
        if self.warnings.len() >= MAX_WARNINGS {
            self.warnings.pop_front();
        }
        self.warnings.push_back(warning);
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
