//! The entropy-parser family (spec.md §4.2, §4.3): one concrete type per
//! scan kind, dispatched through the [`ParserKind`] sum type rather than a
//! trait object, since each variant's bit-I/O backend (Huffman bitstream,
//! QM coder, JPEG-LS bit-stuffed stream) differs (spec.md §9 "Polymorphic
//! scan engines").
pub mod hidden;
pub mod jpegls;
pub mod lossless;
pub mod prog_arith;
pub mod prog_huffman;
pub mod seq_arith;
pub mod seq_huffman;

use crate::errors::{CodecError, Warning, WarningSink};
use crate::markers::Marker;

/// Shared restart-interval bookkeeping (spec.md §4.2 "Restart-interval
/// handling (shared base)"): every variant embeds one of these rather than
/// re-deriving the resync policy.
#[derive(Debug, Clone)]
pub struct RestartState {
    pub interval: u32,
    pub mcus_to_go: u32,
    pub next_rst: u8,
}

impl RestartState {
    #[must_use]
    pub fn new(interval: u32) -> Self {
        RestartState {
            interval,
            mcus_to_go: interval,
            next_rst: 0,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.interval != 0
    }

    /// Called after consuming/producing one MCU. Returns `true` if a
    /// restart marker is now due.
    pub fn tick(&mut self) -> bool {
        if !self.enabled() {
            return false;
        }
        self.mcus_to_go -= 1;
        self.mcus_to_go == 0
    }

    pub fn reset(&mut self) {
        self.mcus_to_go = self.interval;
        self.next_rst = (self.next_rst + 1) % 8;
    }

    /// Resync policy on read (spec.md §4.2): given the marker actually
    /// found at the expected restart boundary, decide whether to accept it,
    /// skip a fill word, or declare the interval unrecoverable.
    pub fn classify_found_marker(&self, found: Option<Marker>) -> ResyncOutcome {
        match found {
            Some(Marker::RST(n)) if n == self.next_rst => ResyncOutcome::Accept,
            Some(Marker::RST(n)) => {
                let ahead = (u8::from(n) as i16 - i16::from(self.next_rst)).rem_euclid(8);
                if ahead >= 4 {
                    ResyncOutcome::Abandon
                } else {
                    ResyncOutcome::SkipForward
                }
            }
            Some(_) => ResyncOutcome::EndScan,
            None => ResyncOutcome::NeedMoreData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncOutcome {
    Accept,
    SkipForward,
    Abandon,
    EndScan,
    NeedMoreData,
}

/// Record a resync event as a warning rather than aborting, per spec.md §7
/// "Propagation": "a frame with any out-of-sync interval completes but is
/// marked with a warning".
pub fn warn_resync(sink: &mut WarningSink, expected: u8, found: u8) {
    sink.push(Warning::RestartResync { expected, found });
}

/// The thirteen standard process parsers plus the JPEG-LS and hidden
/// side-channel wrappers (spec.md §4.3), selected once per scan start.
pub enum ParserKind {
    SequentialHuffman(seq_huffman::SequentialHuffmanParser),
    SequentialArithmetic(seq_arith::SequentialArithParser),
    ProgressiveHuffman(prog_huffman::ProgressiveHuffmanParser),
    ProgressiveArithmetic(prog_arith::ProgressiveArithParser),
    Lossless(lossless::LosslessParser),
    JpegLs(jpegls::JpegLsParser),
    Hidden(Box<hidden::HiddenWrapper>),
}

impl ParserKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ParserKind::SequentialHuffman(_) => "sequential-huffman",
            ParserKind::SequentialArithmetic(_) => "sequential-arithmetic",
            ParserKind::ProgressiveHuffman(_) => "progressive-huffman",
            ParserKind::ProgressiveArithmetic(_) => "progressive-arithmetic",
            ParserKind::Lossless(_) => "lossless",
            ParserKind::JpegLs(_) => "jpeg-ls",
            ParserKind::Hidden(_) => "hidden-side-channel",
        }
    }
}

/// Result of a fallible `start_measure` call (spec.md §4.2): arithmetic
/// scans are not implemented since a symbol-frequency pass makes no sense
/// without a fixed Huffman alphabet.
pub fn measure_not_supported(kind: &str) -> CodecError {
    CodecError::NotImplemented(format!("start_measure is Huffman-only, not for {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_state_ticks_down_to_zero() {
        let mut rs = RestartState::new(2);
        assert!(!rs.tick());
        assert!(rs.tick());
        rs.reset();
        assert_eq!(rs.mcus_to_go, 2);
        assert_eq!(rs.next_rst, 1);
    }

    #[test]
    fn resync_classifies_ahead_marker_as_abandon() {
        let rs = RestartState::new(4);
        // expecting RST0, stream has RST4 (ahead by 4) -> abandon
        let outcome = rs.classify_found_marker(Some(Marker::RST(4)));
        assert_eq!(outcome, ResyncOutcome::Abandon);
    }

    #[test]
    fn resync_accepts_matching_marker() {
        let rs = RestartState::new(4);
        assert_eq!(
            rs.classify_found_marker(Some(Marker::RST(0))),
            ResyncOutcome::Accept
        );
    }
}
