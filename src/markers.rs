//! Marker byte constants and the [`Marker`] enum (spec.md §6).
//!
//! All markers are a 0xFF byte followed by a non-0x00, non-0xFF marker code.
#![allow(dead_code)]

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOS: u8 = 0xDA;
pub const DHT: u8 = 0xC4;
pub const DAC: u8 = 0xCC;
pub const DQT: u8 = 0xDB;
pub const DNL: u8 = 0xDC;
pub const DRI: u8 = 0xDD;
pub const DHP: u8 = 0xDE;
pub const EXP: u8 = 0xDF;
pub const LSE: u8 = 0xF8;
pub const SOF_LS: u8 = 0xF7;
pub const RST0: u8 = 0xD0;
pub const RST7: u8 = 0xD7;

/// A single parsed marker (the byte following 0xFF).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Marker {
    /// Start of Image.
    SOI,
    /// End of Image.
    EOI,
    /// Start of Frame, carrying T.81 Table B.1's process tag byte.
    SOF(u8),
    /// Non-standard JPEG-LS start of frame, 0xFFF7.
    SofLs,
    /// Start of Scan.
    SOS,
    /// Define Huffman Table(s).
    DHT,
    /// Define Arithmetic-coding Conditioning(s).
    DAC,
    /// Define Quantisation Table(s).
    DQT,
    /// Define Number of Lines.
    DNL,
    /// Define Restart Interval.
    DRI,
    /// Define Hierarchical Progression (declares final image dimensions).
    DHP,
    /// Expand reference components (declares hierarchical up-scaling).
    EXP,
    /// JPEG-LS parameters (Annex C thresholds).
    Lse,
    /// Restart marker n, n in 0..=7.
    RST(u8),
    /// Application-specific segment n, n in 0..=15.
    APP(u8),
    /// Comment segment.
    COM,
    /// Any other marker byte we don't specifically dispatch on but whose
    /// segment still has a 2-byte length prefix to skip.
    Other(u8),
}

impl Marker {
    /// Parse a marker from the byte that followed a 0xFF in the stream.
    ///
    /// Returns `None` for 0x00 (byte stuffing) and 0xFF (fill byte), which
    /// the byte layer must special-case before calling this.
    #[must_use]
    pub fn from_u8(byte: u8) -> Option<Marker> {
        match byte {
            0x00 | 0xFF => None,
            SOI => Some(Marker::SOI),
            EOI => Some(Marker::EOI),
            SOS => Some(Marker::SOS),
            DHT => Some(Marker::DHT),
            DAC => Some(Marker::DAC),
            DQT => Some(Marker::DQT),
            DNL => Some(Marker::DNL),
            DRI => Some(Marker::DRI),
            DHP => Some(Marker::DHP),
            EXP => Some(Marker::EXP),
            LSE => Some(Marker::Lse),
            SOF_LS => Some(Marker::SofLs),
            RST0..=RST7 => Some(Marker::RST(byte - RST0)),
            0xE0..=0xEF => Some(Marker::APP(byte - 0xE0)),
            0xFE => Some(Marker::COM),
            // SOF0..SOFF except DHT(C4)/JPG(C8)/DAC(CC), per T.81 Table B.1.
            0xC0..=0xCF if byte != DHT && byte != 0xC8 && byte != DAC => {
                Some(Marker::SOF(byte - 0xC0))
            }
            other => Some(Marker::Other(other)),
        }
    }

    /// `true` if this is a restart marker (RST0..RST7).
    #[must_use]
    pub fn is_restart(self) -> bool {
        matches!(self, Marker::RST(_))
    }

    /// `true` if this marker ends the entropy-coded segment of a scan (any
    /// marker in the 0xFFC0..0xFFE0 range that is not a restart marker, per
    /// spec.md §4.2).
    #[must_use]
    pub fn ends_scan(self) -> bool {
        matches!(
            self,
            Marker::SOF(_)
                | Marker::SofLs
                | Marker::SOS
                | Marker::DHT
                | Marker::DAC
                | Marker::DQT
                | Marker::DHP
                | Marker::EXP
                | Marker::APP(_)
        )
    }
}

/// The thirteen standard process tags plus the hierarchical "dimensions
/// only" pseudo-tag (spec.md §3 "Frame"), keyed by coding method and
/// differential-ness.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProcessType {
    BaselineHuffman,
    SequentialHuffman,
    SequentialHuffmanDifferential,
    ProgressiveHuffman,
    ProgressiveHuffmanDifferential,
    LosslessHuffman,
    LosslessHuffmanDifferential,
    SequentialArithmetic,
    SequentialArithmeticDifferential,
    ProgressiveArithmetic,
    ProgressiveArithmeticDifferential,
    LosslessArithmetic,
    LosslessArithmeticDifferential,
    /// JPEG-LS (ITU-T T.87), SOF marker 0xFFF7.
    JpegLs,
    /// DHP pseudo-frame: declares hierarchical final dimensions only.
    Dimensions,
}

impl ProcessType {
    #[must_use]
    pub fn is_progressive(self) -> bool {
        matches!(
            self,
            ProcessType::ProgressiveHuffman
                | ProcessType::ProgressiveHuffmanDifferential
                | ProcessType::ProgressiveArithmetic
                | ProcessType::ProgressiveArithmeticDifferential
        )
    }

    #[must_use]
    pub fn is_lossless(self) -> bool {
        matches!(
            self,
            ProcessType::LosslessHuffman
                | ProcessType::LosslessHuffmanDifferential
                | ProcessType::LosslessArithmetic
                | ProcessType::LosslessArithmeticDifferential
                | ProcessType::JpegLs
        )
    }

    #[must_use]
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            ProcessType::SequentialArithmetic
                | ProcessType::SequentialArithmeticDifferential
                | ProcessType::ProgressiveArithmetic
                | ProcessType::ProgressiveArithmeticDifferential
                | ProcessType::LosslessArithmetic
                | ProcessType::LosslessArithmeticDifferential
        )
    }

    #[must_use]
    pub fn is_differential(self) -> bool {
        matches!(
            self,
            ProcessType::SequentialHuffmanDifferential
                | ProcessType::ProgressiveHuffmanDifferential
                | ProcessType::LosslessHuffmanDifferential
                | ProcessType::SequentialArithmeticDifferential
                | ProcessType::ProgressiveArithmeticDifferential
                | ProcessType::LosslessArithmeticDifferential
        )
    }

    /// Decode the process tag from a non-differential SOF marker code
    /// (`Marker::SOF(n)`) together with whether this frame followed a DHP
    /// (making it differential).
    #[must_use]
    pub fn from_sof(code: u8, differential: bool) -> Option<ProcessType> {
        use ProcessType::{
            BaselineHuffman, LosslessArithmetic, LosslessArithmeticDifferential, LosslessHuffman,
            LosslessHuffmanDifferential, ProgressiveArithmetic,
            ProgressiveArithmeticDifferential, ProgressiveHuffman,
            ProgressiveHuffmanDifferential, SequentialArithmetic,
            SequentialArithmeticDifferential, SequentialHuffman, SequentialHuffmanDifferential,
        };
        Some(match (code, differential) {
            (0, false) => BaselineHuffman,
            (1, false) => SequentialHuffman,
            (1, true) => SequentialHuffmanDifferential,
            (2, false) => ProgressiveHuffman,
            (2, true) => ProgressiveHuffmanDifferential,
            (3, false) => LosslessHuffman,
            (3, true) => LosslessHuffmanDifferential,
            (9, false) => SequentialArithmetic,
            (9, true) => SequentialArithmeticDifferential,
            (10, false) => ProgressiveArithmetic,
            (10, true) => ProgressiveArithmeticDifferential,
            (11, false) => LosslessArithmetic,
            (11, true) => LosslessArithmeticDifferential,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_restart_markers_in_order() {
        for n in 0..8u8 {
            assert_eq!(Marker::from_u8(RST0 + n), Some(Marker::RST(n)));
        }
    }

    #[test]
    fn byte_stuffing_bytes_are_not_markers() {
        assert_eq!(Marker::from_u8(0x00), None);
        assert_eq!(Marker::from_u8(0xFF), None);
    }

    #[test]
    fn sof_excludes_dht_jpg_dac() {
        assert_ne!(Marker::from_u8(DHT), Some(Marker::SOF(4)));
        assert_ne!(Marker::from_u8(DAC), Some(Marker::SOF(12)));
        assert_eq!(Marker::from_u8(0xC8), Some(Marker::Other(0xC8)));
    }

    #[test]
    fn process_type_roundtrip() {
        assert_eq!(
            ProcessType::from_sof(2, true),
            Some(ProcessType::ProgressiveHuffmanDifferential)
        );
        assert!(ProcessType::ProgressiveHuffman.is_progressive());
        assert!(ProcessType::LosslessArithmeticDifferential.is_differential());
    }
}
