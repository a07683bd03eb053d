//! Hidden refinement / residual side-channel wrapper (spec.md §4.3.9):
//! templated over the progressive Huffman/AC refinement and sequential
//! scans, but fed from an APP marker payload instead of the main
//! codestream. From every other module's perspective this is an ordinary
//! scan — the orchestrator builds the bit I/O over the side-channel's
//! bytes exactly as it would for a main scan and hands it to the same
//! `parse_block`/`write_block` methods.
use crate::bitio::huffman_bits::{BitReader, BitWriter};
use crate::bitio::qm::{QmDecoder, QmEncoder};
use crate::control::block_buffer::QuantisedBlock;
use crate::entropy::prog_arith::ProgressiveArithParser;
use crate::entropy::prog_huffman::ProgressiveHuffmanParser;
use crate::entropy::seq_arith::SequentialArithParser;
use crate::entropy::seq_huffman::SequentialHuffmanParser;
use crate::errors::CodecError;
use crate::huffman::{EncodeTable, HuffmanTable};
use crate::markers::ProcessType;

/// APP marker number (APPn, n=9) side-channel payloads live in. Not part
/// of T.81/T.87; a repo-local convention for the non-standard extension
/// (spec.md §9 "Open question": where does a non-standard side channel
/// live that a conforming reader must skip?).
pub const HIDDEN_SIDE_CHANNEL_APP_MARKER: u8 = 9;

/// Which of the four scan kinds this side channel is templated over.
pub enum HiddenInner {
    SequentialHuffman(SequentialHuffmanParser),
    SequentialArithmetic(SequentialArithParser),
    ProgressiveHuffman(ProgressiveHuffmanParser),
    ProgressiveArithmetic(ProgressiveArithParser),
}

/// A hidden refinement or residual scan. Carries its own entropy-coder
/// state (restart/predictors/contexts) exactly like a real scan, plus the
/// frame process tag it borrows for dispatch purposes since it has no SOF
/// of its own (spec.md §4.3.9: "inherits `write_frame_type` from the next
/// real scan").
pub struct HiddenWrapper {
    pub inner: HiddenInner,
    pub write_frame_type: ProcessType,
}

impl HiddenWrapper {
    #[must_use]
    pub fn new(inner: HiddenInner, write_frame_type: ProcessType) -> Self {
        HiddenWrapper {
            inner,
            write_frame_type,
        }
    }

    pub fn restart_scan(&mut self) {
        match &mut self.inner {
            HiddenInner::SequentialHuffman(p) => p.restart_scan(),
            HiddenInner::SequentialArithmetic(p) => p.restart_scan(),
            HiddenInner::ProgressiveHuffman(p) => p.restart_scan(),
            HiddenInner::ProgressiveArithmetic(p) => p.restart_scan(),
        }
    }

    /// Huffman-coded block, dispatched to whichever Huffman variant this
    /// side channel wraps. Returns an error if the wrapper was built over
    /// an arithmetic inner parser and a Huffman bitstream was supplied —
    /// a mismatch the caller set up, not a stream-corruption case.
    pub fn parse_block_huffman(
        &mut self,
        br: &mut BitReader,
        component: usize,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::SequentialHuffman(p) => p.parse_block(br, component, dc_table, ac_table, block),
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a sequential-huffman scan".into(),
            )),
        }
    }

    pub fn write_block_huffman(
        &mut self,
        bw: &mut BitWriter,
        component: usize,
        dc_table: &EncodeTable,
        ac_table: &EncodeTable,
        block: &QuantisedBlock,
    ) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::SequentialHuffman(p) => {
                p.write_block(bw, component, dc_table, ac_table, block);
                Ok(())
            }
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a sequential-huffman scan".into(),
            )),
        }
    }

    /// Progressive AC refinement over the side channel (the common case:
    /// a hidden scan adding bit-planes below a baseline-compatible
    /// progressive image).
    pub fn parse_ac_refine_huffman(
        &mut self,
        br: &mut BitReader,
        ac_table: &HuffmanTable,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::ProgressiveHuffman(p) => p.parse_ac_refine(br, ac_table, start, stop, low_bit, block),
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a progressive-huffman scan".into(),
            )),
        }
    }

    pub fn parse_ac_refine_arith(
        &mut self,
        dec: &mut QmDecoder,
        component: usize,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::ProgressiveArithmetic(p) => p.parse_ac_refine(dec, component, start, stop, low_bit, block),
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a progressive-arithmetic scan".into(),
            )),
        }
    }

    pub fn parse_block_arith(
        &mut self,
        dec: &mut QmDecoder,
        component: usize,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::SequentialArithmetic(p) => p.parse_block(dec, component, block),
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a sequential-arithmetic scan".into(),
            )),
        }
    }

    pub fn write_block_arith(&mut self, enc: &mut QmEncoder, component: usize, block: &QuantisedBlock) -> Result<(), CodecError> {
        match &mut self.inner {
            HiddenInner::SequentialArithmetic(p) => {
                p.write_block(enc, component, block);
                Ok(())
            }
            _ => Err(CodecError::InvalidParameter(
                "hidden side channel is not a sequential-arithmetic scan".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::byte_stream::ByteReader;

    fn closed_dc_table() -> (HuffmanTable, EncodeTable) {
        let counts: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let values: Vec<u8> = (0..12).collect();
        (
            HuffmanTable::new(&counts, values.clone()).unwrap(),
            EncodeTable::new(&counts, &values),
        )
    }

    fn closed_ac_table() -> (HuffmanTable, EncodeTable) {
        let mut counts = [0u8; 16];
        counts[1] = 2;
        let values = vec![crate::entropy::seq_huffman::EOB, 0x01, 0x02];
        counts[2] = 1;
        (
            HuffmanTable::new(&counts, values.clone()).unwrap(),
            EncodeTable::new(&counts, &values),
        )
    }

    #[test]
    fn hidden_sequential_huffman_roundtrips_through_side_channel() {
        let (dc_dec, dc_enc) = closed_dc_table();
        let (ac_dec, ac_enc) = closed_ac_table();

        let mut block = QuantisedBlock::default();
        block.coeffs[0] = 9;

        let mut writer = HiddenWrapper::new(
            HiddenInner::SequentialHuffman(SequentialHuffmanParser::new(1, 0, false)),
            ProcessType::ProgressiveHuffman,
        );
        let mut bw = BitWriter::new();
        writer
            .write_block_huffman(&mut bw, 0, &dc_enc, &ac_enc, &block)
            .unwrap();
        let bytes = bw.into_bytes();

        let mut reader = HiddenWrapper::new(
            HiddenInner::SequentialHuffman(SequentialHuffmanParser::new(1, 0, false)),
            ProcessType::ProgressiveHuffman,
        );
        let mut br = BitReader::new(ByteReader::new(&bytes));
        let mut out = QuantisedBlock::default();
        reader
            .parse_block_huffman(&mut br, 0, &dc_dec, &ac_dec, &mut out)
            .unwrap();
        assert_eq!(out.coeffs[0], 9);
    }

    #[test]
    fn mismatched_inner_kind_is_rejected() {
        let (_, ac_enc) = closed_ac_table();
        let (_, dc_enc) = closed_dc_table();
        let mut wrapper = HiddenWrapper::new(
            HiddenInner::ProgressiveArithmetic(ProgressiveArithParser::new(1, 0)),
            ProcessType::ProgressiveArithmetic,
        );
        let mut bw = BitWriter::new();
        let err = wrapper
            .write_block_huffman(&mut bw, 0, &dc_enc, &ac_enc, &QuantisedBlock::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }
}
