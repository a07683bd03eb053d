//! Sequential Huffman entropy parser (spec.md §4.3.1): per-block DC
//! difference coding plus the canonical (run, size) AC alphabet.
use crate::bitio::huffman_bits::{BitReader, BitWriter};
use crate::control::block_buffer::QuantisedBlock;
use crate::entropy::RestartState;
use crate::errors::CodecError;
use crate::huffman::{HuffmanTable, SymbolStats};
use crate::misc::ZIGZAG;

pub const ZRL: u8 = 0xF0;
pub const EOB: u8 = 0x00;

/// Magnitude category (0..=11) of a signed coefficient difference/value,
/// i.e. the number of bits `HUFF_EXTEND` needs to represent it.
#[must_use]
pub fn magnitude_category(value: i32) -> u8 {
    let mut v = value.unsigned_abs();
    let mut size = 0u8;
    while v != 0 {
        size += 1;
        v >>= 1;
    }
    size
}

/// Per-component state carried across MCUs within a scan (spec.md §3
/// "Invariants": DC predictor reset at restart).
#[derive(Default, Clone, Copy)]
pub struct DcPredictor {
    pub value: i32,
}

pub struct SequentialHuffmanParser {
    pub restart: RestartState,
    pub predictors: Vec<DcPredictor>,
    /// Differential-mode frames reset the predictor at the start of every
    /// MCU row instead of carrying it across rows (spec.md §4.3.1).
    pub differential: bool,
    pub measure: Option<Vec<SymbolStats>>,
}

impl SequentialHuffmanParser {
    #[must_use]
    pub fn new(component_count: usize, restart_interval: u32, differential: bool) -> Self {
        SequentialHuffmanParser {
            restart: RestartState::new(restart_interval),
            predictors: vec![DcPredictor::default(); component_count],
            differential,
            measure: None,
        }
    }

    pub fn start_read(&mut self) {
        for p in &mut self.predictors {
            *p = DcPredictor::default();
        }
        self.restart = RestartState::new(self.restart.interval);
    }

    pub fn start_measure(&mut self, component_count: usize) {
        self.measure = Some(vec![SymbolStats::default(); component_count * 2]);
    }

    pub fn start_mcu_row(&mut self) {
        if self.differential {
            for p in &mut self.predictors {
                *p = DcPredictor::default();
            }
        }
    }

    pub fn restart_scan(&mut self) {
        for p in &mut self.predictors {
            *p = DcPredictor::default();
        }
        self.restart.reset();
    }

    /// Decode one block's DC + AC coefficients (natural order) from `br`.
    pub fn parse_block(
        &mut self,
        br: &mut BitReader,
        component: usize,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        block.clear();

        let size = br.decode_symbol(dc_table)?;
        let diff = br.receive_extend(size)?;
        let pred = &mut self.predictors[component];
        pred.value += diff;
        block.coeffs[ZIGZAG[0]] = pred.value;

        let mut k = 1usize;
        while k <= 63 {
            let rs = br.decode_symbol(ac_table)?;
            let run = rs >> 4;
            let sz = rs & 0x0F;
            if sz == 0 {
                if run == 15 {
                    k += 16; // ZRL: 16 zero coefficients
                    continue;
                }
                break; // EOB
            }
            k += usize::from(run);
            if k > 63 {
                return Err(CodecError::MalformedStream(
                    "AC run overruns the 63-coefficient block".into(),
                ));
            }
            let value = br.receive_extend(sz)?;
            block.coeffs[ZIGZAG[k]] = value;
            k += 1;
        }
        Ok(())
    }

    /// Encode one block's DC + AC coefficients (natural order) to `bw`.
    pub fn write_block(
        &mut self,
        bw: &mut BitWriter,
        component: usize,
        dc_table: &crate::huffman::EncodeTable,
        ac_table: &crate::huffman::EncodeTable,
        block: &QuantisedBlock,
    ) {
        let dc = block.coeffs[ZIGZAG[0]];
        let pred = &mut self.predictors[component];
        let diff = dc - pred.value;
        pred.value = dc;

        let size = magnitude_category(diff);
        bw.encode_symbol(dc_table, size);
        bw.send_extend(diff, size);

        let mut run = 0u8;
        for k in 1..64 {
            let value = block.coeffs[ZIGZAG[k]];
            if value == 0 {
                run += 1;
                if run == 16 {
                    bw.encode_symbol(ac_table, ZRL);
                    run = 0;
                }
                continue;
            }
            let sz = magnitude_category(value);
            bw.encode_symbol(ac_table, (run << 4) | sz);
            bw.send_extend(value, sz);
            run = 0;
        }
        if run > 0 {
            bw.encode_symbol(ac_table, EOB);
        }
    }

    /// Record (not code) the symbols a block would produce, for a
    /// statistics-gathering pre-pass (spec.md §4.2 `start_measure`).
    pub fn measure_block(&mut self, component: usize, block: &QuantisedBlock) {
        let Some(stats) = self.measure.as_mut() else {
            return;
        };
        let dc = block.coeffs[ZIGZAG[0]];
        let pred = &mut self.predictors[component];
        let diff = dc - pred.value;
        pred.value = dc;
        stats[component * 2].record(magnitude_category(diff));

        let mut run = 0u8;
        for k in 1..64 {
            let value = block.coeffs[ZIGZAG[k]];
            if value == 0 {
                run += 1;
                if run == 16 {
                    stats[component * 2 + 1].record(ZRL);
                    run = 0;
                }
                continue;
            }
            let sz = magnitude_category(value);
            stats[component * 2 + 1].record((run << 4) | sz);
            run = 0;
        }
        if run > 0 {
            stats[component * 2 + 1].record(EOB);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::byte_stream::ByteReader;
    use crate::huffman::EncodeTable;

    fn standard_dc_table() -> (HuffmanTable, EncodeTable) {
        let counts: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let values: Vec<u8> = (0..12).collect();
        (
            HuffmanTable::new(&counts, values.clone()).unwrap(),
            EncodeTable::new(&counts, &values),
        )
    }

    fn standard_ac_table() -> (HuffmanTable, EncodeTable) {
        // A tiny closed alphabet: EOB, ZRL, and (0,size) for size 1..4.
        let mut counts = [0u8; 16];
        counts[1] = 2; // EOB, (0,1)
        counts[2] = 2; // ZRL, (0,2)
        counts[3] = 2; // (0,3), (0,4)
        let values = vec![EOB, 0x01, ZRL, 0x02, 0x03, 0x04];
        (
            HuffmanTable::new(&counts, values.clone()).unwrap(),
            EncodeTable::new(&counts, &values),
        )
    }

    #[test]
    fn magnitude_category_matches_huff_extend_ranges() {
        assert_eq!(magnitude_category(0), 0);
        assert_eq!(magnitude_category(1), 1);
        assert_eq!(magnitude_category(-1), 1);
        assert_eq!(magnitude_category(4), 3);
    }

    #[test]
    fn block_roundtrips_through_write_then_parse() {
        let (dc_dec, dc_enc) = standard_dc_table();
        let (ac_dec, ac_enc) = standard_ac_table();

        let mut block = QuantisedBlock::default();
        block.coeffs[0] = 5; // DC in natural order position 0 (zigzag[0]==0)
        block.coeffs[ZIGZAG[3]] = 3;

        let mut writer_parser = SequentialHuffmanParser::new(1, 0, false);
        let mut bw = BitWriter::new();
        writer_parser.write_block(&mut bw, 0, &dc_enc, &ac_enc, &block);
        let bytes = bw.into_bytes();

        let mut reader_parser = SequentialHuffmanParser::new(1, 0, false);
        let mut br = BitReader::new(ByteReader::new(&bytes));
        let mut out = QuantisedBlock::default();
        reader_parser
            .parse_block(&mut br, 0, &dc_dec, &ac_dec, &mut out)
            .unwrap();

        assert_eq!(out.coeffs[0], 5);
        assert_eq!(out.coeffs[ZIGZAG[3]], 3);
    }

    #[test]
    fn dc_predictor_resets_on_restart() {
        let mut p = SequentialHuffmanParser::new(1, 1, false);
        p.predictors[0].value = 42;
        p.restart_scan();
        assert_eq!(p.predictors[0].value, 0);
    }
}
