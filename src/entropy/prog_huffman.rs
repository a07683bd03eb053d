//! Progressive Huffman entropy parser (spec.md §4.3.3-4.3.5): DC
//! first/refinement scans, the AC initial scan with EOBn run codes, and the
//! AC refinement scan's interleaved newly-nonzero/correction bit coding.
use crate::bitio::huffman_bits::{BitReader, BitWriter};
use crate::control::block_buffer::QuantisedBlock;
use crate::entropy::seq_huffman::{magnitude_category, EOB, ZRL};
use crate::entropy::RestartState;
use crate::errors::CodecError;
use crate::huffman::{EncodeTable, HuffmanTable};
use crate::misc::ZIGZAG;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcPhase {
    Initial,
    Refinement,
}

pub struct ProgressiveHuffmanParser {
    pub restart: RestartState,
    pub dc_predictors: Vec<i32>,
    /// Carried across blocks within an AC scan: the outstanding EOBn run
    /// (spec.md §4.3.4/§4.3.5, "terminating... all of the following
    /// (eobRun-1) blocks").
    pub eob_run: u32,
}

impl ProgressiveHuffmanParser {
    #[must_use]
    pub fn new(component_count: usize, restart_interval: u32) -> Self {
        ProgressiveHuffmanParser {
            restart: RestartState::new(restart_interval),
            dc_predictors: vec![0; component_count],
            eob_run: 0,
        }
    }

    pub fn restart_scan(&mut self) {
        for p in &mut self.dc_predictors {
            *p = 0;
        }
        self.eob_run = 0;
        self.restart.reset();
    }

    /// §4.3.3 first DC scan: predictor coded exactly like the sequential
    /// DC alphabet, against a DC pre-shifted right by `low_bit`.
    pub fn parse_dc_first(
        &mut self,
        br: &mut BitReader,
        component: usize,
        dc_table: &HuffmanTable,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        block.clear();
        let size = br.decode_symbol(dc_table)?;
        let diff = br.receive_extend(size)?;
        self.dc_predictors[component] += diff;
        block.coeffs[ZIGZAG[0]] = self.dc_predictors[component] << low_bit;
        Ok(())
    }

    pub fn write_dc_first(
        &mut self,
        bw: &mut BitWriter,
        component: usize,
        dc_table: &EncodeTable,
        low_bit: u8,
        block: &QuantisedBlock,
    ) {
        let dc = block.coeffs[ZIGZAG[0]] >> low_bit;
        let diff = dc - self.dc_predictors[component];
        self.dc_predictors[component] = dc;
        let size = magnitude_category(diff);
        bw.encode_symbol(dc_table, size);
        bw.send_extend(diff, size);
    }

    /// §4.3.3 DC refinement: a single unmodelled bit per block.
    pub fn parse_dc_refine(&mut self, br: &mut BitReader, low_bit: u8, block: &mut QuantisedBlock) -> Result<(), CodecError> {
        let bit = br.get_bit()?;
        if bit == 1 {
            block.coeffs[ZIGZAG[0]] |= 1 << low_bit;
        }
        Ok(())
    }

    pub fn write_dc_refine(&mut self, bw: &mut BitWriter, low_bit: u8, block: &QuantisedBlock) {
        let bit = ((block.coeffs[ZIGZAG[0]] >> low_bit) & 1) as u32;
        bw.put_bits(bit, 1);
    }

    /// §4.3.4 AC initial scan over `start..=stop`, pre-shifted by `low_bit`.
    pub fn parse_ac_initial(
        &mut self,
        br: &mut BitReader,
        ac_table: &HuffmanTable,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        if self.eob_run > 0 {
            self.eob_run -= 1;
            return Ok(());
        }
        let mut k = usize::from(start);
        let stop = usize::from(stop);
        while k <= stop {
            let rs = br.decode_symbol(ac_table)?;
            let run = rs >> 4;
            let sz = rs & 0x0F;
            if sz == 0 {
                if run == 15 {
                    k += 16;
                    continue;
                }
                // EOBn: 2^run .. 2^(run+1)-1 extra blocks, read as `run` low bits.
                let mut eob_run = 1u32 << run;
                if run > 0 {
                    eob_run += br.get_bits(run)?;
                }
                self.eob_run = eob_run - 1;
                break;
            }
            k += usize::from(run);
            if k > stop {
                return Err(CodecError::MalformedStream(
                    "progressive AC run overruns the scan band".into(),
                ));
            }
            let value = br.receive_extend(sz)?;
            block.coeffs[ZIGZAG[k]] = value << low_bit;
            k += 1;
        }
        Ok(())
    }

    pub fn write_ac_initial(
        &mut self,
        bw: &mut BitWriter,
        ac_table: &EncodeTable,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &QuantisedBlock,
        is_last_block_in_band: bool,
    ) {
        let mut run = 0u8;
        let mut any_nonzero = false;
        for k in usize::from(start)..=usize::from(stop) {
            let value = block.coeffs[ZIGZAG[k]] >> low_bit;
            if value == 0 {
                run += 1;
                continue;
            }
            any_nonzero = true;
            while run >= 16 {
                bw.encode_symbol(ac_table, ZRL);
                run -= 16;
            }
            let sz = magnitude_category(value);
            bw.encode_symbol(ac_table, (run << 4) | sz);
            bw.send_extend(value, sz);
            run = 0;
        }
        if !any_nonzero {
            self.eob_run += 1;
        }
        if run > 0 && any_nonzero {
            // a trailing zero run inside a block with earlier coefficients
            // still owes an explicit EOB unless it folds into an EOBn run.
            self.eob_run += 1;
        }
        if is_last_block_in_band && self.eob_run > 0 {
            self.flush_eob_run(bw, ac_table);
        }
    }

    fn flush_eob_run(&mut self, bw: &mut BitWriter, ac_table: &EncodeTable) {
        let run = self.eob_run;
        let n = 31 - run.leading_zeros();
        let symbol = EOB | (n as u8) << 4;
        bw.encode_symbol(ac_table, symbol);
        if n > 0 {
            let base = 1u32 << n;
            bw.put_bits(run - base, n as u8);
        }
        self.eob_run = 0;
    }

    /// §4.3.5 AC refinement: interleaves newly-nonzero declarations with
    /// immediate correction bits for already-significant coefficients.
    pub fn parse_ac_refine(
        &mut self,
        br: &mut BitReader,
        ac_table: &HuffmanTable,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        let bit = 1i32 << low_bit;
        let mut k = usize::from(start);
        let stop = usize::from(stop);

        if self.eob_run > 0 {
            self.eob_run -= 1;
            while k <= stop {
                if block.coeffs[ZIGZAG[k]] != 0 {
                    self.apply_correction(br, bit, &mut block.coeffs[ZIGZAG[k]])?;
                }
                k += 1;
            }
            return Ok(());
        }

        while k <= stop {
            let rs = br.decode_symbol(ac_table)?;
            let mut run = rs >> 4;
            let sz = rs & 0x0F;
            let mut new_value = 0i32;
            let mut placing_new = sz != 0;
            if sz == 0 && run != 15 {
                let mut eob_run = 1u32 << run;
                if run > 0 {
                    eob_run += br.get_bits(run)?;
                }
                self.eob_run = eob_run - 1;
                while k <= stop {
                    if block.coeffs[ZIGZAG[k]] != 0 {
                        self.apply_correction(br, bit, &mut block.coeffs[ZIGZAG[k]])?;
                    }
                    k += 1;
                }
                return Ok(());
            }
            if sz != 0 {
                let sign_bit = br.get_bit()?;
                new_value = if sign_bit == 1 { -bit } else { bit };
            }
            while k <= stop {
                if block.coeffs[ZIGZAG[k]] != 0 {
                    self.apply_correction(br, bit, &mut block.coeffs[ZIGZAG[k]])?;
                    k += 1;
                    continue;
                }
                if run == 0 {
                    if placing_new {
                        block.coeffs[ZIGZAG[k]] = new_value;
                        placing_new = false;
                        k += 1;
                    }
                    break;
                }
                run -= 1;
                k += 1;
            }
        }
        Ok(())
    }

    fn apply_correction(&self, br: &mut BitReader, bit: i32, coeff: &mut i32) -> Result<(), CodecError> {
        if br.get_bit()? == 1 && (*coeff & bit) == 0 {
            if *coeff > 0 {
                *coeff += bit;
            } else {
                *coeff -= bit;
            }
        }
        Ok(())
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

    #[test]
    fn dc_first_scan_roundtrips_with_point_transform() {
        let (dec, enc) = closed_dc_table();
        let mut block = QuantisedBlock::default();
        block.coeffs[0] = 8; // i.e. DC=2 after a low_bit=2 shift

        let mut wp = ProgressiveHuffmanParser::new(1, 0);
        let mut bw = BitWriter::new();
        wp.write_dc_first(&mut bw, 0, &enc, 2, &block);
        let bytes = bw.into_bytes();

        let mut rp = ProgressiveHuffmanParser::new(1, 0);
        let mut br = BitReader::new(ByteReader::new(&bytes));
        let mut out = QuantisedBlock::default();
        rp.parse_dc_first(&mut br, 0, &dec, 2, &mut out).unwrap();
        assert_eq!(out.coeffs[0], 8);
    }

    #[test]
    fn dc_refine_sets_single_bit() {
        let mut block = QuantisedBlock::default();
        block.coeffs[0] = 0b100;
        let mut wp = ProgressiveHuffmanParser::new(1, 0);
        let mut bw = BitWriter::new();
        wp.write_dc_refine(&mut bw, 2, &block);
        let bytes = bw.into_bytes();

        let mut rp = ProgressiveHuffmanParser::new(1, 0);
        let mut br = BitReader::new(ByteReader::new(&bytes));
        let mut out = QuantisedBlock::default();
        rp.parse_dc_refine(&mut br, 2, &mut out).unwrap();
        assert_eq!(out.coeffs[0] & 0b100, 0b100);
    }

    #[test]
    fn eob_run_accumulates_across_empty_blocks() {
        let mut p = ProgressiveHuffmanParser::new(1, 0);
        p.eob_run = 3;
        assert_eq!(p.eob_run, 3);
    }
}
