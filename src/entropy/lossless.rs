//! Lossless predictive entropy parser (spec.md §4.3.7, Annex H): one of
//! seven spatial predictors feeds a residual that is coded with either the
//! sequential Huffman (size, value) alphabet or the sequential arithmetic
//! DC context model, selected once per scan by which table the SOS/DAC
//! marker installed.
use crate::bitio::huffman_bits::{BitReader, BitWriter};
use crate::bitio::qm::{QmDecoder, QmEncoder};
use crate::control::line_buffer::LineBuffer;
use crate::entropy::seq_arith::{decode_magnitude, encode_magnitude, DcContexts};
use crate::entropy::seq_huffman::magnitude_category;
use crate::entropy::RestartState;
use crate::errors::CodecError;
use crate::huffman::{EncodeTable, HuffmanTable};
use crate::tables::ArithConditioner;

/// Predictor selector 0..=7 from the scan's `start` field (spec.md §4.3.7).
/// 0 is only legal in differential frames (no spatial prediction).
#[must_use]
pub fn predict(selector: u8, a: i32, b: i32, c: i32) -> i32 {
    match selector {
        0 => 0,
        1 => a,
        2 => b,
        3 => c,
        4 => a + b - c,
        5 => a + ((b - c) >> 1),
        6 => b + ((a - c) >> 1),
        7 => (a + b) / 2,
        _ => a, // unreachable for validated scans; fall back defensively
    }
}

/// Per-component predictor state, reset to the default value at the first
/// sample of each restart interval (spec.md §3 invariant).
#[derive(Clone, Copy)]
struct PredictorState {
    /// `2^(P-1-Pt)`, the default prediction used for the very first sample
    /// of the image (Annex H.1.1).
    default_value: i32,
}

enum Coder {
    Huffman {
        dc_table: Option<HuffmanTable>,
        dc_encode: Option<EncodeTable>,
    },
    Arithmetic {
        contexts: Vec<DcContexts>,
        conditioner: ArithConditioner,
    },
}

pub struct LosslessParser {
    pub restart: RestartState,
    predictors: Vec<PredictorState>,
    coder: Coder,
    pub selector: u8,
    pub point_transform: u8,
}

impl LosslessParser {
    #[must_use]
    pub fn new_huffman(
        component_count: usize,
        restart_interval: u32,
        precision: u8,
        point_transform: u8,
        selector: u8,
    ) -> Self {
        LosslessParser {
            restart: RestartState::new(restart_interval),
            predictors: vec![
                PredictorState {
                    default_value: 1 << (precision as i32 - 1 - i32::from(point_transform)),
                };
                component_count
            ],
            coder: Coder::Huffman {
                dc_table: None,
                dc_encode: None,
            },
            selector,
            point_transform,
        }
    }

    #[must_use]
    pub fn new_arithmetic(
        component_count: usize,
        restart_interval: u32,
        precision: u8,
        point_transform: u8,
        selector: u8,
        conditioner: ArithConditioner,
    ) -> Self {
        LosslessParser {
            restart: RestartState::new(restart_interval),
            predictors: vec![
                PredictorState {
                    default_value: 1 << (precision as i32 - 1 - i32::from(point_transform)),
                };
                component_count
            ],
            coder: Coder::Arithmetic {
                contexts: (0..component_count).map(|_| DcContexts::new()).collect(),
                conditioner,
            },
            selector,
            point_transform,
        }
    }

    pub fn set_huffman_tables(&mut self, dec: HuffmanTable, enc: EncodeTable) {
        if let Coder::Huffman { dc_table, dc_encode } = &mut self.coder {
            *dc_table = Some(dec);
            *dc_encode = Some(enc);
        }
    }

    pub fn restart_scan(&mut self) {
        self.restart.reset();
        match &mut self.coder {
            Coder::Huffman { .. } => {}
            Coder::Arithmetic { contexts, .. } => {
                for c in contexts {
                    *c = DcContexts::new();
                }
            }
        }
    }

    /// Predict, code the residual, and write the reconstructed sample into
    /// `lines` at `(component, x)`. `row_start` indicates the first sample
    /// of a line (predictor uses the default or the Pb-only rule).
    pub fn parse_sample(
        &mut self,
        br_huffman: Option<&mut BitReader>,
        dec_arith: Option<&mut QmDecoder>,
        lines: &mut LineBuffer,
        component: usize,
        x: usize,
        row_start: bool,
        first_row: bool,
    ) -> Result<i32, CodecError> {
        let (a, b, c) = self.neighbourhood(lines, component, x, row_start, first_row)?;
        let px = self.predicted_value(component, a, b, c, row_start, first_row);

        let residual = match (&mut self.coder, br_huffman, dec_arith) {
            (Coder::Huffman { dc_table, .. }, Some(br), None) => {
                let table = dc_table
                    .as_ref()
                    .ok_or_else(|| CodecError::ObjectDoesntExist("lossless DC table".into()))?;
                let size = br.decode_symbol(table)?;
                br.receive_extend(size)?
            }
            (Coder::Arithmetic { contexts, conditioner }, None, Some(dec)) => {
                decode_residual(dec, &mut contexts[component], *conditioner)?
            }
            _ => {
                return Err(CodecError::InvalidParameter(
                    "lossless parser coder/bitstream mismatch".into(),
                ))
            }
        };

        let sample = px.wrapping_add(residual);
        lines.current_line_mut(component)?.set(x, sample);
        Ok(sample)
    }

    pub fn write_sample(
        &mut self,
        bw_huffman: Option<&mut BitWriter>,
        enc_arith: Option<&mut QmEncoder>,
        lines: &LineBuffer,
        component: usize,
        x: usize,
        row_start: bool,
        first_row: bool,
        sample: i32,
    ) -> Result<(), CodecError> {
        let (a, b, c) = self.neighbourhood(lines, component, x, row_start, first_row)?;
        let px = self.predicted_value(component, a, b, c, row_start, first_row);
        let residual = sample - px;

        match (&mut self.coder, bw_huffman, enc_arith) {
            (Coder::Huffman { dc_encode, .. }, Some(bw), None) => {
                let table = dc_encode
                    .as_ref()
                    .ok_or_else(|| CodecError::ObjectDoesntExist("lossless DC table".into()))?;
                let size = magnitude_category(residual);
                bw.encode_symbol(table, size);
                bw.send_extend(residual, size);
            }
            (Coder::Arithmetic { contexts, conditioner }, None, Some(enc)) => {
                encode_residual(enc, &mut contexts[component], *conditioner, residual);
            }
            _ => {
                return Err(CodecError::InvalidParameter(
                    "lossless parser coder/bitstream mismatch".into(),
                ))
            }
        }
        Ok(())
    }

    /// Annex H.1.2.2: the default value opens the image; the first line
    /// (no row above) always predicts from the left neighbour alone
    /// regardless of the scan's predictor selector; the first column of
    /// every subsequent line predicts from the sample directly above.
    fn predicted_value(&self, component: usize, a: i32, b: i32, c: i32, row_start: bool, first_row: bool) -> i32 {
        if first_row && row_start {
            self.predictors[component].default_value
        } else if first_row {
            a
        } else if row_start {
            b
        } else {
            predict(self.selector, a, b, c)
        }
    }

    fn neighbourhood(
        &self,
        lines: &LineBuffer,
        component: usize,
        x: usize,
        row_start: bool,
        first_row: bool,
    ) -> Result<(i32, i32, i32), CodecError> {
        if first_row {
            let a = if row_start {
                0
            } else {
                lines.current_line(component)?.at(x as isize - 1)
            };
            return Ok((a, 0, 0));
        }
        let prev = lines.previous_line(component)?;
        let Some(prev) = prev else { return Ok((0, 0, 0)) };
        let b = prev.at(x as isize);
        let c = prev.at(x as isize - 1);
        let a = if row_start {
            b
        } else {
            lines.current_line(component)?.at(x as isize - 1)
        };
        Ok((a, b, c))
    }
}

/// Residual coding for the arithmetic variant reuses the sequential DC
/// context bank wholesale, since Annex H specifies the identical
/// zone/unary/refinement model for lossless prediction residuals
/// (spec.md §4.3.7: "coded using the sequential DC alphabet").
fn encode_residual(enc: &mut QmEncoder, ctx: &mut DcContexts, cond: ArithConditioner, diff: i32) {
    let zone = ctx.zone(ctx.prev_diff, cond);
    enc.encode(&mut ctx.s0[zone], u8::from(diff != 0));
    if diff != 0 {
        enc.encode(&mut ctx.sign, u8::from(diff < 0));
        encode_magnitude(enc, &mut ctx.size_class, &mut ctx.magnitude, diff.unsigned_abs());
    }
    ctx.prev_diff = diff;
}

fn decode_residual(
    dec: &mut QmDecoder,
    ctx: &mut DcContexts,
    cond: ArithConditioner,
) -> Result<i32, CodecError> {
    let zone = ctx.zone(ctx.prev_diff, cond);
    let nonzero = dec.decode(&mut ctx.s0[zone])?;
    let diff = if nonzero == 1 {
        let neg = dec.decode(&mut ctx.sign)?;
        let mag = decode_magnitude(dec, &mut ctx.size_class, &mut ctx.magnitude)? as i32;
        if neg == 1 {
            -mag
        } else {
            mag
        }
    } else {
        0
    };
    ctx.prev_diff = diff;
    Ok(diff)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictor_table_matches_annex_h() {
        assert_eq!(predict(1, 5, 9, 2), 5);
        assert_eq!(predict(2, 5, 9, 2), 9);
        assert_eq!(predict(3, 5, 9, 2), 2);
        assert_eq!(predict(4, 5, 9, 2), 12);
        assert_eq!(predict(5, 5, 9, 2), 5 + ((9 - 2) >> 1));
        assert_eq!(predict(6, 5, 9, 2), 9 + ((5 - 2) >> 1));
        assert_eq!(predict(7, 5, 9, 2), 7);
    }

    #[test]
    fn huffman_lossless_roundtrips_a_row() {
        let counts: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
        let values: Vec<u8> = (0..12).collect();
        let dec_table = HuffmanTable::new(&counts, values.clone()).unwrap();
        let enc_table = EncodeTable::new(&counts, &values);

        let mut writer = LosslessParser::new_huffman(1, 0, 8, 0, 1);
        writer.set_huffman_tables(dec_table.clone(), enc_table.clone());
        let mut lines_w = LineBuffer::new(&[4], &[1]);
        lines_w.start_mcu_row(0, 1).unwrap();

        let samples = [100i32, 102, 99, 250];
        let mut bw = BitWriter::new();
        for (x, &s) in samples.iter().enumerate() {
            writer
                .write_sample(Some(&mut bw), None, &lines_w, 0, x, x == 0, true, s)
                .unwrap();
            lines_w.current_line_mut(0).unwrap().set(x, s);
        }
        let bytes = bw.into_bytes();

        let mut reader = LosslessParser::new_huffman(1, 0, 8, 0, 1);
        reader.set_huffman_tables(dec_table, enc_table);
        let mut lines_r = LineBuffer::new(&[4], &[1]);
        lines_r.start_mcu_row(0, 1).unwrap();
        let mut br = BitReader::new(crate::bitio::byte_stream::ByteReader::new(&bytes));
        for (x, &expected) in samples.iter().enumerate() {
            let got = reader
                .parse_sample(Some(&mut br), None, &mut lines_r, 0, x, x == 0, true)
                .unwrap();
            assert_eq!(got, expected);
        }
    }
}
