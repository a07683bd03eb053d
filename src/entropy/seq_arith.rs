//! Sequential arithmetic (QM-coder) entropy parser (spec.md §4.3.2, Annex
//! F): DC zone classification against DAC thresholds L/U, unary
//! size-class coding with per-class contexts, and AC coding gated by the
//! Kx block-end discriminator.
use crate::bitio::qm::{QmContext, QmDecoder, QmEncoder};
use crate::control::block_buffer::QuantisedBlock;
use crate::entropy::RestartState;
use crate::errors::CodecError;
use crate::misc::ZIGZAG;
use crate::tables::ArithConditioner;

/// One component's DC conditioning state (Annex F.1.2): five zone
/// classifiers (S0) and the unary size-class / magnitude-refinement banks.
pub struct DcContexts {
    pub s0: [QmContext; 5],
    pub sign: QmContext,
    pub size_class: [QmContext; 20],
    pub magnitude: [QmContext; 20],
    pub prev_diff: i32,
}

impl DcContexts {
    pub(crate) fn new() -> Self {
        DcContexts {
            s0: [QmContext::new(); 5],
            sign: QmContext::new(),
            size_class: [QmContext::new(); 20],
            magnitude: [QmContext::new(); 20],
            prev_diff: 0,
        }
    }

    /// Classify `diff` into one of the five DC zones against the DAC
    /// conditioner thresholds (spec.md §4.3.2 step 1); shared verbatim by
    /// the lossless-arithmetic residual coder (spec.md §4.3.7).
    pub(crate) fn zone(&self, diff: i32, cond: ArithConditioner) -> usize {
        let l = i32::from(cond.l);
        let u = i32::from(cond.u);
        if diff == 0 {
            0
        } else if diff > 0 && diff <= u {
            1
        } else if diff < 0 && diff >= -l.max(1) {
            2
        } else if diff > 0 {
            3
        } else {
            4
        }
    }
}

/// One component's AC conditioning state (Annex F.1.2.2): per-position
/// end-of-block contexts, run contexts, and the magnitude banks chosen by
/// the Kx discriminator.
pub struct AcContexts {
    pub se: [QmContext; 63],
    pub s0: [QmContext; 63],
    pub sign: QmContext,
    pub size_class_low: [QmContext; 20],
    pub size_class_high: [QmContext; 20],
    pub magnitude: [QmContext; 20],
}

impl AcContexts {
    fn new() -> Self {
        AcContexts {
            se: [QmContext::new(); 63],
            s0: [QmContext::new(); 63],
            sign: QmContext::new(),
            size_class_low: [QmContext::new(); 20],
            size_class_high: [QmContext::new(); 20],
            magnitude: [QmContext::new(); 20],
        }
    }
}

/// Unary size-class plus binary-refinement magnitude code shared by DC, AC,
/// and lossless-arithmetic residual coding (Annex F.1.2.3 / spec.md §4.3.2
/// step 3, reused verbatim by §4.3.7).
pub(crate) fn encode_magnitude(enc: &mut QmEncoder, size_ctx: &mut [QmContext], mag_ctx: &mut [QmContext], value: u32) {
    let mut v = value;
    let mut i = 0usize;
    while v > 1 {
        enc.encode(&mut size_ctx[i.min(size_ctx.len() - 1)], 1);
        i += 1;
        v >>= 1;
    }
    enc.encode(&mut size_ctx[i.min(size_ctx.len() - 1)], 0);
    // refinement bits, most significant first, excluding the implicit
    // leading 1 (Annex F unary-plus-refinement magnitude code).
    let bits = 32 - value.leading_zeros();
    for b in (0..bits.saturating_sub(1)).rev() {
        let bit = ((value >> b) & 1) as u8;
        enc.encode(&mut mag_ctx[(bits as usize - 1).min(mag_ctx.len() - 1)], bit);
    }
}

pub(crate) fn decode_magnitude(dec: &mut QmDecoder, size_ctx: &mut [QmContext], mag_ctx: &mut [QmContext]) -> Result<u32, CodecError> {
    let mut i = 0usize;
    loop {
        let bit = dec.decode(&mut size_ctx[i.min(size_ctx.len() - 1)])?;
        if bit == 0 {
            break;
        }
        i += 1;
        if i > 16 {
            return Err(CodecError::MalformedStream(
                "arithmetic magnitude unary prefix too long".into(),
            ));
        }
    }
    if i == 0 {
        return Ok(1);
    }
    let mut value = 1u32;
    for b in (0..i).rev() {
        let bit = dec.decode(&mut mag_ctx[i.min(mag_ctx.len() - 1)])?;
        value = (value << 1) | u32::from(bit);
        let _ = b;
    }
    Ok(value)
}

pub struct SequentialArithParser {
    pub restart: RestartState,
    pub dc: Vec<DcContexts>,
    pub ac: Vec<AcContexts>,
    pub dc_conditioner: Vec<ArithConditioner>,
    pub ac_conditioner: Vec<ArithConditioner>,
    pub predictors: Vec<i32>,
}

impl SequentialArithParser {
    #[must_use]
    pub fn new(component_count: usize, restart_interval: u32) -> Self {
        SequentialArithParser {
            restart: RestartState::new(restart_interval),
            dc: (0..component_count).map(|_| DcContexts::new()).collect(),
            ac: (0..component_count).map(|_| AcContexts::new()).collect(),
            dc_conditioner: vec![ArithConditioner::default(); component_count],
            ac_conditioner: vec![ArithConditioner::default(); component_count],
            predictors: vec![0; component_count],
        }
    }

    pub fn restart_scan(&mut self) {
        for p in &mut self.predictors {
            *p = 0;
        }
        for dc in &mut self.dc {
            *dc = DcContexts::new();
        }
        for ac in &mut self.ac {
            *ac = AcContexts::new();
        }
        self.restart.reset();
    }

    pub fn write_block(&mut self, enc: &mut QmEncoder, component: usize, block: &QuantisedBlock) {
        let dc_cond = self.dc_conditioner[component];
        let dc_value = block.coeffs[ZIGZAG[0]];
        let prev = self.predictors[component];
        let diff = dc_value - prev;
        self.predictors[component] = dc_value;

        let dc = &mut self.dc[component];
        let zone = dc.zone(diff, dc_cond);
        enc.encode(&mut dc.s0[zone], u8::from(diff != 0));
        if diff != 0 {
            enc.encode(&mut dc.sign, u8::from(diff < 0));
            encode_magnitude(
                enc,
                &mut dc.size_class,
                &mut dc.magnitude,
                diff.unsigned_abs(),
            );
        }
        dc.prev_diff = diff;

        let ac = &mut self.ac[component];
        let mut last_nonzero = 0usize;
        for k in 1..64 {
            if block.coeffs[ZIGZAG[k]] != 0 {
                last_nonzero = k;
            }
        }
        let mut k = 1usize;
        while k <= 63 {
            if k > last_nonzero {
                if k <= 63 {
                    enc.encode(&mut ac.se[k - 1], 1);
                }
                break;
            }
            enc.encode(&mut ac.se[k - 1], 0);
            let value = block.coeffs[ZIGZAG[k]];
            if value == 0 {
                enc.encode(&mut ac.s0[k - 1], 0);
                k += 1;
                continue;
            }
            enc.encode(&mut ac.s0[k - 1], 1);
            enc.encode(&mut ac.sign, u8::from(value < 0));
            // Bank selection must be decodable before the magnitude itself
            // is known, so it is keyed on the spectral position `k` against
            // Kx (Annex F.2.4.2), never on the value being coded.
            let kx = usize::from(self.ac_conditioner[component].kx);
            let size_ctx = if k <= kx {
                &mut ac.size_class_low
            } else {
                &mut ac.size_class_high
            };
            encode_magnitude(enc, size_ctx, &mut ac.magnitude, value.unsigned_abs());
            k += 1;
        }
    }

    pub fn parse_block(
        &mut self,
        dec: &mut QmDecoder,
        component: usize,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        block.clear();
        let dc_cond = self.dc_conditioner[component];
        let prev = self.predictors[component];

        let dc = &mut self.dc[component];
        let zone = dc.zone(dc.prev_diff, dc_cond);
        let nonzero = dec.decode(&mut dc.s0[zone])?;
        let diff = if nonzero == 1 {
            let neg = dec.decode(&mut dc.sign)?;
            let mag = decode_magnitude(dec, &mut dc.size_class, &mut dc.magnitude)? as i32;
            if neg == 1 {
                -mag
            } else {
                mag
            }
        } else {
            0
        };
        dc.prev_diff = diff;
        let dc_value = prev + diff;
        self.predictors[component] = dc_value;
        block.coeffs[ZIGZAG[0]] = dc_value;

        let ac = &mut self.ac[component];
        let mut k = 1usize;
        while k <= 63 {
            let eob = dec.decode(&mut ac.se[k - 1])?;
            if eob == 1 {
                break;
            }
            let nonzero = dec.decode(&mut ac.s0[k - 1])?;
            if nonzero == 0 {
                k += 1;
                continue;
            }
            let neg = dec.decode(&mut ac.sign)?;
            let kx = usize::from(self.ac_conditioner[component].kx);
            let size_ctx = if k <= kx {
                &mut ac.size_class_low
            } else {
                &mut ac.size_class_high
            };
            let mag = decode_magnitude(dec, size_ctx, &mut ac.magnitude)?;
            let value = if neg == 1 { -(mag as i32) } else { mag as i32 };
            block.coeffs[ZIGZAG[k]] = value;
            k += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_only_block_roundtrips() {
        let mut block = QuantisedBlock::default();
        block.coeffs[0] = 7;

        let mut wp = SequentialArithParser::new(1, 0);
        let mut enc = QmEncoder::new();
        wp.write_block(&mut enc, 0, &block);
        let data = enc.finish();

        let mut rp = SequentialArithParser::new(1, 0);
        let mut dec = QmDecoder::new(&data).unwrap();
        let mut out = QuantisedBlock::default();
        rp.parse_block(&mut dec, 0, &mut out).unwrap();
        assert_eq!(out.coeffs[0], 7);
    }
}
