//! Progressive arithmetic (QM-coder) entropy parser (spec.md §4.3.6):
//! initial AC scan mirrors §4.3.4 in the QM model, refinement uses three
//! per-position contexts {SE, S0, SC} with an eobx cutoff reconstructed by
//! scanning for the highest previously-significant coefficient.
use crate::bitio::qm::{QmContext, QmDecoder, QmEncoder};
use crate::control::block_buffer::QuantisedBlock;
use crate::entropy::RestartState;
use crate::errors::CodecError;
use crate::misc::ZIGZAG;

struct AcInitContexts {
    se: [QmContext; 63],
    s0: [QmContext; 63],
    sign: QmContext,
    size_class: [QmContext; 20],
    magnitude: [QmContext; 20],
}

impl AcInitContexts {
    fn new() -> Self {
        AcInitContexts {
            se: [QmContext::new(); 63],
            s0: [QmContext::new(); 63],
            sign: QmContext::new(),
            size_class: [QmContext::new(); 20],
            magnitude: [QmContext::new(); 20],
        }
    }
}

struct AcRefineContexts {
    se: [QmContext; 63],
    s0: [QmContext; 63],
    sc: QmContext,
}

impl AcRefineContexts {
    fn new() -> Self {
        AcRefineContexts {
            se: [QmContext::new(); 63],
            s0: [QmContext::new(); 63],
            sc: QmContext::new(),
        }
    }
}

pub struct ProgressiveArithParser {
    pub restart: RestartState,
    init: Vec<AcInitContexts>,
    refine: Vec<AcRefineContexts>,
    pub dc_predictors: Vec<i32>,
}

fn encode_magnitude(enc: &mut QmEncoder, size_ctx: &mut [QmContext], mag_ctx: &mut [QmContext], value: u32) {
    let mut v = value;
    let mut i = 0usize;
    while v > 1 {
        enc.encode(&mut size_ctx[i.min(size_ctx.len() - 1)], 1);
        i += 1;
        v >>= 1;
    }
    enc.encode(&mut size_ctx[i.min(size_ctx.len() - 1)], 0);
    let bits = 32 - value.leading_zeros();
    for b in (0..bits.saturating_sub(1)).rev() {
        let bit = ((value >> b) & 1) as u8;
        enc.encode(&mut mag_ctx[(bits as usize - 1).min(mag_ctx.len() - 1)], bit);
    }
}

fn decode_magnitude(dec: &mut QmDecoder, size_ctx: &mut [QmContext], mag_ctx: &mut [QmContext]) -> Result<u32, CodecError> {
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
    for _ in (0..i).rev() {
        let bit = dec.decode(&mut mag_ctx[i.min(mag_ctx.len() - 1)])?;
        value = (value << 1) | u32::from(bit);
    }
    Ok(value)
}

impl ProgressiveArithParser {
    #[must_use]
    pub fn new(component_count: usize, restart_interval: u32) -> Self {
        ProgressiveArithParser {
            restart: RestartState::new(restart_interval),
            init: (0..component_count).map(|_| AcInitContexts::new()).collect(),
            refine: (0..component_count).map(|_| AcRefineContexts::new()).collect(),
            dc_predictors: vec![0; component_count],
        }
    }

    pub fn restart_scan(&mut self) {
        for p in &mut self.dc_predictors {
            *p = 0;
        }
        for c in &mut self.init {
            *c = AcInitContexts::new();
        }
        for c in &mut self.refine {
            *c = AcRefineContexts::new();
        }
        self.restart.reset();
    }

    /// §4.3.6 AC initial scan, modelled identically to §4.3.2's AC coding
    /// but scoped to `start..=stop`.
    pub fn write_ac_initial(
        &mut self,
        enc: &mut QmEncoder,
        component: usize,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &QuantisedBlock,
    ) {
        let ctx = &mut self.init[component];
        let mut last_nonzero = usize::from(start).saturating_sub(1);
        for k in usize::from(start)..=usize::from(stop) {
            if (block.coeffs[ZIGZAG[k]] >> low_bit) != 0 {
                last_nonzero = k;
            }
        }
        let mut k = usize::from(start);
        let stop = usize::from(stop);
        while k <= stop {
            if k > last_nonzero {
                enc.encode(&mut ctx.se[k - 1], 1);
                break;
            }
            enc.encode(&mut ctx.se[k - 1], 0);
            let value = block.coeffs[ZIGZAG[k]] >> low_bit;
            if value == 0 {
                enc.encode(&mut ctx.s0[k - 1], 0);
                k += 1;
                continue;
            }
            enc.encode(&mut ctx.s0[k - 1], 1);
            enc.encode(&mut ctx.sign, u8::from(value < 0));
            encode_magnitude(enc, &mut ctx.size_class, &mut ctx.magnitude, value.unsigned_abs());
            k += 1;
        }
    }

    pub fn parse_ac_initial(
        &mut self,
        dec: &mut QmDecoder,
        component: usize,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        let ctx = &mut self.init[component];
        let mut k = usize::from(start);
        let stop = usize::from(stop);
        while k <= stop {
            let eob = dec.decode(&mut ctx.se[k - 1])?;
            if eob == 1 {
                break;
            }
            let nonzero = dec.decode(&mut ctx.s0[k - 1])?;
            if nonzero == 0 {
                k += 1;
                continue;
            }
            let neg = dec.decode(&mut ctx.sign)?;
            let mag = decode_magnitude(dec, &mut ctx.size_class, &mut ctx.magnitude)? as i32;
            let value = if neg == 1 { -mag } else { mag };
            block.coeffs[ZIGZAG[k]] = value << low_bit;
            k += 1;
        }
        Ok(())
    }

    /// Highest coefficient position already significant from a prior AC
    /// scan (spec.md §4.3.6: "the decoder reconstructs eobx by scanning the
    /// block for the highest previously significant coefficient").
    fn eobx(block: &QuantisedBlock, start: u8, stop: u8, low_bit: u8) -> usize {
        let bit = 1i32 << (low_bit + 1);
        let mut highest = usize::from(start).saturating_sub(1);
        for k in usize::from(start)..=usize::from(stop) {
            if block.coeffs[ZIGZAG[k]].unsigned_abs() as i32 >= bit {
                highest = k;
            }
        }
        highest
    }

    pub fn write_ac_refine(
        &mut self,
        enc: &mut QmEncoder,
        component: usize,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &QuantisedBlock,
    ) {
        let bit = 1i32 << low_bit;
        let eobx = Self::eobx(block, start, stop, low_bit);
        let ctx = &mut self.refine[component];

        let mut last_nonzero = usize::from(start).saturating_sub(1);
        for k in usize::from(start)..=usize::from(stop) {
            if block.coeffs[ZIGZAG[k]] != 0 {
                last_nonzero = k;
            }
        }

        let mut k = usize::from(start);
        let stop = usize::from(stop);
        while k <= stop {
            let already = block.coeffs[ZIGZAG[k]].unsigned_abs() as i32 >= (bit << 1);
            if already {
                let correction = ((block.coeffs[ZIGZAG[k]].unsigned_abs() as i32) >> low_bit) & 1;
                enc.encode(&mut ctx.sc, correction as u8);
                k += 1;
                continue;
            }
            // the EOB test is suppressed below eobx (spec.md §4.3.6):
            // those positions still need explicit zero/nonzero coding.
            if k >= eobx {
                enc.encode(&mut ctx.se[k - 1], u8::from(k > last_nonzero));
                if k > last_nonzero {
                    break;
                }
            }
            let value = block.coeffs[ZIGZAG[k]] >> low_bit;
            enc.encode(&mut ctx.s0[k - 1], u8::from(value != 0));
            k += 1;
        }
    }

    pub fn parse_ac_refine(
        &mut self,
        dec: &mut QmDecoder,
        component: usize,
        start: u8,
        stop: u8,
        low_bit: u8,
        block: &mut QuantisedBlock,
    ) -> Result<(), CodecError> {
        let bit = 1i32 << low_bit;
        let eobx = Self::eobx(block, start, stop, low_bit);
        let ctx = &mut self.refine[component];

        let mut k = usize::from(start);
        let stop = usize::from(stop);
        while k <= stop {
            let already = block.coeffs[ZIGZAG[k]].unsigned_abs() as i32 >= (bit << 1);
            if already {
                let correction = dec.decode(&mut ctx.sc)?;
                if correction == 1 {
                    if block.coeffs[ZIGZAG[k]] > 0 {
                        block.coeffs[ZIGZAG[k]] += bit;
                    } else {
                        block.coeffs[ZIGZAG[k]] -= bit;
                    }
                }
                k += 1;
                continue;
            }
            if k >= eobx {
                let eob = dec.decode(&mut ctx.se[k - 1])?;
                if eob == 1 {
                    break;
                }
            }
            let nonzero = dec.decode(&mut ctx.s0[k - 1])?;
            if nonzero == 1 {
                block.coeffs[ZIGZAG[k]] = bit;
            }
            k += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ac_initial_block_roundtrips() {
        let mut block = QuantisedBlock::default();
        block.coeffs[ZIGZAG[2]] = 4;
        block.coeffs[ZIGZAG[5]] = -1;

        let mut wp = ProgressiveArithParser::new(1, 0);
        let mut enc = QmEncoder::new();
        wp.write_ac_initial(&mut enc, 0, 1, 63, 0, &block);
        let data = enc.finish();

        let mut rp = ProgressiveArithParser::new(1, 0);
        let mut dec = QmDecoder::new(&data).unwrap();
        let mut out = QuantisedBlock::default();
        rp.parse_ac_initial(&mut dec, 0, 1, 63, 0, &mut out).unwrap();

        assert_eq!(out.coeffs[ZIGZAG[2]], 4);
        assert_eq!(out.coeffs[ZIGZAG[5]], -1);
    }
}
