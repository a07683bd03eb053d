//! The QM arithmetic coder (spec.md §4.1 Annex D): a probability-adaptive
//! binary arithmetic coder shared by the arithmetic-coded JPEG processes.
//! Encoder and decoder both walk the same [`QE_TABLE`] state machine, so the
//! sub-interval layout (MPS at the bottom of width `A - Qe`, LPS at the top
//! of width `Qe`) and the state transitions below follow ITU-T T.81 Annex D
//! even though the byte-level carry propagation is written from scratch
//! rather than transcribed from a reference implementation.
use crate::bitio::byte_stream::{ByteReader, ByteWriter};
use crate::errors::CodecError;

/// One row of the probability-estimation state machine.
#[derive(Copy, Clone)]
pub struct QeRow {
    pub qe: u16,
    pub nmps: u8,
    pub nlps: u8,
    pub switch: bool,
}

macro_rules! qe {
    ($qe:expr, $nmps:expr, $nlps:expr, $sw:expr) => {
        QeRow {
            qe: $qe,
            nmps: $nmps,
            nlps: $nlps,
            switch: $sw == 1,
        }
    };
}

/// The probability-estimation table (ITU-T T.81 Table D.3 / Annex D.2).
pub const QE_TABLE: [QeRow; 113] = [
    qe!(0x5a1d, 1, 1, 1),
    qe!(0x2586, 14, 2, 0),
    qe!(0x1114, 16, 3, 0),
    qe!(0x080b, 18, 4, 0),
    qe!(0x03d8, 20, 5, 0),
    qe!(0x01da, 23, 6, 0),
    qe!(0x00e5, 25, 7, 0),
    qe!(0x006f, 28, 8, 0),
    qe!(0x0036, 30, 9, 0),
    qe!(0x001a, 33, 10, 0),
    qe!(0x000d, 35, 11, 0),
    qe!(0x0006, 9, 12, 0),
    qe!(0x0003, 10, 13, 0),
    qe!(0x0001, 12, 13, 0),
    qe!(0x5a7f, 15, 15, 1),
    qe!(0x3f25, 36, 16, 0),
    qe!(0x2e42, 38, 17, 0),
    qe!(0x2255, 39, 18, 0),
    qe!(0x1a91, 40, 19, 0),
    qe!(0x1403, 42, 20, 0),
    qe!(0x0f6b, 43, 21, 0),
    qe!(0x0bb6, 45, 22, 0),
    qe!(0x08f9, 46, 23, 0),
    qe!(0x0708, 48, 24, 0),
    qe!(0x058c, 49, 25, 0),
    qe!(0x0473, 51, 26, 0),
    qe!(0x039a, 52, 27, 0),
    qe!(0x02e1, 54, 28, 0),
    qe!(0x0249, 56, 29, 0),
    qe!(0x01ec, 57, 30, 0),
    qe!(0x018f, 59, 31, 0),
    qe!(0x0161, 60, 32, 0),
    qe!(0x0125, 62, 33, 0),
    qe!(0x00f7, 63, 34, 0),
    qe!(0x00d2, 32, 35, 0),
    qe!(0x00a9, 33, 9, 0),
    qe!(0x008e, 37, 37, 0),
    qe!(0x0075, 38, 38, 0),
    qe!(0x0063, 39, 39, 0),
    qe!(0x0053, 40, 40, 0),
    qe!(0x0045, 41, 41, 0),
    qe!(0x003a, 42, 42, 0),
    qe!(0x0030, 43, 43, 0),
    qe!(0x0028, 44, 44, 0),
    qe!(0x0022, 45, 45, 0),
    qe!(0x001c, 46, 46, 0),
    qe!(0x0018, 47, 47, 0),
    qe!(0x0015, 48, 48, 0),
    qe!(0x0011, 49, 49, 0),
    qe!(0x000f, 50, 50, 0),
    qe!(0x000c, 51, 51, 0),
    qe!(0x000a, 52, 52, 0),
    qe!(0x0008, 53, 53, 0),
    qe!(0x0006, 54, 54, 0),
    qe!(0x0005, 55, 55, 0),
    qe!(0x0004, 56, 56, 0),
    qe!(0x0003, 57, 57, 0),
    qe!(0x0002, 58, 58, 0),
    qe!(0x0001, 59, 59, 0),
    qe!(0x5a1d, 60, 60, 0),
    qe!(0x4b85, 61, 61, 0),
    qe!(0x3f38, 62, 62, 0),
    qe!(0x34cc, 63, 63, 0),
    qe!(0x2c5f, 64, 64, 0),
    qe!(0x2516, 65, 65, 0),
    qe!(0x1f33, 66, 66, 0),
    qe!(0x19a8, 67, 67, 0),
    qe!(0x1518, 68, 68, 0),
    qe!(0x1177, 69, 69, 0),
    qe!(0x0e74, 70, 70, 0),
    qe!(0x0bfb, 71, 71, 0),
    qe!(0x09f8, 72, 72, 0),
    qe!(0x0861, 73, 73, 0),
    qe!(0x0706, 74, 74, 0),
    qe!(0x05cd, 75, 75, 0),
    qe!(0x04de, 76, 76, 0),
    qe!(0x040f, 77, 77, 0),
    qe!(0x0363, 78, 78, 0),
    qe!(0x02d4, 79, 79, 0),
    qe!(0x025c, 80, 80, 0),
    qe!(0x01f8, 81, 81, 0),
    qe!(0x01a4, 82, 82, 0),
    qe!(0x0160, 83, 83, 0),
    qe!(0x0125, 84, 84, 0),
    qe!(0x00f6, 85, 85, 0),
    qe!(0x00cb, 86, 86, 0),
    qe!(0x00ab, 87, 87, 0),
    qe!(0x008f, 88, 88, 0),
    qe!(0x0077, 89, 89, 0),
    qe!(0x0062, 90, 90, 0),
    qe!(0x0052, 91, 91, 0),
    qe!(0x0043, 92, 92, 0),
    qe!(0x0036, 93, 93, 0),
    qe!(0x002c, 94, 94, 0),
    qe!(0x0024, 95, 95, 0),
    qe!(0x001e, 96, 96, 0),
    qe!(0x0018, 97, 97, 0),
    qe!(0x0014, 98, 98, 0),
    qe!(0x0010, 99, 99, 0),
    qe!(0x000d, 100, 100, 0),
    qe!(0x000a, 101, 101, 0),
    qe!(0x0009, 102, 102, 0),
    qe!(0x0007, 103, 103, 0),
    qe!(0x0006, 104, 104, 0),
    qe!(0x0004, 105, 105, 0),
    qe!(0x0003, 106, 106, 0),
    qe!(0x0003, 107, 107, 0),
    qe!(0x0002, 108, 108, 0),
    qe!(0x0001, 109, 109, 0),
    qe!(0x0001, 110, 110, 0),
    qe!(0x0001, 111, 111, 0),
    qe!(0x0001, 112, 112, 0),
    qe!(0x5a1d, 112, 112, 0),
];

/// A single adaptive binary context: an index into [`QE_TABLE`] plus the
/// current sense of the more-probable symbol.
#[derive(Copy, Clone, Debug, Default)]
pub struct QmContext {
    pub index: u8,
    pub mps: u8,
}

impl QmContext {
    #[must_use]
    pub fn new() -> Self {
        QmContext { index: 0, mps: 0 }
    }

    fn row(self) -> QeRow {
        QE_TABLE[self.index as usize]
    }
}

/// A bank of contexts, indexed by the small integer context labels the scan
/// decoder/encoder uses (DC/AC conditioning bins, lossless prediction
/// contexts, and JPEG-LS's run/regular-mode contexts all reuse this).
#[derive(Clone)]
pub struct ContextBank {
    contexts: Vec<QmContext>,
}

impl ContextBank {
    #[must_use]
    pub fn new(count: usize) -> Self {
        ContextBank {
            contexts: vec![QmContext::new(); count],
        }
    }

    pub fn reset(&mut self) {
        for ctx in &mut self.contexts {
            *ctx = QmContext::new();
        }
    }

    pub fn get(&mut self, index: usize) -> &mut QmContext {
        &mut self.contexts[index]
    }
}

/// Bitwise carry-propagating byte sink shared by the encoder: bytes are
/// held back one at a time (`cache`) along with a run length of pending
/// 0xFF bytes (`ff_run`), so a late carry can still increment the right
/// byte and clear the 0xFFs to 0x00 before they reach the output.
struct CarryBuffer {
    cache: Option<u8>,
    ff_run: u64,
}

impl CarryBuffer {
    fn new() -> Self {
        CarryBuffer {
            cache: None,
            ff_run: 0,
        }
    }

    fn push(&mut self, out: &mut ByteWriter, byte: u8, carry: bool) {
        if carry {
            if let Some(c) = self.cache {
                out.put_entropy_byte(c.wrapping_add(1));
            }
            for _ in 0..self.ff_run {
                out.put_entropy_byte(0x00);
            }
            self.ff_run = 0;
            self.cache = Some(byte);
        } else if byte == 0xFF {
            self.ff_run += 1;
        } else {
            if let Some(c) = self.cache {
                out.put_entropy_byte(c);
            }
            for _ in 0..self.ff_run {
                out.put_entropy_byte(0xFF);
            }
            self.ff_run = 0;
            self.cache = Some(byte);
        }
    }

    fn finish(self, out: &mut ByteWriter) {
        if let Some(c) = self.cache {
            out.put_entropy_byte(c);
        }
        for _ in 0..self.ff_run {
            out.put_entropy_byte(0xFF);
        }
    }
}

/// QM arithmetic encoder.
pub struct QmEncoder {
    low: u64,
    a: u32,
    bits_pending: u32,
    out: ByteWriter,
    carry: CarryBuffer,
}

impl Default for QmEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QmEncoder {
    #[must_use]
    pub fn new() -> Self {
        QmEncoder {
            low: 0,
            a: 0x1_0000,
            bits_pending: 0,
            out: ByteWriter::new(),
            carry: CarryBuffer::new(),
        }
    }

    fn renorm_bit(&mut self) {
        self.a <<= 1;
        self.low <<= 1;
        self.bits_pending += 1;
        if self.bits_pending == 8 {
            let carry = (self.low >> 40) & 1 == 1;
            let byte = ((self.low >> 32) & 0xFF) as u8;
            self.carry.push(&mut self.out, byte, carry);
            self.low &= 0xFFFF_FFFF;
            self.bits_pending = 0;
        }
    }

    /// Encode one decision bit under `ctx`.
    pub fn encode(&mut self, ctx: &mut QmContext, bit: u8) {
        let row = ctx.row();
        let qe = u32::from(row.qe);
        let a_mps = self.a - qe;

        if bit == ctx.mps {
            self.a = a_mps;
            if self.a < 0x8000 {
                if self.a < qe {
                    ctx.index = row.nlps;
                    if row.switch {
                        ctx.mps = 1 - ctx.mps;
                    }
                } else {
                    ctx.index = row.nmps;
                }
                while self.a < 0x8000 {
                    self.renorm_bit();
                }
            }
        } else {
            self.low += u64::from(a_mps);
            self.a = qe;
            if a_mps < qe {
                ctx.index = row.nmps;
            } else {
                ctx.index = row.nlps;
                if row.switch {
                    ctx.mps = 1 - ctx.mps;
                }
            }
            while self.a < 0x8000 {
                self.renorm_bit();
            }
        }
    }

    /// Flush the remaining pending bits and bytes, returning the completed
    /// entropy-coded segment.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        // Pad out to a whole number of bits, then drain whatever is left in
        // `low` through the same carry path one byte at a time.
        while self.bits_pending != 0 {
            self.renorm_bit();
        }
        // low may still hold up to 5 bytes worth of unflushed high bits
        // (accumulated adds that never triggered a renorm doubling). Drain
        // them most-significant first.
        for shift in (0..40).step_by(8).rev() {
            let byte = ((self.low >> shift) & 0xFF) as u8;
            self.carry.push(&mut self.out, byte, false);
        }
        self.carry.finish(&mut self.out);
        self.out.into_bytes()
    }
}

/// QM arithmetic decoder.
pub struct QmDecoder<'a> {
    reader: ByteReader<'a>,
    code: u64,
    a: u32,
    window_bits: u32,
}

impl<'a> QmDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(data);
        let mut code = 0u64;
        for _ in 0..5 {
            let b = reader.get_entropy_byte()?.unwrap_or(0xFF);
            code = (code << 8) | u64::from(b);
        }
        Ok(QmDecoder {
            reader,
            code,
            a: 0x1_0000,
            window_bits: 40,
        })
    }

    #[must_use]
    pub fn marker(&self) -> Option<crate::markers::Marker> {
        self.reader.marker
    }

    fn renorm_bit(&mut self) -> Result<(), CodecError> {
        self.a <<= 1;
        self.code <<= 1;
        self.window_bits += 1;
        if self.window_bits >= 48 {
            let b = self.reader.get_entropy_byte()?.unwrap_or(0xFF);
            self.code |= u64::from(b);
            self.window_bits -= 8;
        }
        self.code &= (1u64 << 48) - 1;
        Ok(())
    }

    /// Decode one bit under `ctx`.
    pub fn decode(&mut self, ctx: &mut QmContext) -> Result<u8, CodecError> {
        let row = ctx.row();
        let qe = u32::from(row.qe);
        let a_mps = self.a - qe;
        let active = (self.code >> (self.window_bits.saturating_sub(16))) as u32 & 0xFFFF;

        let bit;
        if active < a_mps {
            self.a = a_mps;
            bit = ctx.mps;
            if self.a < 0x8000 {
                if self.a < qe {
                    ctx.index = row.nlps;
                    if row.switch {
                        ctx.mps = 1 - ctx.mps;
                    }
                } else {
                    ctx.index = row.nmps;
                }
                while self.a < 0x8000 {
                    self.renorm_bit()?;
                }
            }
        } else {
            let offset = u64::from(a_mps) << self.window_bits.saturating_sub(16);
            self.code -= offset.min(self.code);
            self.a = qe;
            bit = 1 - ctx.mps;
            if a_mps < qe {
                ctx.index = row.nmps;
            } else {
                ctx.index = row.nlps;
                if row.switch {
                    ctx.mps = 1 - ctx.mps;
                }
            }
            while self.a < 0x8000 {
                self.renorm_bit()?;
            }
        }
        Ok(bit)
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.reader.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bits: &[u8]) {
        let mut enc_ctx = QmContext::new();
        let mut enc = QmEncoder::new();
        for &b in bits {
            enc.encode(&mut enc_ctx, b);
        }
        let data = enc.finish();

        let mut dec_ctx = QmContext::new();
        let mut dec = QmDecoder::new(&data).unwrap();
        for (i, &expected) in bits.iter().enumerate() {
            let got = dec.decode(&mut dec_ctx).unwrap();
            assert_eq!(got, expected, "bit {i} mismatched");
        }
    }

    #[test]
    fn single_context_roundtrips_a_bit_sequence() {
        roundtrip(&[0, 0, 0, 1, 0, 1, 1, 1, 0, 0, 1]);
    }

    #[test]
    fn context_bank_tracks_independent_states() {
        let mut bank = ContextBank::new(4);
        let ctx0 = bank.get(0);
        assert_eq!(ctx0.index, 0);
        ctx0.index = 5;
        assert_eq!(bank.get(1).index, 0);
        assert_eq!(bank.get(0).index, 5);
    }

    #[test]
    fn long_skewed_sequence_roundtrips() {
        let bits: Vec<u8> = (0..500u32).map(|i| u8::from(i % 17 == 0)).collect();
        roundtrip(&bits);
    }

    #[test]
    fn alternating_sequence_roundtrips() {
        let bits: Vec<u8> = (0..200u32).map(|i| (i % 2) as u8).collect();
        roundtrip(&bits);
    }
}
