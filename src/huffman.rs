//! Huffman table construction, for both decode (fast lookup tables, in the
//! teacher's style) and encode (canonical code assignment + a measuring
//! pass that can derive an optimal table from symbol frequencies).
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use crate::errors::CodecError;

/// Number of bits looked up at once by the decoder's fast path.
pub(crate) const FAST_BITS: usize = 9;

/// A decode-direction Huffman table, built from the 16 code-length counts
/// and the symbol list exactly as they appear in a DHT segment.
#[derive(Clone)]
pub struct HuffmanTable {
    pub(crate) fast: [u8; 1 << FAST_BITS],
    pub(crate) code: [u16; 256],
    pub(crate) values: Vec<u8>,
    pub(crate) size: [u8; 256],
    pub(crate) maxcode: [u32; 18],
    pub(crate) delta: [i32; 17],
    pub(crate) num_codes: usize,
}

impl Default for HuffmanTable {
    fn default() -> Self {
        HuffmanTable {
            fast: [255; 1 << FAST_BITS],
            code: [0; 256],
            values: Vec::new(),
            size: [0; 256],
            maxcode: [0; 18],
            delta: [0; 17],
            num_codes: 0,
        }
    }
}

impl HuffmanTable {
    /// Build a decode table from the 16 code-length counts and the symbols,
    /// in the order a DHT segment lists them (spec.md §6 "Marker-segment
    /// syntax").
    pub fn new(counts: &[u8; 16], values: Vec<u8>) -> Result<HuffmanTable, CodecError> {
        let total: u32 = counts.iter().map(|&c| u32::from(c)).sum();
        if total as usize != values.len() || total > 256 {
            return Err(CodecError::MalformedStream(format!(
                "huffman table declares {total} codes but supplied {} symbols",
                values.len()
            )));
        }

        let mut table = HuffmanTable::default();
        table.build(counts);
        table.num_codes = total as usize;
        table.values = values;
        Ok(table)
    }

    fn build(&mut self, counts: &[u8; 16]) {
        let mut code = 0_u32;
        let mut k = 0usize;

        for (i, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                self.size[k] = (i + 1) as u8;
                k += 1;
            }
        }
        self.size[k] = 0;

        let mut k2 = 0usize;
        for j in 1..=16usize {
            self.delta[j] = k2 as i32 - code as i32;
            if usize::from(self.size[k2]) == j {
                while usize::from(self.size[k2]) == j {
                    self.code[k2] = code as u16;
                    code += 1;
                    k2 += 1;
                }
            }
            self.maxcode[j] = code << (16 - j);
            code <<= 1;
        }
        self.maxcode[16] = 0xFFFF_FFFF;

        for i in 0..k {
            let s = usize::from(self.size[i]);
            if s != 0 && s <= FAST_BITS {
                let c = u32::from(self.code[i]) << (FAST_BITS - s);
                let m = 1u32 << (FAST_BITS - s);
                for j in 0..m {
                    self.fast[(c + j) as usize] = i as u8;
                }
            }
        }
    }

    /// Look up the code length and symbol for a `lookahead`-bit window
    /// already peeked from the bitstream (used by [`crate::bitio::huffman_bits`]).
    #[must_use]
    pub(crate) fn lookup_fast(&self, window: u32) -> Option<(u8, u8)> {
        let idx = self.fast[(window as usize) & ((1 << FAST_BITS) - 1)];
        if idx == 255 {
            return None;
        }
        Some((self.size[idx as usize], self.values[idx as usize]))
    }
}

/// Per-symbol code table for encoding, indexed by symbol value.
#[derive(Clone)]
pub struct EncodeTable {
    /// `(code, length)` for every possible symbol, 0..256.
    pub codes: [(u16, u8); 256],
}

impl EncodeTable {
    /// Build the canonical Huffman code assignment used for encoding
    /// (JPEG Annex C, `Generate_code_table`).
    #[must_use]
    pub fn new(counts: &[u8; 16], values: &[u8]) -> EncodeTable {
        let mut codes = [(0u16, 0u8); 256];
        let mut code = 0u16;
        let mut k = 0usize;
        for (len_idx, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                let symbol = values[k];
                codes[symbol as usize] = (code, (len_idx + 1) as u8);
                code += 1;
                k += 1;
            }
            code <<= 1;
        }
        EncodeTable { codes }
    }

    /// Derive `(counts, values)` (a DHT-ready code-length histogram) from a
    /// table of raw symbol frequencies, limiting code length to 16 bits via
    /// the standard overflow-redistribution procedure (Annex K.3).
    #[must_use]
    pub fn from_frequencies(freq: &[u32; 257]) -> ([u8; 16], Vec<u8>) {
        // freq[256] is a sentinel guaranteeing at least one code exists.
        let mut freq = *freq;
        freq[256] = 1;

        let mut code_size = [0i32; 257];
        let mut others: [i32; 257] = [-1; 257];

        loop {
            // find smallest non-zero freq
            let mut v1 = -1i32;
            let mut v2 = -1i32;
            for i in 0..257 {
                if freq[i] != 0 && (v1 == -1 || freq[i] <= freq[v1 as usize]) {
                    v2 = v1;
                    v1 = i as i32;
                } else if freq[i] != 0 && (v2 == -1 || freq[i] <= freq[v2 as usize]) {
                    v2 = i as i32;
                }
            }
            if v2 == -1 {
                break;
            }
            freq[v1 as usize] += freq[v2 as usize];
            freq[v2 as usize] = 0;

            code_size[v1 as usize] += 1;
            while others[v1 as usize] != -1 {
                v1 = others[v1 as usize];
                code_size[v1 as usize] += 1;
            }
            others[v1 as usize] = v2;

            code_size[v2 as usize] += 1;
            while others[v2 as usize] != -1 {
                v2 = others[v2 as usize];
                code_size[v2 as usize] += 1;
            }
        }

        let mut bits = [0i32; 33];
        for &size in &code_size[..256] {
            if size > 0 {
                bits[size as usize] += 1;
            }
        }

        // limit to 16 bits (Annex K.3 "adjust_diff")
        let mut i = 32usize;
        while i > 16 {
            while bits[i] > 0 {
                let mut j = i - 2;
                while bits[j] == 0 {
                    j -= 1;
                }
                bits[i] -= 2;
                bits[i - 1] += 1;
                bits[j + 1] += 2;
                bits[j] -= 1;
            }
            i -= 1;
        }
        while bits[i] == 0 {
            i -= 1;
        }
        bits[i] -= 1;

        let mut counts = [0u8; 16];
        for (len, &c) in bits[1..=16].iter().enumerate() {
            counts[len] = c as u8;
        }

        // assign symbols in order of code size then symbol value
        let mut values = Vec::with_capacity(256);
        for len in 1..=16usize {
            for sym in 0..257usize {
                if code_size[sym] == len as i32 {
                    values.push(sym as u8);
                }
            }
        }

        (counts, values)
    }
}

/// Frequency counter used by `EntropyParser::start_measure` (spec.md §4.2);
/// a Huffman scan can be run once in measuring mode to collect symbol
/// statistics before a second pass emits the final, optimal table.
#[derive(Clone)]
pub struct SymbolStats {
    pub freq: [u32; 257],
}

impl Default for SymbolStats {
    fn default() -> Self {
        SymbolStats { freq: [0; 257] }
    }
}

impl SymbolStats {
    pub fn record(&mut self, symbol: u8) {
        self.freq[symbol as usize] += 1;
    }

    #[must_use]
    pub fn into_table(self) -> ([u8; 16], Vec<u8>) {
        EncodeTable::from_frequencies(&self.freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_symbol_table_roundtrips() {
        let mut counts = [0u8; 16];
        counts[0] = 1;
        let values = vec![5u8];
        let table = HuffmanTable::new(&counts, values.clone()).unwrap();
        assert_eq!(table.values, values);

        let enc = EncodeTable::new(&counts, &values);
        assert_eq!(enc.codes[5], (0, 1));
    }

    #[test]
    fn rejects_mismatched_symbol_count() {
        let mut counts = [0u8; 16];
        counts[0] = 2;
        let err = HuffmanTable::new(&counts, vec![1]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedStream(_)));
    }

    #[test]
    fn frequency_table_produces_valid_code_lengths() {
        let mut freq = [0u32; 257];
        freq[0] = 100;
        freq[1] = 50;
        freq[2] = 1;
        let (counts, values) = EncodeTable::from_frequencies(&freq);
        let total: u32 = counts.iter().map(|&c| u32::from(c)).sum();
        assert_eq!(total as usize, values.len());
        assert!(total >= 3);
    }
}
