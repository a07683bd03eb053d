//! The shared, per-frame tables object (spec.md §5 "Shared resources"):
//! quantisation tables, Huffman tables, AC arithmetic-conditioning
//! parameters, the restart interval, DNL pending-height state, and the
//! JPEG-LS (Annex C / LSE) threshold set. Read-only across a frame's scans,
//! mutated only when the corresponding marker is parsed.
use crate::errors::CodecError;
use crate::huffman::HuffmanTable;

pub const MAX_QUANT_TABLES: usize = 4;
pub const MAX_HUFFMAN_TABLES: usize = 4;

/// One 64-entry quantisation table (DQT), stored in zig-zag order exactly
/// as transmitted.
#[derive(Clone, Default)]
pub struct QuantTable {
    pub values: [u16; 64],
    pub precision_16bit: bool,
}

/// AC arithmetic-coding conditioning parameters from a DAC segment
/// (spec.md §4.3.2): classification thresholds `l`/`u` and the AC
/// block-end discriminator `kx`.
#[derive(Clone, Copy, Debug)]
pub struct ArithConditioner {
    pub l: u8,
    pub u: u8,
    pub kx: u8,
}

impl Default for ArithConditioner {
    fn default() -> Self {
        // DC defaults L=0, U=1; AC default Kx=5 (spec.md §4.3.2).
        ArithConditioner { l: 0, u: 1, kx: 5 }
    }
}

/// JPEG-LS Annex C threshold set, either defaulted from precision/NEAR
/// (Annex C.2.4.1.1) or overridden by an LSE segment.
#[derive(Clone, Copy, Debug)]
pub struct LsThresholds {
    pub maxval: i32,
    pub near: i32,
    pub t1: i32,
    pub t2: i32,
    pub t3: i32,
    pub reset: i32,
}

impl LsThresholds {
    /// Derive the Annex C.2.4.1.1 defaults for a given `maxval`/`near`.
    #[must_use]
    pub fn defaults(maxval: i32, near: i32) -> LsThresholds {
        let basic_t1 = 3;
        let basic_t2 = 7;
        let basic_t3 = 21;

        let (t1, t2, t3) = if maxval >= 128 {
            let factor = f64::from(maxval).max(1.0) / 255.0;
            let clamp = |base: i32, lo: i32| -> i32 {
                let scaled = (factor * f64::from(base - lo)).round() as i32 + lo;
                scaled.clamp(near + 1, maxval)
            };
            (
                clamp(basic_t1, near + 1),
                clamp(basic_t2, t1_floor(near)),
                clamp(basic_t3, t1_floor(near)),
            )
        } else {
            let factor = 256 / (maxval + 1);
            let t1 = (basic_t1 / factor).max(near + 1).min(maxval);
            let t2 = (basic_t2 / factor).max(t1).min(maxval);
            let t3 = (basic_t3 / factor).max(t2).min(maxval);
            (t1, t2, t3)
        };

        LsThresholds {
            maxval,
            near,
            t1,
            t2,
            t3,
            reset: 64,
        }
    }
}

fn t1_floor(near: i32) -> i32 {
    near + 1
}

/// Per-frame shared tables. Owned by [`crate::frame::Frame`], indexed by
/// the selector bytes carried in SOS.
#[derive(Clone, Default)]
pub struct Tables {
    pub quant: [Option<QuantTable>; MAX_QUANT_TABLES],
    pub dc_huffman: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
    pub ac_huffman: [Option<HuffmanTable>; MAX_HUFFMAN_TABLES],
    pub dc_conditioner: [ArithConditioner; MAX_HUFFMAN_TABLES],
    pub ac_conditioner: [ArithConditioner; MAX_HUFFMAN_TABLES],
    pub restart_interval: u16,
    /// `None` until SOF/DNL commits the final height; `Some(0)` is not a
    /// valid committed value.
    pub pending_dnl: bool,
    pub ls_thresholds: Option<LsThresholds>,
}

impl Tables {
    #[must_use]
    pub fn new() -> Self {
        Tables::default()
    }

    pub fn set_quant(&mut self, index: usize, table: QuantTable) -> Result<(), CodecError> {
        self.slot_mut(index, &self.quant)?;
        self.quant[index] = Some(table);
        Ok(())
    }

    pub fn set_dc_huffman(&mut self, index: usize, table: HuffmanTable) -> Result<(), CodecError> {
        check_index(index, MAX_HUFFMAN_TABLES)?;
        self.dc_huffman[index] = Some(table);
        Ok(())
    }

    pub fn set_ac_huffman(&mut self, index: usize, table: HuffmanTable) -> Result<(), CodecError> {
        check_index(index, MAX_HUFFMAN_TABLES)?;
        self.ac_huffman[index] = Some(table);
        Ok(())
    }

    pub fn dc_table(&self, index: usize) -> Result<&HuffmanTable, CodecError> {
        self.dc_huffman
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| CodecError::ObjectDoesntExist(format!("DC huffman table {index}")))
    }

    pub fn ac_table(&self, index: usize) -> Result<&HuffmanTable, CodecError> {
        self.ac_huffman
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| CodecError::ObjectDoesntExist(format!("AC huffman table {index}")))
    }

    pub fn quant_table(&self, index: usize) -> Result<&QuantTable, CodecError> {
        self.quant
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| CodecError::ObjectDoesntExist(format!("quantisation table {index}")))
    }

    fn slot_mut<T>(&self, index: usize, slice: &[T]) -> Result<(), CodecError> {
        check_index(index, slice.len())
    }
}

fn check_index(index: usize, max: usize) -> Result<(), CodecError> {
    if index >= max {
        Err(CodecError::InvalidParameter(format!(
            "table selector {index} out of range (max {max})"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ls_defaults_match_annex_c_for_8bit() {
        let th = LsThresholds::defaults(255, 0);
        assert_eq!((th.t1, th.t2, th.t3), (3, 7, 21));
    }

    #[test]
    fn rejects_out_of_range_quant_selector() {
        let mut t = Tables::new();
        let err = t.set_quant(9, QuantTable::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }
}
