//! Per-component metadata carried in a frame header (spec.md §3 "Component").
use crate::errors::CodecError;

pub const MAX_COMPONENTS: usize = 4;

/// Identifies one component slot inside a frame.
#[derive(Debug, Clone)]
pub struct Component {
    /// 8-bit component label as it appeared in the SOF/SOS payload.
    pub id: u8,
    /// Positional index of this component inside the frame's component list.
    pub index: usize,
    /// Horizontal subsampling factor, 1..=4.
    pub h: u8,
    /// Vertical subsampling factor, 1..=4.
    pub v: u8,
    /// Quantisation-table selector (DCT processes).
    pub quant_table: u8,
    /// Mapping-table selector (JPEG-LS); unused by DCT/lossless processes.
    pub mapping_table: u8,
    /// DC entropy-table selector, set per scan by SOS.
    pub dc_table: u8,
    /// AC entropy-table selector, set per scan by SOS.
    pub ac_table: u8,
    /// DC predictor carried across MCUs within a scan, reset at restart.
    pub dc_pred: i32,
    /// Width in pixels of this component's sample grid (after subsampling).
    pub width: usize,
    /// Height in pixels of this component's sample grid (after subsampling).
    pub height: usize,
    /// Width of one MCU cell for this component, in 8-pixel blocks (DCT) or
    /// in samples (lossless/JPEG-LS): `h` for DCT, 1 otherwise.
    pub mcu_w: usize,
    /// Height of one MCU cell for this component, matching `mcu_w`.
    pub mcu_h: usize,
}

impl Component {
    /// Construct from the three SOF bytes `(id, h<<4|v, quant_table)`.
    pub fn from_sof_bytes(bytes: [u8; 3], index: usize) -> Result<Component, CodecError> {
        let id = bytes[0];
        let h = bytes[1] >> 4;
        let v = bytes[1] & 0x0F;
        let quant_table = bytes[2];

        if !(1..=4).contains(&h) || !(1..=4).contains(&v) {
            return Err(CodecError::InvalidParameter(format!(
                "component {id} has subsampling ({h},{v}) outside [1,4]"
            )));
        }
        if usize::from(quant_table) >= MAX_COMPONENTS {
            return Err(CodecError::InvalidParameter(format!(
                "component {id} references out-of-range quantisation table {quant_table}"
            )));
        }

        Ok(Component {
            id,
            index,
            h,
            v,
            quant_table,
            mapping_table: 0,
            dc_table: 0,
            ac_table: 0,
            dc_pred: 0,
            width: 0,
            height: 0,
            mcu_w: usize::from(h),
            mcu_h: usize::from(v),
        })
    }

    /// Reset DC predictor; called on scan start and on every restart.
    pub fn reset_dc_predictor(&mut self) {
        self.dc_pred = 0;
    }

    /// Number of 8x8 blocks wide a quantised row must be for this component
    /// given the frame's overall pixel width and maximum sampling factors
    /// (spec.md §3 invariant).
    #[must_use]
    pub fn blocks_per_mcu_row(&self, frame_width: usize, h_max: usize) -> usize {
        let mcu_width_px = 8 * h_max / usize::from(self.h);
        frame_width.div_ceil(mcu_width_px) * usize::from(self.h)
    }
}

/// How a component's samples are packed relative to the frame's maximum
/// sampling factors; purely descriptive, used by the resampling layer to
/// pick a concrete downsample/upsample routine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SubSampling {
    pub h: u8,
    pub v: u8,
}

impl SubSampling {
    #[must_use]
    pub const fn is_full_resolution(self) -> bool {
        self.h == 1 && self.v == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_sampling() {
        let err = Component::from_sof_bytes([1, 0x00, 0], 0).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }

    #[test]
    fn blocks_per_mcu_row_matches_invariant() {
        // 4:2:0 chroma, max H=2, component H=1: width 17px -> ceil(17/16)=2 mcus * 1 block
        let c = Component::from_sof_bytes([2, 0x11, 0], 1).unwrap();
        assert_eq!(c.blocks_per_mcu_row(17, 2), 2);
    }
}
