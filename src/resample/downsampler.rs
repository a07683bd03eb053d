//! Downsamplers instantiated per component from (subx, suby) ∈ [1..4]²
//! (spec.md §4.5). Two variants: a plain box filter (available for both
//! encoding paths) and an interpolating 1-3-3-1 filter, which is
//! unavailable alongside a residual side-channel (spec.md §9 "Resampling
//! choice at encoding").
use crate::errors::CodecError;
use crate::resample::edge_clamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsamplerKind {
    Box,
    Interpolated,
}

/// Aggregates incoming full-resolution rows in a small ring buffer and
/// reduces a `(subx*8) x (suby*8)` box of input samples to one 8x8 output
/// block at a time.
pub struct Downsampler {
    kind: DownsamplerKind,
    subx: u8,
    suby: u8,
    /// Ring of full-resolution input rows buffered so far for the block
    /// row currently being produced.
    rows: Vec<Vec<i32>>,
    image_width: usize,
}

impl Downsampler {
    pub fn new(
        kind: DownsamplerKind,
        subx: u8,
        suby: u8,
        image_width: usize,
        has_residual_channel: bool,
    ) -> Result<Downsampler, CodecError> {
        if !(1..=4).contains(&subx) || !(1..=4).contains(&suby) {
            return Err(CodecError::InvalidParameter(format!(
                "downsampling factor ({subx},{suby}) outside [1,4]"
            )));
        }
        if kind == DownsamplerKind::Interpolated && has_residual_channel {
            // spec.md §9: the interpolating downsampler's one-line delay
            // breaks the residual side-channel's bit-exactness requirement.
            return Err(CodecError::InvalidParameter(
                "interpolated downsampler cannot pair with a residual side-channel".into(),
            ));
        }
        Ok(Downsampler {
            kind,
            subx,
            suby,
            rows: Vec::new(),
            image_width,
        })
    }

    /// Grow the buffered row window to cover `height` full-resolution rows.
    pub fn set_buffered_region(&mut self, rows: Vec<Vec<i32>>) {
        self.rows = rows;
    }

    /// Reduce the `bx`-th output block in the buffered row window into
    /// `out` (8 values), averaging a `(subx*8) x (suby*8)` input box with
    /// edge duplication past the image's right edge (spec.md §4.5).
    pub fn downsample_block(&self, bx: usize, out: &mut [i32; 8]) {
        let box_w = usize::from(self.subx) * 8;
        let box_h = usize::from(self.suby) * 8;
        let taps = match self.kind {
            DownsamplerKind::Box => None,
            DownsamplerKind::Interpolated => Some([1i64, 3, 3, 1]),
        };

        for (col, slot) in out.iter_mut().enumerate() {
            let x0 = bx * box_w + col * usize::from(self.subx);
            let mut acc = 0i64;
            let mut weight = 0i64;
            for (ry, row) in self.rows.iter().enumerate().take(box_h) {
                let row_weight = match taps {
                    None => 1,
                    Some(t) => i64::from(t[ry.min(3) % 4]),
                };
                for sx in 0..usize::from(self.subx) {
                    let x = edge_clamp((x0 + sx) as isize, self.image_width);
                    acc += i64::from(row[x]) * row_weight;
                    weight += row_weight;
                }
            }
            *slot = if weight == 0 { 0 } else { (acc / weight) as i32 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_filter_averages_flat_region() {
        let ds = Downsampler::new(DownsamplerKind::Box, 2, 2, 16, false).unwrap();
        let mut ds = ds;
        ds.set_buffered_region(vec![vec![100; 16]; 16]);
        let mut out = [0i32; 8];
        ds.downsample_block(0, &mut out);
        assert_eq!(out, [100; 8]);
    }

    #[test]
    fn rejects_interpolated_with_residual_channel() {
        let err = Downsampler::new(DownsamplerKind::Interpolated, 2, 2, 16, true).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }

    #[test]
    fn rejects_out_of_range_factor() {
        let err = Downsampler::new(DownsamplerKind::Box, 5, 1, 16, false).unwrap_err();
        assert!(matches!(err, CodecError::InvalidParameter(_)));
    }
}
