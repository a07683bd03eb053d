//! Upsamplers symmetric to the downsampler (spec.md §4.5). Three variants:
//! nearest, bilinear (cosited with the pixel grid), and centered (JFIF-style
//! chroma centering). Each holds a three-line window so vertical
//! interpolation always has one line above and below the current position.
use crate::errors::CodecError;
use crate::resample::edge_clamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsamplerKind {
    Nearest,
    Bilinear,
    Centered,
}

pub struct Upsampler {
    kind: UpsamplerKind,
    subx: u8,
    suby: u8,
    /// The three buffered subsampled rows: above, current, below. Edge rows
    /// duplicate at the top/bottom of the image.
    window: [Vec<i32>; 3],
    width: usize,
}

impl Upsampler {
    pub fn new(kind: UpsamplerKind, subx: u8, suby: u8, subsampled_width: usize) -> Result<Upsampler, CodecError> {
        if !(1..=4).contains(&subx) || !(1..=4).contains(&suby) {
            return Err(CodecError::InvalidParameter(format!(
                "upsampling factor ({subx},{suby}) outside [1,4]"
            )));
        }
        Ok(Upsampler {
            kind,
            subx,
            suby,
            window: [
                vec![0; subsampled_width],
                vec![0; subsampled_width],
                vec![0; subsampled_width],
            ],
            width: subsampled_width,
        })
    }

    /// Slide the three-line window forward, duplicating the new row at
    /// image edges as needed.
    pub fn set_window(&mut self, above: &[i32], current: &[i32], below: &[i32]) {
        self.window[0] = above.to_vec();
        self.window[1] = current.to_vec();
        self.window[2] = below.to_vec();
    }

    /// Horizontal tap weights for a fractional position `0..subx`, per
    /// kind, sharing a 1:3 / 3:1 style pattern with the downsampler.
    fn horizontal_sample(&self, row: &[i32], col_frac: usize) -> i32 {
        if self.subx == 1 || self.kind == UpsamplerKind::Nearest {
            let x = col_frac / usize::from(self.subx);
            return row[edge_clamp(x as isize, self.width)];
        }
        let base = col_frac / usize::from(self.subx);
        let frac = col_frac % usize::from(self.subx);
        let left = row[edge_clamp(base as isize, self.width)];
        let right = row[edge_clamp(base as isize + 1, self.width)];
        let (wl, wr) = match self.kind {
            UpsamplerKind::Centered => {
                let num = usize::from(self.subx) - frac;
                (num as i64, frac as i64)
            }
            _ => {
                // Bilinear, cosited at the pixel grid: the tap weight ramps
                // linearly across the subsampling factor.
                let num = 2 * (usize::from(self.subx) - frac) - 1;
                let den = 2 * frac + 1;
                (num.max(1) as i64, den as i64)
            }
        };
        let total = wl + wr;
        (((i64::from(left) * wl) + (i64::from(right) * wr)) / total) as i32
    }

    /// Produce one upsampled output row of `out_width` full-resolution
    /// samples, vertically interpolating between the buffered window rows
    /// first, then filtering horizontally.
    pub fn upsample_row(&self, row_frac: usize, out_width: usize, out: &mut [i32]) {
        let vdenom = usize::from(self.suby).max(1);
        let vfrac = row_frac % vdenom;
        let (top, bottom, wl, wr) = if self.kind == UpsamplerKind::Nearest || self.suby == 1 {
            (1usize, 1usize, 1i64, 0i64)
        } else {
            let num_top = 2 * (vdenom - vfrac) as i64 - 1;
            let num_bot = 2 * vfrac as i64 + 1;
            (0usize, 2usize, num_top.max(1), num_bot)
        };

        let blended: Vec<i32> = self.window[top]
            .iter()
            .zip(&self.window[bottom])
            .map(|(&t, &b)| (((i64::from(t) * wl) + (i64::from(b) * wr)) / (wl + wr)) as i32)
            .collect();

        for (col, slot) in out.iter_mut().enumerate().take(out_width) {
            *slot = self.horizontal_sample(&blended, col);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_upsampler_repeats_samples() {
        let mut up = Upsampler::new(UpsamplerKind::Nearest, 2, 2, 4).unwrap();
        up.set_window(&[10, 20, 30, 40], &[10, 20, 30, 40], &[10, 20, 30, 40]);
        let mut out = [0i32; 8];
        up.upsample_row(0, 8, &mut out);
        assert_eq!(out, [10, 10, 20, 20, 30, 30, 40, 40]);
    }

    #[test]
    fn flat_image_upsamples_to_flat_output() {
        let mut up = Upsampler::new(UpsamplerKind::Bilinear, 2, 2, 4).unwrap();
        up.set_window(&[50; 4], &[50; 4], &[50; 4]);
        let mut out = [0i32; 8];
        up.upsample_row(1, 8, &mut out);
        assert!(out.iter().all(|&v| v == 50));
    }
}
