//! Small shared utilities used across the crate: the zig-zag permutation,
//! an aligned-storage wrapper for quantised blocks, and primitive big-endian
//! reads used by marker-segment parsing.
#![allow(dead_code)]

use std::io::Read;

use crate::errors::CodecError;

/// Natural (raster) position of the k-th zig-zag-ordered coefficient.
///
/// JPEG entropy coders always code coefficients in zig-zag order; buffer
/// control stores blocks in natural order so the DCT/IDCT external
/// collaborator never has to know about the permutation.
#[rustfmt::skip]
pub const UN_ZIGZAG: [usize; 64] = [
    0,  1,  8,  16, 9,  2,  3, 10,
    17, 24, 32, 25, 18, 11, 4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13, 6,  7,  14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

/// Inverse of [`UN_ZIGZAG`]: zig-zag index of the k-th natural-order coefficient.
#[rustfmt::skip]
pub const ZIGZAG: [usize; 64] = [
    0,  1,  5,  6,  14, 15, 27, 28,
    2,  4,  7,  13, 16, 26, 29, 42,
    3,  8,  12, 17, 25, 30, 41, 43,
    9,  11, 18, 24, 31, 40, 44, 53,
    10, 19, 23, 32, 39, 45, 52, 54,
    20, 22, 33, 38, 46, 51, 55, 60,
    21, 34, 37, 47, 50, 56, 59, 61,
    35, 36, 48, 49, 57, 58, 62, 63,
];

/// Align data to a 32 byte boundary, matching the alignment requirements of
/// the external (out-of-scope) IDCT/quantiser collaborator.
#[repr(align(32))]
#[derive(Clone)]
pub struct Aligned32<T: ?Sized>(pub T);

impl<T> Default for Aligned32<T>
where
    T: Default,
{
    fn default() -> Self {
        Aligned32(T::default())
    }
}

/// Read a single byte, returning [`CodecError::UnexpectedEof`] at end of stream.
#[inline]
pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8, CodecError> {
    let mut tmp = [0u8; 1];
    reader
        .read_exact(&mut tmp)
        .map_err(|_| CodecError::UnexpectedEof("expected one more byte".to_string()))?;
    Ok(tmp[0])
}

/// Read a big-endian `u16` (every multi-byte field in a JPEG marker is
/// big-endian).
#[inline]
pub fn read_u16_be<R: Read>(reader: &mut R) -> Result<u16, CodecError> {
    let mut tmp = [0u8; 2];
    reader
        .read_exact(&mut tmp)
        .map_err(|_| CodecError::UnexpectedEof("expected 2 more bytes".to_string()))?;
    Ok(u16::from_be_bytes(tmp))
}

/// Write a big-endian `u16`.
#[inline]
pub fn write_u16_be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Clamp `value` into `[lo, hi]`, used throughout JPEG-LS reconstruction
/// (spec.md §4.3.8 step 6) and predictive-lossless sample recovery.
#[inline]
pub const fn clamp_i32(value: i32, lo: i32, hi: i32) -> i32 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}
