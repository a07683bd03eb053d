//! Bit I/O layer (spec.md §4.1): byte-stuffed Huffman bitstream, the QM
//! arithmetic coder, and the bit-stuffed JPEG-LS bitstream.
pub mod byte_stream;
pub mod huffman_bits;
pub mod ls_bits;
pub mod qm;

pub use byte_stream::{ByteReader, ByteWriter};
pub use huffman_bits::{BitReader, BitWriter};
pub use ls_bits::{LsBitReader, LsBitWriter};
pub use qm::{QmContext, QmDecoder, QmEncoder};
