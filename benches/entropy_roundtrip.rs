//! Microbenchmarks for the entropy-coder round trip: encode a row of
//! blocks/samples and decode it back, for the three alphabets (sequential
//! Huffman, sequential arithmetic, JPEG-LS).
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use jpeg_core::bitio::byte_stream::ByteReader;
use jpeg_core::bitio::huffman_bits::{BitReader, BitWriter};
use jpeg_core::bitio::ls_bits::{LsBitReader, LsBitWriter};
use jpeg_core::bitio::qm::{QmDecoder, QmEncoder};
use jpeg_core::control::block_buffer::QuantisedBlock;
use jpeg_core::entropy::jpegls::{JpegLsParser, LsParams};
use jpeg_core::entropy::seq_arith::SequentialArithParser;
use jpeg_core::entropy::seq_huffman::SequentialHuffmanParser;
use jpeg_core::huffman::{EncodeTable, HuffmanTable};
use jpeg_core::tables::LsThresholds;

fn dc_tables() -> (HuffmanTable, EncodeTable) {
    let counts: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
    let values: Vec<u8> = (0..12).collect();
    (
        HuffmanTable::new(&counts, values.clone()).unwrap(),
        EncodeTable::new(&counts, &values),
    )
}

fn ac_tables() -> (HuffmanTable, EncodeTable) {
    let mut counts = [0u8; 16];
    counts[1] = 1;
    counts[2] = 1;
    let values = vec![0x00, 0x03];
    (
        HuffmanTable::new(&counts, values.clone()).unwrap(),
        EncodeTable::new(&counts, &values),
    )
}

fn bench_sequential_huffman(c: &mut Criterion) {
    let (dc_dec, dc_enc) = dc_tables();
    let (ac_dec, ac_enc) = ac_tables();
    let mut block = QuantisedBlock::default();
    block.coeffs[0] = 42;
    block.coeffs[1] = 5;

    c.bench_function("sequential-huffman block roundtrip", |b| {
        b.iter(|| {
            let mut writer = SequentialHuffmanParser::new(1, 0, false);
            let mut bw = BitWriter::new();
            writer.write_block(&mut bw, 0, &dc_enc, &ac_enc, black_box(&block));
            let bytes = bw.into_bytes();

            let mut reader = SequentialHuffmanParser::new(1, 0, false);
            let mut br = BitReader::new(ByteReader::new(&bytes));
            let mut out = QuantisedBlock::default();
            reader.parse_block(&mut br, 0, &dc_dec, &ac_dec, &mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_sequential_arithmetic(c: &mut Criterion) {
    let mut block = QuantisedBlock::default();
    block.coeffs[0] = 42;
    block.coeffs[1] = 5;

    c.bench_function("sequential-arithmetic block roundtrip", |b| {
        b.iter(|| {
            let mut writer = SequentialArithParser::new(1, 0);
            let mut enc = QmEncoder::new();
            writer.write_block(&mut enc, 0, black_box(&block));
            let bytes = enc.finish();

            let mut reader = SequentialArithParser::new(1, 0);
            let mut dec = QmDecoder::new(&bytes).unwrap();
            let mut out = QuantisedBlock::default();
            reader.parse_block(&mut dec, 0, &mut out).unwrap();
            black_box(out);
        });
    });
}

fn bench_jpegls_regular(c: &mut Criterion) {
    let params = LsParams::derive(LsThresholds::defaults(255, 0));

    c.bench_function("jpeg-ls regular-mode sample roundtrip", |b| {
        b.iter(|| {
            let mut writer = JpegLsParser::new(1, params, 1);
            let mut bw = LsBitWriter::new();
            let encoded = writer.encode_regular(&mut bw, black_box(100), 102, 99, 101, 103);
            let bytes = bw.finish();

            let mut reader = JpegLsParser::new(1, params, 1);
            let mut br = LsBitReader::new(&bytes);
            let decoded = reader.decode_regular(&mut br, 100, 102, 99, 101).unwrap();
            black_box((encoded, decoded));
        });
    });
}

criterion_group!(benches, bench_sequential_huffman, bench_sequential_arithmetic, bench_jpegls_regular);
criterion_main!(benches);
