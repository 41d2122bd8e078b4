/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::Read;

use flate2::read::GzDecoder;
use gzip_chunk::{
    ExitCode, GZIP_HEADER_SIZE, GZIP_TRAILER_SIZE, GzipChunk, GzipChunkConfig, crc32_combine,
};

const BOMB_LINE: &str = "++?????++ Out of Cheese Error. Redo From Start.<br/>\n";

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(data);
    let mut output = Vec::new();
    decoder.read_to_end(&mut output).unwrap();
    output
}

/// returns the crc and length stored in the gzip trailer
fn read_trailer(data: &[u8]) -> (u32, u32) {
    let t = &data[data.len() - GZIP_TRAILER_SIZE..];
    (
        u32::from_le_bytes(t[0..4].try_into().unwrap()),
        u32::from_le_bytes(t[4..8].try_into().unwrap()),
    )
}

/// decodes just the DEFLATE body with a different inflater than the one used by GzDecoder
fn inflate_body(data: &[u8]) -> Vec<u8> {
    miniz_oxide::inflate::decompress_to_vec(&data[GZIP_HEADER_SIZE..data.len() - GZIP_TRAILER_SIZE])
        .unwrap()
}

/// handy function to compare two arrays, and print the first mismatch. Useful for debugging.
#[track_caller]
fn assert_eq_array<T: PartialEq + std::fmt::Debug>(a: &[T], b: &[T]) {
    use core::panic;

    if a.len() != b.len() {
        for i in 0..std::cmp::min(a.len(), b.len()) {
            assert_eq!(
                a[i],
                b[i],
                "length mismatch {},{} and first mismatch at offset {}",
                a.len(),
                b.len(),
                i
            );
        }
        panic!(
            "length mismatch {} and {}, but common prefix identical",
            a.len(),
            b.len()
        );
    } else {
        for i in 0..a.len() {
            assert_eq!(
                a[i],
                b[i],
                "length identical {}, but first mismatch at offset {}",
                a.len(),
                i
            );
        }
    }
}

/// checks the stream against the expected content with two decoders and the trailer
fn verify_stream(gz: &[u8], expected: &[u8]) {
    assert_eq_array(&gunzip(gz), expected);
    assert_eq_array(&inflate_body(gz), expected);

    let (crc, len) = read_trailer(gz);
    assert_eq!(crc, crc32fast::hash(expected));
    assert_eq!(len, expected.len() as u32);
}

#[test]
fn page_with_embedded_bomb() {
    let mut bomb = GzipChunk::with_initial_data(BOMB_LINE, 10_000, 0).unwrap();

    let mut page = GzipChunk::with_config(GzipChunkConfig {
        timestamp: 1_600_000_000,
        ..GzipChunkConfig::default()
    })
    .unwrap();

    page.add("2024-01-01 00:00:00\n", 1).unwrap();
    page.add(&mut bomb, 1).unwrap();
    page.add(b"That was the time", 1).unwrap();
    page.add(&mut bomb, 1).unwrap();
    page.add(b"That was the time that was", 1).unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(b"2024-01-01 00:00:00\n");
    expected.extend_from_slice(BOMB_LINE.repeat(10_000).as_bytes());
    expected.extend_from_slice(b"That was the time");
    expected.extend_from_slice(BOMB_LINE.repeat(10_000).as_bytes());
    expected.extend_from_slice(b"That was the time that was");

    let gz = page.finalize().unwrap();
    verify_stream(&gz, &expected);

    // text, bomb, text, bomb, text
    assert_eq!(page.fragment_count(), 5);
    assert_eq!(bomb.fragment_count(), 1);

    // the bomb is much smaller compressed than expanded
    assert!(gz.len() * 100 < expected.len());
}

#[test]
fn mixed_sequence_round_trip() {
    let mut sources: Vec<GzipChunk> = (0..3)
        .map(|i| GzipChunk::with_initial_data(format!("<source {}>", i), i + 1, 0).unwrap())
        .collect();

    let mut chunk = GzipChunk::new();
    let mut expected = Vec::new();

    for round in 0..20u64 {
        let text = format!("round {} ", round);
        let reps = round % 4;
        chunk.add(text.as_str(), reps).unwrap();
        expected.extend_from_slice(text.repeat(reps as usize).as_bytes());

        let index = (round % 3) as usize;
        let embed_reps = (round + 1) % 3;
        chunk.add(&mut sources[index], embed_reps).unwrap();

        let source_text = format!("<source {}>", index).repeat(index + 1);
        expected.extend_from_slice(source_text.repeat(embed_reps as usize).as_bytes());

        // snapshots along the way must all be valid
        if round % 5 == 0 {
            verify_stream(&chunk.finalize().unwrap(), &expected);
        }
    }

    verify_stream(&chunk.finalize().unwrap(), &expected);
    assert_eq!(chunk.uncompressed_len(), expected.len() as u64);
}

#[test]
fn crc_matches_ground_truth() {
    let a_text = b"The quick brown fox jumps over the lazy dog. ";
    let b_text: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

    let mut a = GzipChunk::with_initial_data(a_text, 3, 0).unwrap();
    let mut b = GzipChunk::with_initial_data(&b_text, 2, 0).unwrap();

    let a_crc = a.crc32();
    let b_crc = b.crc32();
    let b_len = b.uncompressed_len();

    a.add(&mut b, 1).unwrap();

    let gz = a.finalize().unwrap();
    let plain = gunzip(&gz);

    let (crc, _) = read_trailer(&gz);
    assert_eq!(crc, crc32fast::hash(&plain));
    assert_eq!(crc, crc32_combine(a_crc, b_crc, b_len));
    assert_eq!(plain.len(), a_text.len() * 3 + b_text.len() * 2);
}

#[test]
fn embedding_rejection() {
    let mut multi = GzipChunk::with_initial_data("one", 1, 0).unwrap();
    let mut single = GzipChunk::with_initial_data("two", 1, 0).unwrap();
    multi.add(&mut single, 1).unwrap();
    assert_eq!(multi.fragment_count(), 2);
    multi.add("tail", 1).unwrap();
    assert_eq!(multi.fragment_count(), 3);

    let mut dest = GzipChunk::new();

    // open session on the last fragment
    let e = dest.add(&mut multi, 1).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::MultiFragmentChunk);

    // everything flushed
    multi.finalize().unwrap();
    let e = dest.add(&mut multi, 3).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::MultiFragmentChunk);

    // and the rejected calls did not touch the destination
    assert_eq!(dest.fragment_count(), 0);
    verify_stream(&dest.finalize().unwrap(), b"");
}

#[test]
fn finalize_repeatable_and_not_terminal() {
    let mut chunk = GzipChunk::with_initial_data("abc", 2, 42).unwrap();

    let first = chunk.finalize().unwrap();
    assert_eq!(first, chunk.finalize().unwrap());
    verify_stream(&first, b"abcabc");

    chunk.add("def", 1).unwrap();
    let second = chunk.finalize().unwrap();
    verify_stream(&second, b"abcabcdef");

    let mut written = Vec::new();
    chunk.finalize_to(&mut written).unwrap();
    assert_eq!(written, second);
}

#[test]
fn embedded_chunk_can_be_embedded_again_after_finalize() {
    let mut source = GzipChunk::with_initial_data("payload", 1, 0).unwrap();

    // finalize flushes the source but keeps it at one fragment
    verify_stream(&source.finalize().unwrap(), b"payload");
    assert_eq!(source.fragment_count(), 1);

    let mut dest = GzipChunk::new();
    dest.add(&mut source, 2).unwrap();
    dest.add("!", 1).unwrap();
    verify_stream(&dest.finalize().unwrap(), b"payloadpayload!");
}

#[test]
fn embedding_cost_independent_of_payload_size() {
    const EMBED_COUNT: u64 = 500;

    let mut sizes = Vec::new();
    for reps in [10u64, 100_000] {
        let sealed = GzipChunk::with_initial_data(BOMB_LINE, reps, 0)
            .unwrap()
            .seal()
            .unwrap();

        let mut page = GzipChunk::new();
        page.add(&sealed, EMBED_COUNT).unwrap();

        // one fragment per embedded copy, whatever the payload expands to
        assert_eq!(page.fragment_count(), EMBED_COUNT as usize);

        let gz = page.finalize().unwrap();
        let framing = gz.len() - EMBED_COUNT as usize * sealed.compressed_data().len();
        sizes.push(framing);

        let (crc, len) = read_trailer(&gz);
        assert_eq!(
            len,
            (EMBED_COUNT * reps * BOMB_LINE.len() as u64) as u32
        );

        let mut expected_crc = 0;
        for _ in 0..EMBED_COUNT {
            expected_crc = crc32_combine(expected_crc, sealed.crc32(), sealed.uncompressed_len());
        }
        assert_eq!(crc, expected_crc);
    }

    // the output is just the copies plus the same framing in both cases
    assert_eq!(sizes[0], sizes[1]);
}

#[test]
fn length_wraps_modulo_2_32() {
    // 2^20 bytes of payload embedded 2^12 + 1 times is 2^32 + 2^20 bytes
    let sealed = GzipChunk::with_initial_data(vec![b'z'; 1 << 20], 1, 0)
        .unwrap()
        .seal()
        .unwrap();

    let mut chunk = GzipChunk::new();
    chunk.add(&sealed, (1 << 12) + 1).unwrap();
    assert_eq!(chunk.uncompressed_len(), (1u64 << 32) + (1 << 20));

    let gz = chunk.finalize().unwrap();
    let (_, len) = read_trailer(&gz);
    assert_eq!(len, 1 << 20);
}
