#![no_main]

use std::io::Read;

use flate2::read::GzDecoder;
use gzip_chunk::GzipChunk;

use libfuzzer_sys::fuzz_target;

// Each operation is encoded as [op, reps, len, bytes...]. Raw data is added to the
// current chunk, to the current source, or the source is embedded. The output must
// always decode to the expected concatenation.
fuzz_target!(|data: &[u8]| {
    let mut chunk = GzipChunk::new();
    let mut source = GzipChunk::new();
    let mut source_content = Vec::new();
    let mut source_sealed = false;
    let mut expected = Vec::new();

    let mut rest = data;
    while rest.len() >= 3 {
        let (op, reps, len) = (rest[0] % 4, u64::from(rest[1] % 8), usize::from(rest[2]));
        rest = &rest[3..];
        let payload = &rest[..len.min(rest.len())];
        rest = &rest[payload.len()..];

        match op {
            0 => {
                chunk.add(payload, reps).unwrap();
                for _ in 0..reps {
                    expected.extend_from_slice(payload);
                }
            }
            1 => {
                // once embedded, more data would give the source a second fragment
                if !source_sealed {
                    source.add(payload, 1).unwrap();
                    source_content.extend_from_slice(payload);
                }
            }
            2 => match chunk.add(&mut source, reps) {
                Ok(()) => {
                    source_sealed |= reps > 0;
                    for _ in 0..reps {
                        expected.extend_from_slice(&source_content);
                    }
                }
                Err(e) => assert!(e.is_composition_error()),
            },
            _ => {
                let gz = chunk.finalize().unwrap();
                let mut decoded = Vec::new();
                GzDecoder::new(&gz[..]).read_to_end(&mut decoded).unwrap();
                assert_eq!(decoded, expected);
            }
        }
    }

    let gz = chunk.finalize().unwrap();
    let mut decoded = Vec::new();
    GzDecoder::new(&gz[..]).read_to_end(&mut decoded).unwrap();
    assert_eq!(decoded, expected);
    assert_eq!(chunk.uncompressed_len(), expected.len() as u64);
});
