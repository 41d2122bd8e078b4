/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! CRC-32 arithmetic over GF(2) that allows the CRC of a concatenation A‖B to be
//! calculated from CRC(A), CRC(B) and the length of B, without touching the data.
//!
//! Polynomials are kept in the reflected bit order used by the gzip CRC, so bit 31
//! holds the coefficient of x^0 and bit 0 holds the coefficient of x^31.

/// reflected CRC-32 polynomial (gzip, zlib, PNG)
const POLY: u32 = 0xedb8_8320;

/// x^0 in reflected representation
const X0: u32 = 1 << 31;

/// X2N_TABLE[n] = x^(2^n) mod p(x)
const X2N_TABLE: [u32; 32] = build_x2n_table();

/// Multiplies a(x) by b(x) modulo p(x).
const fn multmodp(a: u32, mut b: u32) -> u32 {
    let mut m = X0;
    let mut p = 0;
    while m != 0 {
        if a & m != 0 {
            p ^= b;
        }
        m >>= 1;
        // b(x) * x mod p(x)
        b = if b & 1 != 0 { (b >> 1) ^ POLY } else { b >> 1 };
    }
    p
}

const fn build_x2n_table() -> [u32; 32] {
    let mut table = [0u32; 32];
    // x^1
    let mut p = X0 >> 1;
    let mut n = 0;
    while n < table.len() {
        table[n] = p;
        p = multmodp(p, p);
        n += 1;
    }
    table
}

/// Returns x^(n * 2^k) mod p(x) using one multiplication per set bit of n.
///
/// The order of x modulo p(x) divides 2^32 - 1, so x^(2^32) == x^(2^0) and the table
/// index can wrap around.
fn x2nmodp(mut n: u64, mut k: usize) -> u32 {
    let mut p = X0;
    while n != 0 {
        if n & 1 != 0 {
            p = multmodp(X2N_TABLE[k & 31], p);
        }
        n >>= 1;
        k += 1;
    }
    p
}

/// CRC-32 of a buffer.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Precomputes the operator that advances a CRC over `len2` zero bytes. Use
/// with [`crc32_combine_apply`] when the same length is combined many times.
pub fn crc32_combine_op(len2: u64) -> u32 {
    // each byte is 8 = 2^3 bits
    x2nmodp(len2, 3)
}

/// Combines two CRCs with an operator returned by [`crc32_combine_op`].
#[inline]
pub fn crc32_combine_apply(crc1: u32, crc2: u32, op: u32) -> u32 {
    multmodp(op, crc1) ^ crc2
}

/// Given `crc1` = CRC-32(A) and `crc2` = CRC-32(B), returns CRC-32(A‖B), where `len2`
/// is the length of B in bytes. Runs in O(log len2).
pub fn crc32_combine(crc1: u32, crc2: u32, len2: u64) -> u32 {
    crc32_combine_apply(crc1, crc2, crc32_combine_op(len2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_of_parts(parts: &[&[u8]]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for p in parts {
            hasher.update(p);
        }
        hasher.finalize()
    }

    #[test]
    fn table_starts_with_powers_of_x() {
        // x^1, x^2, x^4, x^8
        assert_eq!(X2N_TABLE[0], 1 << 30);
        assert_eq!(X2N_TABLE[1], 1 << 29);
        assert_eq!(X2N_TABLE[2], 1 << 27);
        assert_eq!(X2N_TABLE[3], 1 << 23);

        // x^32 is the first power that needs a reduction, which gives back the polynomial
        assert_eq!(X2N_TABLE[5], POLY);
    }

    #[test]
    fn multiply_by_one_is_identity() {
        for v in [0u32, 1, 0xdead_beef, POLY, u32::MAX] {
            assert_eq!(multmodp(X0, v), v);
            assert_eq!(multmodp(v, X0), v);
        }
    }

    #[test]
    fn combine_matches_direct_crc() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 7 + i / 13) as u8).collect();

        for split in [0, 1, 2, 3, 7, 8, 100, 255, 256, 1024, 4095, 4999, 5000] {
            let (a, b) = data.split_at(split);
            let combined = crc32_combine(crc32(a), crc32(b), b.len() as u64);
            assert_eq!(combined, crc32(&data), "split at {}", split);
        }
    }

    #[test]
    fn combine_with_empty_sides() {
        let crc = crc32(b"hello world");

        // empty B leaves A unchanged
        assert_eq!(crc32_combine(crc, 0, 0), crc);

        // empty A is CRC 0, which combines to just B
        assert_eq!(crc32_combine(0, crc, 11), crc);
    }

    #[test]
    fn combine_repeated_block() {
        let block = b"++?????++ Out of Cheese Error. Redo From Start.<br/>\n";
        let block_crc = crc32(block);
        let op = crc32_combine_op(block.len() as u64);

        let mut crc = 0;
        let mut hasher = crc32fast::Hasher::new();
        for _ in 0..1000 {
            crc = crc32_combine_apply(crc, block_crc, op);
            hasher.update(block);
        }
        assert_eq!(crc, hasher.finalize());
    }

    #[test]
    fn combine_large_length() {
        // 3 MiB of a repeated pattern combined in one step with its own length
        let chunk = vec![0x5au8; 3 * 1024 * 1024];
        let crc_chunk = crc32(&chunk);
        let crc_prefix = crc32(b"prefix");

        assert_eq!(
            crc32_combine(crc_prefix, crc_chunk, chunk.len() as u64),
            crc_of_parts(&[&b"prefix"[..], &chunk[..]])
        );
    }

    #[test]
    fn combine_is_associative() {
        let a = b"first part ";
        let b = b"second part ";
        let c = b"and the third";

        let (ca, cb, cc) = (crc32(a), crc32(b), crc32(c));

        let left = crc32_combine(crc32_combine(ca, cb, b.len() as u64), cc, c.len() as u64);
        let right = crc32_combine(
            ca,
            crc32_combine(cb, cc, c.len() as u64),
            (b.len() + c.len()) as u64,
        );

        assert_eq!(left, right);
        assert_eq!(left, crc_of_parts(&[&a[..], &b[..], &c[..]]));
    }

    #[test]
    fn operator_wraps_past_table() {
        // lengths above 2^29 bytes use table entries beyond index 31
        let op = crc32_combine_op(1u64 << 40);
        let mut expected = X0;
        for _ in 0..8 {
            expected = multmodp(expected, crc32_combine_op(1u64 << 37));
        }
        assert_eq!(op, expected);
    }
}
