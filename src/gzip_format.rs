/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Framing for a single gzip member (RFC 1952). Only the fixed 10 byte header is
//! written, there are never any extra, filename or comment fields.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

pub const GZIP_HEADER_SIZE: usize = 10;
pub const GZIP_TRAILER_SIZE: usize = 8;

const GZIP_ID1: u8 = 0x1f;
const GZIP_ID2: u8 = 0x8b;
const CM_DEFLATE: u8 = 8;

/// extra flags: compressor used maximum compression. Purely informational.
const XFL_BEST: u8 = 2;

const OS_UNKNOWN: u8 = 255;

pub fn write_gzip_header(writer: &mut impl Write, mtime: u32) -> std::io::Result<()> {
    writer.write_u8(GZIP_ID1)?;
    writer.write_u8(GZIP_ID2)?;
    writer.write_u8(CM_DEFLATE)?;
    // FLG: no optional fields
    writer.write_u8(0)?;
    writer.write_u32::<LittleEndian>(mtime)?;
    writer.write_u8(XFL_BEST)?;
    writer.write_u8(OS_UNKNOWN)?;
    Ok(())
}

/// Writes the CRC-32 and the size of the uncompressed data modulo 2^32.
pub fn write_gzip_trailer(
    writer: &mut impl Write,
    crc: u32,
    uncompressed_len: u64,
) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(crc)?;
    writer.write_u32::<LittleEndian>(uncompressed_len as u32)?;
    Ok(())
}

#[test]
fn header_layout() {
    let mut header = Vec::new();
    write_gzip_header(&mut header, 0x6543_2110).unwrap();

    assert_eq!(header.len(), GZIP_HEADER_SIZE);
    assert_eq!(
        header,
        [0x1f, 0x8b, 0x08, 0x00, 0x10, 0x21, 0x43, 0x65, 0x02, 0xff]
    );
}

#[test]
fn trailer_wraps_length() {
    let mut trailer = Vec::new();
    write_gzip_trailer(&mut trailer, 0xcbf4_3926, (1u64 << 32) + 10).unwrap();

    assert_eq!(trailer.len(), GZIP_TRAILER_SIZE);
    assert_eq!(trailer, [0x26, 0x39, 0xf4, 0xcb, 0x0a, 0x00, 0x00, 0x00]);
}
