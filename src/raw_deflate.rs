/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::gzip_chunk_error::{AddContext, Result};

/// minimum amount of free space we give the compressor for each call
const MIN_OUTPUT_SPACE: usize = 4096;

/// A header-less DEFLATE compression session. Output is appended to a caller
/// supplied buffer so that several sessions can write into separate fragments.
pub struct RawDeflate {
    compress: Compress,
}

impl std::fmt::Debug for RawDeflate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RawDeflate {{ total_in: {}, total_out: {} }}",
            self.compress.total_in(),
            self.compress.total_out()
        )
    }
}

impl RawDeflate {
    pub fn new(level: u32) -> Self {
        RawDeflate {
            compress: Compress::new(Compression::new(level), false),
        }
    }

    /// Compresses the input without forcing any output. The compressor may keep
    /// some or all of the data buffered internally until the next flush.
    pub fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        self.run(input, output, FlushCompress::None)
    }

    /// Ends the session with a full flush. The output ends on a byte boundary
    /// and nothing after it can refer back to data before it, so the fragment
    /// can be concatenated with other independently compressed fragments.
    pub fn full_flush(&mut self, output: &mut Vec<u8>) -> Result<()> {
        self.run(&[], output, FlushCompress::Full)
    }

    /// Finishes the session, writing the final block of the deflate stream.
    pub fn finish(mut self, output: &mut Vec<u8>) -> Result<()> {
        self.run(&[], output, FlushCompress::Finish)
    }

    /// bytes fed into the session so far
    pub fn total_in(&self) -> u64 {
        self.compress.total_in()
    }

    fn run(&mut self, mut input: &[u8], output: &mut Vec<u8>, flush: FlushCompress) -> Result<()> {
        loop {
            if output.capacity() - output.len() < MIN_OUTPUT_SPACE {
                output.reserve(MIN_OUTPUT_SPACE.max(input.len() / 2));
            }

            let before_in = self.compress.total_in();
            let status = self.compress.compress_vec(input, output, flush).context()?;
            let consumed = (self.compress.total_in() - before_in) as usize;
            input = &input[consumed..];

            match status {
                Status::StreamEnd => return Ok(()),
                Status::Ok | Status::BufError => {
                    // if the compressor stopped without filling the output, it has nothing more to give us
                    if input.is_empty() && output.len() < output.capacity() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
