/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Builds a gzip stream out of a list of independently compressed DEFLATE fragments.
//!
//! Raw data is compressed into the last fragment by an open compression session. When
//! another chunk is embedded, the open session is ended with a full flush, and the
//! compressed bytes of the embedded chunk are appended as new fragments without being
//! decompressed. The CRC-32 and length of the logical content are tracked by combining
//! the CRCs of the pieces, so nothing ever has to be recompressed or rehashed.

use std::{io::Write, sync::Arc};

use crate::{
    crc32_combine::{crc32, crc32_combine_apply, crc32_combine_op},
    gzip_chunk_error::{err_exit_code, AddContext, ExitCode, Result},
    gzip_format::{write_gzip_header, write_gzip_trailer, GZIP_HEADER_SIZE, GZIP_TRAILER_SIZE},
    raw_deflate::RawDeflate,
};

/// Configures how a GzipChunk compresses its raw data and what it writes into the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipChunkConfig {
    /// DEFLATE compression level, 0 (store) to 9 (best)
    pub compression_level: u32,

    /// modification time written into the gzip header, 0 if unknown
    pub timestamp: u32,
}

impl Default for GzipChunkConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            timestamp: 0,
        }
    }
}

impl GzipChunkConfig {
    fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return err_exit_code(
                ExitCode::InvalidParameter,
                &format!(
                    "compression level {} is out of range 0..=9",
                    self.compression_level
                ),
            );
        }
        Ok(())
    }
}

/// A compression session that is still accepting data, along with the fragment
/// it is writing into. This is always the last fragment of the chunk.
#[derive(Debug)]
struct OpenSession {
    deflate: RawDeflate,
    fragment: Vec<u8>,
}

/// Immutable snapshot of a chunk that consists of a single flushed fragment.
///
/// This is what actually gets embedded into other chunks. Since it cannot be
/// modified, it can be shared between threads and embedded any number of times
/// after the chunk it came from has been changed or dropped.
#[derive(Debug, Clone)]
pub struct SealedChunk {
    data: Arc<[u8]>,
    crc: u32,
    uncompressed_len: u64,
}

impl SealedChunk {
    /// the raw DEFLATE bytes of the fragment, ending with a full flush
    pub fn compressed_data(&self) -> &[u8] {
        &self.data
    }

    pub fn crc32(&self) -> u32 {
        self.crc
    }

    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }
}

/// Anything that can be added to a GzipChunk.
#[derive(Debug)]
pub enum ChunkInput<'a> {
    /// uncompressed bytes that are compressed as they are added
    Bytes(&'a [u8]),

    /// another chunk, which must consist of a single fragment. It will be sealed
    /// as a side effect of being added.
    Chunk(&'a mut GzipChunk),

    /// an already sealed chunk
    Sealed(&'a SealedChunk),
}

impl<'a> From<&'a [u8]> for ChunkInput<'a> {
    fn from(data: &'a [u8]) -> Self {
        ChunkInput::Bytes(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for ChunkInput<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        ChunkInput::Bytes(data)
    }
}

impl<'a> From<&'a Vec<u8>> for ChunkInput<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        ChunkInput::Bytes(data)
    }
}

impl<'a> From<&'a str> for ChunkInput<'a> {
    fn from(text: &'a str) -> Self {
        ChunkInput::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a String> for ChunkInput<'a> {
    fn from(text: &'a String) -> Self {
        ChunkInput::Bytes(text.as_bytes())
    }
}

impl<'a> From<&'a mut GzipChunk> for ChunkInput<'a> {
    fn from(chunk: &'a mut GzipChunk) -> Self {
        ChunkInput::Chunk(chunk)
    }
}

impl<'a> From<&'a SealedChunk> for ChunkInput<'a> {
    fn from(sealed: &'a SealedChunk) -> Self {
        ChunkInput::Sealed(sealed)
    }
}

/// Builds a gzip stream incrementally from uncompressed data and precompressed chunks.
///
/// ```
/// use gzip_chunk::GzipChunk;
///
/// // compressed once
/// let mut payload = GzipChunk::new();
/// payload.add("XY", 1).unwrap();
///
/// let mut page = GzipChunk::new();
/// page.add("AB", 3).unwrap();
/// page.add(&mut payload, 2).unwrap();
///
/// let gz = page.finalize().unwrap();
/// assert_eq!(page.uncompressed_len(), 10);
/// # let _ = gz;
/// ```
#[derive(Debug)]
pub struct GzipChunk {
    config: GzipChunkConfig,

    /// flushed fragments, in stream order
    fragments: Vec<Arc<[u8]>>,

    /// None while idle. The next raw add opens a new session and fragment.
    session: Option<OpenSession>,

    crc: u32,
    uncompressed_len: u64,

    /// final block of the deflate stream, created on the first call to finalize
    end_block: Vec<u8>,
}

impl Default for GzipChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl GzipChunk {
    pub fn new() -> Self {
        Self::new_unchecked(GzipChunkConfig::default())
    }

    pub fn with_config(config: GzipChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new_unchecked(config))
    }

    /// Creates a chunk with the given header timestamp that starts out with
    /// `repetitions` copies of `data`.
    pub fn with_initial_data(
        data: impl AsRef<[u8]>,
        repetitions: u64,
        timestamp: u32,
    ) -> Result<Self> {
        let mut chunk = Self::with_config(GzipChunkConfig {
            timestamp,
            ..GzipChunkConfig::default()
        })?;
        chunk.add_bytes(data.as_ref(), repetitions)?;
        Ok(chunk)
    }

    fn new_unchecked(config: GzipChunkConfig) -> Self {
        GzipChunk {
            config,
            fragments: Vec::new(),
            session: None,
            crc: 0,
            uncompressed_len: 0,
            end_block: Vec::new(),
        }
    }

    /// CRC-32 of all the uncompressed data that has been added
    pub fn crc32(&self) -> u32 {
        self.crc
    }

    /// total number of uncompressed bytes that have been added, including all repetitions
    pub fn uncompressed_len(&self) -> u64 {
        self.uncompressed_len
    }

    pub fn timestamp(&self) -> u32 {
        self.config.timestamp
    }

    pub fn config(&self) -> &GzipChunkConfig {
        &self.config
    }

    /// Number of fragments, including the one an open session is writing into.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len() + usize::from(self.session.is_some())
    }

    /// Compressed bytes held so far, including the gzip framing. Data still buffered
    /// inside an open compression session is not counted until it is flushed.
    pub fn compressed_len(&self) -> usize {
        GZIP_HEADER_SIZE
            + self.fragments.iter().map(|f| f.len()).sum::<usize>()
            + self.session.as_ref().map_or(0, |s| s.fragment.len())
            + self.end_block.len()
            + GZIP_TRAILER_SIZE
    }

    /// Adds uncompressed data or another chunk `repetitions` times. A repetition
    /// count of zero leaves the chunk unchanged.
    pub fn add<'a>(&mut self, input: impl Into<ChunkInput<'a>>, repetitions: u64) -> Result<()> {
        match input.into() {
            ChunkInput::Bytes(data) => self.add_bytes(data, repetitions),
            ChunkInput::Chunk(chunk) => self.add_chunk(chunk, repetitions),
            ChunkInput::Sealed(sealed) => self.add_sealed(sealed, repetitions),
        }
    }

    /// Compresses `repetitions` copies of `data` into the current fragment.
    pub fn add_bytes(&mut self, data: &[u8], repetitions: u64) -> Result<()> {
        if repetitions == 0 {
            return Ok(());
        }

        let data_len = data.len() as u64;
        let new_len = self.checked_total_len(data_len, repetitions)?;

        let level = self.config.compression_level;
        let session = self.session.get_or_insert_with(|| {
            log::debug!("opening compression session at level {}", level);
            OpenSession {
                deflate: RawDeflate::new(level),
                fragment: Vec::new(),
            }
        });

        let data_crc = crc32(data);
        let op = crc32_combine_op(data_len);

        for _ in 0..repetitions {
            session.deflate.compress(data, &mut session.fragment)?;
            self.crc = crc32_combine_apply(self.crc, data_crc, op);
        }

        self.uncompressed_len = new_len;
        Ok(())
    }

    /// Embeds the compressed data of `source` into this chunk `repetitions` times.
    ///
    /// The source must consist of exactly one fragment. Its open session, if any, is
    /// flushed and closed so that its fragment becomes a stable sealed chunk.
    pub fn add_chunk(&mut self, source: &mut GzipChunk, repetitions: u64) -> Result<()> {
        source.check_single_fragment()?;

        if repetitions == 0 {
            return Ok(());
        }

        // check before sealing, so that a rejected call leaves the source untouched
        self.checked_total_len(source.uncompressed_len, repetitions)?;

        let sealed = source.seal()?;
        self.add_sealed(&sealed, repetitions)
    }

    /// Appends the fragment of a sealed chunk `repetitions` times. The fragment
    /// is shared, not copied, so the cost does not depend on its size.
    pub fn add_sealed(&mut self, sealed: &SealedChunk, repetitions: u64) -> Result<()> {
        if repetitions == 0 {
            return Ok(());
        }

        let new_len = self.checked_total_len(sealed.uncompressed_len, repetitions)?;

        // the precompressed data has to start on a fresh block boundary
        self.close_session()?;

        let op = crc32_combine_op(sealed.uncompressed_len);
        for _ in 0..repetitions {
            self.fragments.push(Arc::clone(&sealed.data));
            self.crc = crc32_combine_apply(self.crc, sealed.crc, op);
        }
        self.uncompressed_len = new_len;

        log::debug!(
            "embedded {} copies of {} compressed bytes ({} uncompressed), {} fragments",
            repetitions,
            sealed.data.len(),
            sealed.uncompressed_len,
            self.fragments.len()
        );

        Ok(())
    }

    /// Flushes any open session and returns a snapshot of the single fragment of
    /// this chunk, suitable for embedding into other chunks.
    ///
    /// Sealing is idempotent. Adding more data afterwards is allowed, but the chunk
    /// will then have more than one fragment and cannot be sealed again.
    pub fn seal(&mut self) -> Result<SealedChunk> {
        self.check_single_fragment()?;
        self.close_session()?;

        Ok(SealedChunk {
            data: Arc::clone(&self.fragments[0]),
            crc: self.crc,
            uncompressed_len: self.uncompressed_len,
        })
    }

    /// Returns the complete gzip stream for everything added so far. More data can
    /// still be added afterwards, and finalize can be called again.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        self.close_session()?;
        self.create_end_block()?;

        let mut output = Vec::with_capacity(self.compressed_len());
        self.write_stream(&mut output).context()?;

        log::debug!(
            "finalized {} fragments, {} compressed bytes for {} uncompressed",
            self.fragments.len(),
            output.len(),
            self.uncompressed_len
        );

        Ok(output)
    }

    /// Same as finalize, but writes the stream to `writer`.
    pub fn finalize_to(&mut self, writer: &mut impl Write) -> Result<()> {
        self.close_session()?;
        self.create_end_block()?;
        self.write_stream(writer).context()
    }

    fn write_stream(&self, writer: &mut impl Write) -> std::io::Result<()> {
        write_gzip_header(writer, self.config.timestamp)?;
        for fragment in &self.fragments {
            writer.write_all(fragment)?;
        }
        writer.write_all(&self.end_block)?;
        write_gzip_trailer(writer, self.crc, self.uncompressed_len)
    }

    fn create_end_block(&mut self) -> Result<()> {
        if self.end_block.is_empty() {
            RawDeflate::new(self.config.compression_level).finish(&mut self.end_block)?;
        }
        Ok(())
    }

    /// Ends the open session with a full flush and moves its fragment into the
    /// list of flushed fragments. Does nothing if there is no open session.
    fn close_session(&mut self) -> Result<()> {
        if let Some(session) = &mut self.session {
            session.deflate.full_flush(&mut session.fragment)?;
        }

        if let Some(session) = self.session.take() {
            log::debug!(
                "closed session: {} bytes in, {} bytes out",
                session.deflate.total_in(),
                session.fragment.len()
            );
            self.fragments.push(Arc::from(session.fragment));
        }
        Ok(())
    }

    fn check_single_fragment(&self) -> Result<()> {
        let count = self.fragment_count();
        if count != 1 {
            return err_exit_code(
                ExitCode::MultiFragmentChunk,
                &format!(
                    "cannot embed a multi-fragment chunk (chunk has {} fragments)",
                    count
                ),
            );
        }
        Ok(())
    }

    /// Returns the total length after adding `repetitions` copies of `len` bytes
    fn checked_total_len(&self, len: u64, repetitions: u64) -> Result<u64> {
        match len
            .checked_mul(repetitions)
            .and_then(|added| added.checked_add(self.uncompressed_len))
        {
            Some(total) => Ok(total),
            None => err_exit_code(
                ExitCode::InvalidRepetitions,
                &format!(
                    "{} repetitions of {} bytes overflow the uncompressed length",
                    repetitions, len
                ),
            ),
        }
    }
}
