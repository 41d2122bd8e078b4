/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

// forbid lints that we already have eliminated from the codebase so they don't show up in the future
#![forbid(unsafe_code)]
#![forbid(trivial_casts)]
#![forbid(trivial_numeric_casts)]
#![forbid(non_ascii_idents)]
#![forbid(unused_extern_crates)]
#![forbid(unused_import_braces)]
#![forbid(redundant_lifetimes)]
#![forbid(unused_lifetimes)]
#![forbid(unused_macro_rules)]
#![forbid(macro_use_extern_crate)]
#![forbid(missing_unsafe_on_extern)]

mod crc32_combine;
mod gzip_chunk;
mod gzip_chunk_error;
mod gzip_format;
mod raw_deflate;

pub use crc32_combine::{crc32, crc32_combine, crc32_combine_apply, crc32_combine_op};

pub use gzip_chunk::{ChunkInput, GzipChunk, GzipChunkConfig, SealedChunk};

pub use gzip_chunk_error::ExitCode;
pub use gzip_chunk_error::{AddContext, GzipChunkError, Result, err_exit_code};

pub use gzip_format::{GZIP_HEADER_SIZE, GZIP_TRAILER_SIZE};

#[cfg(test)]
static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize the logger for tests. This is a no-op if the logger is already initialized.
#[cfg(test)]
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
