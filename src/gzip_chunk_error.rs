/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::{fmt::Display, io::ErrorKind, panic::Location};

#[derive(Debug, Clone)]
pub struct GzipChunkError {
    /// standard error code
    exit_code: ExitCode,

    /// diagnostic message including location. Content should not be relied on.
    message: String,
}

pub type Result<T> = std::result::Result<T, GzipChunkError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExitCode {
    /// A chunk that does not consist of exactly one fragment was added to another chunk
    MultiFragmentChunk = 1,
    /// The repetition count would overflow the uncompressed length
    InvalidRepetitions = 2,
    InvalidParameter = 3,
    CompressionFailed = 4,
    ShortRead = 16,
    OsError = 17,
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Display for GzipChunkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.exit_code, self.message)
    }
}

/// translates std::io::Error into GzipChunkError
impl From<std::io::Error> for GzipChunkError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<GzipChunkError>() {
            Ok(le) => le,
            Err(e) => {
                let caller = Location::caller();
                GzipChunkError {
                    exit_code: get_io_error_exit_code(&e),
                    message: format!("error {} at {}", e, caller),
                }
            }
        }
    }
}

impl From<flate2::CompressError> for GzipChunkError {
    #[track_caller]
    fn from(e: flate2::CompressError) -> Self {
        let caller = Location::caller();
        GzipChunkError {
            exit_code: ExitCode::CompressionFailed,
            message: format!("deflate error {} at {}", e, caller),
        }
    }
}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    if e.kind() == ErrorKind::UnexpectedEof {
        ExitCode::ShortRead
    } else {
        ExitCode::OsError
    }
}

impl GzipChunkError {
    pub fn new(exit_code: ExitCode, message: &str) -> GzipChunkError {
        GzipChunkError {
            exit_code,
            message: message.to_owned(),
        }
    }

    pub fn wrap(exit_code: ExitCode, e: &impl Display) -> GzipChunkError {
        GzipChunkError {
            exit_code,
            message: e.to_string(),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// true if a chunk could not be embedded into another chunk
    pub fn is_composition_error(&self) -> bool {
        self.exit_code == ExitCode::MultiFragmentChunk
    }

    /// true if the arguments of the call were rejected before anything was modified
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self.exit_code,
            ExitCode::InvalidRepetitions | ExitCode::InvalidParameter
        )
    }

    fn add_location(&mut self, location: &Location<'_>) {
        self.message.push_str(&format!("\n at {}", location));
    }
}

/// translates GzipChunkError into std::io::Error, which involves putting into a Box and using Other
impl From<GzipChunkError> for std::io::Error {
    fn from(e: GzipChunkError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

impl std::error::Error for GzipChunkError {}

/// returns an error with the given exit code and message
#[track_caller]
pub fn err_exit_code<T>(exit_code: ExitCode, message: &str) -> Result<T> {
    Err(GzipChunkError::new(exit_code, message))
}

/// Adds the location of the caller to any error that can be converted into a GzipChunkError,
/// so that the path the error took is visible in the message.
pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<GzipChunkError>> AddContext<T> for std::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e: GzipChunkError = e.into();
                e.add_location(Location::caller());
                Err(e)
            }
        }
    }
}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> std::result::Result<(), std::io::Error> {
        Err(GzipChunkError::new(ExitCode::MultiFragmentChunk, "test error").into())
    }

    let e: GzipChunkError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code, ExitCode::MultiFragmentChunk);
    assert_eq!(e.message, "test error");
    assert!(e.is_composition_error());
    assert!(!e.is_validation_error());

    // an IO error should be translated into an OsError
    let e: GzipChunkError =
        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found").into();
    assert_eq!(e.exit_code, ExitCode::OsError);

    let e: GzipChunkError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
    assert_eq!(e.exit_code, ExitCode::ShortRead);
}

#[test]
fn test_context_adds_location() {
    let r: Result<()> = err_exit_code(ExitCode::InvalidRepetitions, "too many");
    let e = r.context().unwrap_err();

    assert_eq!(e.exit_code(), ExitCode::InvalidRepetitions);
    assert!(e.is_validation_error());
    assert!(e.message().starts_with("too many\n at "));
    assert!(e.message().contains("gzip_chunk_error.rs"));
}
