use std::io;

use dbimage::ImageError;
use thiserror::Error;

/// Failures while decoding or encoding an image.
///
/// Everything except `Io` means the bytes on disk do not describe a valid
/// image.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("image size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("invalid header: max_data {max_data}, max_rows {max_rows}")]
    InvalidHeader { max_data: u32, max_rows: u32 },
    #[error("invalid occupancy flag {flag} in slot {slot}")]
    InvalidFlag { slot: u32, flag: u8 },
    #[error("unterminated {field} in slot {slot}")]
    Unterminated { slot: u32, field: &'static str },
    #[error("{field} in slot {slot} is not valid utf-8")]
    InvalidText { slot: u32, field: &'static str },
    #[error(transparent)]
    Image(#[from] ImageError),
}
