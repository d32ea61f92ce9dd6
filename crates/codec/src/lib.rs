//! # codec
//!
//! Binary encoding of a [`dbimage::Image`] for the slotdb file format.
//!
//! ## File layout (v1)
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ HEADER (8 bytes)                              │
//! │                                               │
//! │ max_data (u32) | max_rows (u32)               │
//! ├───────────────────────────────────────────────┤
//! │ RECORDS (max_rows times, in slot order)       │
//! │                                               │
//! │ id (u32) | occupied (u8)                      │
//! │ name [max_data bytes] | email [max_data bytes]│
//! │                                               │
//! │ ... repeated for each slot ...                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Text fields are NUL-terminated and
//! zero-padded to exactly `max_data` bytes. There is no magic number,
//! version or checksum: the only integrity check is that the file length
//! equals `8 + max_rows * (5 + 2 * max_data)`.

mod error;
mod format;
mod reader;
mod writer;

pub use error::CodecError;
pub use format::{image_bytes, record_bytes, HEADER_BYTES, RECORD_FIXED_BYTES};
pub use reader::{decode, read_image};
pub use writer::{encode, write_image};
