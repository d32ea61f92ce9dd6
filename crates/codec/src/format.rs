//! Size constants and header read/write helpers.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use dbimage::Geometry;
use std::io::{Read, Result as IoResult, Write};

/// Size of the header in bytes: 4 (`max_data`) + 4 (`max_rows`).
pub const HEADER_BYTES: u64 = 4 + 4;

/// Per-record bytes before the two text fields: 4 (`id`) + 1 (`occupied`).
pub const RECORD_FIXED_BYTES: u64 = 4 + 1;

pub(crate) const FLAG_EMPTY: u8 = 0;
pub(crate) const FLAG_OCCUPIED: u8 = 1;

/// On-disk size of one record.
pub fn record_bytes(max_data: u32) -> u64 {
    RECORD_FIXED_BYTES + 2 * max_data as u64
}

/// On-disk size of a whole image, or `None` if it does not fit in a `u64`.
pub fn image_bytes(max_data: u32, max_rows: u32) -> Option<u64> {
    record_bytes(max_data)
        .checked_mul(max_rows as u64)?
        .checked_add(HEADER_BYTES)
}

pub(crate) fn write_header<W: Write>(w: &mut W, geometry: Geometry) -> IoResult<()> {
    w.write_u32::<LittleEndian>(geometry.max_data())?;
    w.write_u32::<LittleEndian>(geometry.max_rows())?;
    Ok(())
}

/// Reads the header, returning the raw `(max_data, max_rows)` pair.
pub(crate) fn read_header<R: Read>(r: &mut R) -> IoResult<(u32, u32)> {
    let max_data = r.read_u32::<LittleEndian>()?;
    let max_rows = r.read_u32::<LittleEndian>()?;
    Ok((max_data, max_rows))
}
