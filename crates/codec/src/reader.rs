use byteorder::{LittleEndian, ReadBytesExt};
use dbimage::{Geometry, Image};
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};

use crate::error::CodecError;
use crate::format::{image_bytes, read_header, FLAG_EMPTY, FLAG_OCCUPIED, HEADER_BYTES};

/// Reads one complete image from `r`.
///
/// The reader is seeked to the end to determine its length and then
/// rewound, so decoding always starts at byte 0 regardless of the current
/// position.
///
/// # Validation
///
/// - The header must describe a valid geometry (`max_data >= 1`,
///   `max_rows >= 1`, at most `dbimage::MAX_IMAGE_BYTES` of records).
/// - The total length must equal exactly what the header implies. This is
///   checked before any record storage is allocated, and the allocation
///   itself is fallible (`CodecError::Image` with `ImageError::Alloc`).
/// - Occupancy flags must be 0 or 1.
/// - Occupied slots must hold NUL-terminated UTF-8 text. The text of empty
///   slots is ignored and comes back zeroed.
///
/// Stored ids are taken as-is, even when they differ from the slot index.
pub fn read_image<R: Read + Seek>(r: &mut R) -> Result<Image, CodecError> {
    let actual = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(0))?;
    if actual < HEADER_BYTES {
        return Err(CodecError::SizeMismatch {
            expected: HEADER_BYTES,
            actual,
        });
    }

    let mut rdr = BufReader::new(r);
    let (max_data, max_rows) = read_header(&mut rdr)?;
    let invalid = CodecError::InvalidHeader { max_data, max_rows };
    let geometry = match Geometry::new(max_data, max_rows) {
        Ok(g) => g,
        Err(_) => return Err(invalid),
    };
    let expected = image_bytes(max_data, max_rows).ok_or(invalid)?;
    if expected != actual {
        return Err(CodecError::SizeMismatch { expected, actual });
    }

    let mut image = Image::new(geometry)?;
    let mut name = vec![0u8; max_data as usize];
    let mut email = vec![0u8; max_data as usize];
    for slot in 0..max_rows {
        let id = rdr.read_u32::<LittleEndian>()?;
        let flag = rdr.read_u8()?;
        rdr.read_exact(&mut name)?;
        rdr.read_exact(&mut email)?;

        let occupied = match flag {
            FLAG_EMPTY => false,
            FLAG_OCCUPIED => {
                check_text(&name, slot, "name")?;
                check_text(&email, slot, "email")?;
                true
            }
            flag => return Err(CodecError::InvalidFlag { slot, flag }),
        };
        image.restore(slot, id, occupied, &name, &email)?;
    }
    Ok(image)
}

/// Decodes an image held entirely in memory.
pub fn decode(bytes: &[u8]) -> Result<Image, CodecError> {
    read_image(&mut Cursor::new(bytes))
}

fn check_text(buf: &[u8], slot: u32, field: &'static str) -> Result<(), CodecError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::Unterminated { slot, field })?;
    if std::str::from_utf8(&buf[..end]).is_err() {
        return Err(CodecError::InvalidText { slot, field });
    }
    Ok(())
}
