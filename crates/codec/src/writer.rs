use byteorder::{LittleEndian, WriteBytesExt};
use dbimage::Image;
use std::io::{Result as IoResult, Write};

use crate::format::{image_bytes, write_header, FLAG_EMPTY, FLAG_OCCUPIED};

/// Writes `image` to `w`: header, then every record in slot order.
///
/// # Record Layout
///
/// ```text
/// id(u32) | occupied(u8) | name[max_data] | email[max_data]
/// ```
///
/// Empty slots are written with their (zeroed) text buffers so every record
/// has the same width.
pub fn write_image<W: Write>(w: &mut W, image: &Image) -> IoResult<()> {
    write_header(w, image.geometry())?;
    for row in image.records() {
        w.write_u32::<LittleEndian>(row.id())?;
        let flag = if row.is_occupied() {
            FLAG_OCCUPIED
        } else {
            FLAG_EMPTY
        };
        w.write_u8(flag)?;
        w.write_all(row.name().raw())?;
        w.write_all(row.email().raw())?;
    }
    Ok(())
}

/// Encodes `image` into one contiguous buffer, ready to be written as a
/// single block.
pub fn encode(image: &Image) -> IoResult<Vec<u8>> {
    let geometry = image.geometry();
    let len = image_bytes(geometry.max_data(), geometry.max_rows()).unwrap_or(0);
    let mut buf = Vec::with_capacity(len as usize);
    write_image(&mut buf, image)?;
    Ok(buf)
}
