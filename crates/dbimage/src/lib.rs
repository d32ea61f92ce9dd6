//! # dbimage
//!
//! The in-memory image of a slotdb database file: a fixed number of
//! fixed-size address records, addressed only by slot index.
//!
//! The image is the unit every other layer works with. The codec turns it
//! into bytes, the connection loads and writes it as a whole, and the CLI
//! runs exactly one operation on it per invocation.
//!
//! ## Key properties
//! - **Fixed capacity**: the image always has exactly `max_rows` slots.
//!   All text storage lives in one arena of `max_rows * 2 * max_data` bytes,
//!   reserved up front with a fallible allocation and never resized.
//! - **Single occupancy**: `set` never overwrites a live record; the slot has
//!   to be deleted first.
//! - **Bounded text**: `name` and `email` are windows of exactly `max_data`
//!   bytes into the arena, always NUL-terminated. Longer input is truncated.
//!
//! ## Example
//! ```rust
//! use dbimage::{Geometry, Image};
//!
//! let mut image = Image::new(Geometry::new(32, 4).unwrap()).unwrap();
//! image.set(2, "Alice", "a@x.com").unwrap();
//! assert_eq!(image.get(2).unwrap().to_string(), "2 Alice a@x.com");
//!
//! image.delete(2).unwrap();
//! assert!(image.get(2).is_err());
//! ```

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

/// Per-field text capacity used when none is configured.
pub const DEFAULT_MAX_DATA: u32 = 512;

/// Slot count used when none is configured.
pub const DEFAULT_MAX_ROWS: u32 = 100;

/// Upper bound on `max_rows * (5 + 2 * max_data)`, the size of all records
/// in bytes. Anything larger is refused before allocating.
pub const MAX_IMAGE_BYTES: u64 = 1 << 30;

/// Failures raised by image construction and operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("already set, delete it first (id {0})")]
    AlreadySet(u32),
    #[error("id {0} is not set")]
    NotSet(u32),
    #[error("there's not that many records: id {id} with max_rows {max_rows}")]
    OutOfRange { id: u32, max_rows: u32 },
    #[error("invalid geometry: max_data {max_data}, max_rows {max_rows}")]
    InvalidGeometry { max_data: u32, max_rows: u32 },
    #[error("memory error: cannot allocate {bytes} bytes")]
    Alloc { bytes: u64 },
    #[error("malformed image: {0}")]
    Malformed(&'static str),
}

/// The two capacity parameters of an image.
///
/// `max_data` counts the terminating NUL, so it must be at least 1.
/// `max_rows` must be at least 1. Together they may not describe more than
/// [`MAX_IMAGE_BYTES`] of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    max_data: u32,
    max_rows: u32,
}

impl Geometry {
    pub fn new(max_data: u32, max_rows: u32) -> Result<Self, ImageError> {
        let records = (5 + 2 * max_data as u64).checked_mul(max_rows as u64);
        let too_big = records.map_or(true, |n| n > MAX_IMAGE_BYTES);
        if max_data == 0 || max_rows == 0 || too_big {
            return Err(ImageError::InvalidGeometry { max_data, max_rows });
        }
        Ok(Self { max_data, max_rows })
    }

    pub fn max_data(&self) -> u32 {
        self.max_data
    }

    pub fn max_rows(&self) -> u32 {
        self.max_rows
    }

    /// Returns the slot index for `id`, or `OutOfRange` if it does not fit.
    pub fn check(&self, id: u32) -> Result<usize, ImageError> {
        if id < self.max_rows {
            Ok(id as usize)
        } else {
            Err(ImageError::OutOfRange {
                id,
                max_rows: self.max_rows,
            })
        }
    }

    /// Bytes of text storage: two fields per slot.
    fn arena_len(&self) -> usize {
        self.max_rows as usize * 2 * self.max_data as usize
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            max_data: DEFAULT_MAX_DATA,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

/// A read-only view of one NUL-terminated text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    buf: &'a [u8],
}

impl<'a> Field<'a> {
    /// Returns the stored text bytes, without the terminator.
    pub fn as_bytes(&self) -> &'a [u8] {
        let end = self.buf.iter().position(|&b| b == 0).unwrap_or(self.buf.len());
        &self.buf[..end]
    }

    pub fn text(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// The whole buffer, terminator and padding included.
    pub fn raw(&self) -> &'a [u8] {
        self.buf
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }
}

/// Copies `text` into `buf`, truncating to `buf.len() - 1` bytes.
///
/// Input stops at an interior NUL. Truncation backs off to a UTF-8
/// character boundary, so the stored bytes are always valid UTF-8.
fn assign(buf: &mut [u8], text: &str) {
    let text = text.split('\0').next().unwrap_or_default();
    let mut end = text.len().min(buf.len().saturating_sub(1));
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    buf.fill(0);
    buf[..end].copy_from_slice(&text.as_bytes()[..end]);
}

/// Copies a raw field into `buf` and zeroes everything after the first NUL.
fn assign_raw(buf: &mut [u8], raw: &[u8]) {
    buf.copy_from_slice(raw);
    if let Some(end) = buf.iter().position(|&b| b == 0) {
        buf[end..].fill(0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    id: u32,
    occupied: bool,
}

/// One address slot, borrowed from an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    id: u32,
    occupied: bool,
    name: Field<'a>,
    email: Field<'a>,
}

impl<'a> Record<'a> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied
    }

    pub fn name(&self) -> Field<'a> {
        self.name
    }

    pub fn email(&self) -> Field<'a> {
        self.email
    }
}

impl fmt::Display for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.name.text(), self.email.text())
    }
}

/// One line of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing<'a> {
    Record(Record<'a>),
    /// Only produced by verbose listings.
    Vacant(u32),
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listing::Record(record) => write!(f, "{}", record),
            Listing::Vacant(slot) => write!(f, "no record at {}", slot),
        }
    }
}

/// The full in-memory database: geometry, `max_rows` slot headers and one
/// text arena holding every `name` and `email`.
///
/// Slot `i` owns arena bytes `i * 2 * max_data .. (i + 1) * 2 * max_data`,
/// name first, then email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    geometry: Geometry,
    slots: Vec<Slot>,
    arena: Box<[u8]>,
}

impl Image {
    /// Allocates all `max_rows` slots up front, every one empty with
    /// `id == index`.
    ///
    /// # Errors
    ///
    /// `Alloc` if the slot table or the text arena cannot be reserved.
    pub fn new(geometry: Geometry) -> Result<Self, ImageError> {
        let rows = geometry.max_rows as usize;
        let arena_len = geometry.arena_len();
        let bytes = (arena_len + rows * std::mem::size_of::<Slot>()) as u64;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(rows)
            .map_err(|_| ImageError::Alloc { bytes })?;
        slots.extend((0..geometry.max_rows).map(|id| Slot {
            id,
            occupied: false,
        }));

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(arena_len)
            .map_err(|_| ImageError::Alloc { bytes })?;
        arena.resize(arena_len, 0u8);

        Ok(Self {
            geometry,
            slots,
            arena: arena.into_boxed_slice(),
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Number of slots (always `max_rows`).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of occupied slots.
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupied).count()
    }

    fn fields(&self, slot: usize) -> (&[u8], &[u8]) {
        let width = self.geometry.max_data as usize;
        let start = slot * 2 * width;
        self.arena[start..start + 2 * width].split_at(width)
    }

    fn fields_mut(&mut self, slot: usize) -> (&mut [u8], &mut [u8]) {
        let width = self.geometry.max_data as usize;
        let start = slot * 2 * width;
        self.arena[start..start + 2 * width].split_at_mut(width)
    }

    fn view(&self, slot: usize) -> Record<'_> {
        let (name, email) = self.fields(slot);
        let Slot { id, occupied } = self.slots[slot];
        Record {
            id,
            occupied,
            name: Field { buf: name },
            email: Field { buf: email },
        }
    }

    fn vacate(&mut self, slot: usize) {
        self.slots[slot] = Slot {
            id: slot as u32,
            occupied: false,
        };
        let (name, email) = self.fields_mut(slot);
        name.fill(0);
        email.fill(0);
    }

    /// Every slot in index order, occupied or not.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> + '_ {
        (0..self.slots.len()).map(move |slot| self.view(slot))
    }

    /// The slot at `id` whatever its state.
    pub fn record(&self, id: u32) -> Result<Record<'_>, ImageError> {
        let slot = self.geometry.check(id)?;
        Ok(self.view(slot))
    }

    /// Overwrites slot `slot` with decoded values.
    ///
    /// `name` and `email` must be exactly `max_data` bytes. For an empty slot
    /// they are ignored and the text is zeroed. The stored `id` is kept as
    /// given, even if it differs from `slot`.
    pub fn restore(
        &mut self,
        slot: u32,
        id: u32,
        occupied: bool,
        name: &[u8],
        email: &[u8],
    ) -> Result<(), ImageError> {
        let index = self.geometry.check(slot)?;
        let width = self.geometry.max_data as usize;
        if name.len() != width || email.len() != width {
            return Err(ImageError::Malformed("field width does not match max_data"));
        }
        self.slots[index] = Slot { id, occupied };
        let (name_buf, email_buf) = self.fields_mut(index);
        if occupied {
            assign_raw(name_buf, name);
            assign_raw(email_buf, email);
        } else {
            name_buf.fill(0);
            email_buf.fill(0);
        }
        Ok(())
    }

    /// Resets every slot to an empty record with `id == index`.
    ///
    /// Idempotent. Storage is reused, not reallocated.
    pub fn create(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            *slot = Slot {
                id: i as u32,
                occupied: false,
            };
        }
        self.arena.fill(0);
    }

    /// Occupies slot `id` with `name` and `email`, truncating both to
    /// `max_data - 1` bytes.
    ///
    /// The stored `id` is refreshed to the slot index.
    ///
    /// # Errors
    ///
    /// `OutOfRange` for a bad index, `AlreadySet` if the slot is occupied.
    /// On error the slot is left untouched.
    pub fn set(&mut self, id: u32, name: &str, email: &str) -> Result<Record<'_>, ImageError> {
        let slot = self.geometry.check(id)?;
        if self.slots[slot].occupied {
            return Err(ImageError::AlreadySet(id));
        }
        self.slots[slot] = Slot { id, occupied: true };
        let (name_buf, email_buf) = self.fields_mut(slot);
        assign(name_buf, name);
        assign(email_buf, email);
        Ok(self.view(slot))
    }

    /// Returns the occupied record at `id`.
    ///
    /// # Errors
    ///
    /// `OutOfRange` for a bad index, `NotSet` if the slot is empty.
    pub fn get(&self, id: u32) -> Result<Record<'_>, ImageError> {
        let slot = self.geometry.check(id)?;
        if !self.slots[slot].occupied {
            return Err(ImageError::NotSet(id));
        }
        Ok(self.view(slot))
    }

    /// Resets slot `id` to an empty record. Deleting an empty slot is fine.
    pub fn delete(&mut self, id: u32) -> Result<(), ImageError> {
        let slot = self.geometry.check(id)?;
        self.vacate(slot);
        Ok(())
    }

    /// Walks every slot in index order. Empty slots are reported only when
    /// `verbose` is set.
    pub fn list(&self, verbose: bool) -> impl Iterator<Item = Listing<'_>> + '_ {
        self.records().enumerate().filter_map(move |(i, record)| {
            if record.occupied {
                Some(Listing::Record(record))
            } else if verbose {
                Some(Listing::Vacant(i as u32))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Image {
        Image::new(Geometry::new(8, 5).unwrap()).unwrap()
    }

    // -------------------- Geometry --------------------

    #[test]
    fn geometry_rejects_zero_sizes() {
        assert!(Geometry::new(0, 10).is_err());
        assert!(Geometry::new(10, 0).is_err());
        assert!(Geometry::new(1, 1).is_ok());
    }

    #[test]
    fn geometry_rejects_impossible_sizes() {
        assert_eq!(
            Geometry::new(1, 4_000_000_000),
            Err(ImageError::InvalidGeometry {
                max_data: 1,
                max_rows: 4_000_000_000
            })
        );
        assert!(Geometry::new(u32::MAX, u32::MAX).is_err());
        assert!(Geometry::new(u32::MAX, 1).is_err());
    }

    #[test]
    fn geometry_limit_is_inclusive() {
        // max_data 6 gives 17-byte records
        let rows = (MAX_IMAGE_BYTES / 17) as u32;
        assert!(Geometry::new(6, rows).is_ok());
        assert!(Geometry::new(6, rows + 1).is_err());
    }

    #[test]
    fn default_geometry_matches_constants() {
        let g = Geometry::default();
        assert_eq!(g.max_data(), DEFAULT_MAX_DATA);
        assert_eq!(g.max_rows(), DEFAULT_MAX_ROWS);
        assert_eq!(Geometry::new(DEFAULT_MAX_DATA, DEFAULT_MAX_ROWS), Ok(g));
    }

    // -------------------- Create --------------------

    #[test]
    fn new_image_has_max_rows_empty_slots() {
        let image = small();
        assert_eq!(image.len(), 5);
        assert_eq!(image.arena.len(), 5 * 2 * 8);
        for (i, row) in image.records().enumerate() {
            assert_eq!(row.id(), i as u32);
            assert!(!row.is_occupied());
            assert_eq!(row.name().capacity(), 8);
            assert_eq!(row.email().capacity(), 8);
        }
    }

    #[test]
    fn create_clears_and_is_idempotent() {
        let mut image = small();
        image.set(1, "a", "b").unwrap();
        image.create();
        assert_eq!(image.occupied_count(), 0);
        assert_eq!(image.len(), 5);
        let once = image.clone();
        image.create();
        assert_eq!(image, once);
        assert_eq!(image, small());
    }

    // -------------------- Set / get --------------------

    #[test]
    fn set_then_get_formats_record() {
        let mut image = small();
        image.set(2, "Alice", "a@x.com").unwrap();
        assert_eq!(image.get(2).unwrap().to_string(), "2 Alice a@x.com");
    }

    #[test]
    fn set_rejects_occupied_slot_and_keeps_record() {
        let mut image = small();
        image.set(3, "first", "f@x").unwrap();
        assert_eq!(
            image.set(3, "second", "s@x").unwrap_err(),
            ImageError::AlreadySet(3)
        );
        let rec = image.get(3).unwrap();
        assert_eq!(rec.name().text(), "first");
        assert_eq!(rec.email().text(), "f@x");
    }

    #[test]
    fn set_truncates_to_max_data_minus_one() {
        let mut image = small();
        image.set(0, "abcdefghijkl", "0123456789").unwrap();
        let rec = image.get(0).unwrap();
        assert_eq!(rec.name().as_bytes(), b"abcdefg");
        assert_eq!(rec.email().as_bytes(), b"0123456");
        assert_eq!(rec.name().raw().len(), 8);
        assert_eq!(rec.name().raw()[7], 0);
    }

    #[test]
    fn truncation_does_not_spill_into_neighbours() {
        let mut image = small();
        image.set(1, "abcdefghijkl", "0123456789").unwrap();
        assert_eq!(image.record(0).unwrap().email().raw(), &[0u8; 8]);
        assert_eq!(image.record(2).unwrap().name().raw(), &[0u8; 8]);
        assert_eq!(image.get(1).unwrap().email().as_bytes(), b"0123456");
    }

    #[test]
    fn set_truncation_keeps_utf8_valid() {
        let mut image = small();
        // 'é' is two bytes; 7 bytes would split the fourth one
        image.set(0, "éééé", "x").unwrap();
        assert_eq!(image.get(0).unwrap().name().text(), "ééé");
    }

    #[test]
    fn set_stops_at_interior_nul() {
        let mut image = small();
        image.set(0, "ab\0cd", "x").unwrap();
        assert_eq!(image.get(0).unwrap().name().as_bytes(), b"ab");
    }

    #[test]
    fn set_with_single_byte_fields_stores_empty_text() {
        let mut image = Image::new(Geometry::new(1, 1).unwrap()).unwrap();
        image.set(0, "long", "long").unwrap();
        assert_eq!(image.get(0).unwrap().to_string(), "0  ");
    }

    #[test]
    fn set_refreshes_stale_id() {
        let mut image = Image::new(Geometry::new(4, 2).unwrap()).unwrap();
        image.restore(1, 77, false, &[0; 4], &[0; 4]).unwrap();
        assert_eq!(image.record(1).unwrap().id(), 77);
        image.set(1, "b", "c").unwrap();
        assert_eq!(image.get(1).unwrap().id(), 1);
    }

    #[test]
    fn get_empty_slot_is_not_set() {
        let image = small();
        assert_eq!(image.get(4).unwrap_err(), ImageError::NotSet(4));
    }

    // -------------------- Delete --------------------

    #[test]
    fn delete_then_get_is_not_set() {
        let mut image = small();
        image.set(3, "x", "y").unwrap();
        image.delete(3).unwrap();
        assert_eq!(image.get(3).unwrap_err(), ImageError::NotSet(3));
    }

    #[test]
    fn delete_is_idempotent() {
        let mut image = small();
        image.set(3, "x", "y").unwrap();
        image.delete(3).unwrap();
        let once = image.clone();
        image.delete(3).unwrap();
        assert_eq!(image, once);
        assert_eq!(image, small());
    }

    #[test]
    fn slot_can_be_set_again_after_delete() {
        let mut image = small();
        image.set(1, "old", "o@x").unwrap();
        image.delete(1).unwrap();
        image.set(1, "new", "n@x").unwrap();
        assert_eq!(image.get(1).unwrap().to_string(), "1 new n@x");
    }

    // -------------------- Bounds --------------------

    #[test]
    fn out_of_range_ids_are_rejected() {
        let mut image = small();
        let err = ImageError::OutOfRange { id: 5, max_rows: 5 };
        assert_eq!(image.get(5).unwrap_err(), err);
        assert_eq!(image.set(5, "a", "b").unwrap_err(), err);
        assert_eq!(image.delete(5).unwrap_err(), err);
        assert_eq!(image.record(5).unwrap_err(), err);
        assert!(image.get(u32::MAX).is_err());
        assert_eq!(image.occupied_count(), 0);
    }

    // -------------------- List --------------------

    #[test]
    fn list_skips_empty_slots_unless_verbose() {
        let mut image = Image::new(Geometry::new(8, 3).unwrap()).unwrap();
        image.set(0, "A", "a@x").unwrap();
        image.set(2, "B", "b@x").unwrap();

        let quiet: Vec<String> = image.list(false).map(|l| l.to_string()).collect();
        assert_eq!(quiet, vec!["0 A a@x", "2 B b@x"]);

        let verbose: Vec<String> = image.list(true).map(|l| l.to_string()).collect();
        assert_eq!(verbose, vec!["0 A a@x", "no record at 1", "2 B b@x"]);
    }

    #[test]
    fn list_on_empty_image() {
        let image = small();
        assert_eq!(image.list(false).count(), 0);
        assert_eq!(image.list(true).count(), 5);
    }

    // -------------------- Restore --------------------

    #[test]
    fn restore_zeroes_bytes_after_terminator() {
        let mut image = Image::new(Geometry::new(4, 1).unwrap()).unwrap();
        image.restore(0, 0, true, b"ab\0z", b"c\0yy").unwrap();
        let rec = image.get(0).unwrap();
        assert_eq!(rec.name().raw(), b"ab\0\0");
        assert_eq!(rec.email().raw(), b"c\0\0\0");
    }

    #[test]
    fn restore_ignores_text_of_empty_slot() {
        let mut image = Image::new(Geometry::new(4, 1).unwrap()).unwrap();
        image.restore(0, 0, false, b"gggg", b"gggg").unwrap();
        assert_eq!(image, Image::new(Geometry::new(4, 1).unwrap()).unwrap());
    }

    #[test]
    fn restore_checks_field_width() {
        let mut image = Image::new(Geometry::new(4, 1).unwrap()).unwrap();
        assert!(matches!(
            image.restore(0, 0, true, b"abc", b"d\0\0\0"),
            Err(ImageError::Malformed(_))
        ));
        assert!(image.restore(1, 1, false, &[0; 4], &[0; 4]).is_err());
    }
}
