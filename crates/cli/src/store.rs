//! Store operations that run image operations through a Connection.

use connection::{Connection, ConnectionError, OpenMode};
use dbimage::{Geometry, ImageError, Listing, Record};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Coarse failure category, for callers that only care what went wrong in
/// broad terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File open/read/write/flush failed, or memory for the image could not
    /// be allocated.
    Resource,
    /// The file does not hold a well-formed image.
    Integrity,
    /// The request itself was not valid for the current image.
    Precondition,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connection(ConnectionError::Load(_)) => ErrorKind::Integrity,
            StoreError::Connection(_) => ErrorKind::Resource,
            StoreError::Image(ImageError::Malformed(_)) => ErrorKind::Integrity,
            StoreError::Image(ImageError::Alloc { .. }) => ErrorKind::Resource,
            StoreError::Image(_) => ErrorKind::Precondition,
        }
    }

    /// The operating-system error behind this failure, if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            StoreError::Connection(ConnectionError::Io(e)) => Some(e),
            _ => None,
        }
    }
}

/// A database file opened for exactly one operation.
///
/// # Write Path
///
/// 1. Apply the mutation to the in-memory image.
/// 2. Rewrite the whole image to the file.
///
/// A mutation that fails in step 1 never reaches step 2, so the file keeps
/// whatever the last successful write put there.
///
/// # Read Path
///
/// Reads are served from the image loaded at open time; nothing is written.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Creates (or truncates) the file at `path`, empties every slot and
    /// writes the fresh image.
    ///
    /// The image is allocated before the file is opened, so running out of
    /// memory leaves an existing file untouched.
    pub fn create<P: AsRef<Path>>(
        path: P,
        geometry: Geometry,
        sync: bool,
    ) -> Result<Self, StoreError> {
        let mut conn = Connection::open(path, OpenMode::Create(geometry), sync)?;
        conn.image_mut().create();
        conn.write()?;
        Ok(Self { conn })
    }

    /// Opens an existing file and loads its image.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, StoreError> {
        let conn = Connection::open(path, OpenMode::Existing, sync)?;
        Ok(Self { conn })
    }

    pub fn geometry(&self) -> Geometry {
        self.conn.image().geometry()
    }

    /// Rejects ids outside `0..max_rows` before any operation runs.
    pub fn check_id(&self, id: u32) -> Result<(), StoreError> {
        self.geometry().check(id)?;
        Ok(())
    }

    /// Occupies slot `id` and persists the image.
    ///
    /// An occupied slot is an `AlreadySet` error and nothing is written.
    pub fn set(&mut self, id: u32, name: &str, email: &str) -> Result<(), StoreError> {
        self.conn.image_mut().set(id, name, email)?;
        self.conn.write()?;
        debug!(id, "set record");
        Ok(())
    }

    /// Returns the record in slot `id`, or `NotSet` if the slot is empty.
    pub fn get(&self, id: u32) -> Result<Record<'_>, StoreError> {
        Ok(self.conn.image().get(id)?)
    }

    /// Empties slot `id` and persists the image. Deleting an empty slot is
    /// not an error.
    pub fn delete(&mut self, id: u32) -> Result<(), StoreError> {
        self.conn.image_mut().delete(id)?;
        self.conn.write()?;
        debug!(id, "deleted record");
        Ok(())
    }

    /// Occupied records in slot order, plus `no record` entries for empty
    /// slots when `verbose` is set.
    pub fn list(&self, verbose: bool) -> impl Iterator<Item = Listing<'_>> + '_ {
        self.conn.image().list(verbose)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn close(&mut self) {
        self.conn.close();
    }
}
