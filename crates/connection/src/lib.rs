use codec::CodecError;
use dbimage::{Geometry, Image, ImageError};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to load database: {0}")]
    Load(#[source] CodecError),
    #[error("{0}")]
    Memory(#[source] ImageError),
    #[error("connection is closed")]
    Closed,
}

/// How [`Connection::open`] treats the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create or truncate the file and start from an empty image.
    Create(Geometry),
    /// Open an existing file read-write and load its image.
    Existing,
}

/// One open database file plus the image it holds.
///
/// Every write replaces the whole file contents; there is no in-place record
/// update. The file handle is released by [`close`](Connection::close) or on
/// drop, whichever comes first.
pub struct Connection {
    path: PathBuf,
    file: Option<File>,
    image: Image,
    sync: bool,
}

impl Connection {
    /// Opens `path` in the given mode.
    ///
    /// In `Create` mode the image is allocated first and the file is only
    /// truncated once that succeeded, so a geometry that cannot be held in
    /// memory leaves an existing file as it was. Nothing is written until
    /// [`write`](Connection::write). In `Existing` mode the image is loaded
    /// before returning.
    ///
    /// When `sync` is set every write is followed by `sync_all`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        sync: bool,
    ) -> Result<Self, ConnectionError> {
        let path = path.as_ref().to_path_buf();
        match mode {
            OpenMode::Create(geometry) => {
                let image = Image::new(geometry).map_err(ConnectionError::Memory)?;
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .read(true)
                    .truncate(true)
                    .open(&path)?;
                debug!(
                    path = %path.display(),
                    max_data = geometry.max_data(),
                    max_rows = geometry.max_rows(),
                    "created database file"
                );
                Ok(Self {
                    path,
                    file: Some(file),
                    image,
                    sync,
                })
            }
            OpenMode::Existing => {
                let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
                let image = Self::load_from(&mut file)?;
                debug!(
                    path = %path.display(),
                    rows = image.len(),
                    occupied = image.occupied_count(),
                    "loaded database"
                );
                Ok(Self {
                    path,
                    file: Some(file),
                    image,
                    sync,
                })
            }
        }
    }

    /// Re-reads the whole image from the start of the file, replacing the
    /// one in memory.
    ///
    /// # Errors
    ///
    /// `Load` if the file length does not match its header exactly or any
    /// record is malformed. The in-memory image is left unchanged.
    pub fn load(&mut self) -> Result<(), ConnectionError> {
        let file = self.file.as_mut().ok_or(ConnectionError::Closed)?;
        self.image = Self::load_from(file)?;
        Ok(())
    }

    fn load_from(file: &mut File) -> Result<Image, ConnectionError> {
        codec::read_image(file).map_err(|e| match e {
            CodecError::Io(e) => ConnectionError::Io(e),
            CodecError::Image(e @ ImageError::Alloc { .. }) => ConnectionError::Memory(e),
            e => ConnectionError::Load(e),
        })
    }

    /// Rewinds and writes the entire image as one block, then flushes.
    pub fn write(&mut self) -> Result<(), ConnectionError> {
        let file = self.file.as_mut().ok_or(ConnectionError::Closed)?;
        let buf = codec::encode(&self.image)?;

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        file.flush()?;
        if self.sync {
            file.sync_all()?;
        }
        debug!(path = %self.path.display(), bytes = buf.len(), "wrote database");
        Ok(())
    }

    /// Releases the file handle and emits the `closing database` notice.
    ///
    /// Only the first call does anything. Once the connection is closed,
    /// further calls (including the one from `Drop`) neither touch the file
    /// nor log anything.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            info!(path = %self.path.display(), "closing database");
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
