use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::error::IoError;

/// An immutable byte buffer holding a whole input file.
///
/// Files opened from disk are memory-mapped read-only; nothing is copied
/// until a page is first touched. Buffers built in memory (tests, data
/// received from elsewhere) use the same interface.
#[derive(Debug)]
pub struct MappedFile {
    backing: Backing,
    identifier: String,
}

#[derive(Debug)]
enum Backing {
    Mapped(Mmap),
    Memory(Vec<u8>),
}

impl MappedFile {
    /// Map the file at `path` read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();

        let file = File::open(path).map_err(|e| IoError::Open {
            path: identifier.clone(),
            message: e.to_string(),
        })?;

        // SAFETY: the mapping is read-only and never handed out mutably.
        // Truncating the file underneath a live mapping is outside the
        // contract of this reader, as with any mmap-based parser.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| IoError::Map {
            path: identifier.clone(),
            message: e.to_string(),
        })?;

        debug!(path = %identifier, size = mmap.len(), "mapped file");

        Ok(Self {
            backing: Backing::Mapped(mmap),
            identifier,
        })
    }

    /// Wrap bytes that are already in memory.
    pub fn from_vec(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            backing: Backing::Memory(data),
            identifier: identifier.into(),
        }
    }

    /// Total size of the buffer in bytes.
    pub fn size(&self) -> u64 {
        self.as_slice().len() as u64
    }

    /// The file path or caller-supplied name (for logging).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether the bytes come from a file mapping.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped(mmap) => mmap,
            Backing::Memory(data) => data,
        }
    }
}

impl Deref for MappedFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}
