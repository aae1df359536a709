//! The opened image: mapped bytes plus the parsed directory chain.
//!
//! A [`TiffImage`] is built once by [`TiffImage::open`] (or
//! [`OpenOptions::open`]) and never changes afterwards. Every query is a
//! read, so an image can be shared between threads; fast-path sample views
//! borrow from it and cannot outlive it.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::codec::CodecRegistry;
use crate::error::TiffError;
use crate::format::lsm;
use crate::format::tiff::{
    assemble, contiguous_stack, first_discontinuity, read_chain, validate_regions, ByteAccessor,
    ByteOrder, HookRegistry, ImageFileDirectory, MemoryRegion, RegionReport, SampleView, Samples,
    TiffHeader, VendorMetadata, DEFAULT_MAX_DIRECTORIES, TIFF_HEADER_SIZE,
};
use crate::io::MappedFile;

/// The hooks used when none are configured: strip regions plus the LSM
/// extension.
pub fn default_hooks() -> HookRegistry {
    lsm::register(HookRegistry::standard().to_builder()).build()
}

// =============================================================================
// OpenOptions
// =============================================================================

/// How a file is to be accessed. Only reading is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    #[default]
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::ReadWrite => "read-write",
        })
    }
}

/// Options for opening a [`TiffImage`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    mode: AccessMode,
    max_directories: usize,
    first_byte: u64,
    hooks: Arc<HookRegistry>,
    codecs: Arc<CodecRegistry>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mode: AccessMode::Read,
            max_directories: DEFAULT_MAX_DIRECTORIES,
            first_byte: 0,
            hooks: Arc::new(default_hooks()),
            codecs: Arc::new(CodecRegistry::default()),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Longest directory chain accepted before the file is rejected.
    pub fn max_directories(mut self, max: usize) -> Self {
        self.max_directories = max;
        self
    }

    /// Offset of the TIFF header within the file, for TIFF data embedded in
    /// a larger container. Bytes before it are recorded as one
    /// "embedding prefix" region.
    pub fn first_byte(mut self, offset: u64) -> Self {
        self.first_byte = offset;
        self
    }

    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Map the file at `path` and parse it.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<TiffImage, TiffError> {
        self.check_mode()?;
        let file = MappedFile::open(path)?;
        self.parse(file)
    }

    /// Parse a file that is already in memory.
    pub fn from_bytes(&self, data: Vec<u8>) -> Result<TiffImage, TiffError> {
        self.check_mode()?;
        self.parse(MappedFile::from_vec(data, "<memory>"))
    }

    fn check_mode(&self) -> Result<(), TiffError> {
        match self.mode {
            AccessMode::Read => Ok(()),
            other => Err(TiffError::UnsupportedMode(other.to_string())),
        }
    }

    fn parse(&self, file: MappedFile) -> Result<TiffImage, TiffError> {
        let header = TiffHeader::parse_at(file.as_slice(), self.first_byte)?;
        let bytes = ByteAccessor::new(file.as_slice(), header.byte_order);
        let directories = read_chain(
            bytes,
            header.first_ifd_offset,
            &self.hooks,
            self.max_directories,
        )?;

        let size = file.size();
        let mut regions = vec![
            MemoryRegion::new(size, size, "eof"),
            MemoryRegion::new(
                self.first_byte,
                self.first_byte + TIFF_HEADER_SIZE as u64,
                "file header",
            ),
        ];
        if self.first_byte > 0 {
            regions.push(MemoryRegion::new(0, self.first_byte, "embedding prefix"));
        }

        info!(
            file = %file.identifier(),
            size,
            first_byte = self.first_byte,
            byte_order = ?header.byte_order,
            directories = directories.len(),
            "opened TIFF"
        );

        Ok(TiffImage {
            file,
            header,
            directories,
            regions,
            codecs: Arc::clone(&self.codecs),
        })
    }
}

// =============================================================================
// TiffImage
// =============================================================================

/// An opened, fully parsed TIFF file.
pub struct TiffImage {
    file: MappedFile,
    header: TiffHeader,
    directories: Vec<ImageFileDirectory>,
    regions: Vec<MemoryRegion>,
    codecs: Arc<CodecRegistry>,
}

impl TiffImage {
    /// Open `path` read-only with the default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TiffError> {
        OpenOptions::default().open(path)
    }

    /// Parse an in-memory file with the default options.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, TiffError> {
        OpenOptions::default().from_bytes(data)
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    /// Path or name the image was opened from.
    pub fn identifier(&self) -> &str {
        self.file.identifier()
    }

    /// Directories in chain order.
    pub fn directories(&self) -> &[ImageFileDirectory] {
        &self.directories
    }

    /// Typed reads over the file's bytes.
    pub fn accessor(&self) -> ByteAccessor<'_> {
        ByteAccessor::new(self.file.as_slice(), self.header.byte_order)
    }

    /// Vendor metadata of the first directory that carries any.
    pub fn vendor(&self) -> Option<&VendorMetadata> {
        self.directories.iter().find_map(ImageFileDirectory::vendor)
    }

    // -------------------------------------------------------------------------
    // Samples
    // -------------------------------------------------------------------------

    /// Assemble the channels of all directories of one subfile type.
    ///
    /// Subfile type 0 selects full-resolution slices, 1 reduced-resolution
    /// thumbnails. With `verbose` the stack layout is logged at info level.
    pub fn get_samples(&self, subfile_type: u32, verbose: bool) -> Result<Samples<'_>, TiffError> {
        assemble(
            self.accessor(),
            &self.directories,
            self.vendor(),
            subfile_type,
            &self.codecs,
            verbose,
        )
    }

    /// Whether every directory's strips are contiguous and each directory's
    /// data starts where the previous one's ends.
    pub fn is_contiguous(&self) -> Result<bool, TiffError> {
        Ok(first_discontinuity(self.accessor(), &self.directories)?.is_none())
    }

    /// One borrowed `[depth, height, width]` view over the whole chain.
    pub fn get_contiguous(&self) -> Result<SampleView<'_>, TiffError> {
        contiguous_stack(self.accessor(), &self.directories)
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Every recorded region: header, end-of-file marker, directory tables,
    /// out-of-line values and hook-recorded regions.
    pub fn memory_regions(&self) -> Vec<MemoryRegion> {
        let mut regions = self.regions.clone();
        for dir in &self.directories {
            regions.extend_from_slice(dir.memory_regions());
        }
        regions
    }

    /// Sorted regions with every gap and overlap.
    pub fn memory_report(&self) -> RegionReport {
        validate_regions(self.memory_regions())
    }

    /// True when the recorded regions cover the file without gaps or
    /// overlaps. Issues are logged as warnings.
    pub fn check_memory_usage(&self) -> bool {
        let report = self.memory_report();
        debug!(
            regions = report.regions.len(),
            issues = report.issues.len(),
            "checked memory usage"
        );
        report.is_valid
    }
}

impl fmt::Debug for TiffImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiffImage")
            .field("file", &self.file.identifier())
            .field("size", &self.file.size())
            .field("byte_order", &self.header.byte_order)
            .field("directories", &self.directories.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
