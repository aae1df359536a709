use thiserror::Error;

/// I/O errors raised while opening or mapping an input file
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// The file could not be opened or its metadata could not be read
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    /// The file could not be memory-mapped
    #[error("Failed to map {path}: {message}")]
    Map { path: String, message: String },
}

/// Broad classes of [`TiffError`], used by callers that only care about
/// what kind of failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Format,
    OutOfBounds,
    UnsupportedFeature,
    InconsistentDirectory,
    MisalignedBits,
    Decode,
}

/// Errors that can occur when parsing TIFF files or assembling samples
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while opening the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Only read-only access is supported
    #[error("Unsupported access mode: {0} (only read mode is supported)")]
    UnsupportedMode(String),

    /// Invalid byte-order marker (not II or MM)
    #[error("Invalid TIFF byte order: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidByteOrder(u16),

    /// Invalid magic number after the byte-order marker
    #[error("Wrong magic number for TIFF file: expected 42, got {0}")]
    InvalidMagic(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// The directory chain points back to a directory that was already read
    #[error("Cyclic directory chain: offset {offset} visited twice")]
    CyclicDirectoryChain { offset: u64 },

    /// The directory chain is longer than the configured limit
    #[error("Directory chain exceeds the limit of {limit} directories")]
    TooManyDirectories { limit: usize },

    /// A read would run past the end of the buffer
    #[error("Read out of bounds: {requested} bytes at offset {offset}, buffer size is {size}")]
    OutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Field type code has no known byte width
    #[error("Unknown field type: {0}")]
    UnknownType(u16),

    /// Required tag is missing from a directory
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type, count or value
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Strips of one directory do not follow each other in the file
    #[error("Strips of directory {directory} are not contiguous")]
    NotContiguous { directory: usize },

    /// Planar configuration not handled by the assembler
    #[error("Unsupported planar configuration: {0}")]
    UnsupportedPlanarConfig(u16),

    /// Samples per pixel not handled for this layout
    #[error("Unsupported samples per pixel: {0}")]
    UnsupportedSamplesPerPixel(u16),

    /// Compression scheme without a registered decoder
    #[error("Unknown or unsupported compression: {0}")]
    UnknownCompression(u16),

    /// Sample format and bit depth do not name a numeric element type
    #[error("Unsupported element type: {format} with {bits} bits")]
    UnsupportedElementType { format: String, bits: u16 },

    /// A slice disagrees with slice 0 on a structural tag
    #[error("Inconsistent directory {directory}: {tag} is {found}, expected {expected}")]
    InconsistentDirectory {
        directory: usize,
        tag: &'static str,
        expected: String,
        found: String,
    },

    /// Bits per pixel is not a whole number of bytes
    #[error("Bits per pixel {0} is not a multiple of 8")]
    MisalignedBits(u32),

    /// No directory carries the requested subfile type
    #[error("No directories with subfile type {subfile_type}")]
    NoMatchingDirectories { subfile_type: u32 },

    /// Strip decoder failed or produced too little data
    #[error("Failed to decode {compression} strip: {message}")]
    Codec {
        compression: &'static str,
        message: String,
    },

    /// Typed access to a view with a different element type
    #[error("Element type mismatch: requested {expected}, view holds {actual}")]
    ElementTypeMismatch { expected: String, actual: String },
}

impl TiffError {
    /// The failure class this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TiffError::Io(_) => ErrorCategory::Io,
            TiffError::UnsupportedMode(_)
            | TiffError::InvalidByteOrder(_)
            | TiffError::InvalidMagic(_)
            | TiffError::FileTooSmall { .. }
            | TiffError::CyclicDirectoryChain { .. }
            | TiffError::TooManyDirectories { .. }
            | TiffError::UnknownType(_)
            | TiffError::MissingTag(_)
            | TiffError::InvalidTagValue { .. }
            | TiffError::NoMatchingDirectories { .. } => ErrorCategory::Format,
            TiffError::OutOfBounds { .. } => ErrorCategory::OutOfBounds,
            TiffError::NotContiguous { .. }
            | TiffError::UnsupportedPlanarConfig(_)
            | TiffError::UnsupportedSamplesPerPixel(_)
            | TiffError::UnknownCompression(_)
            | TiffError::UnsupportedElementType { .. }
            | TiffError::ElementTypeMismatch { .. } => ErrorCategory::UnsupportedFeature,
            TiffError::InconsistentDirectory { .. } => ErrorCategory::InconsistentDirectory,
            TiffError::MisalignedBits(_) => ErrorCategory::MisalignedBits,
            TiffError::Codec { .. } => ErrorCategory::Decode,
        }
    }
}
