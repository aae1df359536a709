//! # TIFF Stack
//!
//! A zero-copy reader for multi-directory TIFF files and Zeiss LSM image
//! stacks.
//!
//! The file is memory-mapped once. Directory entries, tag values and pixel
//! samples are read straight from the mapping; when the slices of a stack are
//! uncompressed and evenly spaced, the resulting channel arrays are strided
//! views into the file rather than copies.
//!
//! ## Architecture
//!
//! - [`io`] - Memory-mapped file access
//! - [`mod@format`] - TIFF directory parsing, sample assembly and the LSM extension
//! - [`codec`] - Strip decoders for compressed data
//! - [`image`] - The opened image and its open options
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiff_stack::TiffImage;
//!
//! fn main() -> Result<(), tiff_stack::TiffError> {
//!     let image = TiffImage::open("stack.lsm")?;
//!     let samples = image.get_samples(0, false)?;
//!
//!     for (name, view) in samples.iter() {
//!         println!("{}: {:?} {}", name, view.shape(), view.element_type());
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod image;
pub mod io;

// Re-export commonly used types
pub use codec::{CodecRegistry, LzwDecoder, StripDecoder};
pub use config::{Cli, Command, CommonOptions, InspectConfig, OutputFormat, SamplesConfig};
pub use error::{ErrorCategory, IoError, TiffError};
pub use format::lsm::LsmInfo;
pub use format::tiff::{
    validate_regions, ByteAccessor, ByteOrder, Compression, DirectoryEntry, ElementType,
    FieldType, FinalizeContext, FinalizeHook, HookRegistry, HookRegistryBuilder,
    ImageFileDirectory, MemoryRegion, PlanarConfiguration, PreDecodeHook, RawEntry, RegionIssue,
    RegionReport, SampleFormat, SampleType, SampleView, Samples, StackSummary, TiffHeader,
    TiffTag, ValueLocation, VendorMetadata, DEFAULT_MAX_DIRECTORIES,
};
pub use image::{default_hooks, AccessMode, OpenOptions, TiffImage};
pub use io::MappedFile;
