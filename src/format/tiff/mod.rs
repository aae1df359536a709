//! TIFF parser for image stacks.
//!
//! This module reads classic TIFF files straight from a mapped buffer and
//! turns a chain of per-slice directories into channel arrays.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **IFD (Image File Directory)**: One directory per slice (z-plane, time point or
//!   thumbnail). Directories form a linked list terminated by a zero offset.
//!
//! - **Inline vs offset values**: Values of at most 4 bytes are stored inline in the
//!   entry; larger values are stored at an offset pointed to by the entry.
//!
//! - **Hooks**: Vendor extensions plug into entry decoding through a
//!   [`HookRegistry`] built once before parsing.
//!
//! - **Zero-copy samples**: Uncompressed stacks with regular spacing are exposed as
//!   strided views into the mapped file; everything else is assembled into an owned
//!   buffer.

mod accessor;
mod directory;
mod entry;
mod hooks;
mod parser;
mod regions;
mod samples;
mod tags;
mod view;

pub use accessor::{ByteAccessor, Scalar, TypedValues};
pub use directory::{
    ranges_are_contiguous, read_chain, ImageFileDirectory, VendorMetadata,
    DEFAULT_MAX_DIRECTORIES,
};
pub use entry::{DirectoryEntry, RawEntry, ValueLocation};
pub use hooks::{
    FinalizeContext, FinalizeHook, HookRegistry, HookRegistryBuilder, PreDecodeHook,
    StripRegionsHook,
};
pub use parser::{ByteOrder, TiffHeader, DIRECTORY_ENTRY_SIZE, TIFF_HEADER_SIZE};
pub use regions::{validate_regions, MemoryRegion, RegionIssue, RegionReport};
pub use samples::{
    assemble, constant_step, contiguous_stack, first_discontinuity, generic_names, Samples,
    StackSummary,
};
pub use tags::{
    tag_name, type_name, Compression, FieldType, PlanarConfiguration, SampleFormat, TiffTag,
};
pub use view::{ElementType, SampleStorage, SampleType, SampleView};
