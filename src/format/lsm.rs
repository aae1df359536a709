//! Zeiss LSM extension.
//!
//! LSM files are TIFF stacks with a private tag (34412, CZ_LSMInfo) whose
//! value is a binary structure. The entry's count field does not describe
//! that structure, so a pre-decode hook rewrites the entry to a BYTE array of
//! `StructureSize` bytes. A finalize hook then parses the fixed header and
//! the channel-name block and attaches them to the directory.
//!
//! # CZ_LSMInfo header (little-endian in practice, read in file order)
//!
//! ```text
//! Offset  Size  Field
//! 0       4     MagicNumber (0x0300494C or 0x0400494C)
//! 4       4     StructureSize
//! 8       20    DimensionX, DimensionY, DimensionZ, DimensionChannels,
//!               DimensionTime
//! 28      4     DataType
//! 32      8     ThumbnailX, ThumbnailY
//! 40      24    VoxelSizeX, VoxelSizeY, VoxelSizeZ (f64, meters)
//! 88      2     ScanType
//! 108     4     OffsetChannelColors
//! ```
//!
//! # Channel colors block
//!
//! ```text
//! 0   BlockSize      4   NumberColors   8   NumberNames
//! 12  ColorsOffset   16  NamesOffset    20  Mono
//! ```
//!
//! Names start at `block + NamesOffset`; each is a 4-byte length followed by
//! that many bytes of zero-padded text.

use tracing::{debug, warn};

use crate::error::TiffError;
use crate::format::tiff::{
    generic_names, ByteAccessor, DirectoryEntry, FieldType, FinalizeContext, FinalizeHook,
    HookRegistryBuilder, MemoryRegion, PreDecodeHook, RawEntry, TiffTag, VendorMetadata,
};

const MAGIC_V3: u32 = 0x0300_494C;
const MAGIC_V4: u32 = 0x0400_494C;

/// Bytes of the header this reader interprets.
pub const MIN_STRUCTURE_SIZE: u64 = 112;

const CHANNEL_COLORS_HEADER_SIZE: u64 = 24;

// =============================================================================
// LsmInfo
// =============================================================================

/// The parsed CZ_LSMInfo header.
#[derive(Debug, Clone, PartialEq)]
pub struct LsmInfo {
    pub magic: u32,
    pub structure_size: u32,
    pub dimension_x: u32,
    pub dimension_y: u32,
    pub dimension_z: u32,
    pub dimension_channels: u32,
    pub dimension_time: u32,
    pub data_type: u32,
    pub thumbnail_x: u32,
    pub thumbnail_y: u32,
    pub voxel_size_x: f64,
    pub voxel_size_y: f64,
    pub voxel_size_z: f64,
    pub scan_type: u16,
    pub offset_channel_colors: u32,

    /// Names from the channel colors block, empty when the block is absent
    pub channel_names: Vec<String>,
}

impl LsmInfo {
    /// Parse the header at `offset`.
    pub fn parse(bytes: ByteAccessor<'_>, offset: u64) -> Result<Self, TiffError> {
        let magic = bytes.uint32(offset)?;
        if magic != MAGIC_V3 && magic != MAGIC_V4 {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::CzLsmInfo.name(),
                message: format!("bad magic number {:#010x}", magic),
            });
        }
        let structure_size = bytes.uint32(offset + 4)?;
        if (structure_size as u64) < MIN_STRUCTURE_SIZE {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::CzLsmInfo.name(),
                message: format!(
                    "structure size {} is below {}",
                    structure_size, MIN_STRUCTURE_SIZE
                ),
            });
        }
        bytes.slice(offset, structure_size as u64)?;

        let u32_at = |rel: u64| bytes.uint32(offset + rel);
        let mut info = LsmInfo {
            magic,
            structure_size,
            dimension_x: u32_at(8)?,
            dimension_y: u32_at(12)?,
            dimension_z: u32_at(16)?,
            dimension_channels: u32_at(20)?,
            dimension_time: u32_at(24)?,
            data_type: u32_at(28)?,
            thumbnail_x: u32_at(32)?,
            thumbnail_y: u32_at(36)?,
            voxel_size_x: bytes.float64(offset + 40)?,
            voxel_size_y: bytes.float64(offset + 48)?,
            voxel_size_z: bytes.float64(offset + 56)?,
            scan_type: bytes.uint16(offset + 88)?,
            offset_channel_colors: u32_at(108)?,
            channel_names: Vec::new(),
        };

        if info.offset_channel_colors != 0 {
            info.channel_names = read_channel_names(bytes, info.offset_channel_colors as u64)?;
        }
        Ok(info)
    }

    /// Byte range of the channel colors block, if present.
    pub fn channel_colors_region(
        &self,
        bytes: ByteAccessor<'_>,
    ) -> Result<Option<MemoryRegion>, TiffError> {
        if self.offset_channel_colors == 0 {
            return Ok(None);
        }
        let start = self.offset_channel_colors as u64;
        let size = bytes.uint32(start)? as u64;
        Ok(Some(MemoryRegion::new(
            start,
            start + size,
            "CZ_LSMInfo channel colors",
        )))
    }

    /// Channel names for a subfile selection.
    ///
    /// Full-resolution images (0) take the names stored in the file, padded
    /// with `channel<j>` when fewer names than channels are stored.
    /// Thumbnails (1) are RGB and must have three samples.
    pub fn channel_names(
        &self,
        subfile_type: u32,
        samples_per_pixel: u16,
    ) -> Result<Vec<String>, TiffError> {
        match subfile_type {
            0 => Ok((0..samples_per_pixel as usize)
                .map(|j| {
                    self.channel_names
                        .get(j)
                        .filter(|name| !name.is_empty())
                        .cloned()
                        .unwrap_or_else(|| format!("channel{}", j))
                })
                .collect()),
            1 => {
                if samples_per_pixel != 3 {
                    return Err(TiffError::UnsupportedSamplesPerPixel(samples_per_pixel));
                }
                Ok(vec!["red".into(), "green".into(), "blue".into()])
            }
            _ => Ok(generic_names(samples_per_pixel)),
        }
    }
}

fn read_channel_names(bytes: ByteAccessor<'_>, block: u64) -> Result<Vec<String>, TiffError> {
    bytes.slice(block, CHANNEL_COLORS_HEADER_SIZE)?;
    let count = bytes.uint32(block + 8)?;
    let names_offset = bytes.uint32(block + 16)? as u64;

    let mut names = Vec::with_capacity(count.min(64) as usize);
    let mut position = block + names_offset;
    for _ in 0..count {
        let len = bytes.uint32(position)? as u64;
        let raw = bytes.string(position + 4, Some(len))?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        names.push(String::from_utf8_lossy(&raw[..end]).into_owned());
        position += 4 + len;
    }
    Ok(names)
}

// =============================================================================
// Hooks
// =============================================================================

/// Rewrites the CZ_LSMInfo entry to a BYTE array covering the structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsmInfoPreDecode;

impl PreDecodeHook for LsmInfoPreDecode {
    fn name(&self) -> &'static str {
        "lsm-info-layout"
    }

    fn pre_decode(&self, entry: &mut RawEntry, bytes: ByteAccessor<'_>) -> Result<(), TiffError> {
        if entry.tag != TiffTag::CzLsmInfo.as_u16() {
            return Ok(());
        }
        let offset = entry.value_offset(bytes);
        let structure_size = bytes.uint32(offset + 4)?;
        debug!(offset, structure_size, "found CZ_LSMInfo");

        entry.type_code = FieldType::Byte.as_u16();
        entry.count = structure_size as u64;
        entry.vendor_significant = true;
        Ok(())
    }
}

/// Parses CZ_LSMInfo and attaches it to the directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LsmInfoFinalize;

impl FinalizeHook for LsmInfoFinalize {
    fn name(&self) -> &'static str {
        "lsm-info"
    }

    fn finalize(
        &self,
        entry: &DirectoryEntry,
        ctx: &mut FinalizeContext<'_, '_>,
    ) -> Result<(), TiffError> {
        if entry.tag != TiffTag::CzLsmInfo.as_u16() {
            return Ok(());
        }
        let Some(offset) = entry.data_offset() else {
            warn!("CZ_LSMInfo entry has no readable value");
            return Ok(());
        };

        let bytes = ctx.bytes();
        let info = LsmInfo::parse(bytes, offset)?;
        if let Some(region) = info.channel_colors_region(bytes)? {
            ctx.add_region(region);
        }
        debug!(
            channels = info.dimension_channels,
            names = ?info.channel_names,
            "attached LSM metadata"
        );
        ctx.attach_vendor(VendorMetadata::ZeissLsm(info));
        Ok(())
    }
}

/// Add the LSM hooks to a registry under construction.
pub fn register(builder: HookRegistryBuilder) -> HookRegistryBuilder {
    builder.pre_decode(LsmInfoPreDecode).finalize(LsmInfoFinalize)
}

// =============================================================================
// Tests
// =============================================================================
