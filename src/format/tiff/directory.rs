//! Image file directories and the directory chain reader.
//!
//! # Directory Structure
//!
//! ```text
//! Bytes 0-1:        Number of entries (N)
//! Bytes 2..2+N*12:  Entries (12 bytes each)
//! Next 4 bytes:     Offset to next directory (0 = end of chain)
//! ```
//!
//! Each directory describes one slice of the stack. Directories are indexed
//! in chain order, starting at 0.

use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use crate::error::TiffError;
use crate::format::lsm::LsmInfo;

use super::accessor::ByteAccessor;
use super::entry::DirectoryEntry;
use super::hooks::{FinalizeContext, HookRegistry};
use super::parser::{TiffHeader, DIRECTORY_COUNT_SIZE, DIRECTORY_ENTRY_SIZE};
use super::regions::MemoryRegion;
use super::tags::{Compression, FieldType, PlanarConfiguration, SampleFormat, TiffTag};
use super::view::{ElementType, SampleStorage, SampleView};

/// Default limit on the number of directories in one chain.
pub const DEFAULT_MAX_DIRECTORIES: usize = 65_536;

// =============================================================================
// VendorMetadata
// =============================================================================

/// Vendor metadata attached to a directory by a finalize hook.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorMetadata {
    /// Zeiss confocal LSM (private tag 34412)
    ZeissLsm(LsmInfo),
}

impl VendorMetadata {
    pub fn name(&self) -> &'static str {
        match self {
            VendorMetadata::ZeissLsm(_) => "Zeiss LSM",
        }
    }
}

// =============================================================================
// ImageFileDirectory
// =============================================================================

/// One directory of the chain, with its decoded entries.
#[derive(Debug, Clone)]
pub struct ImageFileDirectory {
    /// Position in the chain (0 = first slice)
    pub index: usize,

    /// File offset of the entry count
    pub offset: u64,

    /// Entries in file order; tags need not be unique
    pub entries: Vec<DirectoryEntry>,

    /// Offset of the next directory, 0 at the end of the chain
    pub next_offset: u64,

    regions: Vec<MemoryRegion>,
    vendor: Option<VendorMetadata>,
}

impl ImageFileDirectory {
    /// Parse the directory at `offset`, running `hooks` on every entry.
    pub fn parse(
        bytes: ByteAccessor<'_>,
        index: usize,
        offset: u64,
        hooks: &HookRegistry,
    ) -> Result<Self, TiffError> {
        let count = bytes.uint16(offset)? as usize;
        let table_len = TiffHeader::directory_size(count) as u64;
        bytes.slice(offset, table_len)?;

        let first_entry = offset + DIRECTORY_COUNT_SIZE as u64;
        let entries = (0..count)
            .map(|i| {
                let position = first_entry + (i * DIRECTORY_ENTRY_SIZE) as u64;
                DirectoryEntry::decode(bytes, position, hooks)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let next_offset =
            bytes.uint32(first_entry + (count * DIRECTORY_ENTRY_SIZE) as u64)? as u64;

        let mut regions = vec![MemoryRegion::new(
            offset,
            offset + table_len,
            format!("IFD{} entries ({})", index, count),
        )];
        regions.extend(entries.iter().filter_map(DirectoryEntry::memory_region));

        let mut vendor = None;
        {
            let mut ctx = FinalizeContext::new(&entries, bytes, &mut regions, &mut vendor);
            hooks.run_finalize(&mut ctx)?;
        }

        debug!(
            index,
            offset,
            entries = count,
            next_offset,
            vendor = ?vendor.as_ref().map(VendorMetadata::name),
            "parsed directory"
        );

        Ok(ImageFileDirectory {
            index,
            offset,
            entries,
            next_offset,
            regions,
            vendor,
        })
    }

    // -------------------------------------------------------------------------
    // Entry lookup
    // -------------------------------------------------------------------------

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the given tag.
    pub fn get(&self, tag: TiffTag) -> Option<&DirectoryEntry> {
        self.get_by_id(tag.as_u16())
    }

    /// First entry with the given numeric tag id.
    pub fn get_by_id(&self, tag: u16) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    /// First value of a tag as an unsigned integer, `None` if absent.
    pub fn get_u64(&self, tag: TiffTag, bytes: ByteAccessor<'_>) -> Result<Option<u64>, TiffError> {
        let Some(entry) = self.get(tag) else {
            return Ok(None);
        };
        let values = entry.values(bytes)?;
        values
            .get_u64(0)
            .map(Some)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected an unsigned integer, found {}", entry.type_name),
            })
    }

    /// First value of a tag, or `default` when the tag is absent.
    pub fn get_u64_or(
        &self,
        tag: TiffTag,
        bytes: ByteAccessor<'_>,
        default: u64,
    ) -> Result<u64, TiffError> {
        Ok(self.get_u64(tag, bytes)?.unwrap_or(default))
    }

    /// First value of a tag that must be present.
    pub fn require_u64(&self, tag: TiffTag, bytes: ByteAccessor<'_>) -> Result<u64, TiffError> {
        self.get_u64(tag, bytes)?
            .ok_or(TiffError::MissingTag(tag.name()))
    }

    /// All values of a tag as unsigned integers, `None` if absent.
    pub fn get_u64_array(
        &self,
        tag: TiffTag,
        bytes: ByteAccessor<'_>,
    ) -> Result<Option<Vec<u64>>, TiffError> {
        let Some(entry) = self.get(tag) else {
            return Ok(None);
        };
        entry
            .values(bytes)?
            .to_u64_vec()
            .map(Some)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected unsigned integers, found {}", entry.type_name),
            })
    }

    /// ASCII value of a tag up to the first zero byte, `None` if absent.
    pub fn get_string(
        &self,
        tag: TiffTag,
        bytes: ByteAccessor<'_>,
    ) -> Result<Option<String>, TiffError> {
        let Some(entry) = self.get(tag) else {
            return Ok(None);
        };
        if entry.field_type() != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("expected ASCII, found {}", entry.type_name),
            });
        }
        let raw = entry.values(bytes)?.as_bytes();
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(Some(String::from_utf8_lossy(&raw[..end]).into_owned()))
    }

    /// NewSubfileType, `None` when the tag is absent.
    pub fn subfile_type(&self, bytes: ByteAccessor<'_>) -> Result<Option<u64>, TiffError> {
        self.get_u64(TiffTag::NewSubfileType, bytes)
    }

    /// Whether this directory belongs to the given subfile selection.
    /// A directory without NewSubfileType matches every selector.
    pub fn matches_subfile_type(
        &self,
        subfile_type: u32,
        bytes: ByteAccessor<'_>,
    ) -> Result<bool, TiffError> {
        Ok(self
            .subfile_type(bytes)?
            .map_or(true, |t| t == subfile_type as u64))
    }

    // -------------------------------------------------------------------------
    // Strips
    // -------------------------------------------------------------------------

    /// Byte ranges of this directory's strips, in strip order.
    pub fn strips(&self, bytes: ByteAccessor<'_>) -> Result<Vec<Range<u64>>, TiffError> {
        let offsets = self
            .get_u64_array(TiffTag::StripOffsets, bytes)?
            .ok_or(TiffError::MissingTag(TiffTag::StripOffsets.name()))?;
        let counts = self
            .get_u64_array(TiffTag::StripByteCounts, bytes)?
            .ok_or(TiffError::MissingTag(TiffTag::StripByteCounts.name()))?;

        if offsets.len() != counts.len() {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "{} byte counts for {} strip offsets",
                    counts.len(),
                    offsets.len()
                ),
            });
        }

        offsets
            .into_iter()
            .zip(counts)
            .map(|(offset, count)| {
                let end = offset.checked_add(count).ok_or(TiffError::OutOfBounds {
                    offset,
                    requested: count,
                    size: bytes.len(),
                })?;
                Ok(offset..end)
            })
            .collect()
    }

    /// Whether each strip ends exactly where the next one starts.
    pub fn is_contiguous(&self, bytes: ByteAccessor<'_>) -> Result<bool, TiffError> {
        Ok(ranges_are_contiguous(&self.strips(bytes)?))
    }

    /// The channel planes of one LSM directory, each a borrowed
    /// `[1, height, width]` view paired with its channel name.
    ///
    /// Requires uncompressed contiguous strips in the separate-planes layout,
    /// an xyz scan, and one strip per channel. Full-resolution directories
    /// have DimensionChannels planes; thumbnails have three RGB planes.
    pub fn get_contiguous<'a>(
        &self,
        bytes: ByteAccessor<'a>,
        vendor: Option<&VendorMetadata>,
    ) -> Result<Vec<(String, SampleView<'a>)>, TiffError> {
        let compression = self.get_u64_or(TiffTag::Compression, bytes, 1)?;
        if compression != Compression::None.as_u16() as u64 {
            return Err(TiffError::UnknownCompression(
                u16::try_from(compression).unwrap_or(u16::MAX),
            ));
        }
        let strips = self.strips(bytes)?;
        if !ranges_are_contiguous(&strips) {
            return Err(TiffError::NotContiguous {
                directory: self.index,
            });
        }

        let Some(VendorMetadata::ZeissLsm(info)) = vendor else {
            return Err(TiffError::MissingTag(TiffTag::CzLsmInfo.name()));
        };
        let planar = self.get_u64_or(TiffTag::PlanarConfiguration, bytes, 1)?;
        if planar != PlanarConfiguration::Separate.as_u16() as u64 {
            return Err(TiffError::UnsupportedPlanarConfig(
                u16::try_from(planar).unwrap_or(u16::MAX),
            ));
        }
        if info.scan_type != 0 {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::CzLsmInfo.name(),
                message: format!("scan type {} is not an xyz scan", info.scan_type),
            });
        }

        let subfile_type = self.subfile_type(bytes)?.unwrap_or(0);
        let channels = match subfile_type {
            0 => info.dimension_channels,
            1 => {
                let photometric = self.get_u64_or(TiffTag::PhotometricInterpretation, bytes, 0)?;
                if photometric != 2 {
                    return Err(TiffError::InvalidTagValue {
                        tag: TiffTag::PhotometricInterpretation.name(),
                        message: format!("thumbnail interpretation {} is not RGB", photometric),
                    });
                }
                3
            }
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag: TiffTag::NewSubfileType.name(),
                    message: format!("no channel layout for subfile type {}", other),
                })
            }
        };
        let channels = u16::try_from(channels).map_err(|_| TiffError::InvalidTagValue {
            tag: TiffTag::CzLsmInfo.name(),
            message: format!("{} channels", channels),
        })?;
        if strips.len() < channels as usize {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripOffsets.name(),
                message: format!("{} strips for {} channels", strips.len(), channels),
            });
        }
        let names = info.channel_names(subfile_type as u32, channels)?;

        let dimension = |tag: TiffTag| -> Result<usize, TiffError> {
            let value = self.require_u64(tag, bytes)?;
            usize::try_from(value).map_err(|_| TiffError::InvalidTagValue {
                tag: tag.name(),
                message: format!("{} does not fit in usize", value),
            })
        };
        let width = dimension(TiffTag::ImageWidth)?;
        let height = dimension(TiffTag::ImageLength)?;
        let bits = self
            .get_u64_array(TiffTag::BitsPerSample, bytes)?
            .ok_or(TiffError::MissingTag(TiffTag::BitsPerSample.name()))?;
        let format = self
            .get_u64(TiffTag::SampleFormat, bytes)?
            .and_then(|code| u16::try_from(code).ok())
            .and_then(SampleFormat::from_code)
            .unwrap_or(SampleFormat::Unsigned);

        let mut planes = Vec::with_capacity(names.len());
        for (j, (name, strip)) in names.into_iter().zip(&strips).enumerate() {
            let channel_bits = bits.get(j).or(bits.first()).copied().unwrap_or(8);
            let channel_bits = u16::try_from(channel_bits).map_err(|_| TiffError::InvalidTagValue {
                tag: TiffTag::BitsPerSample.name(),
                message: format!("{} does not fit in 16 bits", channel_bits),
            })?;
            let element = ElementType::new(format, channel_bits)?;
            let pixel = element.size_in_bytes();
            let row = width.checked_mul(pixel);
            let plane = row.and_then(|row| row.checked_mul(height));
            let (Some(row), Some(plane)) = (row, plane) else {
                return Err(TiffError::InvalidTagValue {
                    tag: TiffTag::ImageLength.name(),
                    message: format!("{}x{} plane overflows usize", width, height),
                });
            };
            if strip.end - strip.start != plane as u64 {
                return Err(TiffError::InvalidTagValue {
                    tag: TiffTag::StripByteCounts.name(),
                    message: format!(
                        "plane {} of directory {} holds {} bytes, needs {}",
                        j,
                        self.index,
                        strip.end - strip.start,
                        plane
                    ),
                });
            }

            let view = SampleView::new(
                SampleStorage::Borrowed(bytes.slice(strip.start, plane as u64)?),
                0,
                [1, height, width],
                [plane, row, pixel],
                element,
                bytes.byte_order(),
            )?;
            planes.push((name, view));
        }
        Ok(planes)
    }

    // -------------------------------------------------------------------------
    // Diagnostics and vendor data
    // -------------------------------------------------------------------------

    /// Regions recorded while parsing: the entry table, out-of-line values,
    /// and whatever finalize hooks added.
    pub fn memory_regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn vendor(&self) -> Option<&VendorMetadata> {
        self.vendor.as_ref()
    }
}

/// True when every range ends where the next begins. Zero or one range is
/// trivially contiguous.
pub fn ranges_are_contiguous(ranges: &[Range<u64>]) -> bool {
    ranges.windows(2).all(|pair| pair[0].end == pair[1].start)
}

// =============================================================================
// Directory Chain Reader
// =============================================================================

/// Walk the directory chain starting at `first_offset`.
///
/// The walk stops at a zero next-offset. A directory offset seen twice is
/// `CyclicDirectoryChain`; more than `max_directories` directories is
/// `TooManyDirectories`.
pub fn read_chain(
    bytes: ByteAccessor<'_>,
    first_offset: u64,
    hooks: &HookRegistry,
    max_directories: usize,
) -> Result<Vec<ImageFileDirectory>, TiffError> {
    let mut directories = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = first_offset;

    while offset != 0 {
        if !seen.insert(offset) {
            return Err(TiffError::CyclicDirectoryChain { offset });
        }
        if directories.len() >= max_directories {
            return Err(TiffError::TooManyDirectories {
                limit: max_directories,
            });
        }

        let directory = ImageFileDirectory::parse(bytes, directories.len(), offset, hooks)?;
        offset = directory.next_offset;
        directories.push(directory);
    }

    debug!(count = directories.len(), "read directory chain");
    Ok(directories)
}

// =============================================================================
// Tests
// =============================================================================
