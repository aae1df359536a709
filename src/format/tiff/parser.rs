//! TIFF header parsing.
//!
//! # TIFF Header Structure
//!
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Magic (42 = 0x002A)
//! Bytes 4-7: Offset to first directory (4 bytes)
//! ```
//!
//! Directories that follow use a 2-byte entry count, 12-byte entries and a
//! 4-byte next-directory offset.

use crate::error::TiffError;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Magic number for classic TIFF
const TIFF_MAGIC: u16 = 42;

/// Size of the TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one directory entry in bytes (tag, type, count, value/offset)
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Size of the entry count at the start of a directory
pub const DIRECTORY_COUNT_SIZE: usize = 2;

/// Size of the next-directory offset at the end of a directory
pub const NEXT_OFFSET_SIZE: usize = 4;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read respecting this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

/// The first `N` bytes of `bytes`. Callers slice to the exact width first.
#[inline]
fn prefix<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut raw = [0u8; N];
    raw.copy_from_slice(&bytes[..N]);
    raw
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = prefix::<2>(bytes);
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = prefix::<4>(bytes);
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let raw = prefix::<8>(bytes);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Offset to the first directory in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from the start of the file.
    ///
    /// # Errors
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidByteOrder` if the byte-order marker is not II or MM
    /// - `InvalidMagic` if the magic number is not 42
    /// - `OutOfBounds` if the first directory offset is outside the file
    pub fn parse(bytes: &[u8]) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Both markers are palindromes, so either order reads them the same
        let marker = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match marker {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidByteOrder(marker)),
        };

        let magic = byte_order.read_u16(&bytes[2..4]);
        if magic != TIFF_MAGIC {
            return Err(TiffError::InvalidMagic(magic));
        }

        let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;
        if first_ifd_offset >= bytes.len() as u64 {
            return Err(TiffError::OutOfBounds {
                offset: first_ifd_offset,
                requested: DIRECTORY_COUNT_SIZE as u64,
                size: bytes.len() as u64,
            });
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }

    /// Parse a header that starts `first_byte` bytes into `bytes`, as for a
    /// TIFF embedded in a larger file.
    ///
    /// The stored first-directory offset is relative to the header; the
    /// returned one is absolute. Offsets inside directories are not shifted.
    pub fn parse_at(bytes: &[u8], first_byte: u64) -> Result<Self, TiffError> {
        let embedded = usize::try_from(first_byte)
            .ok()
            .and_then(|start| bytes.get(start..))
            .ok_or(TiffError::FileTooSmall {
                required: first_byte.saturating_add(TIFF_HEADER_SIZE as u64),
                actual: bytes.len() as u64,
            })?;
        let mut header = Self::parse(embedded)?;
        header.first_ifd_offset += first_byte;
        Ok(header)
    }

    /// Total size of a directory with `entry_count` entries, including the
    /// count field and the next-directory offset.
    #[inline]
    pub const fn directory_size(entry_count: usize) -> usize {
        DIRECTORY_COUNT_SIZE + entry_count * DIRECTORY_ENTRY_SIZE + NEXT_OFFSET_SIZE
    }
}

// =============================================================================
// Tests
// =============================================================================
