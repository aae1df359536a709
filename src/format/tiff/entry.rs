//! Directory entry decoding.
//!
//! Each directory entry is a fixed 12-byte record:
//!
//! ```text
//! Bytes 0-1:  Tag id
//! Bytes 2-3:  Field type code
//! Bytes 4-7:  Element count
//! Bytes 8-11: Value (if it fits) or absolute offset of the value
//! ```
//!
//! Decoding runs the registered pre-decode hooks on the [`RawEntry`] before
//! the value location is resolved, so a vendor hook can reinterpret type and
//! count of a private tag.

use std::borrow::Cow;
use std::fmt;

use tracing::trace;

use crate::error::TiffError;

use super::accessor::{ByteAccessor, TypedValues};
use super::hooks::HookRegistry;
use super::regions::MemoryRegion;
use super::tags::{tag_name, type_name, FieldType, TiffTag};

// =============================================================================
// RawEntry
// =============================================================================

/// An entry as read from the directory table, before its value is resolved.
///
/// Pre-decode hooks receive this and may rewrite `type_code` and `count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// File offset of the 12-byte record
    pub position: u64,
    pub tag: u16,
    pub type_code: u16,
    pub count: u64,
    /// The 4-byte value/offset field, as stored
    pub value_field: [u8; 4],
    /// Set by vendor hooks for private tags they own
    pub vendor_significant: bool,
}

impl RawEntry {
    /// Read the record at `position`.
    pub fn read(bytes: ByteAccessor<'_>, position: u64) -> Result<Self, TiffError> {
        let record = bytes.slice(position, 12)?;
        let order = bytes.byte_order();
        Ok(RawEntry {
            position,
            tag: order.read_u16(&record[0..2]),
            type_code: order.read_u16(&record[2..4]),
            count: order.read_u32(&record[4..8]) as u64,
            value_field: [record[8], record[9], record[10], record[11]],
            vendor_significant: false,
        })
    }

    /// The value field interpreted as an absolute file offset.
    #[inline]
    pub fn value_offset(&self, bytes: ByteAccessor<'_>) -> u64 {
        bytes.byte_order().read_u32(&self.value_field) as u64
    }

    /// File offset of the value field inside the record.
    #[inline]
    pub fn value_field_position(&self) -> u64 {
        self.position + 8
    }
}

// =============================================================================
// DirectoryEntry
// =============================================================================

/// Where an entry's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLocation {
    /// Stored in the entry's own value field at `position`
    Inline { position: u64 },

    /// Stored elsewhere in the file
    OutOfLine { offset: u64, len: u64 },

    /// The field type is unknown, so the value cannot be located
    Unresolved,
}

/// A decoded directory entry.
///
/// The value location is resolved and bounds-checked at construction; typed
/// views are borrowed from the file buffer on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tag: u16,
    pub type_code: u16,
    pub count: u64,
    pub tag_name: Cow<'static, str>,
    pub type_name: Cow<'static, str>,
    pub location: ValueLocation,
    pub vendor_significant: bool,
    /// File offset of the 12-byte record
    pub position: u64,
}

impl DirectoryEntry {
    /// Decode the entry record at `position`.
    ///
    /// Runs the pre-decode hooks, resolves the field width, and picks the
    /// inline or out-of-line location. Unknown tags and unknown type codes
    /// are kept; only out-of-bounds value offsets fail.
    pub fn decode(
        bytes: ByteAccessor<'_>,
        position: u64,
        hooks: &HookRegistry,
    ) -> Result<Self, TiffError> {
        let mut raw = RawEntry::read(bytes, position)?;
        for hook in hooks.pre_decode_hooks() {
            hook.pre_decode(&mut raw, bytes)?;
        }

        let location = match FieldType::from_u16(raw.type_code) {
            Some(field_type) if field_type.fits_inline(raw.count) => ValueLocation::Inline {
                position: raw.value_field_position(),
            },
            Some(field_type) => {
                let offset = raw.value_offset(bytes);
                let len = (field_type.size_in_bytes() as u64)
                    .checked_mul(raw.count)
                    .ok_or(TiffError::OutOfBounds {
                        offset,
                        requested: u64::MAX,
                        size: bytes.len(),
                    })?;
                bytes.slice(offset, len)?;
                ValueLocation::OutOfLine { offset, len }
            }
            None => {
                trace!(tag = raw.tag, type_code = raw.type_code, "unknown field type");
                ValueLocation::Unresolved
            }
        };

        if TiffTag::from_u16(raw.tag).is_none() {
            trace!(tag = raw.tag, position, "unknown tag");
        }

        Ok(DirectoryEntry {
            tag: raw.tag,
            type_code: raw.type_code,
            count: raw.count,
            tag_name: tag_name(raw.tag),
            type_name: type_name(raw.type_code),
            location,
            vendor_significant: raw.vendor_significant,
            position,
        })
    }

    #[inline]
    pub fn field_type(&self) -> Option<FieldType> {
        FieldType::from_u16(self.type_code)
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.location, ValueLocation::Inline { .. })
    }

    /// Offset of an out-of-line value, `None` when inline or unresolved.
    pub fn offset(&self) -> Option<u64> {
        match self.location {
            ValueLocation::OutOfLine { offset, .. } => Some(offset),
            _ => None,
        }
    }

    /// File offset where the value bytes start, inline or not.
    pub fn data_offset(&self) -> Option<u64> {
        match self.location {
            ValueLocation::Inline { position } => Some(position),
            ValueLocation::OutOfLine { offset, .. } => Some(offset),
            ValueLocation::Unresolved => None,
        }
    }

    /// The byte range occupied by an out-of-line value.
    pub fn memory_region(&self) -> Option<MemoryRegion> {
        match self.location {
            ValueLocation::OutOfLine { offset, len } => Some(MemoryRegion::new(
                offset,
                offset + len,
                self.tag_name.clone().into_owned(),
            )),
            _ => None,
        }
    }

    /// Zero-copy typed view of the entry's `count` values.
    pub fn values<'a>(&self, bytes: ByteAccessor<'a>) -> Result<TypedValues<'a>, TiffError> {
        let field_type = self
            .field_type()
            .ok_or(TiffError::UnknownType(self.type_code))?;
        let offset = self
            .data_offset()
            .ok_or(TiffError::UnknownType(self.type_code))?;
        bytes.values_of(offset, field_type, self.count)
    }

    /// Human-readable rendering including a short value preview.
    pub fn describe(&self, bytes: ByteAccessor<'_>) -> String {
        const PREVIEW: usize = 8;

        let preview = match self.values(bytes) {
            Ok(values) if self.field_type() == Some(FieldType::Ascii) => {
                let raw = values.as_bytes();
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                format!("{:?}", String::from_utf8_lossy(&raw[..end]))
            }
            Ok(values) if values.len() == 1 => values
                .get(0)
                .map(|v| v.to_string())
                .unwrap_or_default(),
            Ok(values) => {
                let shown: Vec<String> = values.iter().take(PREVIEW).map(|v| v.to_string()).collect();
                let more = if values.len() > PREVIEW { ", ..." } else { "" };
                format!("[{}{}]", shown.join(", "), more)
            }
            Err(_) => "?".to_string(),
        };

        format!(
            "IFDEntry(tag={}, value={}, count={}, offset={})",
            self.tag_name,
            preview,
            self.count,
            self.offset()
                .map_or_else(|| "None".to_string(), |o| o.to_string())
        )
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IFDEntry(tag={}, type={}, count={}, offset=",
            self.tag_name, self.type_name, self.count
        )?;
        match self.offset() {
            Some(offset) => write!(f, "{})", offset),
            None => write!(f, "None)"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
