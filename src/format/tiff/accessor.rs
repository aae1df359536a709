//! Endian-aware typed reads over the mapped file.
//!
//! [`ByteAccessor`] is a cheap `Copy` handle (a slice plus a byte order).
//! Every read is bounds-checked and fails with `OutOfBounds` instead of
//! panicking. Array reads return a [`TypedValues`] view that borrows the
//! underlying bytes and decodes elements on access.

use std::fmt;

use crate::error::TiffError;

use super::parser::ByteOrder;
use super::tags::FieldType;

// =============================================================================
// ByteAccessor
// =============================================================================

/// Typed, bounds-checked reads over an immutable byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteAccessor<'a> {
    bytes: &'a [u8],
    byte_order: ByteOrder,
}

impl<'a> ByteAccessor<'a> {
    pub fn new(bytes: &'a [u8], byte_order: ByteOrder) -> Self {
        Self { bytes, byte_order }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Total size of the underlying buffer.
    #[inline]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The whole underlying buffer.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&'a [u8], TiffError> {
        let size = self.bytes.len() as u64;
        let end = offset.checked_add(len).filter(|&end| end <= size);
        match end {
            Some(end) => Ok(&self.bytes[offset as usize..end as usize]),
            None => Err(TiffError::OutOfBounds {
                offset,
                requested: len,
                size,
            }),
        }
    }

    pub fn uint8(&self, offset: u64) -> Result<u8, TiffError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn uint16(&self, offset: u64) -> Result<u16, TiffError> {
        Ok(self.byte_order.read_u16(self.slice(offset, 2)?))
    }

    pub fn uint32(&self, offset: u64) -> Result<u32, TiffError> {
        Ok(self.byte_order.read_u32(self.slice(offset, 4)?))
    }

    pub fn uint64(&self, offset: u64) -> Result<u64, TiffError> {
        Ok(self.byte_order.read_u64(self.slice(offset, 8)?))
    }

    pub fn int16(&self, offset: u64) -> Result<i16, TiffError> {
        Ok(self.uint16(offset)? as i16)
    }

    pub fn int32(&self, offset: u64) -> Result<i32, TiffError> {
        Ok(self.uint32(offset)? as i32)
    }

    pub fn float32(&self, offset: u64) -> Result<f32, TiffError> {
        Ok(f32::from_bits(self.uint32(offset)?))
    }

    pub fn float64(&self, offset: u64) -> Result<f64, TiffError> {
        Ok(f64::from_bits(self.uint64(offset)?))
    }

    /// Zero-copy view of `count` values of the type with code `type_code`.
    ///
    /// # Errors
    /// - `UnknownType` if the type code has no known width
    /// - `OutOfBounds` if the values run past the end of the buffer
    pub fn values(
        &self,
        offset: u64,
        type_code: u16,
        count: u64,
    ) -> Result<TypedValues<'a>, TiffError> {
        let field_type = FieldType::from_u16(type_code).ok_or(TiffError::UnknownType(type_code))?;
        self.values_of(offset, field_type, count)
    }

    /// Zero-copy view of `count` values of a known field type.
    pub fn values_of(
        &self,
        offset: u64,
        field_type: FieldType,
        count: u64,
    ) -> Result<TypedValues<'a>, TiffError> {
        let len = (field_type.size_in_bytes() as u64)
            .checked_mul(count)
            .ok_or(TiffError::OutOfBounds {
                offset,
                requested: u64::MAX,
                size: self.len(),
            })?;
        let bytes = self.slice(offset, len)?;
        Ok(TypedValues::new(bytes, field_type, self.byte_order))
    }

    /// Read a byte string.
    ///
    /// With `length = None` the string runs up to (not including) the next
    /// zero byte; a string that is never terminated is `OutOfBounds`.
    pub fn string(&self, offset: u64, length: Option<u64>) -> Result<&'a [u8], TiffError> {
        match length {
            Some(len) => self.slice(offset, len),
            None => {
                let tail = self.slice(offset, self.len().saturating_sub(offset))?;
                match tail.iter().position(|&b| b == 0) {
                    Some(end) => Ok(&tail[..end]),
                    None => Err(TiffError::OutOfBounds {
                        offset,
                        requested: tail.len() as u64 + 1,
                        size: self.len(),
                    }),
                }
            }
        }
    }
}

// =============================================================================
// Scalar
// =============================================================================

/// One decoded element of a [`TypedValues`] view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Rational(u32, u32),
    SignedRational(i32, i32),
}

impl Scalar {
    /// The value as an unsigned integer, if it is a non-negative integer.
    pub fn as_u64(self) -> Option<u64> {
        match self {
            Scalar::Unsigned(v) => Some(v),
            Scalar::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a float (rationals are divided out).
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Unsigned(v) => v as f64,
            Scalar::Signed(v) => v as f64,
            Scalar::Float(v) => v,
            Scalar::Rational(n, d) => n as f64 / d as f64,
            Scalar::SignedRational(n, d) => n as f64 / d as f64,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Unsigned(v) => write!(f, "{}", v),
            Scalar::Signed(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Rational(n, d) => write!(f, "{}/{}", n, d),
            Scalar::SignedRational(n, d) => write!(f, "{}/{}", n, d),
        }
    }
}

// =============================================================================
// TypedValues
// =============================================================================

/// A zero-copy view of an array of TIFF values.
///
/// The bytes stay in the file buffer; elements are decoded with the file's
/// byte order when they are read.
#[derive(Clone, Copy)]
pub struct TypedValues<'a> {
    bytes: &'a [u8],
    field_type: FieldType,
    byte_order: ByteOrder,
}

impl<'a> TypedValues<'a> {
    pub fn new(bytes: &'a [u8], field_type: FieldType, byte_order: ByteOrder) -> Self {
        Self {
            bytes,
            field_type,
            byte_order,
        }
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Number of elements in the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / self.field_type.size_in_bytes()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw bytes covered by the view.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Decode element `index`.
    pub fn get(&self, index: usize) -> Option<Scalar> {
        let width = self.field_type.size_in_bytes();
        let start = index.checked_mul(width)?;
        let raw = self.bytes.get(start..start + width)?;
        let order = self.byte_order;

        let value = match self.field_type {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => {
                Scalar::Unsigned(raw[0] as u64)
            }
            FieldType::SByte => Scalar::Signed(raw[0] as i8 as i64),
            FieldType::Short => Scalar::Unsigned(order.read_u16(raw) as u64),
            FieldType::SShort => Scalar::Signed(order.read_u16(raw) as i16 as i64),
            FieldType::Long => Scalar::Unsigned(order.read_u32(raw) as u64),
            FieldType::SLong => Scalar::Signed(order.read_u32(raw) as i32 as i64),
            FieldType::Float => Scalar::Float(f32::from_bits(order.read_u32(raw)) as f64),
            FieldType::Double => Scalar::Float(f64::from_bits(order.read_u64(raw))),
            FieldType::Rational => {
                Scalar::Rational(order.read_u32(&raw[..4]), order.read_u32(&raw[4..]))
            }
            FieldType::SRational => Scalar::SignedRational(
                order.read_u32(&raw[..4]) as i32,
                order.read_u32(&raw[4..]) as i32,
            ),
        };
        Some(value)
    }

    /// Decode element `index` as an unsigned integer.
    pub fn get_u64(&self, index: usize) -> Option<u64> {
        self.get(index).and_then(Scalar::as_u64)
    }

    pub fn iter(&self) -> impl Iterator<Item = Scalar> + 'a {
        let values = *self;
        (0..values.len()).filter_map(move |i| values.get(i))
    }

    /// Decode every element as an unsigned integer.
    ///
    /// Returns `None` if any element is not a non-negative integer.
    pub fn to_u64_vec(&self) -> Option<Vec<u64>> {
        self.iter().map(Scalar::as_u64).collect()
    }
}

impl fmt::Debug for TypedValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedValues")
            .field("field_type", &self.field_type)
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
