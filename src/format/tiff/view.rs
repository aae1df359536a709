//! Typed, shaped views over sample bytes.
//!
//! A [`SampleView`] is a `[depth, height, width]` grid of elements described
//! by byte strides over some storage. The storage is either borrowed from the
//! mapped file (fast path, tied to the image's lifetime) or an owned buffer
//! (slow path, independent of the image). Several channel views share one
//! storage: borrowed views share the slice, owned views share a `Bytes`
//! buffer.

use std::fmt;

use bytes::Bytes;
use ndarray::{Array3, ArrayView3, ShapeBuilder};

use crate::error::TiffError;

use super::parser::ByteOrder;
use super::tags::SampleFormat;

// =============================================================================
// ElementType
// =============================================================================

/// Numeric type of one sample: format plus bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementType {
    format: SampleFormat,
    bits: u16,
}

impl ElementType {
    /// Resolve a format and bit width to an element type.
    ///
    /// Integers take 8, 16, 32 or 64 bits; floats 32 or 64; complex values
    /// 64 or 128 (two floats).
    pub fn new(format: SampleFormat, bits: u16) -> Result<Self, TiffError> {
        let supported = match format {
            SampleFormat::Unsigned | SampleFormat::Signed => matches!(bits, 8 | 16 | 32 | 64),
            SampleFormat::Float => matches!(bits, 32 | 64),
            SampleFormat::Complex => matches!(bits, 64 | 128),
        };
        if !supported {
            return Err(TiffError::UnsupportedElementType {
                format: format.name().to_string(),
                bits,
            });
        }
        Ok(Self { format, bits })
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    #[inline]
    pub fn bits(&self) -> u16 {
        self.bits
    }

    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.bits as usize / 8
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.format.name(), self.bits)
    }
}

impl serde::Serialize for ElementType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// SampleType
// =============================================================================

/// Rust types a view can be converted to.
pub trait SampleType: Copy + 'static {
    const ELEMENT: ElementType;

    /// Decode one element from exactly `size_in_bytes` bytes.
    fn decode(raw: &[u8], byte_order: ByteOrder) -> Self;
}

macro_rules! impl_sample_type {
    ($ty:ty, $format:expr, $bits:expr) => {
        impl SampleType for $ty {
            const ELEMENT: ElementType = ElementType {
                format: $format,
                bits: $bits,
            };

            #[inline]
            fn decode(raw: &[u8], byte_order: ByteOrder) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(raw);
                match byte_order {
                    ByteOrder::LittleEndian => <$ty>::from_le_bytes(buf),
                    ByteOrder::BigEndian => <$ty>::from_be_bytes(buf),
                }
            }
        }
    };
}

impl_sample_type!(u8, SampleFormat::Unsigned, 8);
impl_sample_type!(i8, SampleFormat::Signed, 8);
impl_sample_type!(u16, SampleFormat::Unsigned, 16);
impl_sample_type!(i16, SampleFormat::Signed, 16);
impl_sample_type!(u32, SampleFormat::Unsigned, 32);
impl_sample_type!(i32, SampleFormat::Signed, 32);
impl_sample_type!(u64, SampleFormat::Unsigned, 64);
impl_sample_type!(i64, SampleFormat::Signed, 64);
impl_sample_type!(f32, SampleFormat::Float, 32);
impl_sample_type!(f64, SampleFormat::Float, 64);

// =============================================================================
// SampleView
// =============================================================================

/// Backing bytes of a [`SampleView`].
#[derive(Debug, Clone)]
pub enum SampleStorage<'a> {
    /// Borrowed from the mapped file; valid while the image lives
    Borrowed(&'a [u8]),

    /// Assembled into a buffer owned by the view
    Owned(Bytes),
}

impl SampleStorage<'_> {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            SampleStorage::Borrowed(slice) => *slice,
            SampleStorage::Owned(bytes) => bytes.as_ref(),
        }
    }
}

/// A `[depth, height, width]` grid of samples of one channel.
#[derive(Debug, Clone)]
pub struct SampleView<'a> {
    storage: SampleStorage<'a>,
    offset: usize,
    shape: [usize; 3],
    strides: [usize; 3],
    element: ElementType,
    byte_order: ByteOrder,
}

impl<'a> SampleView<'a> {
    /// Create a view, checking that every element lies inside `storage`.
    ///
    /// `strides` are in bytes, one per axis.
    pub fn new(
        storage: SampleStorage<'a>,
        offset: usize,
        shape: [usize; 3],
        strides: [usize; 3],
        element: ElementType,
        byte_order: ByteOrder,
    ) -> Result<Self, TiffError> {
        let len = storage.as_slice().len();
        if shape.iter().all(|&n| n > 0) {
            let last = shape
                .iter()
                .zip(&strides)
                .try_fold(offset, |acc, (&n, &stride)| {
                    (n - 1).checked_mul(stride).and_then(|d| acc.checked_add(d))
                })
                .and_then(|last| last.checked_add(element.size_in_bytes()));
            if last.map_or(true, |end| end > len) {
                return Err(TiffError::OutOfBounds {
                    offset: offset as u64,
                    requested: last.map_or(u64::MAX, |end| (end - offset) as u64),
                    size: len as u64,
                });
            }
        }

        Ok(Self {
            storage,
            offset,
            shape,
            strides,
            element,
            byte_order,
        })
    }

    /// True when the view points into the mapped file.
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.storage, SampleStorage::Borrowed(_))
    }

    /// "borrowed" or "owned".
    pub fn storage_kind(&self) -> &'static str {
        if self.is_borrowed() {
            "borrowed"
        } else {
            "owned"
        }
    }

    /// `[depth, height, width]`.
    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Byte strides per axis.
    #[inline]
    pub fn strides(&self) -> [usize; 3] {
        self.strides
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of the element at `(z, y, x)`.
    pub fn sample_bytes(&self, z: usize, y: usize, x: usize) -> Option<&[u8]> {
        let [d, h, w] = self.shape;
        if z >= d || y >= h || x >= w {
            return None;
        }
        let start = self.position(z, y, x);
        self.storage
            .as_slice()
            .get(start..start + self.element.size_in_bytes())
    }

    /// Element at `(z, y, x)`, `None` when the index is outside the view.
    pub fn get<T: SampleType>(&self, z: usize, y: usize, x: usize) -> Result<Option<T>, TiffError> {
        self.check_type::<T>()?;
        Ok(self
            .sample_bytes(z, y, x)
            .map(|raw| T::decode(raw, self.byte_order)))
    }

    /// Copy the view into an owned ndarray of `T`, byte-swapping as needed.
    pub fn to_array<T: SampleType>(&self) -> Result<Array3<T>, TiffError> {
        self.check_type::<T>()?;
        let data = self.storage.as_slice();
        let size = self.element.size_in_bytes();
        let [d, h, w] = self.shape;
        Ok(Array3::from_shape_fn((d, h, w), |(z, y, x)| {
            let start = self.position(z, y, x);
            T::decode(&data[start..start + size], self.byte_order)
        }))
    }

    /// Zero-copy ndarray view when the elements are single bytes.
    pub fn as_u8_view(&self) -> Option<ArrayView3<'_, u8>> {
        if self.element != u8::ELEMENT {
            return None;
        }
        let [d, h, w] = self.shape;
        let [sz, sy, sx] = self.strides;
        let data = self.storage.as_slice().get(self.offset..)?;
        ArrayView3::from_shape((d, h, w).strides((sz, sy, sx)), data).ok()
    }

    /// Detach the view from the mapped file by copying the bytes it spans.
    pub fn into_owned(self) -> SampleView<'static> {
        let end = self.span_end();
        let SampleView {
            storage,
            offset,
            shape,
            strides,
            element,
            byte_order,
        } = self;

        let (bytes, offset) = match storage {
            SampleStorage::Owned(bytes) => (bytes, offset),
            SampleStorage::Borrowed(slice) => (Bytes::copy_from_slice(&slice[offset..end]), 0),
        };
        SampleView {
            storage: SampleStorage::Owned(bytes),
            offset,
            shape,
            strides,
            element,
            byte_order,
        }
    }

    /// One past the last byte any element touches.
    fn span_end(&self) -> usize {
        if self.is_empty() {
            return self.offset;
        }
        let [d, h, w] = self.shape;
        self.position(d - 1, h - 1, w - 1) + self.element.size_in_bytes()
    }

    #[inline]
    fn position(&self, z: usize, y: usize, x: usize) -> usize {
        self.offset + z * self.strides[0] + y * self.strides[1] + x * self.strides[2]
    }

    fn check_type<T: SampleType>(&self) -> Result<(), TiffError> {
        if T::ELEMENT != self.element {
            return Err(TiffError::ElementTypeMismatch {
                expected: T::ELEMENT.to_string(),
                actual: self.element.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
