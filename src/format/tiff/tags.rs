//! TIFF tag and field type catalog.
//!
//! This module is the fixed vocabulary used by the directory decoder:
//! - Field types and their byte widths (codes 1-12)
//! - Tag ids and their names
//! - Enumerated values of the structural tags (compression, sample format,
//!   planar configuration)
//!
//! Unknown codes are never an error here: [`tag_name`] and [`type_name`]
//! synthesize a name instead.

use std::borrow::Cow;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// The type code to byte width mapping is fixed: 1,1,2,4,8,1,1,2,4,8,4,8
/// for codes 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, zero terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two LONGs: numerator and denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLONGs: numerator and denominator
    SRational = 10,
    /// IEEE single precision float
    Float = 11,
    /// IEEE double precision float
    Double = 12,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type codes.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            _ => None,
        }
    }

    /// Canonical upper-case name of the type.
    pub const fn name(self) -> &'static str {
        match self {
            FieldType::Byte => "BYTE",
            FieldType::Ascii => "ASCII",
            FieldType::Short => "SHORT",
            FieldType::Long => "LONG",
            FieldType::Rational => "RATIONAL",
            FieldType::SByte => "SBYTE",
            FieldType::Undefined => "UNDEFINED",
            FieldType::SShort => "SSHORT",
            FieldType::SLong => "SLONG",
            FieldType::SRational => "SRATIONAL",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
        }
    }

    /// Get the numeric type code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maximum bytes that can be stored inline in a directory entry.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Whether the value is stored in the 4-byte value field: exactly one
    /// value no wider than the field. Arrays are always read via the offset.
    #[inline]
    pub fn fits_inline(self, count: u64) -> bool {
        count == 1 && self.size_in_bytes() <= Self::INLINE_THRESHOLD
    }
}

/// Name of a type code, `TYPE<id>` when the code is unknown.
pub fn type_name(code: u16) -> Cow<'static, str> {
    match FieldType::from_u16(code) {
        Some(field_type) => Cow::Borrowed(field_type.name()),
        None => Cow::Owned(format!("TYPE{}", code)),
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag ids the reader knows by name.
///
/// Tags not listed here are kept during parsing with a synthesized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Full-resolution image (0) or reduced-resolution thumbnail (1)
    NewSubfileType = 254,
    /// Deprecated subfile classification
    SubfileType = 255,
    /// Image width in pixels
    ImageWidth = 256,
    /// Image height (length) in pixels
    ImageLength = 257,
    /// Bits per sample, scalar or one value per sample
    BitsPerSample = 258,
    /// Compression scheme used
    Compression = 259,
    /// Photometric interpretation (min-is-black, RGB, ...)
    PhotometricInterpretation = 262,
    /// Free-form description string
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    /// Number of components per pixel
    SamplesPerPixel = 277,
    /// How components are organized (chunky vs planar)
    PlanarConfiguration = 284,
    /// Numeric interpretation of each sample
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Strip Organization
    // -------------------------------------------------------------------------
    /// Byte offsets of strips
    StripOffsets = 273,
    /// Row count per strip
    RowsPerStrip = 278,
    /// Byte counts of strips
    StripByteCounts = 279,

    // -------------------------------------------------------------------------
    // Tile Organization (recognized by name only)
    // -------------------------------------------------------------------------
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Resolution and bookkeeping
    // -------------------------------------------------------------------------
    XResolution = 282,
    YResolution = 283,
    ResolutionUnit = 296,
    Software = 305,
    DateTime = 306,
    Predictor = 317,
    ColorMap = 320,
    ExtraSamples = 338,

    // -------------------------------------------------------------------------
    // Vendor
    // -------------------------------------------------------------------------
    /// Zeiss LSM private metadata block
    CzLsmInfo = 34412,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags. Unknown tags are not an error.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::NewSubfileType),
            255 => Some(TiffTag::SubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            271 => Some(TiffTag::Make),
            272 => Some(TiffTag::Model),
            273 => Some(TiffTag::StripOffsets),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            282 => Some(TiffTag::XResolution),
            283 => Some(TiffTag::YResolution),
            284 => Some(TiffTag::PlanarConfiguration),
            296 => Some(TiffTag::ResolutionUnit),
            305 => Some(TiffTag::Software),
            306 => Some(TiffTag::DateTime),
            317 => Some(TiffTag::Predictor),
            320 => Some(TiffTag::ColorMap),
            322 => Some(TiffTag::TileWidth),
            323 => Some(TiffTag::TileLength),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            338 => Some(TiffTag::ExtraSamples),
            339 => Some(TiffTag::SampleFormat),
            34412 => Some(TiffTag::CzLsmInfo),
            _ => None,
        }
    }

    /// Get the numeric tag id.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Canonical tag name.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::SubfileType => "SubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::Make => "Make",
            TiffTag::Model => "Model",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::SampleFormat => "SampleFormat",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::XResolution => "XResolution",
            TiffTag::YResolution => "YResolution",
            TiffTag::ResolutionUnit => "ResolutionUnit",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::Predictor => "Predictor",
            TiffTag::ColorMap => "ColorMap",
            TiffTag::ExtraSamples => "ExtraSamples",
            TiffTag::CzLsmInfo => "CZ_LSMInfo",
        }
    }
}

/// Name of a tag id, `TAG0x<hex>` when the tag is unknown.
pub fn tag_name(tag: u16) -> Cow<'static, str> {
    match TiffTag::from_u16(tag) {
        Some(known) => Cow::Borrowed(known.name()),
        None => Cow::Owned(format!("TAG{:#x}", tag)),
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,
    /// CCITT modified Huffman RLE
    CcittRle = 2,
    /// LZW compression
    Lzw = 5,
    /// "Old-style" JPEG
    OldJpeg = 6,
    /// JPEG compression
    Jpeg = 7,
    /// Deflate/zlib compression
    Deflate = 8,
    /// PackBits run-length encoding
    PackBits = 32773,
    /// Adobe Deflate
    AdobeDeflate = 32946,
}

impl Compression {
    /// Create a Compression from its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::CcittRle),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::AdobeDeflate),
            _ => None,
        }
    }

    /// Get the numeric compression code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::CcittRle => "CCITT RLE",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::PackBits => "PackBits",
            Compression::AdobeDeflate => "Adobe Deflate",
        }
    }
}

// =============================================================================
// Sample Format
// =============================================================================

/// Numeric interpretation of a sample (SampleFormat tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Unsigned,
    Signed,
    Float,
    Complex,
}

impl SampleFormat {
    /// Map a SampleFormat code. `None` means the code is not recognized;
    /// callers fall back to unsigned and report a warning.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(SampleFormat::Unsigned),
            2 => Some(SampleFormat::Signed),
            3 => Some(SampleFormat::Float),
            6 => Some(SampleFormat::Complex),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SampleFormat::Unsigned => "uint",
            SampleFormat::Signed => "int",
            SampleFormat::Float => "float",
            SampleFormat::Complex => "complex",
        }
    }
}

// =============================================================================
// Planar Configuration
// =============================================================================

/// How the samples of a pixel are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanarConfiguration {
    /// Samples of one pixel are stored together
    Chunky,
    /// Each sample is stored in its own plane
    Separate,
}

impl PlanarConfiguration {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(PlanarConfiguration::Chunky),
            2 => Some(PlanarConfiguration::Separate),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        match self {
            PlanarConfiguration::Chunky => 1,
            PlanarConfiguration::Separate => 2,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
