//! Sample assembly: directory chain to per-channel `[depth, height, width]`
//! views.
//!
//! # Fast path
//!
//! When every selected slice is uncompressed and the gap between one slice's
//! strips and the next is constant, all channels are strided views into the
//! mapped file. Nothing is copied.
//!
//! # Slow path
//!
//! Otherwise each slice's strips are copied (or decoded) into one owned
//! buffer of `depth * bytes_per_image` bytes, and the channel views are cut
//! from that buffer with the same slicing rule.
//!
//! # Channel slicing
//!
//! - Chunky (planar configuration 1): channel `j` starts at the byte offset
//!   of sample `j` within a pixel and advances by `bytes_per_pixel`.
//! - Separate (planar configuration 2, vendor layouts only): channel `j` is
//!   the `width * height * bytes_per_sample[j]` plane that follows the planes
//!   of channels `< j`.

use std::ops::Range;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::CodecRegistry;
use crate::error::TiffError;

use super::accessor::ByteAccessor;
use super::directory::{ranges_are_contiguous, ImageFileDirectory, VendorMetadata};
use super::tags::{Compression, PlanarConfiguration, SampleFormat, TiffTag};
use super::view::{ElementType, SampleStorage, SampleView};

// =============================================================================
// Result types
// =============================================================================

/// Channel views assembled from a directory chain.
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    /// One view per channel, each `[depth, height, width]`
    pub channels: Vec<SampleView<'a>>,

    /// Channel names, parallel to `channels`
    pub names: Vec<String>,

    /// Non-fatal conditions met while assembling
    pub warnings: Vec<String>,

    /// Structural parameters of the stack
    pub summary: StackSummary,
}

impl<'a> Samples<'a> {
    /// Iterate `(name, view)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleView<'a>)> {
        self.names.iter().map(String::as_str).zip(&self.channels)
    }

    /// View of the channel with the given name.
    pub fn channel(&self, name: &str) -> Option<&SampleView<'a>> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Copy borrowed views so the result no longer depends on the image.
    pub fn into_owned(self) -> Samples<'static> {
        Samples {
            channels: self
                .channels
                .into_iter()
                .map(SampleView::into_owned)
                .collect(),
            names: self.names,
            warnings: self.warnings,
            summary: self.summary,
        }
    }
}

/// Structural parameters read from the first selected slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackSummary {
    pub depth: usize,
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: u16,
    pub planar_configuration: u16,
    pub bits_per_sample: Vec<u16>,
    pub sample_format: SampleFormat,
    pub compression: u16,
    pub bytes_per_pixel: usize,
    pub bytes_per_row: usize,
    pub bytes_per_image: usize,
    pub strips_per_image: usize,
    pub rows_per_strip: usize,
    /// Bytes covered by the strips of one slice
    pub strip_span: u64,
    /// Gap between consecutive slices, when constant
    pub step: Option<u64>,
    /// Whether the channels borrow from the file
    pub zero_copy: bool,
}

// =============================================================================
// Slice parameters
// =============================================================================

/// Tags every slice must agree on with slice 0.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SliceShape {
    width: u64,
    height: u64,
    planar: u16,
    bits: Vec<u16>,
}

fn narrow_u16(tag: TiffTag, value: u64) -> Result<u16, TiffError> {
    u16::try_from(value).map_err(|_| TiffError::InvalidTagValue {
        tag: tag.name(),
        message: format!("{} does not fit in 16 bits", value),
    })
}

/// Product of sizes derived from `tag`, failing instead of wrapping.
fn checked_size(tag: TiffTag, factors: &[usize]) -> Result<usize, TiffError> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| TiffError::InvalidTagValue {
            tag: tag.name(),
            message: format!("size {:?} overflows usize", factors),
        })
}

fn narrow_usize(tag: TiffTag, value: u64) -> Result<usize, TiffError> {
    usize::try_from(value).map_err(|_| TiffError::InvalidTagValue {
        tag: tag.name(),
        message: format!("{} does not fit in usize", value),
    })
}

/// BitsPerSample as one value per sample; a single value is replicated.
fn bits_per_sample(
    dir: &ImageFileDirectory,
    bytes: ByteAccessor<'_>,
    samples_per_pixel: u16,
) -> Result<Option<Vec<u16>>, TiffError> {
    let Some(raw) = dir.get_u64_array(TiffTag::BitsPerSample, bytes)? else {
        return Ok(None);
    };
    let bits = raw
        .into_iter()
        .map(|b| narrow_u16(TiffTag::BitsPerSample, b))
        .collect::<Result<Vec<_>, _>>()?;

    match bits.len() {
        1 => Ok(Some(vec![bits[0]; samples_per_pixel as usize])),
        n if n >= samples_per_pixel as usize => {
            Ok(Some(bits[..samples_per_pixel as usize].to_vec()))
        }
        n => Err(TiffError::InvalidTagValue {
            tag: TiffTag::BitsPerSample.name(),
            message: format!("{} values for {} samples per pixel", n, samples_per_pixel),
        }),
    }
}

/// Resolve SampleFormat, falling back to unsigned for unknown codes.
fn sample_format(
    dir: &ImageFileDirectory,
    bytes: ByteAccessor<'_>,
    warnings: &mut Vec<String>,
) -> Result<SampleFormat, TiffError> {
    let Some(code) = dir.get_u64(TiffTag::SampleFormat, bytes)? else {
        return Ok(SampleFormat::Unsigned);
    };
    let format = u16::try_from(code).ok().and_then(SampleFormat::from_code);
    Ok(format.unwrap_or_else(|| {
        let message = format!("unsupported sample format {} is mapped to uint", code);
        warn!(directory = dir.index, "{}", message);
        warnings.push(message);
        SampleFormat::Unsigned
    }))
}

fn check_matches(
    dir: &ImageFileDirectory,
    tag: TiffTag,
    expected: String,
    found: Option<String>,
) -> Result<(), TiffError> {
    match found {
        Some(found) if found == expected => Ok(()),
        found => Err(TiffError::InconsistentDirectory {
            directory: dir.index,
            tag: tag.name(),
            expected,
            found: found.unwrap_or_else(|| "missing".to_string()),
        }),
    }
}

impl SliceShape {
    fn read_first(
        dir: &ImageFileDirectory,
        bytes: ByteAccessor<'_>,
        samples_per_pixel: u16,
    ) -> Result<Self, TiffError> {
        Ok(SliceShape {
            width: dir.require_u64(TiffTag::ImageWidth, bytes)?,
            height: dir.require_u64(TiffTag::ImageLength, bytes)?,
            planar: narrow_u16(
                TiffTag::PlanarConfiguration,
                dir.get_u64_or(TiffTag::PlanarConfiguration, bytes, 1)?,
            )?,
            bits: bits_per_sample(dir, bytes, samples_per_pixel)?
                .ok_or(TiffError::MissingTag(TiffTag::BitsPerSample.name()))?,
        })
    }

    /// Compare another slice against this one. Absent tags never default
    /// to slice 0's value.
    fn check(
        &self,
        dir: &ImageFileDirectory,
        bytes: ByteAccessor<'_>,
        samples_per_pixel: u16,
    ) -> Result<(), TiffError> {
        let as_text = |v: Option<u64>| v.map(|v| v.to_string());

        check_matches(
            dir,
            TiffTag::ImageWidth,
            self.width.to_string(),
            as_text(dir.get_u64(TiffTag::ImageWidth, bytes)?),
        )?;
        check_matches(
            dir,
            TiffTag::ImageLength,
            self.height.to_string(),
            as_text(dir.get_u64(TiffTag::ImageLength, bytes)?),
        )?;
        check_matches(
            dir,
            TiffTag::PlanarConfiguration,
            self.planar.to_string(),
            Some(dir.get_u64_or(TiffTag::PlanarConfiguration, bytes, 1)?.to_string()),
        )?;
        check_matches(
            dir,
            TiffTag::BitsPerSample,
            format!("{:?}", self.bits),
            bits_per_sample(dir, bytes, samples_per_pixel)?.map(|b| format!("{:?}", b)),
        )
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Where channel views come from once the layout is known.
struct Source<'a> {
    storage: SampleStorage<'a>,
    base: usize,
    slice_stride: usize,
}

/// Assemble the channels of every directory whose NewSubfileType equals
/// `subfile_type` (directories without the tag always match).
///
/// `vendor` is the file's vendor metadata, if any; it decides channel names
/// and allows the separate-planes layout.
pub fn assemble<'a>(
    bytes: ByteAccessor<'a>,
    directories: &[ImageFileDirectory],
    vendor: Option<&VendorMetadata>,
    subfile_type: u32,
    codecs: &CodecRegistry,
    verbose: bool,
) -> Result<Samples<'a>, TiffError> {
    let mut warnings = Vec::new();

    // 1. Select slices
    let mut selected = Vec::new();
    for dir in directories {
        if dir.matches_subfile_type(subfile_type, bytes)? {
            selected.push(dir);
        }
    }
    let Some(&first) = selected.first() else {
        return Err(TiffError::NoMatchingDirectories { subfile_type });
    };
    let depth = selected.len();

    // 2. Strip layout of every slice
    let mut strips: Vec<Vec<Range<u64>>> = Vec::with_capacity(depth);
    for dir in &selected {
        let ranges = dir.strips(bytes)?;
        if ranges.is_empty() || !ranges_are_contiguous(&ranges) {
            return Err(TiffError::NotContiguous {
                directory: dir.index,
            });
        }
        strips.push(ranges);
    }
    let spans: Vec<Range<u64>> = strips
        .iter()
        .map(|r| r[0].start..r[r.len() - 1].end)
        .collect();

    // 3. Structural parameters from slice 0, checked against every other
    let samples_per_pixel = narrow_u16(
        TiffTag::SamplesPerPixel,
        first.get_u64_or(TiffTag::SamplesPerPixel, bytes, 1)?,
    )?;
    if samples_per_pixel == 0 {
        return Err(TiffError::UnsupportedSamplesPerPixel(0));
    }
    let shape = SliceShape::read_first(first, bytes, samples_per_pixel)?;
    let format = sample_format(first, bytes, &mut warnings)?;
    let compression = narrow_u16(
        TiffTag::Compression,
        first.get_u64_or(TiffTag::Compression, bytes, 1)?,
    )?;
    let uncompressed = compression == Compression::None.as_u16();

    for dir in &selected[1..] {
        shape.check(dir, bytes, samples_per_pixel)?;
    }

    let planar = PlanarConfiguration::from_code(shape.planar)
        .ok_or(TiffError::UnsupportedPlanarConfig(shape.planar))?;
    if planar == PlanarConfiguration::Separate && vendor.is_none() {
        return Err(TiffError::UnsupportedPlanarConfig(shape.planar));
    }

    // 4. Derived quantities
    let bits_per_pixel: u32 = shape.bits.iter().map(|&b| b as u32).sum();
    if bits_per_pixel % 8 != 0 {
        return Err(TiffError::MisalignedBits(bits_per_pixel));
    }
    let elements = shape
        .bits
        .iter()
        .map(|&bits| ElementType::new(format, bits))
        .collect::<Result<Vec<_>, _>>()?;
    let width = narrow_usize(TiffTag::ImageWidth, shape.width)?;
    let height = narrow_usize(TiffTag::ImageLength, shape.height)?;
    let bytes_per_pixel = (bits_per_pixel / 8) as usize;
    let bytes_per_row = checked_size(TiffTag::ImageWidth, &[width, bytes_per_pixel])?;
    let bytes_per_image = checked_size(TiffTag::ImageLength, &[height, bytes_per_row])?;
    let stack_bytes = checked_size(TiffTag::ImageLength, &[depth, bytes_per_image])?;
    let strips_per_image = if vendor.is_some() { 1 } else { strips[0].len() };

    let rows_per_strip = match first.get_u64(TiffTag::RowsPerStrip, bytes)? {
        Some(declared) => {
            let declared = narrow_usize(TiffTag::RowsPerStrip, declared)?.max(1);
            let consistent = if vendor.is_some() {
                declared >= height
            } else {
                height.div_ceil(declared) == strips_per_image
            };
            if !consistent {
                return Err(TiffError::InvalidTagValue {
                    tag: TiffTag::RowsPerStrip.name(),
                    message: format!(
                        "{} rows per strip for {} rows in {} strips",
                        declared, height, strips_per_image
                    ),
                });
            }
            declared.min(height)
        }
        None => height.div_ceil(strips_per_image.max(1)),
    };

    let strip_span = spans[0].end - spans[0].start;
    if uncompressed {
        if strip_span != bytes_per_image as u64 {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "strips of directory {} cover {} bytes, image needs {}",
                    first.index, strip_span, bytes_per_image
                ),
            });
        }
        for (dir, span) in selected.iter().zip(&spans).skip(1) {
            check_matches(
                dir,
                TiffTag::StripByteCounts,
                strip_span.to_string(),
                Some((span.end - span.start).to_string()),
            )?;
        }
    }

    // 5. Stride analysis
    let step = constant_step(&spans);
    let zero_copy = uncompressed && step.is_some();

    let summary = StackSummary {
        depth,
        width,
        height,
        samples_per_pixel,
        planar_configuration: shape.planar,
        bits_per_sample: shape.bits.clone(),
        sample_format: format,
        compression,
        bytes_per_pixel,
        bytes_per_row,
        bytes_per_image,
        strips_per_image,
        rows_per_strip,
        strip_span,
        step,
        zero_copy,
    };
    if verbose {
        info!(?summary, "sample layout");
    } else {
        debug!(?summary, "sample layout");
    }

    let source = if zero_copy {
        // Fast path: one strided window over every slice
        let slice_stride = (strip_span + step.unwrap_or(0)) as usize;
        let start = spans[0].start;
        let len = (depth as u64 - 1) * slice_stride as u64 + strip_span;
        debug!(start, slice_stride, depth, "zero-copy sample view");
        Source {
            storage: SampleStorage::Borrowed(bytes.slice(start, len)?),
            base: 0,
            slice_stride,
        }
    } else {
        // Slow path
        if planar == PlanarConfiguration::Chunky && samples_per_pixel > 1 {
            return Err(TiffError::UnsupportedSamplesPerPixel(samples_per_pixel));
        }
        // Each plane is no larger than one image, so these cannot overflow
        let plane_sizes: Vec<usize> = elements
            .iter()
            .map(|e| width * height * e.size_in_bytes())
            .collect();
        let buffer = copy_strips(
            bytes,
            &selected,
            &strips,
            compression,
            codecs,
            bytes_per_image,
            stack_bytes,
            rows_per_strip * bytes_per_row,
            planar,
            &plane_sizes,
        )?;
        Source {
            storage: SampleStorage::Owned(buffer),
            base: 0,
            slice_stride: bytes_per_image,
        }
    };

    // 6. Channel slicing
    let mut channels = Vec::with_capacity(elements.len());
    let mut channel_offset = source.base;
    for element in &elements {
        let sample_bytes = element.size_in_bytes();
        let (row_stride, pixel_stride, advance) = match planar {
            PlanarConfiguration::Chunky => (bytes_per_row, bytes_per_pixel, sample_bytes),
            PlanarConfiguration::Separate => {
                (width * sample_bytes, sample_bytes, width * height * sample_bytes)
            }
        };
        channels.push(SampleView::new(
            source.storage.clone(),
            channel_offset,
            [depth, height, width],
            [source.slice_stride, row_stride, pixel_stride],
            *element,
            bytes.byte_order(),
        )?);
        channel_offset += advance;
    }

    // 7. Names
    let names = match (planar, vendor) {
        (PlanarConfiguration::Separate, Some(VendorMetadata::ZeissLsm(info))) => {
            info.channel_names(subfile_type, samples_per_pixel)?
        }
        _ => generic_names(samples_per_pixel),
    };

    Ok(Samples {
        channels,
        names,
        warnings,
        summary,
    })
}

/// `sample0`, `sample1`, ...
pub fn generic_names(samples_per_pixel: u16) -> Vec<String> {
    (0..samples_per_pixel).map(|j| format!("sample{}", j)).collect()
}

/// The gap between consecutive slice spans when it is the same everywhere.
///
/// A single slice has step 0. A slice that starts before the previous one
/// ends never has a constant step.
pub fn constant_step(spans: &[Range<u64>]) -> Option<u64> {
    let mut gaps = spans
        .windows(2)
        .map(|pair| pair[1].start.checked_sub(pair[0].end));
    let Some(first) = gaps.next() else {
        return Some(0);
    };
    let first = first?;
    for gap in gaps {
        if gap != Some(first) {
            return None;
        }
    }
    Some(first)
}

/// Copy or decode every strip of every slice into one buffer.
#[allow(clippy::too_many_arguments)]
fn copy_strips(
    bytes: ByteAccessor<'_>,
    selected: &[&ImageFileDirectory],
    strips: &[Vec<Range<u64>>],
    compression: u16,
    codecs: &CodecRegistry,
    bytes_per_image: usize,
    stack_bytes: usize,
    bytes_per_strip: usize,
    planar: PlanarConfiguration,
    plane_sizes: &[usize],
) -> Result<Bytes, TiffError> {
    let decoder = if compression == Compression::None.as_u16() {
        None
    } else {
        Some(
            codecs
                .get(compression)
                .ok_or(TiffError::UnknownCompression(compression))?,
        )
    };
    debug!(
        slices = selected.len(),
        compression,
        bytes_per_image,
        "copying strips into owned buffer"
    );

    let mut buffer = Vec::with_capacity(stack_bytes);
    for (dir, ranges) in selected.iter().zip(strips) {
        let slice_start = buffer.len();
        for (i, range) in ranges.iter().enumerate() {
            let raw = bytes.slice(range.start, range.end - range.start)?;
            match decoder {
                None => buffer.extend_from_slice(raw),
                Some(decoder) => {
                    let written = buffer.len() - slice_start;
                    let remaining = bytes_per_image.saturating_sub(written);
                    let expected = match planar {
                        PlanarConfiguration::Chunky => bytes_per_strip.min(remaining),
                        PlanarConfiguration::Separate => {
                            plane_sizes.get(i).copied().unwrap_or(remaining).min(remaining)
                        }
                    };
                    buffer.extend_from_slice(&decoder.decode(raw, expected)?);
                }
            }
        }

        let written = buffer.len() - slice_start;
        if written != bytes_per_image {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::StripByteCounts.name(),
                message: format!(
                    "directory {} yields {} bytes, image needs {}",
                    dir.index, written, bytes_per_image
                ),
            });
        }
    }
    Ok(Bytes::from(buffer))
}

/// One borrowed `[depth, height, width]` view over every directory.
///
/// Requires strips that run on from one directory to the next, uncompressed
/// data, and one sample per pixel.
pub fn contiguous_stack<'a>(
    bytes: ByteAccessor<'a>,
    directories: &[ImageFileDirectory],
) -> Result<SampleView<'a>, TiffError> {
    let Some(first) = directories.first() else {
        return Err(TiffError::NoMatchingDirectories { subfile_type: 0 });
    };
    if let Some(index) = first_discontinuity(bytes, directories)? {
        return Err(TiffError::NotContiguous { directory: index });
    }

    let compression = narrow_u16(
        TiffTag::Compression,
        first.get_u64_or(TiffTag::Compression, bytes, 1)?,
    )?;
    if compression != Compression::None.as_u16() {
        return Err(TiffError::UnknownCompression(compression));
    }
    let samples_per_pixel = narrow_u16(
        TiffTag::SamplesPerPixel,
        first.get_u64_or(TiffTag::SamplesPerPixel, bytes, 1)?,
    )?;
    if samples_per_pixel != 1 {
        return Err(TiffError::UnsupportedSamplesPerPixel(samples_per_pixel));
    }

    let shape = SliceShape::read_first(first, bytes, 1)?;
    for dir in &directories[1..] {
        shape.check(dir, bytes, 1)?;
    }
    if shape.bits[0] % 8 != 0 {
        return Err(TiffError::MisalignedBits(shape.bits[0] as u32));
    }
    let mut warnings = Vec::new();
    let element = ElementType::new(sample_format(first, bytes, &mut warnings)?, shape.bits[0])?;

    let width = narrow_usize(TiffTag::ImageWidth, shape.width)?;
    let height = narrow_usize(TiffTag::ImageLength, shape.height)?;
    let pixel = element.size_in_bytes();
    let row = checked_size(TiffTag::ImageWidth, &[width, pixel])?;
    let bytes_per_image = checked_size(TiffTag::ImageLength, &[height, row])?;
    let len = checked_size(TiffTag::ImageLength, &[directories.len(), bytes_per_image])? as u64;

    let start = first.strips(bytes)?[0].start;
    let end = directories
        .last()
        .map(|dir| dir.strips(bytes))
        .transpose()?
        .and_then(|ranges| ranges.last().map(|r| r.end))
        .unwrap_or(start);
    if end - start != len {
        return Err(TiffError::InvalidTagValue {
            tag: TiffTag::StripByteCounts.name(),
            message: format!("stack data covers {} bytes, images need {}", end - start, len),
        });
    }
    SampleView::new(
        SampleStorage::Borrowed(bytes.slice(start, len)?),
        0,
        [directories.len(), height, width],
        [bytes_per_image, row, pixel],
        element,
        bytes.byte_order(),
    )
}

/// Index of the first directory whose strips are not contiguous, or whose
/// data does not start where the previous directory's data ends.
pub fn first_discontinuity(
    bytes: ByteAccessor<'_>,
    directories: &[ImageFileDirectory],
) -> Result<Option<usize>, TiffError> {
    let mut previous_end = None;
    for dir in directories {
        let ranges = dir.strips(bytes)?;
        if ranges.is_empty() || !ranges_are_contiguous(&ranges) {
            return Ok(Some(dir.index));
        }
        if previous_end.is_some_and(|end| end != ranges[0].start) {
            return Ok(Some(dir.index));
        }
        previous_end = Some(ranges[ranges.len() - 1].end);
    }
    Ok(None)
}

// =============================================================================
// Tests
// =============================================================================
