//! Header and directory chain tests.
//!
//! Tests verify:
//! - Both byte orders decode the same values
//! - Inline and out-of-line entry values
//! - Unknown tags and types survive parsing
//! - Chains are walked in order; cycles and over-long chains are rejected
//! - Files open from disk through the memory map

use tiff_stack::{
    ByteOrder, ErrorCategory, FieldType, MemoryRegion, OpenOptions, TiffError, TiffImage,
    TiffTag, ValueLocation,
};

use super::test_utils::{
    is_tiff_magic, ramp, write_temp_file, ByteOrderType, IfdBuilder, TiffBuilder,
};

fn single_slice(order: ByteOrderType) -> Vec<u8> {
    let mut ifd = IfdBuilder::gray8(4, 2, ramp(0, 8));
    ifd.add_ascii(270, "hello stack")
        .add_entry(0x8000, 3, &[0x0102])
        .add_raw(0x8001, 12, 1, encode_f64(1.5, order))
        .add_raw(0x8002, 99, 1, vec![1, 2, 3, 4]);

    TiffBuilder::new()
        .with_byte_order(order)
        .add_ifd(ifd.build())
        .build()
}

fn encode_f64(value: f64, order: ByteOrderType) -> Vec<u8> {
    match order {
        ByteOrderType::LittleEndian => value.to_le_bytes().to_vec(),
        ByteOrderType::BigEndian => value.to_be_bytes().to_vec(),
    }
}

// =============================================================================
// Byte Order Tests
// =============================================================================

#[test]
fn test_little_endian_header() {
    let data = single_slice(ByteOrderType::LittleEndian);
    assert!(is_tiff_magic(&data));

    let image = TiffImage::from_bytes(data).unwrap();
    assert_eq!(image.byte_order(), ByteOrder::LittleEndian);
    assert_eq!(image.header().first_ifd_offset, 8);
    assert_eq!(image.directories().len(), 1);
}

#[test]
fn test_big_endian_header() {
    let data = single_slice(ByteOrderType::BigEndian);
    assert_eq!(&data[0..2], b"MM");

    let image = TiffImage::from_bytes(data).unwrap();
    assert_eq!(image.byte_order(), ByteOrder::BigEndian);
}

#[test]
fn test_short_value_respects_byte_order() {
    for order in [ByteOrderType::LittleEndian, ByteOrderType::BigEndian] {
        let image = TiffImage::from_bytes(single_slice(order)).unwrap();
        let bytes = image.accessor();
        let dir = &image.directories()[0];

        let entry = dir.get_by_id(0x8000).unwrap();
        assert!(entry.is_inline());
        assert_eq!(entry.values(bytes).unwrap().get_u64(0), Some(258));

        let position = entry.data_offset().unwrap();
        let raw = bytes.slice(position, 2).unwrap();
        match order {
            ByteOrderType::BigEndian => assert_eq!(raw, &[0x01, 0x02]),
            ByteOrderType::LittleEndian => assert_eq!(raw, &[0x02, 0x01]),
        }
    }
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_inline_and_out_of_line_values() {
    let image = TiffImage::from_bytes(single_slice(ByteOrderType::BigEndian)).unwrap();
    let bytes = image.accessor();
    let dir = &image.directories()[0];

    let width = dir.get(TiffTag::ImageWidth).unwrap();
    assert!(width.is_inline());
    assert_eq!(width.offset(), None);
    assert_eq!(dir.require_u64(TiffTag::ImageWidth, bytes).unwrap(), 4);

    let description = dir.get(TiffTag::ImageDescription).unwrap();
    assert!(!description.is_inline());
    assert!(description.offset().is_some());
    assert_eq!(
        dir.get_string(TiffTag::ImageDescription, bytes).unwrap().as_deref(),
        Some("hello stack")
    );

    let double = dir.get_by_id(0x8001).unwrap();
    assert_eq!(double.field_type(), Some(FieldType::Double));
    assert!(double.offset().is_some());
    let value = double.values(bytes).unwrap().get(0).unwrap();
    assert_eq!(value.as_f64(), 1.5);
}

#[test]
fn test_unknown_type_is_unresolved() {
    let image = TiffImage::from_bytes(single_slice(ByteOrderType::LittleEndian)).unwrap();
    let bytes = image.accessor();
    let entry = image.directories()[0].get_by_id(0x8002).unwrap();

    assert_eq!(entry.location, ValueLocation::Unresolved);
    assert_eq!(entry.type_name, "TYPE99");
    assert_eq!(entry.tag_name, "TAG0x8002");
    assert!(matches!(
        entry.values(bytes),
        Err(TiffError::UnknownType(99))
    ));
    assert_eq!(
        entry.to_string(),
        "IFDEntry(tag=TAG0x8002, type=TYPE99, count=1, offset=None)"
    );
}

#[test]
fn test_entry_rendering() {
    let image = TiffImage::from_bytes(single_slice(ByteOrderType::LittleEndian)).unwrap();
    let bytes = image.accessor();
    let dir = &image.directories()[0];

    let width = dir.get(TiffTag::ImageWidth).unwrap();
    assert_eq!(
        width.to_string(),
        "IFDEntry(tag=ImageWidth, type=LONG, count=1, offset=None)"
    );
    assert!(width.describe(bytes).contains("value=4"));

    let description = dir.get(TiffTag::ImageDescription).unwrap();
    assert!(description.describe(bytes).contains("\"hello stack\""));
}

// =============================================================================
// Chain Tests
// =============================================================================

fn stack(depth: usize) -> TiffBuilder {
    (0..depth).fold(TiffBuilder::new(), |builder, z| {
        builder.add_ifd(IfdBuilder::gray8(3, 2, ramp(z as u8 * 10, 6)))
    })
}

#[test]
fn test_chain_order() {
    let image = TiffImage::from_bytes(stack(4).build()).unwrap();
    let dirs = image.directories();

    assert_eq!(dirs.len(), 4);
    for (i, dir) in dirs.iter().enumerate() {
        assert_eq!(dir.index, i);
    }
    assert!(dirs.windows(2).all(|pair| pair[0].next_offset == pair[1].offset));
    assert_eq!(dirs[3].next_offset, 0);
}

#[test]
fn test_cyclic_chain() {
    let data = stack(2).with_cycle_to(0).build();
    let err = TiffImage::from_bytes(data).unwrap_err();

    assert!(matches!(err, TiffError::CyclicDirectoryChain { offset: 8 }));
    assert_eq!(err.category(), ErrorCategory::Format);
}

#[test]
fn test_directory_limit() {
    let result = OpenOptions::new()
        .max_directories(2)
        .from_bytes(stack(3).build());
    assert!(matches!(
        result,
        Err(TiffError::TooManyDirectories { limit: 2 })
    ));

    let image = OpenOptions::new()
        .max_directories(3)
        .from_bytes(stack(3).build())
        .unwrap();
    assert_eq!(image.directories().len(), 3);
}

#[test]
fn test_truncated_file() {
    let mut data = stack(2).build();
    data.truncate(30);
    assert!(matches!(
        TiffImage::from_bytes(data),
        Err(TiffError::OutOfBounds { .. })
    ));
}

#[test]
fn test_not_a_tiff() {
    let err = TiffImage::from_bytes(b"GIF89a, not a tiff".to_vec()).unwrap_err();
    assert!(matches!(err, TiffError::InvalidByteOrder(_)));

    let err = TiffImage::from_bytes(b"II".to_vec()).unwrap_err();
    assert!(matches!(
        err,
        TiffError::FileTooSmall {
            required: 8,
            actual: 2
        }
    ));
}

// =============================================================================
// File Tests
// =============================================================================

#[test]
fn test_open_from_disk() {
    let path = write_temp_file("chain.tif", &stack(2).build());
    let image = TiffImage::open(&path).unwrap();

    assert_eq!(image.identifier(), path.display().to_string());
    assert_eq!(image.directories().len(), 2);
    assert_eq!(image.size(), std::fs::metadata(&path).unwrap().len());

    let samples = image.get_samples(0, false).unwrap();
    assert_eq!(samples.channels[0].get::<u8>(1, 0, 0).unwrap(), Some(10));
}

#[test]
fn test_open_missing_file() {
    let err = TiffImage::open("/nonexistent/stack.tif").unwrap_err();
    assert!(matches!(err, TiffError::Io(_)));
    assert_eq!(err.category(), ErrorCategory::Io);
}

#[test]
fn test_open_embedded_tiff() {
    let data = TiffBuilder::new()
        .with_first_byte(32)
        .add_ifd(IfdBuilder::gray8(3, 2, ramp(0, 6)))
        .add_ifd(IfdBuilder::gray8(3, 2, ramp(10, 6)))
        .build();
    assert!(!is_tiff_magic(&data));
    assert!(is_tiff_magic(&data[32..]));

    let image = OpenOptions::new().first_byte(32).from_bytes(data).unwrap();
    assert_eq!(image.header().first_ifd_offset, 40);
    assert_eq!(image.directories().len(), 2);

    let samples = image.get_samples(0, false).unwrap();
    assert_eq!(samples.channels[0].get::<u8>(1, 1, 2).unwrap(), Some(15));

    let report = image.memory_report();
    assert!(report.is_valid, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.regions[0], MemoryRegion::new(0, 32, "embedding prefix"));
    assert_eq!(report.regions[1], MemoryRegion::new(32, 40, "file header"));
}

#[test]
fn test_embedded_tiff_needs_first_byte() {
    let data = TiffBuilder::new()
        .with_first_byte(16)
        .add_ifd(IfdBuilder::gray8(2, 1, vec![1, 2]))
        .build();

    assert!(matches!(
        TiffImage::from_bytes(data.clone()),
        Err(TiffError::InvalidByteOrder(0xEEEE))
    ));
    assert!(matches!(
        OpenOptions::new().first_byte(4096).from_bytes(data),
        Err(TiffError::FileTooSmall { required: 4104, .. })
    ));
}
