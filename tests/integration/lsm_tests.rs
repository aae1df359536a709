//! LSM extension tests.
//!
//! Tests verify:
//! - The CZ_LSMInfo entry is resized by its pre-decode hook
//! - Channel names come from the file for full-resolution slices
//! - Thumbnails are named red/green/blue and must have three samples
//! - Separate planes are exposed without copying

use tiff_stack::{
    default_hooks, HookRegistry, OpenOptions, TiffError, TiffImage, TiffTag, VendorMetadata,
};

use super::test_utils::{
    lsm_slice, lsm_thumbnail, lzw_compress, ramp, TiffBuilder, LSM_INFO_SIZE,
};

/// Three 4x2 two-channel slices, each followed by a 2x1 RGB thumbnail.
fn lsm_stack(thumbnail_samples: usize) -> Vec<u8> {
    let mut builder = TiffBuilder::new();
    for z in 0..3u8 {
        let mut slice = lsm_slice(4, 2, vec![ramp(z * 10, 8), ramp(100 + z * 10, 8)]);
        if z == 0 {
            slice.add_lsm_info(&["Ch1-T1", "Ch2-T2"]);
        }
        builder = builder
            .add_ifd(slice.build())
            .add_ifd(lsm_thumbnail(2, 1, thumbnail_samples));
    }
    builder.build()
}

#[test]
fn test_lsm_info_entry_is_resized() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    let entry = image.directories()[0].get(TiffTag::CzLsmInfo).unwrap();

    assert_eq!(entry.tag_name, "CZ_LSMInfo");
    assert_eq!(entry.count, LSM_INFO_SIZE as u64);
    assert!(entry.vendor_significant);
    assert!(entry.offset().is_some());
}

#[test]
fn test_lsm_vendor_metadata() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();

    let Some(VendorMetadata::ZeissLsm(info)) = image.vendor() else {
        panic!("expected LSM metadata, got {:?}", image.vendor());
    };
    assert_eq!(info.dimension_channels, 2);
    assert_eq!(info.voxel_size_x, 0.25e-6);
    assert_eq!(info.voxel_size_z, 1.0e-6);
    assert_eq!(info.channel_names, vec!["Ch1-T1", "Ch2-T2"]);

    assert!(image.directories()[0].vendor().is_some());
    assert!(image.directories()[1].vendor().is_none());
}

#[test]
fn test_lsm_channels_are_borrowed() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    let samples = image.get_samples(0, false).unwrap();

    assert_eq!(samples.names, vec!["Ch1-T1", "Ch2-T2"]);
    assert_eq!(samples.summary.depth, 3);
    assert_eq!(samples.summary.strips_per_image, 1);
    assert_eq!(samples.summary.planar_configuration, 2);
    assert!(samples.summary.zero_copy);

    let first = samples.channel("Ch1-T1").unwrap();
    let second = samples.channel("Ch2-T2").unwrap();
    assert!(first.is_borrowed() && second.is_borrowed());
    assert_eq!(first.shape(), [3, 2, 4]);
    assert_eq!(first.get::<u8>(2, 1, 3).unwrap(), Some(27));
    assert_eq!(second.get::<u8>(1, 0, 0).unwrap(), Some(110));
}

#[test]
fn test_lsm_thumbnails() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    let thumbnails = image.get_samples(1, false).unwrap();

    assert_eq!(thumbnails.names, vec!["red", "green", "blue"]);
    assert_eq!(thumbnails.summary.depth, 3);
    assert_eq!(
        thumbnails.channel("green").unwrap().get::<u8>(0, 0, 1).unwrap(),
        Some(100)
    );
    assert_eq!(
        thumbnails.channel("blue").unwrap().get::<u8>(2, 0, 0).unwrap(),
        Some(200)
    );
}

#[test]
fn test_lsm_thumbnails_need_three_samples() {
    let image = TiffImage::from_bytes(lsm_stack(2)).unwrap();
    assert!(matches!(
        image.get_samples(1, false),
        Err(TiffError::UnsupportedSamplesPerPixel(2))
    ));
}

#[test]
fn test_lsm_rows_per_strip_must_cover_image() {
    let mut slice = lsm_slice(4, 2, vec![ramp(0, 8), ramp(8, 8)]);
    slice.add_lsm_info(&["A", "B"]).add_entry(278, 4, &[1]);
    let data = TiffBuilder::new().add_ifd(slice.build()).build();

    let image = TiffImage::from_bytes(data).unwrap();
    assert!(matches!(
        image.get_samples(0, false),
        Err(TiffError::InvalidTagValue { tag: "RowsPerStrip", .. })
    ));
}

#[test]
fn test_lsm_compressed_planes() {
    let mut builder = TiffBuilder::new();
    for z in 0..2u8 {
        let planes = vec![ramp(z * 10, 8), ramp(100 + z * 10, 8)];
        let mut slice = lsm_slice(4, 2, planes.clone());
        slice
            .add_entry(259, 3, &[5])
            .with_strips(planes.iter().map(|p| lzw_compress(p)).collect());
        if z == 0 {
            slice.add_lsm_info(&["DAPI"]);
        }
        builder = builder.add_ifd(slice.build());
    }

    let image = TiffImage::from_bytes(builder.build()).unwrap();
    let samples = image.get_samples(0, false).unwrap();

    assert!(!samples.summary.zero_copy);
    assert_eq!(samples.names, vec!["DAPI", "channel1"]);
    let second = &samples.channels[1];
    assert!(!second.is_borrowed());
    assert_eq!(second.get::<u8>(1, 1, 2).unwrap(), Some(116));
}

#[test]
fn test_directory_planes() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    let bytes = image.accessor();

    // Directory 2 is the second full-resolution slice
    let planes = image.directories()[2]
        .get_contiguous(bytes, image.vendor())
        .unwrap();
    let names: Vec<&str> = planes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["Ch1-T1", "Ch2-T2"]);

    let (_, second) = &planes[1];
    assert!(second.is_borrowed());
    assert_eq!(second.shape(), [1, 2, 4]);
    assert_eq!(second.get::<u8>(0, 0, 0).unwrap(), Some(110));
    assert_eq!(second.get::<u8>(0, 1, 3).unwrap(), Some(117));
}

#[test]
fn test_thumbnail_directory_planes() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    let planes = image.directories()[1]
        .get_contiguous(image.accessor(), image.vendor())
        .unwrap();

    let names: Vec<&str> = planes.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["red", "green", "blue"]);
    assert_eq!(planes[2].1.shape(), [1, 1, 2]);
    assert_eq!(planes[2].1.get::<u8>(0, 0, 1).unwrap(), Some(200));
}

#[test]
fn test_directory_planes_need_lsm_metadata() {
    let image = TiffImage::from_bytes(lsm_stack(3)).unwrap();
    assert!(matches!(
        image.directories()[0].get_contiguous(image.accessor(), None),
        Err(TiffError::MissingTag("CZ_LSMInfo"))
    ));
}

#[test]
fn test_compressed_directory_planes_rejected() {
    let planes = vec![ramp(0, 8), ramp(100, 8)];
    let mut slice = lsm_slice(4, 2, planes.clone());
    slice
        .add_entry(259, 3, &[5])
        .with_strips(planes.iter().map(|p| lzw_compress(p)).collect())
        .add_lsm_info(&["A", "B"]);
    let image = TiffImage::from_bytes(TiffBuilder::new().add_ifd(slice.build()).build()).unwrap();

    assert!(matches!(
        image.directories()[0].get_contiguous(image.accessor(), image.vendor()),
        Err(TiffError::UnknownCompression(5))
    ));
}

#[test]
fn test_without_lsm_hooks() {
    let hooks = HookRegistry::standard();
    assert_eq!(hooks.pre_decode_hooks().count(), 0);

    let image = OpenOptions::new()
        .hooks(std::sync::Arc::new(hooks))
        .from_bytes(lsm_stack(3))
        .unwrap();

    // Without the vendor layout the separate planes are not accepted
    assert!(image.vendor().is_none());
    assert!(matches!(
        image.get_samples(0, false),
        Err(TiffError::UnsupportedPlanarConfig(2))
    ));
    assert_eq!(default_hooks().pre_decode_hooks().count(), 1);
}

#[test]
fn test_bad_lsm_magic_fails_open() {
    let mut data = lsm_stack(3);
    let image = TiffImage::from_bytes(data.clone()).unwrap();
    let offset = image.directories()[0]
        .get(TiffTag::CzLsmInfo)
        .and_then(|e| e.offset())
        .unwrap() as usize;
    drop(image);

    data[offset] ^= 0xFF;
    assert!(matches!(
        TiffImage::from_bytes(data),
        Err(TiffError::InvalidTagValue {
            tag: "CZ_LSMInfo",
            ..
        })
    ));
}
