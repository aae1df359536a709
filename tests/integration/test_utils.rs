//! Test utilities for integration tests.
//!
//! This module provides builders for classic TIFF files with strip data,
//! in either byte order, plus helpers for LSM stacks.

#![allow(dead_code)]

use weezl::{encode::Encoder, BitOrder};

// =============================================================================
// TIFF File Builders
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Where pixel data is placed relative to the directories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataLayout {
    /// Each directory is followed by its own values and strips
    Interleaved,
    /// All directories first, then all strips back to back
    DataAtEnd,
}

/// Builder for creating test TIFF files.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    layout: DataLayout,
    ifds: Vec<IfdBuilder>,
    cycle_to: Option<usize>,
    first_byte: usize,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            layout: DataLayout::Interleaved,
            ifds: Vec::new(),
            cycle_to: None,
            first_byte: 0,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Point the last directory's next offset back at directory `index`.
    pub fn with_cycle_to(mut self, index: usize) -> Self {
        self.cycle_to = Some(index);
        self
    }

    /// Place the header after `prefix` filler bytes. The first directory
    /// offset is written relative to the header; every other offset stays
    /// absolute.
    pub fn with_first_byte(mut self, prefix: usize) -> Self {
        self.first_byte = prefix;
        self
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let order = self.byte_order;
        let ifds: Vec<Vec<PendingEntry>> = self.ifds.iter().map(IfdBuilder::sorted_entries).collect();

        // Pass 1: positions of tables, out-of-line values and strip data
        let base = self.first_byte;
        let mut offset = base + 8;
        let mut tables = Vec::with_capacity(ifds.len());
        let mut value_offsets: Vec<Vec<Option<usize>>> = Vec::with_capacity(ifds.len());
        let mut data_starts = vec![0usize; ifds.len()];

        for (i, entries) in ifds.iter().enumerate() {
            tables.push(offset);
            offset += 2 + entries.len() * 12 + 4;

            let mut positions = Vec::with_capacity(entries.len());
            for entry in entries {
                let len = entry.payload_len();
                if entry.count != 1 || len > 4 {
                    positions.push(Some(offset));
                    offset += len;
                } else {
                    positions.push(None);
                }
            }
            value_offsets.push(positions);

            if self.layout == DataLayout::Interleaved {
                offset += self.ifds[i].gap_before_data;
                data_starts[i] = offset;
                offset += self.ifds[i].data_len();
            }
        }
        if self.layout == DataLayout::DataAtEnd {
            for (i, ifd) in self.ifds.iter().enumerate() {
                offset += ifd.gap_before_data;
                data_starts[i] = offset;
                offset += ifd.data_len();
            }
        }

        let mut data = vec![0u8; offset];
        data[..base].fill(0xEE);

        // Header
        match order {
            ByteOrderType::LittleEndian => data[base..base + 2].copy_from_slice(b"II"),
            ByteOrderType::BigEndian => data[base..base + 2].copy_from_slice(b"MM"),
        }
        put(&mut data, base + 2, 42, 2, order);
        let first = tables.first().map_or(0, |t| t - base);
        put(&mut data, base + 4, first as u64, 4, order);

        // Pass 2: tables, values and strips
        for (i, entries) in ifds.iter().enumerate() {
            let ifd = &self.ifds[i];
            let strip_offsets = ifd.strip_offsets(data_starts[i]);

            let table = tables[i];
            put(&mut data, table, entries.len() as u64, 2, order);
            for (j, entry) in entries.iter().enumerate() {
                let at = table + 2 + j * 12;
                put(&mut data, at, entry.tag as u64, 2, order);
                put(&mut data, at + 2, entry.field_type as u64, 2, order);
                put(&mut data, at + 4, entry.count as u64, 4, order);

                let payload = match &entry.payload {
                    Payload::StripOffsets => encode_numbers(&strip_offsets, 4, order),
                    Payload::LsmInfo(names) => {
                        let position = value_offsets[i][j].unwrap_or(0);
                        lsm_info_block(names, position, order)
                    }
                    other => other.encode(entry.field_type, order),
                };
                match value_offsets[i][j] {
                    Some(position) => {
                        put(&mut data, at + 8, position as u64, 4, order);
                        data[position..position + payload.len()].copy_from_slice(&payload);
                    }
                    None => data[at + 8..at + 8 + payload.len()].copy_from_slice(&payload),
                }
            }

            let next = if i + 1 < tables.len() {
                tables[i + 1]
            } else {
                self.cycle_to.map(|c| tables[c]).unwrap_or(0)
            };
            put(&mut data, table + 2 + entries.len() * 12, next as u64, 4, order);

            for (strip, start) in ifd.strips.iter().zip(&strip_offsets) {
                let start = *start as usize;
                data[start..start + strip.len()].copy_from_slice(strip);
            }
        }

        data
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one image file directory and its strips.
#[derive(Clone)]
pub struct IfdBuilder {
    entries: Vec<PendingEntry>,
    strips: Vec<Vec<u8>>,
    strip_gap: usize,
    gap_before_data: usize,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            strips: Vec::new(),
            strip_gap: 0,
            gap_before_data: 0,
        }
    }

    /// An uncompressed grayscale slice stored as one strip.
    pub fn gray8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let mut ifd = Self::new();
        ifd.add_entry(256, 4, &[width as u64])
            .add_entry(257, 4, &[height as u64])
            .add_entry(258, 3, &[8])
            .add_entry(259, 3, &[1])
            .add_entry(262, 3, &[1])
            .add_entry(277, 3, &[1])
            .add_entry(278, 4, &[height as u64])
            .with_strips(vec![pixels]);
        ifd
    }

    /// An uncompressed slice with interleaved 8-bit samples.
    pub fn chunky8(width: u32, height: u32, samples: u16, pixels: Vec<u8>) -> Self {
        let mut ifd = Self::new();
        ifd.add_entry(256, 4, &[width as u64])
            .add_entry(257, 4, &[height as u64])
            .add_entry(258, 3, &vec![8; samples as usize])
            .add_entry(259, 3, &[1])
            .add_entry(262, 3, &[if samples == 3 { 2 } else { 1 }])
            .add_entry(277, 3, &[samples as u64])
            .add_entry(278, 4, &[height as u64])
            .add_entry(284, 3, &[1])
            .with_strips(vec![pixels]);
        ifd
    }

    /// Add a numeric entry; values are written with the type's width.
    pub fn add_entry(&mut self, tag: u16, field_type: u16, values: &[u64]) -> &mut Self {
        self.set(PendingEntry {
            tag,
            field_type,
            count: values.len() as u32,
            payload: Payload::Numbers(values.to_vec()),
        })
    }

    /// Add a NUL-terminated ASCII entry.
    pub fn add_ascii(&mut self, tag: u16, text: &str) -> &mut Self {
        let mut raw = text.as_bytes().to_vec();
        raw.push(0);
        self.add_raw(tag, 2, raw.len() as u32, raw)
    }

    /// Add an entry whose value bytes are written exactly as given.
    pub fn add_raw(&mut self, tag: u16, field_type: u16, count: u32, raw: Vec<u8>) -> &mut Self {
        self.set(PendingEntry {
            tag,
            field_type,
            count,
            payload: Payload::Raw(raw),
        })
    }

    /// Add a CZ_LSMInfo entry with the given channel names.
    ///
    /// The count field is left at 1, as the pre-decode hook must fix it.
    pub fn add_lsm_info(&mut self, names: &[&str]) -> &mut Self {
        self.set(PendingEntry {
            tag: 34412,
            field_type: 1,
            count: 1,
            payload: Payload::LsmInfo(names.iter().map(|n| n.to_string()).collect()),
        })
    }

    pub fn remove_entry(&mut self, tag: u16) -> &mut Self {
        self.entries.retain(|e| e.tag != tag);
        self
    }

    /// Replace the strips. StripOffsets and StripByteCounts are derived.
    pub fn with_strips(&mut self, strips: Vec<Vec<u8>>) -> &mut Self {
        let counts: Vec<u64> = strips.iter().map(|s| s.len() as u64).collect();
        self.set(PendingEntry {
            tag: 273,
            field_type: 4,
            count: strips.len() as u32,
            payload: Payload::StripOffsets,
        });
        self.add_entry(279, 4, &counts);
        self.strips = strips;
        self
    }

    /// Unclaimed bytes between consecutive strips.
    pub fn with_strip_gap(&mut self, gap: usize) -> &mut Self {
        self.strip_gap = gap;
        self
    }

    /// Unclaimed bytes before this directory's first strip.
    pub fn with_gap_before_data(&mut self, gap: usize) -> &mut Self {
        self.gap_before_data = gap;
        self
    }

    pub fn build(&mut self) -> Self {
        self.clone()
    }

    fn set(&mut self, entry: PendingEntry) -> &mut Self {
        self.entries.retain(|e| e.tag != entry.tag);
        self.entries.push(entry);
        self
    }

    fn sorted_entries(&self) -> Vec<PendingEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.tag);
        entries
    }

    fn data_len(&self) -> usize {
        let strips: usize = self.strips.iter().map(Vec::len).sum();
        strips + self.strip_gap * self.strips.len().saturating_sub(1)
    }

    fn strip_offsets(&self, data_start: usize) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(self.strips.len());
        let mut position = data_start;
        for strip in &self.strips {
            offsets.push(position as u64);
            position += strip.len() + self.strip_gap;
        }
        offsets
    }
}

impl Default for IfdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct PendingEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Payload,
}

#[derive(Clone)]
enum Payload {
    Numbers(Vec<u64>),
    Raw(Vec<u8>),
    StripOffsets,
    LsmInfo(Vec<String>),
}

impl PendingEntry {
    fn payload_len(&self) -> usize {
        match &self.payload {
            Payload::Numbers(values) => values.len() * field_type_size(self.field_type),
            Payload::Raw(raw) => raw.len(),
            Payload::StripOffsets => self.count as usize * 4,
            Payload::LsmInfo(names) => LSM_INFO_SIZE + colors_block_len(names),
        }
    }
}

impl Payload {
    fn encode(&self, field_type: u16, order: ByteOrderType) -> Vec<u8> {
        match self {
            Payload::Numbers(values) => encode_numbers(values, field_type_size(field_type), order),
            Payload::Raw(raw) => raw.clone(),
            Payload::StripOffsets | Payload::LsmInfo(_) => Vec::new(),
        }
    }
}

fn field_type_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 => 4,
        5 | 10 | 12 | 16 | 17 | 18 => 8,
        _ => 1,
    }
}

fn encode_numbers(values: &[u64], size: usize, order: ByteOrderType) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * size];
    for (i, &value) in values.iter().enumerate() {
        put(&mut out, i * size, value, size, order);
    }
    out
}

fn put(data: &mut [u8], at: usize, value: u64, size: usize, order: ByteOrderType) {
    let bytes = match order {
        ByteOrderType::LittleEndian => value.to_le_bytes(),
        ByteOrderType::BigEndian => value.to_be_bytes(),
    };
    let field = match order {
        ByteOrderType::LittleEndian => &bytes[..size],
        ByteOrderType::BigEndian => &bytes[8 - size..],
    };
    data[at..at + size].copy_from_slice(field);
}

// =============================================================================
// LSM Helpers
// =============================================================================

pub const LSM_INFO_SIZE: usize = 112;
const COLORS_HEADER_SIZE: usize = 24;

fn colors_block_len(names: &[String]) -> usize {
    COLORS_HEADER_SIZE + names.iter().map(|n| 4 + n.len() + 1).sum::<usize>()
}

/// A CZ_LSMInfo structure at `position`, immediately followed by its
/// channel colors block.
fn lsm_info_block(names: &[String], position: usize, order: ByteOrderType) -> Vec<u8> {
    let mut block = vec![0u8; LSM_INFO_SIZE + colors_block_len(names)];
    put(&mut block, 0, 0x0400_494C, 4, order);
    put(&mut block, 4, LSM_INFO_SIZE as u64, 4, order);
    put(&mut block, 20, names.len() as u64, 4, order);
    put(&mut block, 24, 1, 4, order);
    put(&mut block, 40, 0.25e-6f64.to_bits(), 8, order);
    put(&mut block, 48, 0.25e-6f64.to_bits(), 8, order);
    put(&mut block, 56, 1.0e-6f64.to_bits(), 8, order);
    put(&mut block, 108, (position + LSM_INFO_SIZE) as u64, 4, order);

    let colors = LSM_INFO_SIZE;
    put(&mut block, colors, colors_block_len(names) as u64, 4, order);
    put(&mut block, colors + 8, names.len() as u64, 4, order);
    put(&mut block, colors + 16, COLORS_HEADER_SIZE as u64, 4, order);

    let mut at = colors + COLORS_HEADER_SIZE;
    for name in names {
        put(&mut block, at, name.len() as u64 + 1, 4, order);
        block[at + 4..at + 4 + name.len()].copy_from_slice(name.as_bytes());
        at += 4 + name.len() + 1;
    }
    block
}

/// One LSM image directory: separate planes, one strip per channel.
pub fn lsm_slice(width: u32, height: u32, planes: Vec<Vec<u8>>) -> IfdBuilder {
    let mut ifd = IfdBuilder::new();
    ifd.add_entry(254, 4, &[0])
        .add_entry(256, 4, &[width as u64])
        .add_entry(257, 4, &[height as u64])
        .add_entry(258, 3, &vec![8; planes.len()])
        .add_entry(259, 3, &[1])
        .add_entry(262, 3, &[1])
        .add_entry(277, 3, &[planes.len() as u64])
        .add_entry(278, 4, &[height as u64])
        .add_entry(284, 3, &[2])
        .with_strips(planes);
    ifd
}

/// One LSM thumbnail directory with `samples` separate planes.
pub fn lsm_thumbnail(width: u32, height: u32, samples: usize) -> IfdBuilder {
    let planes = (0..samples)
        .map(|c| vec![c as u8 * 100; (width * height) as usize])
        .collect();
    let mut ifd = lsm_slice(width, height, planes);
    ifd.add_entry(254, 4, &[1]).add_entry(262, 3, &[2]);
    ifd
}

// =============================================================================
// Data Helpers
// =============================================================================

/// `len` bytes counting up from `seed`.
pub fn ramp(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// TIFF-flavoured LZW, as written by libtiff.
pub fn lzw_compress(data: &[u8]) -> Vec<u8> {
    Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
        .encode(data)
        .expect("LZW encoding failed")
}

pub fn is_tiff_magic(data: &[u8]) -> bool {
    data.len() >= 4 && (data.starts_with(b"II*\0") || data.starts_with(b"MM\0*"))
}

/// Write `data` to a fresh file under the system temp directory.
pub fn write_temp_file(name: &str, data: &[u8]) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("tiff-stack-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("failed to create temp dir");
    let path = dir.join(name);
    std::fs::write(&path, data).expect("failed to write temp file");
    path
}
