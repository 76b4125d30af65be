//! Test utilities for integration tests.
//!
//! Synthetic slide files (tiled TIFF/BigTIFF with raw or JPEG tiles) and stub
//! backends that record or fail region reads.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tempfile::NamedTempFile;

use wsi_zarr::error::{IoError, SlideError};
use wsi_zarr::slide::{LevelProperties, PixelBuffer, Resolutions, SlideBackend, SlideIdentity};

// =============================================================================
// Stub Backends
// =============================================================================

/// One `read_region` call as seen by a stub backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRequest {
    pub origin: (u64, u64),
    pub level: usize,
    pub size: (u32, u32),
}

/// How a stub backend fails once closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterClose {
    /// Reports a closed resource
    ReportClosed,
    /// Reports an unrelated failure
    GenericFailure,
}

/// In-memory backend that records every region request and returns buffers
/// filled with the level index.
pub struct RecordingSlide {
    dims: Vec<(u32, u32)>,
    downsamples: Vec<f64>,
    resolutions: Option<Resolutions>,
    channels: usize,
    identity: Option<(bool, PathBuf)>,
    after_close: AfterClose,
    closed: AtomicBool,
    requests: Mutex<Vec<RegionRequest>>,
}

impl RecordingSlide {
    /// Backend exposing direct level attributes with 4 channels.
    pub fn direct(dims: &[(u32, u32)], downsamples: &[f64]) -> Self {
        Self {
            dims: dims.to_vec(),
            downsamples: downsamples.to_vec(),
            resolutions: None,
            channels: 4,
            identity: None,
            after_close: AfterClose::ReportClosed,
            closed: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Backend exposing nested level attributes with 3 channels.
    pub fn nested(dims: &[(u32, u32)], downsamples: &[f64]) -> Self {
        let resolutions = Resolutions {
            level_count: dims.len(),
            level_dimensions: dims.to_vec(),
            level_downsamples: downsamples.to_vec(),
            level_tile_sizes: vec![(256, 256); dims.len()],
        };
        Self {
            resolutions: Some(resolutions),
            channels: 3,
            ..Self::direct(&[], &[])
        }
    }

    /// The two-level 1024/512 pyramid used throughout the store tests.
    pub fn two_level() -> Self {
        Self::direct(&[(1024, 1024), (512, 512)], &[1.0, 2.0])
    }

    pub fn with_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity = Some((true, path.into()));
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity = Some((false, path.into()));
        self
    }

    pub fn failing_after_close(mut self, after_close: AfterClose) -> Self {
        self.after_close = after_close;
        self
    }

    pub fn requests(&self) -> Vec<RegionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SlideBackend for RecordingSlide {
    fn levels(&self) -> LevelProperties<'_> {
        match &self.resolutions {
            Some(res) => LevelProperties::Nested(res),
            None => LevelProperties::Direct {
                level_count: self.dims.len(),
                level_dimensions: &self.dims,
                level_downsamples: &self.downsamples,
            },
        }
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn identity(&self) -> Option<SlideIdentity<'_>> {
        self.identity.as_ref().map(|(is_filename, path)| {
            if *is_filename {
                SlideIdentity::Filename(path)
            } else {
                SlideIdentity::Path(path)
            }
        })
    }

    async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<PixelBuffer, SlideError> {
        self.requests.lock().unwrap().push(RegionRequest {
            origin,
            level,
            size,
        });

        if self.closed.load(Ordering::SeqCst) {
            return Err(match self.after_close {
                AfterClose::ReportClosed => SlideError::Io(IoError::Closed("stub".into())),
                AfterClose::GenericFailure => SlideError::Decode {
                    message: "handle released".into(),
                },
            });
        }

        Ok(PixelBuffer::filled(size.0, size.1, self.channels, level as u8))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Forwards to a shared [`RecordingSlide`] so tests keep a handle on it
/// after giving the store ownership.
pub struct SharedSlide(pub std::sync::Arc<RecordingSlide>);

#[async_trait]
impl SlideBackend for SharedSlide {
    fn levels(&self) -> LevelProperties<'_> {
        self.0.levels()
    }

    fn channels(&self) -> usize {
        self.0.channels()
    }

    fn identity(&self) -> Option<SlideIdentity<'_>> {
        self.0.identity()
    }

    async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<PixelBuffer, SlideError> {
        self.0.read_region(origin, level, size).await
    }

    fn close(&self) {
        self.0.close()
    }
}

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Encode an RGB image as a baseline JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(img)
        .unwrap();
    buf
}

/// Split a complete JPEG into a `JPEGTables` blob (SOI, DQT/DHT, EOI) and an
/// abbreviated stream (SOI, remaining segments, scan, EOI).
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut tile = vec![0xFF, 0xD8];

    let mut i = 2;
    while i + 3 < jpeg.len() {
        assert_eq!(jpeg[i], 0xFF, "expected marker at {i}");
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            tile.extend_from_slice(&jpeg[i..]);
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        let segment = &jpeg[i..i + 2 + len];
        match marker {
            0xDB | 0xC4 => tables.extend_from_slice(segment),
            _ => tile.extend_from_slice(segment),
        }
        i += 2 + len;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, tile)
}

// =============================================================================
// TIFF File Builder
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// How tiles are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEncoding {
    /// Compression 1, 3 samples per pixel
    Raw,
    /// Compression 7, complete JPEG per tile
    Jpeg,
    /// Compression 7, tables shared through JPEGTables
    AbbreviatedJpeg,
    /// Compression 5 (LZW); payload is garbage, only the tag matters
    Lzw,
}

/// Color of the level-space pixel `(x, y)` at `level`.
pub type PixelFn = fn(usize, u32, u32) -> [u8; 3];

/// Default pattern: distinct per level and position, exact for raw tiles.
pub fn pattern(level: usize, x: u32, y: u32) -> [u8; 3] {
    [(x % 251) as u8, (y % 241) as u8, (level * 40) as u8]
}

/// Constant color per tile, for lossy JPEG checks.
pub fn tile_color(level: usize, x: u32, y: u32) -> [u8; 3] {
    let tx = x / 64;
    let ty = y / 64;
    [
        if (tx + ty) % 2 == 0 { 220 } else { 30 },
        (level * 60) as u8,
        if tx % 2 == 0 { 40 } else { 200 },
    ]
}

#[derive(Debug, Clone)]
struct LevelSpec {
    width: u32,
    height: u32,
    tile: u32,
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u64,
    /// Value bytes in file byte order
    data: Vec<u8>,
}

/// Builds pyramidal TIFF files level by level.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    is_bigtiff: bool,
    encoding: TileEncoding,
    pixel: PixelFn,
    description: Option<String>,
    levels: Vec<LevelSpec>,
    label: bool,
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            is_bigtiff: false,
            encoding: TileEncoding::Raw,
            pixel: pattern,
            description: None,
            levels: Vec::new(),
            label: false,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_bigtiff(mut self, is_bigtiff: bool) -> Self {
        self.is_bigtiff = is_bigtiff;
        self
    }

    pub fn with_encoding(mut self, encoding: TileEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_pixels(mut self, pixel: PixelFn) -> Self {
        self.pixel = pixel;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a stripped label image after the pyramid.
    pub fn with_label(mut self) -> Self {
        self.label = true;
        self
    }

    pub fn level(mut self, width: u32, height: u32, tile: u32) -> Self {
        self.levels.push(LevelSpec {
            width,
            height,
            tile,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = Vec::new();
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        if self.is_bigtiff {
            self.put_u16(&mut data, 43);
            self.put_u16(&mut data, 8);
            self.put_u16(&mut data, 0);
            self.put_u64(&mut data, 0);
        } else {
            self.put_u16(&mut data, 42);
            self.put_u32(&mut data, 0);
        }

        // Offset of the field that points at the next IFD
        let mut next_pointer = if self.is_bigtiff { 8 } else { 4 };

        for (index, spec) in self.levels.iter().enumerate() {
            let mut entries = self.level_entries(&mut data, index, spec);
            if index == 0 {
                if let Some(desc) = &self.description {
                    let mut bytes = desc.as_bytes().to_vec();
                    bytes.push(0);
                    entries.push(Entry {
                        tag: 270,
                        field_type: 2,
                        count: bytes.len() as u64,
                        data: bytes,
                    });
                }
            }
            next_pointer = self.write_ifd(&mut data, entries, next_pointer);
        }

        if self.label {
            let strip = vec![128u8; 30 * 20 * 3];
            let strip_offset = data.len() as u64;
            data.extend_from_slice(&strip);
            let entries = vec![
                self.long_entry(256, 30),
                self.long_entry(257, 20),
                self.short_entry(259, 1),
                self.short_entry(277, 3),
                self.offsets_entry(273, &[strip_offset]),
                self.offsets_entry(279, &[strip.len() as u64]),
            ];
            self.write_ifd(&mut data, entries, next_pointer);
        }

        data
    }

    fn level_entries(&self, data: &mut Vec<u8>, index: usize, spec: &LevelSpec) -> Vec<Entry> {
        let tiles_x = spec.width.div_ceil(spec.tile);
        let tiles_y = spec.height.div_ceil(spec.tile);

        let mut jpeg_tables = None;
        let mut offsets = Vec::new();
        let mut counts = Vec::new();

        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let img = RgbImage::from_fn(spec.tile, spec.tile, |px, py| {
                    let x = tx * spec.tile + px;
                    let y = ty * spec.tile + py;
                    if x < spec.width && y < spec.height {
                        Rgb((self.pixel)(index, x, y))
                    } else {
                        Rgb([0, 0, 0])
                    }
                });

                let payload = match self.encoding {
                    TileEncoding::Raw => img.into_raw(),
                    TileEncoding::Jpeg => encode_jpeg(&img, 95),
                    TileEncoding::AbbreviatedJpeg => {
                        let (tables, tile) = split_jpeg_tables(&encode_jpeg(&img, 95));
                        jpeg_tables.get_or_insert(tables);
                        tile
                    }
                    TileEncoding::Lzw => vec![0x80; 16],
                };

                offsets.push(data.len() as u64);
                counts.push(payload.len() as u64);
                data.extend_from_slice(&payload);
            }
        }

        let compression = match self.encoding {
            TileEncoding::Raw => 1,
            TileEncoding::Jpeg | TileEncoding::AbbreviatedJpeg => 7,
            TileEncoding::Lzw => 5,
        };

        let mut entries = vec![
            self.long_entry(256, spec.width),
            self.long_entry(257, spec.height),
            self.short_entry(259, compression),
            self.short_entry(277, 3),
            self.short_entry(322, spec.tile as u16),
            self.short_entry(323, spec.tile as u16),
            self.offsets_entry(324, &offsets),
            self.offsets_entry(325, &counts),
        ];
        if let Some(tables) = jpeg_tables {
            entries.push(Entry {
                tag: 347,
                field_type: 7,
                count: tables.len() as u64,
                data: tables,
            });
        }
        entries
    }

    fn short_entry(&self, tag: u16, value: u16) -> Entry {
        let mut data = Vec::new();
        self.put_u16(&mut data, value);
        Entry {
            tag,
            field_type: 3,
            count: 1,
            data,
        }
    }

    fn long_entry(&self, tag: u16, value: u32) -> Entry {
        let mut data = Vec::new();
        self.put_u32(&mut data, value);
        Entry {
            tag,
            field_type: 4,
            count: 1,
            data,
        }
    }

    /// Long8 arrays in BigTIFF, Long arrays otherwise.
    fn offsets_entry(&self, tag: u16, values: &[u64]) -> Entry {
        let mut data = Vec::new();
        for &v in values {
            if self.is_bigtiff {
                self.put_u64(&mut data, v);
            } else {
                self.put_u32(&mut data, v as u32);
            }
        }
        Entry {
            tag,
            field_type: if self.is_bigtiff { 16 } else { 4 },
            count: values.len() as u64,
            data,
        }
    }

    /// Write out-of-line values, then the IFD, and link it from
    /// `next_pointer`. Returns the position of this IFD's next pointer.
    fn write_ifd(&self, data: &mut Vec<u8>, mut entries: Vec<Entry>, next_pointer: usize) -> usize {
        entries.sort_by_key(|e| e.tag);
        let inline_size = if self.is_bigtiff { 8 } else { 4 };

        let mut value_fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut field = Vec::new();
            if entry.data.len() <= inline_size {
                field.extend_from_slice(&entry.data);
            } else {
                let offset = data.len() as u64;
                data.extend_from_slice(&entry.data);
                if self.is_bigtiff {
                    self.put_u64(&mut field, offset);
                } else {
                    self.put_u32(&mut field, offset as u32);
                }
            }
            field.resize(inline_size, 0);
            value_fields.push(field);
        }

        if data.len() % 2 == 1 {
            data.push(0);
        }
        let ifd_offset = data.len() as u64;
        self.patch_offset(data, next_pointer, ifd_offset);

        if self.is_bigtiff {
            self.put_u64(data, entries.len() as u64);
        } else {
            self.put_u16(data, entries.len() as u16);
        }
        for (entry, field) in entries.iter().zip(value_fields) {
            self.put_u16(data, entry.tag);
            self.put_u16(data, entry.field_type);
            if self.is_bigtiff {
                self.put_u64(data, entry.count);
            } else {
                self.put_u32(data, entry.count as u32);
            }
            data.extend_from_slice(&field);
        }

        let pointer = data.len();
        if self.is_bigtiff {
            self.put_u64(data, 0);
        } else {
            self.put_u32(data, 0);
        }
        pointer
    }

    fn patch_offset(&self, data: &mut [u8], at: usize, offset: u64) {
        let mut bytes = Vec::new();
        if self.is_bigtiff {
            self.put_u64(&mut bytes, offset);
        } else {
            self.put_u32(&mut bytes, offset as u32);
        }
        data[at..at + bytes.len()].copy_from_slice(&bytes);
    }

    fn put_u16(&self, data: &mut Vec<u8>, value: u16) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put_u32(&self, data: &mut Vec<u8>, value: u32) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put_u64(&self, data: &mut Vec<u8>, value: u64) {
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(&value.to_le_bytes()),
            ByteOrderType::BigEndian => data.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

// =============================================================================
// Files
// =============================================================================

/// Write bytes to a named temporary file ending in `suffix`.
pub fn write_slide(data: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("slide-")
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

/// A small three-level raw pyramid: 600x400, 300x200, 150x100 with 128px tiles.
pub fn raw_pyramid() -> Vec<u8> {
    TiffBuilder::new()
        .level(600, 400, 128)
        .level(300, 200, 128)
        .level(150, 100, 128)
        .build()
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}
