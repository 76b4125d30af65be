//! Zarr v2 metadata for a slide pyramid.
//!
//! One group with `multiscales` attributes and one `uint8` array per level,
//! shaped `[height, width, channels]` and chunked `[T, T, channels]`.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};

use crate::error::StoreError;
use crate::slide::{SlideBackend, SlideIdentity};

pub const GROUP_KEY: &str = ".zgroup";
pub const ATTRS_KEY: &str = ".zattrs";
pub const ARRAY_KEY: &str = ".zarray";

/// Version tag of the multiscales descriptor.
pub const MULTISCALES_VERSION: &str = "0.1";

/// Metadata key to document bytes.
pub type MetaStore = BTreeMap<String, Bytes>;

/// `.zgroup`
#[derive(Debug, Clone, Serialize)]
pub struct GroupMetadata {
    pub zarr_format: u8,
}

/// `.zattrs` of the root group
#[derive(Debug, Clone, Serialize)]
pub struct RootAttributes {
    pub multiscales: Vec<Multiscale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Multiscale {
    pub name: String,
    pub datasets: Vec<Dataset>,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub path: String,
}

/// `<level>/.zarray`
#[derive(Debug, Clone, Serialize)]
pub struct ArrayMetadata {
    pub zarr_format: u8,
    pub shape: [u64; 3],
    pub chunks: [u64; 3],
    pub dtype: &'static str,
    pub compressor: Option<serde_json::Value>,
    pub fill_value: u8,
    pub order: &'static str,
    pub filters: Option<Vec<serde_json::Value>>,
}

impl ArrayMetadata {
    /// Uncompressed `|u1` array in C order.
    pub fn uint8(shape: [u64; 3], chunks: [u64; 3]) -> Self {
        Self {
            zarr_format: 2,
            shape,
            chunks,
            dtype: "|u1",
            compressor: None,
            fill_value: 0,
            order: "C",
            filters: None,
        }
    }
}

/// Pretty printing with every non-ASCII character written as a `\uXXXX`
/// escape (UTF-16 surrogate pairs above the BMP).
struct AsciiFormatter<'a> {
    pretty: PrettyFormatter<'a>,
}

impl Formatter for AsciiFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.pretty.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.pretty.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Render a document the way Zarr v2 writes JSON: keys sorted, four-space
/// indent, ASCII only.
pub fn to_json_bytes<T: Serialize>(doc: &T) -> Result<Bytes, StoreError> {
    // Going through `Value` sorts object keys.
    let value = serde_json::to_value(doc)?;

    let mut buf = Vec::new();
    let formatter = AsciiFormatter {
        pretty: PrettyFormatter::with_indent(b"    "),
    };
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(Bytes::from(buf))
}

/// Display name of a slide: the final component of its filename or path.
fn display_name(identity: Option<SlideIdentity<'_>>) -> String {
    let path: Option<&Path> = match identity {
        Some(SlideIdentity::Filename(p)) | Some(SlideIdentity::Path(p)) => Some(p),
        None => None,
    };
    path.and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build every metadata document for `slide` chunked at `tile_size`.
///
/// Only reads level properties, channel count, and identity from the slide.
pub fn create_meta_store(
    slide: &dyn SlideBackend,
    tile_size: u32,
) -> Result<MetaStore, StoreError> {
    let levels = slide.levels();
    let channels = slide.channels() as u64;
    let level_count = levels.level_count();

    let mut store = MetaStore::new();
    store.insert(
        GROUP_KEY.to_string(),
        to_json_bytes(&GroupMetadata { zarr_format: 2 })?,
    );

    let attrs = RootAttributes {
        multiscales: vec![Multiscale {
            name: display_name(slide.identity()),
            datasets: (0..level_count)
                .map(|i| Dataset {
                    path: i.to_string(),
                })
                .collect(),
            version: MULTISCALES_VERSION,
        }],
    };
    store.insert(ATTRS_KEY.to_string(), to_json_bytes(&attrs)?);

    let tile = tile_size as u64;
    let dimensions = levels.level_dimensions().iter().take(level_count);
    for (i, &(width, height)) in dimensions.enumerate() {
        let array = ArrayMetadata::uint8(
            [height as u64, width as u64, channels],
            [tile, tile, channels],
        );
        store.insert(format!("{}/{}", i, ARRAY_KEY), to_json_bytes(&array)?);
    }

    Ok(store)
}
