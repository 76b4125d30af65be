//! Abbreviated JPEG tile handling.
//!
//! Tiled TIFFs with Compression = 7 usually store the quantization (DQT) and
//! Huffman (DHT) tables once in the `JPEGTables` tag. Each tile then carries an
//! abbreviated stream: SOI, frame header, scan, EOI, but no tables. Before a
//! tile can be decoded the two are spliced:
//!
//! ```text
//! tables: SOI DQT DHT EOI
//! tile:   SOI SOF SOS <entropy data> EOI
//! merged: SOI DQT DHT SOF SOS <entropy data> EOI
//! ```

use bytes::{Bytes, BytesMut};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const SOS: [u8; 2] = [0xFF, 0xDA];

const MARKER_DQT: u8 = 0xDB;
const MARKER_SOS: u8 = 0xDA;

/// Walk the marker segments before the first scan and report whether any of
/// them defines a quantization table.
///
/// Returns `None` if the data does not start with SOI or no scan is found.
fn header_defines_tables(data: &[u8]) -> Option<bool> {
    if data.len() < 4 || data[..2] != SOI {
        return None;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            MARKER_DQT => return Some(true),
            MARKER_SOS => return Some(false),
            // Fill bytes and standalone markers carry no length
            0xFF => pos += 1,
            0x01 | 0xD0..=0xD9 => pos += 2,
            _ => {
                if pos + 3 >= data.len() {
                    return None;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
            }
        }
    }
    None
}

/// Whether the stream reaches its scan without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    header_defines_tables(data) == Some(false)
}

/// Whether the stream defines its own quantization tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    header_defines_tables(data) == Some(true)
}

/// Splice a `JPEGTables` blob in front of an abbreviated tile.
///
/// The trailing EOI of the tables and the leading SOI of the tile are dropped
/// so the result has exactly one of each.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tile_data.is_empty() {
        return Bytes::new();
    }
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let tile = tile_data.strip_prefix(&SOI).unwrap_or(tile_data);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Produce a self-contained JPEG for a tile, merging shared tables when the
/// tile needs them.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8]) -> Bytes {
    match tables {
        Some(tables) if is_abbreviated_stream(tile_data) => merge_jpeg_tables(tables, tile_data),
        _ => Bytes::copy_from_slice(tile_data),
    }
}
