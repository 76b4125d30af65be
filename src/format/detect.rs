//! Slide format detection.
//!
//! - **Aperio SVS**: the first ImageDescription contains "Aperio"
//! - **Generic pyramidal TIFF**: any other tiled TIFF

use super::tiff::{ByteOrder, TIFF_HEADER_SIZE};

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS (abbreviated JPEG tiles with shared JPEGTables)
    AperioSvs,

    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }

    /// Vendor string reported in slide properties.
    pub const fn vendor(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "aperio",
            SlideFormat::GenericTiff => "generic-tiff",
        }
    }
}

const APERIO_MARKER: &str = "Aperio";

/// Classify a TIFF by the ImageDescription of its first IFD.
pub fn detect_format(description: Option<&str>) -> SlideFormat {
    match description {
        Some(desc) if desc.contains(APERIO_MARKER) => SlideFormat::AperioSvs,
        _ => SlideFormat::GenericTiff,
    }
}

/// Quick check for a TIFF or BigTIFF signature.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}
