//! Slide file formats.
//!
//! Everything here is TIFF based: Aperio SVS is recognized by the "Aperio"
//! marker in its ImageDescription, anything else tiled is read as a generic
//! pyramidal TIFF.

pub mod decode;
pub mod detect;
pub mod jpeg;
pub mod properties;
pub mod tiff;

pub use decode::{decode_tile, DecodedTile, TileLayout};
pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use properties::SlideProperties;
