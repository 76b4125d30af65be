//! TIFF and BigTIFF structure parsing.
//!
//! - **Byte order**: declared in the header (II or MM) and applied to every
//!   multi-byte value.
//! - **Classic vs BigTIFF**: 32-bit versus 64-bit offsets; both are handled.
//! - **IFD**: one per image in the file. Slides keep pyramid levels, labels,
//!   and macros in separate IFDs.
//! - **Inline vs offset values**: values that fit in the entry are stored in
//!   place, larger ones at an offset.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
