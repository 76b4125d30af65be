use crate::error::ChunkKeyError;

/// Chunk position decoded from a key.
///
/// Keys are written `<level>/<row>.<col>.<group>`: the first coordinate is the
/// y axis. `col` is the x chunk index and `row` the y chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub col: u64,
    pub row: u64,
    pub level: usize,
}

fn parse_field<T: std::str::FromStr>(key: &str, field: &str) -> Result<T, ChunkKeyError> {
    let invalid = || ChunkKeyError::InvalidInteger {
        key: key.to_string(),
        field: field.to_string(),
    };
    // `FromStr` for integers accepts a leading `+`.
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    field.parse().map_err(|_| invalid())
}

/// Parse a chunk key such as `"3/4.5.0"` into `(col 5, row 4, level 3)`.
///
/// The channel group is parsed for validity and discarded.
pub fn parse_chunk_key(key: &str) -> Result<ChunkCoord, ChunkKeyError> {
    let mut parts = key.split('/');
    let (Some(level), Some(coords), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ChunkKeyError::MissingSeparator {
            key: key.to_string(),
        });
    };

    let fields: Vec<&str> = coords.split('.').collect();
    let [row, col, group] = fields[..] else {
        return Err(ChunkKeyError::FieldCount {
            key: key.to_string(),
            count: fields.len(),
        });
    };

    let row = parse_field(key, row)?;
    let col = parse_field(key, col)?;
    parse_field::<u64>(key, group)?;
    let level = parse_field(key, level)?;

    Ok(ChunkCoord { col, row, level })
}
