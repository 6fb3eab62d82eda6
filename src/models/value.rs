//! Typed cell values.

use serde::Serialize;

/// Format hint for an image blob, derived from its magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// JPEG image (`FF D8 FF`).
    Jpeg,
    /// PNG image (`89 50 4E 47`).
    Png,
    /// GIF image (`47 49 46 38`).
    Gif,
    /// BMP image (`42 4D`).
    Bmp,
}

/// A decoded cell value.
///
/// This is a closed set of semantic kinds: every cell in a fetched
/// [`Record`](crate::models::Record) decodes to exactly one of these, and a
/// cell that cannot be decoded becomes [`Value::Null`] rather than an error.
///
/// `Array` and `Image` are display-only kinds produced by BLOB content
/// sniffing; they have no write path and bind as NULL when a record carrying
/// them is written back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// 16-bit integer (declared `SMALLINT`).
    SmallInt(i16),
    /// 64-bit integer (declared `INTEGER`).
    Integer(i64),
    /// 32-bit float (declared `BIGINT` or `FLOAT`).
    Float(f32),
    /// 64-bit float (declared `REAL`).
    Real(f64),
    /// Text (declared `TEXT`/`VARCHAR`/`NVARCHAR`, or sniffed from a BLOB).
    Text(String),
    /// A sniffed list value; not a native `SQLite` type.
    Array(Vec<Value>),
    /// A sniffed raster image, kept as raw bytes plus a format hint.
    Image {
        /// The original blob bytes.
        data: Vec<u8>,
        /// Format detected from the leading magic bytes.
        format: ImageFormat,
    },
    /// Epoch seconds (declared `TIMESTAMP`).
    Timestamp(f64),
    /// NULL, or any cell that failed to decode.
    Null,
}

impl Value {
    /// Whether this value has a write path. `Array` and `Image` are
    /// display-only and bind as NULL when written.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !matches!(self, Self::Array(_) | Self::Image { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_only_kinds() {
        assert!(Value::Integer(1).is_writable());
        assert!(Value::Null.is_writable());
        assert!(!Value::Array(vec![Value::Integer(1)]).is_writable());
        assert!(
            !Value::Image {
                data: vec![0x42, 0x4D],
                format: ImageFormat::Bmp
            }
            .is_writable()
        );
    }
}
