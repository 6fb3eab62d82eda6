//! BLOB content sniffing.
//!
//! Infers a blob's logical content from its leading bytes or decoded text
//! shape, in priority order: magic-byte image signatures, property-list
//! string arrays, then bracketed text arrays or plain text. This is a
//! heuristic classifier; truncated or ambiguous blobs fall through to the
//! next rule and ultimately to [`Value::Null`].

use crate::codec::decode_string;
use crate::models::{ImageFormat, Value};

/// Magic-byte signatures recognized as raster images.
const IMAGE_SIGNATURES: &[(&[u8], ImageFormat)] = &[
    (&[0xFF, 0xD8, 0xFF], ImageFormat::Jpeg),
    (&[0x89, 0x50, 0x4E, 0x47], ImageFormat::Png),
    (&[0x47, 0x49, 0x46, 0x38], ImageFormat::Gif),
    (&[0x42, 0x4D], ImageFormat::Bmp),
];

/// Classifies a blob into a [`Value`].
///
/// A magic-byte match alone is not enough to tag a cell as an image: the
/// blob must also survive a raster decode, otherwise it falls through to the
/// remaining rules like any other blob.
#[must_use]
pub fn sniff_blob(data: &[u8]) -> Value {
    if let Some(format) = detect_image_format(data) {
        match image::load_from_memory_with_format(data, format.into()) {
            Ok(_) => {
                return Value::Image {
                    data: data.to_vec(),
                    format,
                };
            },
            Err(err) => {
                tracing::warn!(?format, %err, "image signature matched but decode failed");
            },
        }
    }

    // A plist holding a plain string list renders as comma-joined text.
    if let Ok(strings) = plist::from_bytes::<Vec<String>>(data) {
        return Value::Text(strings.join(","));
    }

    match decode_string(data) {
        Some(text) => sniff_text(text),
        None => Value::Null,
    }
}

/// Matches the leading bytes against the image signature table.
fn detect_image_format(data: &[u8]) -> Option<ImageFormat> {
    IMAGE_SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
        .map(|&(_, format)| format)
}

/// Classifies decoded text: bracket-delimited strings become arrays,
/// everything else stays text.
fn sniff_text(text: String) -> Value {
    if text.len() >= 2 && text.starts_with('[') && text.ends_with(']') {
        let inner = &text[1..text.len() - 1];
        let elements = inner.split(',').map(sniff_element).collect();
        return Value::Array(elements);
    }

    Value::Text(text)
}

/// One array element: quote-delimited is text, a parseable integer is an
/// integer, anything else is null.
fn sniff_element(element: &str) -> Value {
    let quoted = element.len() >= 2
        && ((element.starts_with('"') && element.ends_with('"'))
            || (element.starts_with('\'') && element.ends_with('\'')));
    if quoted {
        return Value::Text(element[1..element.len() - 1].to_string());
    }

    element
        .parse::<i64>()
        .map_or(Value::Null, Value::Integer)
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::Gif => Self::Gif,
            ImageFormat::Bmp => Self::Bmp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::new_rgba8(1, 1)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_blob_is_image() {
        let data = png_bytes();
        assert!(data.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
        match sniff_blob(&data) {
            Value::Image { data: raw, format } => {
                assert_eq!(format, ImageFormat::Png);
                assert_eq!(raw, data);
            },
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_image_falls_through() {
        // JPEG magic with nothing behind it: decode fails, text decode
        // fails on the 0xFF bytes, so the cell ends up Null.
        assert_eq!(sniff_blob(&[0xFF, 0xD8, 0xFF, 0x00]), Value::Null);
    }

    #[test]
    fn test_plist_string_array_joins_to_text() {
        let mut data = Vec::new();
        plist::to_writer_xml(
            &mut data,
            &vec!["alpha".to_string(), "beta".to_string()],
        )
        .unwrap();
        assert_eq!(sniff_blob(&data), Value::Text("alpha,beta".to_string()));
    }

    #[test]
    fn test_integer_array_text() {
        assert_eq!(
            sniff_blob(b"[1,2,3]"),
            Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ])
        );
    }

    #[test]
    fn test_quoted_string_array_text() {
        assert_eq!(
            sniff_blob(b"[\"a\",\"b\"]"),
            Value::Array(vec![
                Value::Text("a".to_string()),
                Value::Text("b".to_string())
            ])
        );
    }

    #[test]
    fn test_unparseable_element_is_null() {
        assert_eq!(
            sniff_blob(b"[1,x]"),
            Value::Array(vec![Value::Integer(1), Value::Null])
        );
    }

    #[test]
    fn test_plain_text_blob() {
        assert_eq!(sniff_blob(b"hello"), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_undecodable_blob_is_null() {
        assert_eq!(sniff_blob(&[0x00, 0xFF, 0xFE, 0x01]), Value::Null);
    }
}
