//! Magic-byte format detection.
//!
//! Only the leading bytes are inspected; the `Content-Type` header of the
//! response is ignored because image hosts routinely serve WebP as
//! `image/jpeg` and vice versa.

use serde::{Deserialize, Serialize};

/// Format tag derived from the leading bytes of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Unknown,
}

const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const WEBP_OFFSET: usize = 8;
const WEBP_MARKER: &[u8] = b"WEBP";

/// Classify a buffer by its magic bytes.
///
/// Total and pure: every input maps to a tag, short buffers included.
/// The RIFF container tag at offset 0 is deliberately not checked; the
/// `WEBP` marker at offset 8 is enough.
pub fn classify(bytes: &[u8]) -> ImageKind {
    if bytes.starts_with(PNG_MAGIC) {
        ImageKind::Png
    } else if bytes.starts_with(JPEG_MAGIC) {
        ImageKind::Jpeg
    } else if bytes.get(WEBP_OFFSET..WEBP_OFFSET + WEBP_MARKER.len()) == Some(WEBP_MARKER) {
        ImageKind::Webp
    } else {
        ImageKind::Unknown
    }
}

impl ImageKind {
    /// Short lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpeg",
            ImageKind::Webp => "webp",
            ImageKind::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_headers() {
        let cases: &[(&[u8], ImageKind)] = &[
            (&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], ImageKind::Png),
            (&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F'], ImageKind::Jpeg),
            (&[0xFF, 0xD8, 0xFF, 0xE1], ImageKind::Jpeg),
            (b"RIFF\x24\x00\x00\x00WEBPVP8 ", ImageKind::Webp),
            (b"GIF89a\x01\x00\x01\x00", ImageKind::Unknown),
            (b"<html><body>", ImageKind::Unknown),
        ];
        for (bytes, expected) in cases {
            assert_eq!(classify(bytes), *expected, "bytes: {bytes:02X?}");
        }
    }

    #[test]
    fn webp_marker_without_riff_prefix_still_counts() {
        assert_eq!(classify(b"XXXXXXXXWEBP"), ImageKind::Webp);
    }

    #[test]
    fn short_buffers_are_unknown() {
        assert_eq!(classify(&[]), ImageKind::Unknown);
        assert_eq!(classify(&[0x89, b'P', b'N']), ImageKind::Unknown);
        assert_eq!(classify(&[0xFF, 0xD8]), ImageKind::Unknown);
        assert_eq!(classify(b"RIFF\0\0\0\0WEB"), ImageKind::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let buf = b"RIFF\0\0\0\0WEBPVP8L";
        assert_eq!(classify(buf), classify(buf));
    }
}
