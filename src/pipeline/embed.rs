//! Raster validation with PNG ↔ JPEG fallback.
//!
//! File extensions and `Content-Type` headers lie often enough that the
//! detected kind is only a first guess: if its decoder rejects the bytes the
//! other raster decoder gets a turn before the image is declared broken.
//!
//! JPEG data is never re-encoded. The decoder only proves the bytes are a
//! usable JPEG and yields the dimensions; the fetched bytes themselves go
//! into the PDF as a DCT stream. Only PNG keeps its decoded raster.

use crate::error::ImageError;
use crate::pipeline::classify::ImageKind;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// How the image reaches the PDF writer.
#[derive(Debug, Clone)]
pub enum PixelSource {
    /// Embed [`ImageAsset::bytes`] unchanged.
    Jpeg,
    /// Embed the decoded raster as a bitmap.
    Raster(DynamicImage),
}

/// A validated image ready to be placed on a page.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    /// Detected kind, before any fallback.
    pub kind: ImageKind,
    /// Decoder that actually accepted the bytes.
    pub decoded_as: ImageKind,
    pub width: u32,
    pub height: u32,
    /// The bytes as fetched.
    pub bytes: Bytes,
    pub source: PixelSource,
}

impl ImageAsset {
    /// True when the fetched bytes are embedded without re-encoding.
    pub fn is_passthrough(&self) -> bool {
        matches!(self.source, PixelSource::Jpeg)
    }
}

/// Decoder order for a detected kind. Unknown bytes try JPEG first.
fn decoder_order(kind: ImageKind) -> [ImageFormat; 2] {
    match kind {
        ImageKind::Png => [ImageFormat::Png, ImageFormat::Jpeg],
        _ => [ImageFormat::Jpeg, ImageFormat::Png],
    }
}

fn kind_of(format: ImageFormat) -> ImageKind {
    match format {
        ImageFormat::Png => ImageKind::Png,
        ImageFormat::Jpeg => ImageKind::Jpeg,
        _ => ImageKind::Unknown,
    }
}

/// Validate `bytes` for embedding.
///
/// WebP is refused up front; callers are expected to have routed it to the
/// notice page already.
pub fn decode_for_embedding(bytes: Bytes, kind: ImageKind) -> Result<ImageAsset, ImageError> {
    if kind == ImageKind::Webp {
        return Err(ImageError::WebpUnsupported);
    }

    let mut last_err = String::new();
    for format in decoder_order(kind) {
        match image::load_from_memory_with_format(&bytes, format) {
            Ok(image) => {
                let decoded_as = kind_of(format);
                if decoded_as != kind {
                    debug!(
                        "Detected {} but decoded as {}",
                        kind.as_str(),
                        decoded_as.as_str()
                    );
                }
                let (width, height) = (image.width(), image.height());
                let source = match decoded_as {
                    ImageKind::Jpeg => PixelSource::Jpeg,
                    _ => PixelSource::Raster(image),
                };
                return Ok(ImageAsset {
                    kind,
                    decoded_as,
                    width,
                    height,
                    bytes,
                    source,
                });
            }
            Err(e) => last_err = e.to_string(),
        }
    }

    Err(ImageError::Decode { detail: last_err })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn encoded(format: ImageFormat, w: u32, h: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 30, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format)
            .expect("encode fixture");
        Bytes::from(buf)
    }

    #[test]
    fn png_decodes_with_its_own_decoder() {
        let bytes = encoded(ImageFormat::Png, 12, 7);
        let asset = decode_for_embedding(bytes, ImageKind::Png).unwrap();
        assert_eq!((asset.width, asset.height), (12, 7));
        assert_eq!(asset.decoded_as, ImageKind::Png);
        assert!(matches!(asset.source, PixelSource::Raster(_)));
    }

    #[test]
    fn jpeg_keeps_fetched_bytes_and_drops_the_raster() {
        let bytes = encoded(ImageFormat::Jpeg, 120, 180);
        let asset = decode_for_embedding(bytes.clone(), ImageKind::Jpeg).unwrap();
        assert_eq!((asset.width, asset.height), (120, 180));
        assert!(asset.is_passthrough());
        assert_eq!(asset.bytes, bytes);
    }

    #[test]
    fn truncated_jpeg_is_rejected() {
        let bytes = encoded(ImageFormat::Jpeg, 64, 64);
        // SOI and part of APP0, no frame header.
        let cut = bytes.slice(..20);
        let err = decode_for_embedding(cut, ImageKind::Jpeg).unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn mislabelled_bytes_fall_back_to_other_decoder() {
        let bytes = encoded(ImageFormat::Jpeg, 16, 16);
        let asset = decode_for_embedding(bytes, ImageKind::Png).unwrap();
        assert_eq!(asset.kind, ImageKind::Png);
        assert_eq!(asset.decoded_as, ImageKind::Jpeg);
        assert!(asset.is_passthrough());
    }

    #[test]
    fn unknown_kind_still_tries_both_decoders() {
        let bytes = encoded(ImageFormat::Png, 3, 4);
        let asset = decode_for_embedding(bytes, ImageKind::Unknown).unwrap();
        assert_eq!(asset.decoded_as, ImageKind::Png);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_for_embedding(Bytes::from_static(b"GIF89a not really"), ImageKind::Unknown)
            .unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn webp_is_refused() {
        let err = decode_for_embedding(Bytes::from_static(b"RIFF\0\0\0\0WEBPVP8 "), ImageKind::Webp)
            .unwrap_err();
        assert_eq!(err, ImageError::WebpUnsupported);
    }
}
