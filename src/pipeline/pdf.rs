//! PDF serialisation via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not be driven from async worker threads. The whole
//! document is therefore assembled inside one `spawn_blocking` call once the
//! page list is final.

use crate::error::BundleError;
use crate::output::PageResult;
use crate::pipeline::embed::{ImageAsset, PixelSource};
use crate::pipeline::page::{FailurePage, PageContent, Severity};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEXT_LEFT_PT: f32 = 50.0;
const TITLE_BASELINE_PT: f32 = 400.0;
const TITLE_SIZE_PT: f32 = 20.0;
const LINE_SIZE_PT: f32 = 12.0;
const LINE_SPACING_PT: f32 = 18.0;

/// Bind pdfium from an explicit library file, or from the system search path.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, BundleError> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(path.to_string_lossy().into_owned()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| BundleError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn pdf_err(e: PdfiumError) -> BundleError {
    BundleError::PdfGeneration(format!("{e:?}"))
}

/// Serialise `pages` into a PDF on the blocking pool.
pub async fn render_pdf(
    pages: Vec<PageResult>,
    library_path: Option<PathBuf>,
) -> Result<Vec<u8>, BundleError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(library_path.as_deref())?;
        write_pdf(&pdfium, &pages)
    })
    .await
    .map_err(|e| BundleError::Internal(format!("PDF task panicked: {e}")))?
}

/// Write one page per entry of `pages`, in slice order.
pub fn write_pdf(pdfium: &Pdfium, pages: &[PageResult]) -> Result<Vec<u8>, BundleError> {
    let mut document = pdfium.create_new_pdf().map_err(pdf_err)?;
    let regular = document.fonts_mut().helvetica();
    let bold = document.fonts_mut().helvetica_bold();

    for page in pages {
        let (width, height) = page.content.size_pt();
        let mut pdf_page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(width),
                PdfPoints::new(height),
            ))
            .map_err(pdf_err)?;

        match &page.content {
            PageContent::Image(asset) => {
                place_image(&document, &mut pdf_page, asset, width, height)?;
            }
            PageContent::Failure(body) => {
                let title_font = match body.severity {
                    Severity::Error => bold,
                    Severity::Notice => regular,
                };
                draw_failure(&mut pdf_page, body, title_font, regular)?;
            }
        }
        debug!("Page {} written ({}x{} pt)", page.index + 1, width, height);
    }

    let bytes = document.save_to_bytes().map_err(pdf_err)?;
    info!("PDF assembled: {} pages, {} bytes", pages.len(), bytes.len());
    Ok(bytes)
}

/// Cover the whole page with `asset`.
///
/// JPEGs go in as their fetched DCT stream; everything else as a bitmap.
fn place_image<'a>(
    document: &PdfDocument<'a>,
    page: &mut PdfPage<'a>,
    asset: &ImageAsset,
    width: f32,
    height: f32,
) -> Result<(), BundleError> {
    match &asset.source {
        PixelSource::Jpeg => {
            let mut object =
                PdfPageImageObject::new_from_jpeg_reader(document, Cursor::new(asset.bytes.clone()))
                    .map_err(pdf_err)?;
            // A fresh image object spans one unit square.
            object.scale(width, height).map_err(pdf_err)?;
            page.objects_mut()
                .add_image_object(object)
                .map_err(pdf_err)?;
        }
        PixelSource::Raster(image) => {
            page.objects_mut()
                .create_image_object(
                    PdfPoints::ZERO,
                    PdfPoints::ZERO,
                    image,
                    Some(PdfPoints::new(width)),
                    Some(PdfPoints::new(height)),
                )
                .map_err(pdf_err)?;
        }
    }
    Ok(())
}

fn draw_failure(
    page: &mut PdfPage<'_>,
    body: &FailurePage,
    title_font: PdfFontToken,
    line_font: PdfFontToken,
) -> Result<(), BundleError> {
    page.objects_mut()
        .create_text_object(
            PdfPoints::new(TEXT_LEFT_PT),
            PdfPoints::new(TITLE_BASELINE_PT),
            &body.title,
            title_font,
            PdfPoints::new(TITLE_SIZE_PT),
        )
        .map_err(pdf_err)?;

    let mut baseline = TITLE_BASELINE_PT - TITLE_SIZE_PT - LINE_SPACING_PT / 2.0;
    for line in &body.lines {
        page.objects_mut()
            .create_text_object(
                PdfPoints::new(TEXT_LEFT_PT),
                PdfPoints::new(baseline),
                line,
                line_font,
                PdfPoints::new(LINE_SIZE_PT),
            )
            .map_err(pdf_err)?;
        baseline -= LINE_SPACING_PT;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageKind;
    use crate::pipeline::classify::ImageKind;
    use crate::pipeline::embed::decode_for_embedding;
    use crate::pipeline::page::{failure_page, A4_HEIGHT_PT, A4_WIDTH_PT};
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    /// Skip unless a pdfium library can be bound on this machine.
    fn pdfium_or_skip() -> Option<Pdfium> {
        let path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
        match bind_pdfium(path.as_deref()) {
            Ok(p) => Some(p),
            Err(e) => {
                println!("SKIP: pdfium unavailable: {e}");
                None
            }
        }
    }

    fn encoded(format: ImageFormat, w: u32, h: u32) -> Bytes {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buf), format)
            .expect("encode fixture");
        Bytes::from(buf)
    }

    fn image_page(index: usize, format: ImageFormat, w: u32, h: u32) -> PageResult {
        let kind = match format {
            ImageFormat::Jpeg => ImageKind::Jpeg,
            _ => ImageKind::Png,
        };
        let asset = decode_for_embedding(encoded(format, w, h), kind).expect("decode fixture");
        PageResult {
            index,
            kind: PageKind::Embedded,
            content: PageContent::Image(asset),
            error: None,
        }
    }

    fn placeholder_page(index: usize) -> PageResult {
        PageResult {
            index,
            kind: PageKind::Placeholder,
            content: failure_page(
                Severity::Error,
                format!("Image {} could not be loaded", index + 1),
                ["HTTP 404".to_string()],
            ),
            error: None,
        }
    }

    #[test]
    fn page_count_and_sizes_survive_serialisation() {
        let Some(pdfium) = pdfium_or_skip() else { return };
        let pages = vec![
            image_page(0, ImageFormat::Png, 300, 450),
            placeholder_page(1),
            image_page(2, ImageFormat::Jpeg, 80, 60),
        ];

        let bytes = write_pdf(&pdfium, &pages).expect("write pdf");
        assert!(bytes.starts_with(b"%PDF"));

        let doc = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .expect("reload pdf");
        let reloaded = doc.pages();
        assert_eq!(reloaded.len(), 3);

        let second = reloaded.get(1).expect("page 2");
        assert!((second.width().value - A4_WIDTH_PT).abs() < 0.5);
        assert!((second.height().value - A4_HEIGHT_PT).abs() < 0.5);

        let first = reloaded.get(0).expect("page 1");
        assert!((first.width().value - 300.0).abs() < 0.5);
        assert!((first.height().value - 450.0).abs() < 0.5);
    }

    #[test]
    fn jpeg_stream_is_embedded_unchanged() {
        let Some(pdfium) = pdfium_or_skip() else { return };
        let jpeg = encoded(ImageFormat::Jpeg, 1200, 1800);
        let pages = vec![image_page_from(0, jpeg.clone())];

        let bytes = write_pdf(&pdfium, &pages).expect("write pdf");

        // The original DCT data appears verbatim, and nothing near the
        // 1200x1800x3 raster size was written.
        assert!(bytes.windows(jpeg.len()).any(|w| w == jpeg.as_ref()));
        assert!(bytes.len() < jpeg.len() + 64 * 1024);

        let doc = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .expect("reload pdf");
        let page = doc.pages().get(0).expect("page 1");
        assert!((page.width().value - 1200.0).abs() < 0.5);
        assert!((page.height().value - 1800.0).abs() < 0.5);
    }

    fn image_page_from(index: usize, jpeg: Bytes) -> PageResult {
        let asset = decode_for_embedding(jpeg, ImageKind::Jpeg).expect("decode fixture");
        assert!(asset.is_passthrough());
        PageResult {
            index,
            kind: PageKind::Embedded,
            content: PageContent::Image(asset),
            error: None,
        }
    }
}
