//! Document-mode page rendering: one fetch outcome → exactly one page.
//!
//! Whatever happens to an image, the document gets a page for it. Success
//! yields a page sized to the image; every failure path goes through
//! [`failure_page`] so placeholder layout lives in one place.

use crate::error::ImageError;
use crate::output::{ImageRequest, PageKind, PageResult};
use crate::pipeline::classify::{classify, ImageKind};
use crate::pipeline::embed::{decode_for_embedding, ImageAsset};
use crate::pipeline::fetch::FetchOutcome;
use tracing::{debug, warn};

/// A4 portrait in PDF points.
pub const A4_WIDTH_PT: f32 = 595.0;
pub const A4_HEIGHT_PT: f32 = 842.0;

/// Detail lines longer than this are shortened on placeholder pages.
const LINE_DISPLAY_MAX: usize = 80;
const LINE_DISPLAY_KEEP: usize = 77;

/// How loudly a failure page presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The image could not be used.
    Error,
    /// The image was deliberately skipped (WebP).
    Notice,
}

/// Text-only A4 page standing in for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePage {
    pub severity: Severity,
    pub title: String,
    pub lines: Vec<String>,
}

/// What a page will contain once serialised.
#[derive(Debug, Clone)]
pub enum PageContent {
    /// Page sized to the image, image filling it from the origin.
    Image(ImageAsset),
    /// Fixed A4 page with diagnostic text.
    Failure(FailurePage),
}

impl PageContent {
    /// Page size in points. One pixel maps to one point.
    pub fn size_pt(&self) -> (f32, f32) {
        match self {
            PageContent::Image(asset) => (asset.width as f32, asset.height as f32),
            PageContent::Failure(_) => (A4_WIDTH_PT, A4_HEIGHT_PT),
        }
    }
}

/// Build the single placeholder page shape used by every failure path.
pub fn failure_page(
    severity: Severity,
    title: impl Into<String>,
    lines: impl IntoIterator<Item = String>,
) -> PageContent {
    PageContent::Failure(FailurePage {
        severity,
        title: title.into(),
        lines: lines.into_iter().collect(),
    })
}

/// Shorten a detail line (URL or error text) so it fits the A4 page:
/// more than 80 characters → first 77 + `...`.
pub fn display_line(text: &str) -> String {
    if text.chars().count() > LINE_DISPLAY_MAX {
        let head: String = text.chars().take(LINE_DISPLAY_KEEP).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Turn a terminal fetch outcome into the page for `request`.
///
/// CPU-bound when the image decodes; call it from a blocking context.
pub fn render_page(request: &ImageRequest, outcome: FetchOutcome) -> PageResult {
    let number = request.number();
    let bytes = match outcome.into_result() {
        Ok(bytes) => bytes,
        Err(e) => return placeholder_page(request, e),
    };

    let kind = classify(&bytes);
    if kind == ImageKind::Webp {
        warn!("Image {}: WebP detected, adding notice page", number);
        return webp_notice(request);
    }

    match decode_for_embedding(bytes, kind) {
        Ok(asset) => {
            debug!(
                "Image {}: embedded {}x{} ({})",
                number,
                asset.width,
                asset.height,
                asset.decoded_as.as_str()
            );
            PageResult {
                index: request.index,
                kind: PageKind::Embedded,
                content: PageContent::Image(asset),
                error: None,
            }
        }
        Err(e) => placeholder_page(request, e),
    }
}

/// Placeholder page for an image that could not be used.
pub fn placeholder_page(request: &ImageRequest, error: ImageError) -> PageResult {
    warn!("Image {}: {} ({})", request.number(), error, request.url);
    PageResult {
        index: request.index,
        kind: PageKind::Placeholder,
        content: failure_page(
            Severity::Error,
            format!("Image {} could not be loaded", request.number()),
            [display_line(&error.to_string()), display_line(&request.url)],
        ),
        error: Some(error),
    }
}

fn webp_notice(request: &ImageRequest) -> PageResult {
    PageResult {
        index: request.index,
        kind: PageKind::WebpSkipped,
        content: failure_page(
            Severity::Notice,
            format!("Image {} is a WebP image", request.number()),
            [
                "WebP images cannot be embedded in a PDF.".to_string(),
                "Use the ZIP download to keep every image.".to_string(),
                display_line(&request.url),
            ],
        ),
        error: Some(ImageError::WebpUnsupported),
    }
}
