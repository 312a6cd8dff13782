//! Error types for the manga-bundler library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BundleError`]: **Fatal**: the batch cannot produce a payload at all
//!   (bad request body, every image failed, pdfium unavailable). Returned as
//!   `Err(BundleError)` from the top-level `bundle_*` functions and mapped to
//!   an HTTP status by [`crate::response`].
//!
//! * [`ImageError`]: **Non-fatal**: a single image could not be fetched or
//!   embedded. Stored on the per-image result; in document mode it turns
//!   into a placeholder page, in archive mode into a missing entry.

use thiserror::Error;

/// All fatal errors returned by the manga-bundler library.
#[derive(Debug, Error)]
pub enum BundleError {
    // ── Request errors ────────────────────────────────────────────────────
    /// Request body was missing the `urls` array or was not JSON.
    #[error("{0}")]
    Validation(String),

    /// Endpoint was called with something other than POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Not a single image of the batch could be used; no payload exists.
    #[error("No images could be processed: {failed} of {total} failed")]
    AllImagesFailed {
        total: usize,
        failed: usize,
        /// Only reported by the document pipeline.
        webp_skipped: Option<usize>,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// pdfium rejected an operation while building the document.
    #[error("PDF generation failed: {0}")]
    PdfGeneration(String),

    /// The ZIP writer failed.
    #[error("Archive generation failed: {0}")]
    ArchiveGeneration(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BundleError {
    /// HTTP status code this error surfaces as.
    pub fn status_code(&self) -> u16 {
        match self {
            BundleError::Validation(_) => 400,
            BundleError::MethodNotAllowed => 405,
            _ => 500,
        }
    }
}

/// A non-fatal error for a single image.
///
/// The `Display` text is what ends up on the placeholder page, so keep it
/// short and readable.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ImageError {
    /// The URL could not be parsed as an absolute URL. No request was sent.
    #[error("Invalid URL: {reason}")]
    InvalidUrl { reason: String },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// Connection, TLS, redirect or body-read failure.
    #[error("{detail}")]
    Transport { detail: String },

    /// Neither raster decoder accepted the bytes.
    #[error("Unsupported image format: {detail}")]
    Decode { detail: String },

    /// WebP cannot be embedded in the PDF.
    #[error("WebP images cannot be embedded in a PDF")]
    WebpUnsupported,
}

impl ImageError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ImageError::HttpStatus { status } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_failed_display() {
        let e = BundleError::AllImagesFailed {
            total: 3,
            failed: 3,
            webp_skipped: Some(1),
        };
        assert!(e.to_string().contains("3 of 3"), "got: {e}");
        assert_eq!(e.status_code(), 500);
    }

    #[test]
    fn request_errors_map_to_client_statuses() {
        assert_eq!(BundleError::Validation("URLs array required".into()).status_code(), 400);
        assert_eq!(BundleError::MethodNotAllowed.status_code(), 405);
        assert_eq!(BundleError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn http_status_display_matches_placeholder_text() {
        let e = ImageError::HttpStatus { status: 404 };
        assert_eq!(e.to_string(), "HTTP 404");
        assert_eq!(e.http_status(), Some(404));
        assert_eq!(ImageError::WebpUnsupported.http_status(), None);
    }
}
