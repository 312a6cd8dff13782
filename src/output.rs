//! Result types shared by both pipelines.
//!
//! Everything here is batch-scoped: created when a request arrives, consumed
//! by the response composer, then dropped.

use crate::error::ImageError;
use crate::pipeline::page::PageContent;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One image URL of the batch, with its submission position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// 0-based position in the submitted list.
    pub index: usize,
    pub url: String,
}

impl ImageRequest {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
        }
    }

    /// 1-based number shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Number a URL list in submission order.
    pub fn from_urls<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .enumerate()
            .map(|(index, url)| Self::new(index, url))
            .collect()
    }
}

/// How a document page came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageKind {
    Embedded,
    Placeholder,
    WebpSkipped,
}

/// The page produced for one request in document mode.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub index: usize,
    pub kind: PageKind,
    pub content: PageContent,
    /// Set for placeholder and WebP pages.
    pub error: Option<ImageError>,
}

/// The archive entry produced for one request in archive mode.
#[derive(Debug, Clone)]
pub struct EntryResult {
    pub index: usize,
    pub name: String,
    /// `None` when the download failed; no entry is written then.
    pub bytes: Option<Bytes>,
    pub error: Option<ImageError>,
}

impl EntryResult {
    pub fn is_present(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Final counters of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub successful: usize,
    pub failed: usize,
    /// Only meaningful in document mode.
    pub webp_skipped: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

/// Counters updated by in-flight images.
///
/// Each request bumps exactly one of `successful`/`failed` when it reaches
/// a terminal state; `webp_skipped` is bumped in addition to `failed`.
#[derive(Debug, Default)]
pub struct BatchCounters {
    successful: AtomicUsize,
    failed: AtomicUsize,
    webp_skipped: AtomicUsize,
}

impl BatchCounters {
    pub fn record_success(&self) {
        self.successful.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_webp_skip(&self) {
        self.webp_skipped.fetch_add(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the counters. Only stable once every image has finished.
    pub fn snapshot(&self) -> BatchSummary {
        BatchSummary {
            successful: self.successful.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            webp_skipped: self.webp_skipped.load(Ordering::SeqCst),
        }
    }
}

/// Which artifact a batch produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleMode {
    /// One PDF page per image.
    Pdf,
    /// Flat ZIP of the raw downloads.
    Zip,
}

impl BundleMode {
    pub fn content_type(self) -> &'static str {
        match self {
            BundleMode::Pdf => "application/pdf",
            BundleMode::Zip => "application/zip",
        }
    }

    /// Download filename, templated with the success count.
    pub fn filename(self, successful: usize) -> String {
        match self {
            BundleMode::Pdf => format!("manga_{successful}_pages.pdf"),
            BundleMode::Zip => format!("manga_{successful}_images.zip"),
        }
    }
}

/// A serialised artifact plus the counters that describe it.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    pub mode: BundleMode,
    pub bytes: Vec<u8>,
    pub summary: BatchSummary,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_numbered_in_order() {
        let reqs = ImageRequest::from_urls(["a", "b", "c"]);
        assert_eq!(reqs[2], ImageRequest::new(2, "c"));
        assert_eq!(reqs[0].number(), 1);
    }

    #[test]
    fn webp_skip_also_counts_as_failure() {
        let counters = BatchCounters::default();
        counters.record_success();
        counters.record_webp_skip();
        counters.record_failure();
        let summary = counters.snapshot();
        assert_eq!(
            summary,
            BatchSummary {
                successful: 1,
                failed: 2,
                webp_skipped: 1
            }
        );
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn filenames_carry_success_count() {
        assert_eq!(BundleMode::Pdf.filename(12), "manga_12_pages.pdf");
        assert_eq!(BundleMode::Zip.filename(1), "manga_1_images.zip");
    }
}
