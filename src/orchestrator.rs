//! Batch orchestration over a URL list.
//!
//! Both pipelines share one driver, [`Orchestrator::run`], and differ only in
//! the [`ConcurrencyPolicy`] they hand it:
//!
//! | Policy      | In flight | Builder sees results            |
//! |-------------|-----------|---------------------------------|
//! | `Ordered`   | 1         | as each image finishes, in order |
//! | `Unbounded` | all       | after every image has finished   |
//!
//! In both cases the builder is only ever touched from the driving task,
//! never from the per-image futures. The per-image futures share nothing but
//! the atomic [`BatchCounters`].

use crate::config::BundleConfig;
use crate::error::{BundleError, ImageError};
use crate::output::{BatchCounters, BatchSummary, EntryResult, ImageRequest, PageKind, PageResult};
use crate::pipeline::entry::render_entry;
use crate::pipeline::fetch::{
    fetch_with_retry, Backoff, FetchSettings, FixedBackoff, ImageFetcher, ReqwestFetcher,
};
use crate::pipeline::page::{placeholder_page, render_page};
use crate::pipeline::{archive, pdf};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How many images are in flight and when their results reach the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// One image at a time in index order. Results are pushed as they finish.
    Ordered,
    /// Every image at once, no cap. Results are pushed after the join.
    Unbounded,
}

/// Pages collected in document mode, one per request, in request order.
#[derive(Debug)]
pub struct DocumentBatch {
    pub pages: Vec<PageResult>,
    pub summary: BatchSummary,
}

impl DocumentBatch {
    /// Serialise the pages through pdfium.
    pub async fn into_pdf(self, pdfium_library_path: Option<PathBuf>) -> Result<Vec<u8>, BundleError> {
        pdf::render_pdf(self.pages, pdfium_library_path).await
    }
}

/// Entries collected in archive mode, one per request (present or not).
#[derive(Debug)]
pub struct ArchiveBatch {
    pub entries: Vec<EntryResult>,
    pub summary: BatchSummary,
}

impl ArchiveBatch {
    /// Entries that will actually land in the archive.
    pub fn present(&self) -> impl Iterator<Item = &EntryResult> {
        self.entries.iter().filter(|e| e.is_present())
    }

    /// Serialise the present entries into a ZIP.
    pub async fn into_zip(self, compression_level: u8) -> Result<Vec<u8>, BundleError> {
        archive::render_zip(self.entries, compression_level).await
    }
}

/// Drives fetch → render for every image of a batch.
pub struct Orchestrator {
    fetcher: Arc<dyn ImageFetcher>,
    backoff: Arc<dyn Backoff>,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, backoff: Arc<dyn Backoff>) -> Self {
        Self {
            fetcher,
            backoff,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Build from config: injected fetcher/backoff win over the defaults.
    pub fn from_config(config: &BundleConfig) -> Result<Self, BundleError> {
        let fetcher: Arc<dyn ImageFetcher> = match &config.fetcher {
            Some(f) => Arc::clone(f),
            None => Arc::new(ReqwestFetcher::new(&FetchSettings {
                user_agent: config.user_agent.clone(),
                timeout: config.request_timeout_secs.map(Duration::from_secs),
            })?),
        };
        let backoff: Arc<dyn Backoff> = match &config.backoff {
            Some(b) => Arc::clone(b),
            None => Arc::new(FixedBackoff::from_millis(config.retry_delay_ms)),
        };
        Ok(Self {
            fetcher,
            backoff,
            progress: config.progress_callback.clone(),
        })
    }

    /// Run `process` for every request under `policy`, handing each result
    /// to `push` from this task only.
    pub async fn run<T, F, Fut>(
        requests: &[ImageRequest],
        policy: ConcurrencyPolicy,
        process: F,
        mut push: impl FnMut(T),
    ) where
        F: Fn(ImageRequest) -> Fut,
        Fut: Future<Output = T>,
    {
        match policy {
            ConcurrencyPolicy::Ordered => {
                for request in requests {
                    push(process(request.clone()).await);
                }
            }
            ConcurrencyPolicy::Unbounded => {
                let in_flight = requests.len().max(1);
                let results: Vec<T> = stream::iter(requests.iter().cloned().map(&process))
                    .buffer_unordered(in_flight)
                    .collect()
                    .await;
                for result in results {
                    push(result);
                }
            }
        }
    }

    /// Document pipeline: one page per request, in order, with retry.
    pub async fn collect_pages(
        &self,
        requests: &[ImageRequest],
        max_attempts: u32,
    ) -> Result<DocumentBatch, BundleError> {
        let total = requests.len();
        info!("Processing {} images for PDF...", total);
        self.notify(|cb| cb.on_batch_start(total));

        let counters = BatchCounters::default();
        let counters_ref = &counters;
        let mut pages = Vec::with_capacity(total);

        Self::run(
            requests,
            ConcurrencyPolicy::Ordered,
            move |request| self.document_page(request, max_attempts, counters_ref, total),
            |page| pages.push(page),
        )
        .await;

        let summary = counters.snapshot();
        self.finish(total, summary);
        debug_assert_eq!(pages.len(), total);

        if summary.successful == 0 {
            return Err(BundleError::AllImagesFailed {
                total,
                failed: summary.failed,
                webp_skipped: Some(summary.webp_skipped),
            });
        }
        Ok(DocumentBatch { pages, summary })
    }

    /// Archive pipeline: all downloads at once, entries added after the join.
    pub async fn collect_entries(
        &self,
        requests: &[ImageRequest],
        max_attempts: u32,
    ) -> Result<ArchiveBatch, BundleError> {
        let total = requests.len();
        info!("Processing {} images...", total);
        self.notify(|cb| cb.on_batch_start(total));

        let counters = BatchCounters::default();
        let counters_ref = &counters;
        let mut entries = Vec::with_capacity(total);

        Self::run(
            requests,
            ConcurrencyPolicy::Unbounded,
            move |request| self.archive_entry(request, max_attempts, counters_ref, total),
            |entry| entries.push(entry),
        )
        .await;

        entries.sort_by_key(|e: &EntryResult| e.index);
        let summary = counters.snapshot();
        self.finish(total, summary);

        if summary.successful == 0 {
            return Err(BundleError::AllImagesFailed {
                total,
                failed: summary.failed,
                webp_skipped: None,
            });
        }
        Ok(ArchiveBatch { entries, summary })
    }

    async fn document_page(
        &self,
        request: ImageRequest,
        max_attempts: u32,
        counters: &BatchCounters,
        total: usize,
    ) -> PageResult {
        let number = request.number();
        self.notify(|cb| cb.on_image_start(number, total));
        debug!("Downloading image {}/{}...", number, total);

        let outcome =
            fetch_with_retry(self.fetcher.as_ref(), &request.url, max_attempts, self.backoff.as_ref())
                .await;
        let fetched_len = outcome.bytes.as_ref().map_or(0, |b| b.len());

        // Decoding is CPU-bound; keep it off the async workers.
        let fallback = request.clone();
        let page = match tokio::task::spawn_blocking(move || render_page(&request, outcome)).await {
            Ok(page) => page,
            Err(e) => placeholder_page(
                &fallback,
                ImageError::Decode {
                    detail: format!("decoder panicked: {e}"),
                },
            ),
        };

        match page.kind {
            PageKind::Embedded => {
                counters.record_success();
                self.notify(|cb| cb.on_image_complete(number, total, fetched_len));
            }
            PageKind::Placeholder => counters.record_failure(),
            PageKind::WebpSkipped => counters.record_webp_skip(),
        }
        if let Some(err) = &page.error {
            let msg = err.to_string();
            self.notify(|cb| cb.on_image_error(number, total, &msg));
        }
        page
    }

    async fn archive_entry(
        &self,
        request: ImageRequest,
        max_attempts: u32,
        counters: &BatchCounters,
        total: usize,
    ) -> EntryResult {
        let number = request.number();
        self.notify(|cb| cb.on_image_start(number, total));

        let outcome =
            fetch_with_retry(self.fetcher.as_ref(), &request.url, max_attempts, self.backoff.as_ref())
                .await;
        let entry = render_entry(&request, outcome);

        match (&entry.bytes, &entry.error) {
            (Some(bytes), _) => {
                counters.record_success();
                let len = bytes.len();
                self.notify(|cb| cb.on_image_complete(number, total, len));
            }
            (None, err) => {
                counters.record_failure();
                let msg = err.as_ref().map(|e| e.to_string()).unwrap_or_default();
                self.notify(|cb| cb.on_image_error(number, total, &msg));
            }
        }
        entry
    }

    fn notify(&self, f: impl FnOnce(&ProgressCallback)) {
        if let Some(cb) = &self.progress {
            f(cb);
        }
    }

    fn finish(&self, total: usize, summary: BatchSummary) {
        info!(
            "Batch complete: {} successful, {} failed, {} WebP skipped (of {})",
            summary.successful, summary.failed, summary.webp_skipped, total
        );
        self.notify(|cb| cb.on_batch_complete(total, summary.successful));
    }
}
