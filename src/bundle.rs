//! Top-level bundling entry points.
//!
//! [`bundle_pdf`] and [`bundle_zip`] run a whole batch and return the
//! serialised artifact with its counters. They return `Err` only for fatal
//! conditions: every image failed, or the artifact could not be written.
//! Per-image failures are already folded into the artifact (placeholder
//! pages, missing entries) and the counters.

use crate::config::BundleConfig;
use crate::error::BundleError;
use crate::orchestrator::{ArchiveBatch, DocumentBatch, Orchestrator};
use crate::output::{BundleMode, BundleOutput, ImageRequest};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Fetch every URL and build a page-per-image PDF.
///
/// # Errors
/// - [`BundleError::AllImagesFailed`] when no image could be embedded
/// - [`BundleError::PdfiumBindingFailed`] when pdfium cannot be loaded
pub async fn bundle_pdf<I, S>(urls: I, config: &BundleConfig) -> Result<BundleOutput, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    bundle(BundleMode::Pdf, urls, config).await
}

/// Fetch every URL concurrently and pack the downloads into a ZIP.
///
/// # Errors
/// - [`BundleError::AllImagesFailed`] when no image could be downloaded
pub async fn bundle_zip<I, S>(urls: I, config: &BundleConfig) -> Result<BundleOutput, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    bundle(BundleMode::Zip, urls, config).await
}

/// Dispatch on `mode` with an orchestrator built from `config`.
pub async fn bundle<I, S>(
    mode: BundleMode,
    urls: I,
    config: &BundleConfig,
) -> Result<BundleOutput, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let orchestrator = Orchestrator::from_config(config)?;
    bundle_with(&orchestrator, mode, urls, config).await
}

/// Run a whole batch on an existing orchestrator and serialise the result.
///
/// The HTTP server keeps one orchestrator (and so one connection pool) for
/// its lifetime and calls this per request.
pub async fn bundle_with<I, S>(
    orchestrator: &Orchestrator,
    mode: BundleMode,
    urls: I,
    config: &BundleConfig,
) -> Result<BundleOutput, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let start = Instant::now();
    let (bytes, summary) = match mode {
        BundleMode::Pdf => {
            let batch = collect_pages(orchestrator, urls, config).await?;
            let summary = batch.summary;
            (batch.into_pdf(config.pdfium_library_path.clone()).await?, summary)
        }
        BundleMode::Zip => {
            let batch = collect_entries(orchestrator, urls, config).await?;
            let summary = batch.summary;
            (batch.into_zip(config.compression_level).await?, summary)
        }
    };

    Ok(BundleOutput {
        mode,
        bytes,
        summary,
        total_duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Run the document pipeline up to, but not including, serialisation.
pub async fn collect_pages<I, S>(
    orchestrator: &Orchestrator,
    urls: I,
    config: &BundleConfig,
) -> Result<DocumentBatch, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let requests = ImageRequest::from_urls(urls);
    orchestrator
        .collect_pages(&requests, config.document_max_attempts)
        .await
}

/// Run the archive pipeline up to, but not including, serialisation.
pub async fn collect_entries<I, S>(
    orchestrator: &Orchestrator,
    urls: I,
    config: &BundleConfig,
) -> Result<ArchiveBatch, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let requests = ImageRequest::from_urls(urls);
    orchestrator
        .collect_entries(&requests, config.archive_max_attempts)
        .await
}

/// Bundle and write the artifact to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn bundle_to_file<I, S>(
    mode: BundleMode,
    urls: I,
    output_path: impl AsRef<Path>,
    config: &BundleConfig,
) -> Result<BundleOutput, BundleError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let output = bundle(mode, urls, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| BundleError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("part");
    tokio::fs::write(&tmp_path, &output.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!(
        "Wrote {} ({} bytes, {} images)",
        path.display(),
        output.bytes.len(),
        output.summary.successful
    );
    Ok(output)
}

/// Synchronous wrapper around [`bundle`].
///
/// Creates a temporary tokio runtime internally.
pub fn bundle_sync(
    mode: BundleMode,
    urls: Vec<String>,
    config: &BundleConfig,
) -> Result<BundleOutput, BundleError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BundleError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(bundle(mode, urls, config))
}
