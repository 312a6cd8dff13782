//! # manga-bundler
//!
//! Turn a list of remotely hosted image URLs into one download: a PDF with
//! one page per image, or a ZIP of the raw files.
//!
//! ## Why this crate?
//!
//! Batches of scanned pages live on hosts that throttle, hiccup and serve
//! the odd WebP. A single bad image must not cost the user the whole
//! chapter, so failures are folded into the artifact instead of aborting
//! it: a placeholder page in the PDF, a missing entry in the ZIP. The batch
//! fails only when not a single image could be used.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [url, url, url, …]
//!  │
//!  ├─ 1. Fetch     browser-like GET with per-image retry
//!  ├─ 2. Classify  PNG / JPEG / WebP / unknown by magic bytes
//!  ├─ 3. Build     document: one page per image, in order
//!  │               archive:  all downloads at once, image_NNN.jpg entries
//!  ├─ 4. Write     pdfium / DEFLATE (CPU-bound, spawn_blocking)
//!  └─ 5. Respond   payload + X-Images-Successful / X-Images-Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use manga_bundler::{bundle_zip, BundleConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BundleConfig::default();
//!     let output = bundle_zip(
//!         ["https://example.com/001.jpg", "https://example.com/002.jpg"],
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} stored, {} failed",
//!         output.summary.successful,
//!         output.summary.failed);
//!     std::fs::write("chapter.zip", &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `manga-bundler` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! manga-bundler = { version = "0.1", default-features = false }
//! ```
//!
//! ## Modes
//!
//! | Mode | Concurrency | Attempts | WebP | Failure |
//! |------|-------------|----------|------|---------|
//! | PDF  | one at a time | 3, 1 s apart | notice page | placeholder page |
//! | ZIP  | all at once | 1 | stored as-is | entry omitted |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bundle;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod response;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bundle::{bundle, bundle_pdf, bundle_sync, bundle_to_file, bundle_with, bundle_zip};
pub use config::{BundleConfig, BundleConfigBuilder};
pub use error::{BundleError, ImageError};
pub use orchestrator::{ArchiveBatch, ConcurrencyPolicy, DocumentBatch, Orchestrator};
pub use output::{BatchSummary, BundleMode, BundleOutput, EntryResult, ImageRequest, PageKind, PageResult};
pub use pipeline::fetch::{Backoff, FetchedImage, FixedBackoff, ImageFetcher};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use server::{router, serve, AppState, ServerConfig};
