//! Configuration for bundling runs.
//!
//! All pipeline behaviour is controlled through [`BundleConfig`], built via
//! [`BundleConfigBuilder`]. One struct holds every setting, so the same
//! config can be shared by the HTTP server and the CLI and logged as a whole.

use crate::error::BundleError;
use crate::pipeline::archive::DEFAULT_COMPRESSION_LEVEL;
use crate::pipeline::fetch::{Backoff, ImageFetcher, DEFAULT_USER_AGENT};
use crate::progress::BatchProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a bundling run.
///
/// # Example
/// ```rust
/// use manga_bundler::BundleConfig;
///
/// let config = BundleConfig::builder()
///     .document_max_attempts(5)
///     .retry_delay_ms(250)
///     .build()
///     .unwrap();
/// assert_eq!(config.archive_max_attempts, 1);
/// ```
#[derive(Clone)]
pub struct BundleConfig {
    /// Fetch attempts per image in document mode. Default: 3.
    pub document_max_attempts: u32,

    /// Fetch attempts per image in archive mode. Default: 1.
    pub archive_max_attempts: u32,

    /// Fixed pause between attempts in milliseconds. Default: 1000.
    ///
    /// Ignored when [`BundleConfig::backoff`] is set.
    pub retry_delay_ms: u64,

    /// User-Agent header sent with every image request.
    pub user_agent: String,

    /// Whole-request timeout per image in seconds. Default: none.
    pub request_timeout_secs: Option<u64>,

    /// DEFLATE level for archives, 0–9. Default: 6.
    pub compression_level: u8,

    /// Path to the pdfium shared library. `None` uses the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Pre-constructed fetcher. Takes precedence over the reqwest default.
    pub fetcher: Option<Arc<dyn ImageFetcher>>,

    /// Custom delay strategy. Takes precedence over `retry_delay_ms`.
    pub backoff: Option<Arc<dyn Backoff>>,

    /// Per-image progress events.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            document_max_attempts: 3,
            archive_max_attempts: 1,
            retry_delay_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: None,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            pdfium_library_path: None,
            fetcher: None,
            backoff: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BundleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleConfig")
            .field("document_max_attempts", &self.document_max_attempts)
            .field("archive_max_attempts", &self.archive_max_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("compression_level", &self.compression_level)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn ImageFetcher>"))
            .field("backoff", &self.backoff.as_ref().map(|_| "<dyn Backoff>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl BundleConfig {
    /// Create a new builder for `BundleConfig`.
    pub fn builder() -> BundleConfigBuilder {
        BundleConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BundleConfig`].
#[derive(Debug)]
pub struct BundleConfigBuilder {
    config: BundleConfig,
}

impl BundleConfigBuilder {
    pub fn document_max_attempts(mut self, n: u32) -> Self {
        self.config.document_max_attempts = n;
        self
    }

    pub fn archive_max_attempts(mut self, n: u32) -> Self {
        self.config.archive_max_attempts = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn compression_level(mut self, level: u8) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.config.backoff = Some(backoff);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BundleConfig, BundleError> {
        let c = &self.config;
        if c.document_max_attempts == 0 || c.archive_max_attempts == 0 {
            return Err(BundleError::InvalidConfig(
                "Attempts per image must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(BundleError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.user_agent.trim().is_empty() {
            return Err(BundleError::InvalidConfig("User agent must not be empty".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_contract() {
        let c = BundleConfig::default();
        assert_eq!(c.document_max_attempts, 3);
        assert_eq!(c.archive_max_attempts, 1);
        assert_eq!(c.retry_delay_ms, 1000);
        assert_eq!(c.compression_level, 6);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = BundleConfig::builder().document_max_attempts(0).build().unwrap_err();
        assert!(err.to_string().contains("Attempts"));
    }

    #[test]
    fn compression_level_is_clamped() {
        let c = BundleConfig::builder().compression_level(42).build().unwrap();
        assert_eq!(c.compression_level, 9);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let c = BundleConfig::default();
        let s = format!("{c:?}");
        assert!(s.contains("document_max_attempts: 3"));
    }
}
