//! Image download with retry.
//!
//! The network call sits behind the [`ImageFetcher`] trait and the wait
//! between attempts behind the [`Backoff`] trait, so the retry loop in
//! [`fetch_with_retry`] can be driven by scripted fetchers and a zero delay
//! in tests.
//!
//! ## Retry Strategy
//!
//! Image CDNs fail in bursts (hot-link protection warming up, 503 under load).
//! The document pipeline therefore retries up to three times with a fixed
//! 1 s pause. There is no exponential growth: the batch runs one image at a
//! time, so there is no herd to spread out. The archive pipeline makes a
//! single attempt per image.

use crate::error::{BundleError, ImageError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Url;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Browser user agent sent by default; several image hosts reject obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const ACCEPT_IMAGES: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

/// Bytes of one successful HTTP attempt.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub status: u16,
}

/// Performs a single GET for an image. Implementations must not retry.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch_once(&self, url: &Url) -> Result<FetchedImage, ImageError>;
}

/// Delay to wait after a failed attempt before the next one.
///
/// `attempt` is the 1-based number of the attempt that just failed.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same pause after every failure.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff(pub Duration);

impl FixedBackoff {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }
}

impl Backoff for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Terminal result of fetching one URL, after all attempts.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub bytes: Option<Bytes>,
    pub http_status: Option<u16>,
    /// Attempts actually sent. `0` when the URL was rejected before any I/O.
    pub attempts: u32,
    pub error: Option<ImageError>,
}

impl FetchOutcome {
    fn fetched(attempts: u32, image: FetchedImage) -> Self {
        Self {
            bytes: Some(image.bytes),
            http_status: Some(image.status),
            attempts,
            error: None,
        }
    }

    fn failed(attempts: u32, error: ImageError) -> Self {
        Self {
            bytes: None,
            http_status: error.http_status(),
            attempts,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.bytes.is_some()
    }

    /// Collapse into the bytes or the last error.
    pub fn into_result(self) -> Result<Bytes, ImageError> {
        match (self.bytes, self.error) {
            (Some(bytes), _) => Ok(bytes),
            (None, Some(err)) => Err(err),
            (None, None) => Err(ImageError::Transport {
                detail: "no response".to_string(),
            }),
        }
    }
}

/// Parse a user-supplied image URL. Only absolute http(s) URLs pass.
pub fn parse_image_url(raw: &str) -> Result<Url, ImageError> {
    let url = Url::parse(raw).map_err(|e| ImageError::InvalidUrl {
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ImageError::InvalidUrl {
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Fetch `raw_url`, making at most `max_attempts` attempts.
///
/// Malformed URLs fail immediately without touching the network. Every
/// other failure (non-2xx status, transport error) is retried while
/// attempts remain, waiting `backoff.delay(attempt)` in between.
pub async fn fetch_with_retry(
    fetcher: &dyn ImageFetcher,
    raw_url: &str,
    max_attempts: u32,
    backoff: &dyn Backoff,
) -> FetchOutcome {
    let url = match parse_image_url(raw_url) {
        Ok(url) => url,
        Err(e) => {
            warn!("Rejecting '{}': {}", raw_url, e);
            return FetchOutcome::failed(0, e);
        }
    };

    let max_attempts = max_attempts.max(1);
    let mut last_err: Option<ImageError> = None;

    for attempt in 1..=max_attempts {
        match fetcher.fetch_once(&url).await {
            Ok(image) => {
                debug!(
                    "{}: {} bytes on attempt {}/{}",
                    url,
                    image.bytes.len(),
                    attempt,
                    max_attempts
                );
                return FetchOutcome::fetched(attempt, image);
            }
            Err(e) => {
                warn!("{}: attempt {}/{} failed: {}", url, attempt, max_attempts, e);
                last_err = Some(e);
            }
        }

        if attempt < max_attempts {
            let delay = backoff.delay(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }

    let err = last_err.unwrap_or_else(|| ImageError::Transport {
        detail: "no attempt was made".to_string(),
    });
    FetchOutcome::failed(max_attempts, err)
}

// ── reqwest implementation ───────────────────────────────────────────────

/// Client-level settings for [`ReqwestFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Whole-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }
}

/// [`ImageFetcher`] backed by a shared `reqwest::Client`.
///
/// Redirects are followed with reqwest's default policy (up to 10 hops).
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, BundleError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(browser_headers());
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BundleError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_IMAGES));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// Referer the image host expects: the image URL's own origin.
pub fn referer_for(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[async_trait]
impl ImageFetcher for ReqwestFetcher {
    async fn fetch_once(&self, url: &Url) -> Result<FetchedImage, ImageError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::REFERER, referer_for(url))
            .send()
            .await
            .map_err(|e| ImageError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ImageError::Transport {
            detail: e.to_string(),
        })?;

        Ok(FetchedImage {
            bytes,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of attempt results.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<FetchedImage, ImageError>>>,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<FetchedImage, ImageError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageFetcher for ScriptedFetcher {
        async fn fetch_once(&self, _url: &Url) -> Result<FetchedImage, ImageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ImageError::HttpStatus { status: 500 }))
        }
    }

    fn ok(body: &'static [u8]) -> Result<FetchedImage, ImageError> {
        Ok(FetchedImage {
            bytes: Bytes::from_static(body),
            status: 200,
        })
    }

    fn no_wait() -> FixedBackoff {
        FixedBackoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn third_attempt_success_is_a_success() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(ImageError::HttpStatus { status: 503 }),
            Err(ImageError::Transport {
                detail: "connection reset".into(),
            }),
            ok(b"img"),
        ]);
        let delays = Mutex::new(Vec::new());
        let backoff = |attempt: u32| {
            delays.lock().unwrap().push(attempt);
            Duration::ZERO
        };

        let outcome = fetch_with_retry(&fetcher, "https://x/a.png", 3, &backoff).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.http_status, Some(200));
        assert_eq!(*delays.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn exhausted_attempts_keep_last_error() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(ImageError::HttpStatus { status: 500 }),
            Err(ImageError::HttpStatus { status: 502 }),
            Err(ImageError::HttpStatus { status: 404 }),
        ]);

        let outcome = fetch_with_retry(&fetcher, "https://x/c.jpg", 3, &no_wait()).await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.http_status, Some(404));
        assert_eq!(outcome.error, Some(ImageError::HttpStatus { status: 404 }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_attempt_never_waits() {
        let fetcher = ScriptedFetcher::new(vec![Err(ImageError::HttpStatus { status: 500 })]);
        let backoff = |_: u32| -> Duration { panic!("no delay expected with one attempt") };

        let outcome = fetch_with_retry(&fetcher, "https://x/a.png", 1, &backoff).await;

        assert!(!outcome.is_success());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_url_fails_fast_without_network() {
        let fetcher = ScriptedFetcher::new(vec![ok(b"never")]);

        for raw in ["not a url", "/relative/path.png", "ftp://x/a.png", ""] {
            let outcome = fetch_with_retry(&fetcher, raw, 3, &no_wait()).await;
            assert_eq!(outcome.attempts, 0, "{raw}");
            assert!(matches!(outcome.error, Some(ImageError::InvalidUrl { .. })), "{raw}");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn referer_is_origin_only() {
        let url = Url::parse("https://cdn.example.com:8443/ch/1/p01.jpg?x=1").unwrap();
        assert_eq!(referer_for(&url), "https://cdn.example.com:8443");
    }

    #[test]
    fn into_result_prefers_bytes() {
        let outcome = FetchOutcome::fetched(
            1,
            FetchedImage {
                bytes: Bytes::from_static(b"x"),
                status: 200,
            },
        );
        assert_eq!(outcome.into_result().unwrap(), Bytes::from_static(b"x"));
    }
}
