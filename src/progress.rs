//! Progress-callback trait for per-image batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BundleConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the URL list. The CLI uses it to
//! drive a progress bar; the HTTP server leaves it unset.
//!
//! In archive mode images run concurrently, so `on_image_*` methods may be
//! called from several tasks at once. Protect shared state accordingly.

use std::sync::Arc;

/// Called by the orchestrator as it processes each image.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any image is fetched.
    fn on_batch_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before the first fetch attempt for an image.
    ///
    /// `image_num` is 1-based.
    fn on_image_start(&self, image_num: usize, total_images: usize) {
        let _ = (image_num, total_images);
    }

    /// Called when an image was embedded or stored.
    fn on_image_complete(&self, image_num: usize, total_images: usize, bytes: usize) {
        let _ = (image_num, total_images, bytes);
    }

    /// Called when an image ended up as a placeholder or was dropped.
    fn on_image_error(&self, image_num: usize, total_images: usize, error: &str) {
        let _ = (image_num, total_images, error);
    }

    /// Called once after every image reached a terminal state.
    fn on_batch_complete(&self, total_images: usize, successful: usize) {
        let _ = (total_images, successful);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BundleConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tally {
        completes: AtomicUsize,
        errors: AtomicUsize,
        successful: AtomicUsize,
    }

    impl BatchProgressCallback for Tally {
        fn on_image_complete(&self, _n: usize, _t: usize, _bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _n: usize, _t: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _t: usize, successful: usize) {
            self.successful.store(successful, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3);
        cb.on_image_start(1, 3);
        cb.on_image_complete(1, 3, 1024);
        cb.on_image_error(2, 3, "HTTP 404");
        cb.on_batch_complete(3, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let tally = Tally::default();
        tally.on_batch_start(2);
        tally.on_image_complete(1, 2, 10);
        tally.on_image_error(2, 2, "HTTP 500");
        tally.on_batch_complete(2, 1);
        assert_eq!(tally.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tally.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tally.successful.load(Ordering::SeqCst), 1);
    }
}
