//! Archive-mode entries: the raw downloaded bytes, or nothing.

use crate::output::{EntryResult, ImageRequest};
use crate::pipeline::fetch::FetchOutcome;
use tracing::warn;

/// Archive path for the image at 0-based `index`.
///
/// Always `.jpg`, whatever the bytes are. Readers sniff the content anyway,
/// and the name only has to sort in input order.
pub fn entry_name(index: usize) -> String {
    format!("image_{:03}.jpg", index + 1)
}

/// Turn a terminal fetch outcome into an archive entry (or its absence).
pub fn render_entry(request: &ImageRequest, outcome: FetchOutcome) -> EntryResult {
    match outcome.into_result() {
        Ok(bytes) => EntryResult {
            index: request.index,
            name: entry_name(request.index),
            bytes: Some(bytes),
            error: None,
        },
        Err(e) => {
            warn!("Failed to download image {}: {}", request.number(), e);
            EntryResult {
                index: request.index,
                name: entry_name(request.index),
                bytes: None,
                error: Some(e),
            }
        }
    }
}
