//! Per-image pipeline stages.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested without the others (the classifier needs no network, the
//! renderers need no pdfium).
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ classify ──▶ embed ──▶ page ──▶ pdf       (document mode)
//!   │
//!   └─────────────────────────────▶ entry ──▶ archive  (archive mode)
//! ```
//!
//! 1. [`fetch`]    : GET with browser headers; retry/backoff lives here
//! 2. [`classify`] : magic bytes → PNG / JPEG / WEBP / UNKNOWN
//! 3. [`embed`]    : decode with the detected decoder, fall back to the other
//! 4. [`page`]     : one page per image (embedded, placeholder or WebP notice)
//! 5. [`pdf`]      : pdfium serialisation on the blocking pool
//! 6. [`entry`]    : raw bytes under `image_NNN.jpg`, or nothing
//! 7. [`archive`]  : DEFLATE ZIP serialisation

pub mod archive;
pub mod classify;
pub mod embed;
pub mod entry;
pub mod fetch;
pub mod page;
pub mod pdf;
