//! Response composition: payload + counters, or a batch-level error, into
//! status, headers and body.
//!
//! Transport-agnostic: [`crate::server`] converts a
//! [`BundleResponse`] into an axum response, tests inspect it directly.

use crate::error::BundleError;
use crate::output::{BundleMode, BundleOutput};
use serde_json::{json, Value};

pub const HEADER_SUCCESSFUL: &str = "X-Images-Successful";
pub const HEADER_FAILED: &str = "X-Images-Failed";
pub const HEADER_WEBP_SKIPPED: &str = "X-WebP-Skipped";

/// Body of a composed response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Binary(Vec<u8>),
    Json(Value),
}

/// Status, headers and body ready for any transport.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: ResponseBody,
}

impl BundleResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: ResponseBody::Json(body),
        }
    }
}

/// 200 with the artifact and its counters.
pub fn compose_success(output: BundleOutput) -> BundleResponse {
    let summary = output.summary;
    let mut headers = vec![
        ("Content-Type", output.mode.content_type().to_string()),
        (
            "Content-Disposition",
            format!(
                "attachment; filename=\"{}\"",
                output.mode.filename(summary.successful)
            ),
        ),
        (HEADER_SUCCESSFUL, summary.successful.to_string()),
        (HEADER_FAILED, summary.failed.to_string()),
    ];
    if output.mode == BundleMode::Pdf {
        headers.push((HEADER_WEBP_SKIPPED, summary.webp_skipped.to_string()));
    }

    BundleResponse {
        status: 200,
        headers,
        body: ResponseBody::Binary(output.bytes),
    }
}

/// JSON error response for a batch-level failure.
pub fn compose_error(err: &BundleError, mode: BundleMode) -> BundleResponse {
    let status = err.status_code();
    let body = match err {
        BundleError::Validation(msg) => json!({ "error": msg }),
        BundleError::MethodNotAllowed => json!({ "error": err.to_string() }),
        BundleError::AllImagesFailed {
            total,
            failed,
            webp_skipped,
        } => {
            let headline = match mode {
                BundleMode::Pdf => "No images could be processed",
                BundleMode::Zip => "No images could be downloaded",
            };
            let mut body = json!({
                "error": headline,
                "details": format!("{failed} of {total} failed"),
            });
            if let (BundleMode::Pdf, Some(webp)) = (mode, webp_skipped) {
                body["webpImages"] = json!(webp);
            }
            body
        }
        other => json!({ "error": "Server error", "message": other.to_string() }),
    };
    BundleResponse::json(status, body)
}

/// Compose whatever a bundling run produced.
pub fn compose(result: Result<BundleOutput, BundleError>, mode: BundleMode) -> BundleResponse {
    match result {
        Ok(output) => compose_success(output),
        Err(e) => compose_error(&e, mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BatchSummary;

    fn output(mode: BundleMode, successful: usize, failed: usize, webp: usize) -> BundleOutput {
        BundleOutput {
            mode,
            bytes: b"payload".to_vec(),
            summary: BatchSummary {
                successful,
                failed,
                webp_skipped: webp,
            },
            total_duration_ms: 5,
        }
    }

    #[test]
    fn pdf_success_headers() {
        let r = compose_success(output(BundleMode::Pdf, 1, 2, 1));
        assert_eq!(r.status, 200);
        assert_eq!(r.header("content-type"), Some("application/pdf"));
        assert_eq!(
            r.header("Content-Disposition"),
            Some("attachment; filename=\"manga_1_pages.pdf\"")
        );
        assert_eq!(r.header(HEADER_SUCCESSFUL), Some("1"));
        assert_eq!(r.header(HEADER_FAILED), Some("2"));
        assert_eq!(r.header(HEADER_WEBP_SKIPPED), Some("1"));
        assert_eq!(r.body, ResponseBody::Binary(b"payload".to_vec()));
    }

    #[test]
    fn zip_success_has_no_webp_header() {
        let r = compose_success(output(BundleMode::Zip, 7, 0, 0));
        assert_eq!(r.header("Content-Type"), Some("application/zip"));
        assert_eq!(
            r.header("Content-Disposition"),
            Some("attachment; filename=\"manga_7_images.zip\"")
        );
        assert_eq!(r.header(HEADER_WEBP_SKIPPED), None);
    }

    #[test]
    fn all_failed_is_json_500_without_binary() {
        let err = BundleError::AllImagesFailed {
            total: 3,
            failed: 3,
            webp_skipped: Some(1),
        };
        let r = compose_error(&err, BundleMode::Pdf);
        assert_eq!(r.status, 500);
        let ResponseBody::Json(body) = &r.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["details"], "3 of 3 failed");
        assert_eq!(body["webpImages"], 1);

        let r = compose_error(
            &BundleError::AllImagesFailed {
                total: 2,
                failed: 2,
                webp_skipped: None,
            },
            BundleMode::Zip,
        );
        let ResponseBody::Json(body) = &r.body else {
            panic!("expected JSON body");
        };
        assert!(body.get("webpImages").is_none());
    }

    #[test]
    fn request_errors() {
        let r = compose_error(&BundleError::Validation("URLs array required".into()), BundleMode::Zip);
        assert_eq!(r.status, 400);
        assert_eq!(r.body, ResponseBody::Json(json!({ "error": "URLs array required" })));

        let r = compose_error(&BundleError::MethodNotAllowed, BundleMode::Pdf);
        assert_eq!(r.status, 405);
        assert_eq!(r.body, ResponseBody::Json(json!({ "error": "Method not allowed" })));
    }

    #[test]
    fn unexpected_errors_pass_message_through() {
        let r = compose_error(&BundleError::Internal("disk on fire".into()), BundleMode::Pdf);
        assert_eq!(r.status, 500);
        let ResponseBody::Json(body) = &r.body else {
            panic!("expected JSON body");
        };
        assert_eq!(body["error"], "Server error");
        assert!(body["message"].as_str().unwrap().contains("disk on fire"));
    }
}
