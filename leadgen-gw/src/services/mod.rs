//! Upstream adapters
//!
//! One module per proxied service. Each adapter owns a route table, checks
//! its secrets at construction, issues exactly one outbound call per inbound
//! request (diagnostic fan-outs excepted) and funnels every upstream failure
//! through [`Upstream::error_for`] so clients always see the same envelope.

pub mod keywords;
pub mod llm;
pub mod reader;
pub mod search_console;
pub mod sheets;

pub use keywords::KeywordsRouter;
pub use llm::LlmRouter;
pub use reader::ReaderRouter;
pub use search_console::SearchConsoleRouter;
pub use sheets::{GoogleSheetsStore, SheetsRouter};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

const USER_AGENT: &str = concat!("leadgen-gw/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Characters `encodeURIComponent` leaves as they are
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// HTTP client shared by every adapter
pub fn build_http_client() -> leadgen_common::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| leadgen_common::Error::Internal(format!("HTTP client init failed: {}", e)))
}

/// How a proxied service names itself in client-facing errors
#[derive(Debug, Clone, Copy)]
pub struct Upstream {
    /// Display name, e.g. "Search Console"
    pub name: &'static str,
    /// What a 404 failed to find, e.g. "URL"
    pub subject: &'static str,
    /// Steps the end user can take to get access after a 403
    pub access_help: &'static str,
}

impl Upstream {
    /// Map a non-2xx upstream response to the uniform error
    ///
    /// - 429 → retry later
    /// - 402 → account activation / credits
    /// - 403, or a message mentioning insufficient permissions → long-form
    ///   access instructions
    /// - 404, or a message mentioning "not found" → 404
    /// - anything else → 502 carrying the upstream body as details
    pub fn error_for(&self, status: u16, body: &str) -> ApiError {
        let upstream_message = extract_error_message(body);
        let message = upstream_message
            .clone()
            .unwrap_or_else(|| format!("status {}", status));
        let lowered = message.to_lowercase();

        if status == 429 {
            return ApiError::RateLimited("Rate limit exceeded. Please try again later.".to_string());
        }

        if status == 402 {
            return ApiError::PaymentRequired {
                message: format!(
                    "{} API account needs activation or has insufficient credits",
                    self.name
                ),
                details: non_empty(body),
            };
        }

        // matches both "insufficient permissions" and "does not have sufficient permissions"
        if status == 403 || lowered.contains("sufficient permissions") {
            return ApiError::Forbidden {
                message: self.permission_message(&message),
                details: Some(format!(
                    "Please verify you have access to this {} in {}",
                    self.subject, self.name
                )),
            };
        }

        if status == 404 || lowered.contains("not found") {
            return ApiError::NotFound {
                message: format!("{} API error: {}", self.name, message),
                details: Some(format!(
                    "The requested {} was not found in {}",
                    self.subject, self.name
                )),
            };
        }

        let message = match upstream_message {
            Some(msg) => format!("{} API error: {} - {}", self.name, status, msg),
            None => format!("{} API error: {}", self.name, status),
        };
        ApiError::Upstream {
            message,
            details: non_empty(body),
        }
    }

    /// Long-form instructions shown when the upstream refuses access
    pub fn permission_message(&self, upstream_message: &str) -> String {
        format!(
            "{} API error: {}. Your account does not have sufficient permissions for this resource. {}",
            self.name, upstream_message, self.access_help
        )
    }

    /// Pass 2xx responses through, map everything else
    pub async fn check(&self, response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            upstream = self.name,
            status = status.as_u16(),
            "Upstream returned an error"
        );
        debug!(upstream = self.name, body = %body, "Upstream error body");
        Err(self.error_for(status.as_u16(), &body))
    }

    /// Check status, then parse the body as JSON
    pub async fn json(&self, response: reqwest::Response) -> ApiResult<Value> {
        let response = self.check(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::parse(&format!("Invalid {} API response", self.name), e))
    }
}

/// Pull a human message out of a JSON error body
///
/// Understands `{"error": {"message": ".."}}`, `{"error": ".."}` and
/// `{"message": ".."}`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = value
        .pointer("/error/message")
        .or_else(|| value.get("error").filter(|v| v.is_string()))
        .or_else(|| value.get("message"))?;
    candidate.as_str().map(str::to_string)
}

/// Percent-encode a value for use as one path segment
///
/// Used where a whole value (a site property, a target URL) has to travel as
/// a single segment. Same character set as `encodeURIComponent`.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn non_empty(body: &str) -> Option<String> {
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const TEST: Upstream = Upstream {
        name: "Test",
        subject: "resource",
        access_help: "Ask the owner to share it with you.",
    };

    #[test]
    fn test_rate_limit() {
        let err = TEST.error_for(429, "");
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(err.message().contains("try again later"));
    }

    #[test]
    fn test_payment_required() {
        let err = TEST.error_for(402, "{}");
        assert_eq!(err.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            err.message(),
            "Test API account needs activation or has insufficient credits"
        );
    }

    #[test]
    fn test_permission_phrase_on_non_403() {
        let body = r#"{"error": {"message": "User does not have sufficient permissions for site"}}"#;
        let err = TEST.error_for(400, body);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.message().contains("permissions"));
        assert!(err.message().contains("Ask the owner"));
    }

    #[test]
    fn test_forbidden_detail_names_subject() {
        let err = TEST.error_for(403, "{}");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            err.details().as_deref(),
            Some("Please verify you have access to this resource in Test")
        );
    }

    #[test]
    fn test_not_found_detail() {
        let err = TEST.error_for(404, r#"{"error": "gone"}"#);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.details().as_deref(),
            Some("The requested resource was not found in Test")
        );
    }

    #[test]
    fn test_other_errors_are_bad_gateway_with_body() {
        let err = TEST.error_for(500, "boom");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.message(), "Test API error: 500");
        assert_eq!(err.details().as_deref(), Some("boom"));
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"a"}}"#).as_deref(),
            Some("a")
        );
        assert_eq!(extract_error_message(r#"{"error":"b"}"#).as_deref(), Some("b"));
        assert_eq!(extract_error_message(r#"{"message":"c"}"#).as_deref(), Some("c"));
        assert_eq!(extract_error_message("plain text"), None);
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("sc-domain:example.com"), "sc-domain%3Aexample.com");
        assert_eq!(
            encode_component("https://example.com/a b"),
            "https%3A%2F%2Fexample.com%2Fa%20b"
        );
        assert_eq!(encode_component("it's (new)!*~"), "it's%20(new)!*~");
        assert_eq!(encode_component("café/?q=1&x"), "caf%C3%A9%2F%3Fq%3D1%26x");
    }
}
