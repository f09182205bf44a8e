//! Uniform error envelope
//!
//! Every error that reaches a client is rendered as:
//!
//! ```json
//! { "error": { "message": "...", "details": "..." | null, "timestamp": "2024-01-01T00:00:00.000Z" } }
//! ```
//!
//! Success responses carry the (possibly normalised) upstream payload
//! directly, so there is no success wrapper type.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Top-level error wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

/// Error payload inside the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub message: String,
    /// Additional context; serialized as `null` when absent
    pub details: Option<String>,
    /// ISO 8601 UTC timestamp of when the error was produced
    pub timestamp: String,
}

impl ErrorEnvelope {
    /// Create an envelope stamped with the current time
    pub fn new(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                details,
                timestamp: iso_timestamp(),
            },
        }
    }
}

/// Current UTC time in the `2024-01-01T00:00:00.000Z` form
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
