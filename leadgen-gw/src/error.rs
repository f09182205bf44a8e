//! Error types for leadgen-gw
//!
//! Every failure on the request path ends up as an [`ApiError`], which renders
//! the uniform envelope `{error: {message, details, timestamp}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use leadgen_common::ErrorEnvelope;
use thiserror::Error;
use tracing::warn;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or malformed bearer token (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Upstream account needs activation or credits (402)
    #[error("{message}")]
    PaymentRequired {
        message: String,
        details: Option<String>,
    },

    /// Upstream refused access to the resource (403)
    #[error("{message}")]
    Forbidden {
        message: String,
        details: Option<String>,
    },

    /// Unknown route, or upstream could not find the resource (404)
    #[error("{message}")]
    NotFound {
        message: String,
        details: Option<String>,
    },

    /// Upstream rate limit hit (429)
    #[error("{0}")]
    RateLimited(String),

    /// Any other upstream non-2xx (502)
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },

    /// Upstream answered 2xx with a payload we could not understand (502)
    #[error("{message}")]
    Parse {
        message: String,
        details: Option<String>,
    },

    /// Transport failure on the outbound call (502)
    #[error("{0}")]
    Network(String),

    /// Status probe failed or is not configured (503)
    #[error("{0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// leadgen-common error
    #[error(transparent)]
    Common(#[from] leadgen_common::Error),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound {
            message: message.into(),
            details: None,
        }
    }

    pub fn parse(context: &str, err: impl std::fmt::Display) -> Self {
        ApiError::Parse {
            message: format!("{}: {}", context, err),
            details: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        use leadgen_common::Error as Common;

        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { .. } | ApiError::Parse { .. } | ApiError::Network(_) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(Common::InvalidInput(_) | Common::NotFound(_) | Common::Json(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client, without variant prefixes
    pub fn message(&self) -> String {
        use leadgen_common::Error as Common;

        match self {
            ApiError::Common(Common::InvalidInput(msg) | Common::NotFound(msg)) => msg.clone(),
            other => other.to_string(),
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            ApiError::PaymentRequired { details, .. }
            | ApiError::Forbidden { details, .. }
            | ApiError::NotFound { details, .. }
            | ApiError::Upstream { details, .. }
            | ApiError::Parse { details, .. } => details.clone(),
            _ => None,
        }
    }

    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.message(), self.details())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::parse("Failed to decode upstream response", err)
        } else {
            ApiError::Network(format!("Upstream request failed: {}", err))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = self.to_envelope();

        warn!(
            status = status.as_u16(),
            message = %envelope.error.message,
            "Request failed"
        );

        (status, Json(envelope)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
