//! CORS headers and preflight handling
//!
//! The browser front-end is served from another origin, so every response
//! (errors included) carries the same fixed header set and `OPTIONS`
//! preflights are answered with an empty 200 without reaching any router.

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use std::time::Duration;
use tower_http::{cors::{Any, CorsLayer}, set_header::SetResponseHeaderLayer};

pub const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, Origin";
pub const MAX_AGE_SECS: u64 = 86400;

/// Wrap `router` with the CORS layers
///
/// `CorsLayer` short-circuits preflights and sets the origin; the
/// set-header layers pin methods, headers and max-age on every response in
/// the exact form clients expect.
pub fn with_cors(router: Router) -> Router {
    let preflight = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ORIGIN])
        .max_age(Duration::from_secs(MAX_AGE_SECS));

    router
        .layer(preflight)
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(MAX_AGE_SECS),
        ))
}
