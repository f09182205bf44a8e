//! Fallback handler feeding the router table

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::router::ApiRequest;
use crate::AppState;

/// Any path not claimed by a static route
///
/// `/api/*` paths are dispatched to the first router that owns them; anything
/// else is a plain 404 since static assets are served elsewhere.
pub async fn api_fallback(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    if !path.starts_with("/api/") {
        return ApiError::not_found("Not Found").into_response();
    }

    let request = ApiRequest::new(method, path, headers, body);
    state.dispatcher.dispatch_or_not_found(request).await
}
