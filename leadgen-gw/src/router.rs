//! Ordered router dispatch
//!
//! Each upstream adapter implements [`ApiRouter`]: a fixed table of paths it
//! owns plus an async handler. The [`Dispatcher`] walks its routers in
//! registration order and the first one whose table contains the path
//! handles the request. Registration order is therefore significant: if two
//! routers ever claimed the same path, the earlier one would win.

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};

/// Inbound request as seen by a router
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    /// Build a POST request carrying a JSON body
    pub fn post_json(path: impl Into<String>, body: &Value) -> Self {
        Self::new(
            Method::POST,
            path,
            HeaderMap::new(),
            Bytes::from(body.to_string()),
        )
    }

    /// Parse the body as a JSON value; an empty body is an empty object
    pub fn json_value(&self) -> ApiResult<Value> {
        if self.body.is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
    }

    /// Check `fields` are present, then deserialize the body
    ///
    /// A field counts as missing when absent, `null`, or an empty string.
    pub fn json_with<T: DeserializeOwned>(&self, fields: &[&str]) -> ApiResult<T> {
        let value = self.json_value()?;
        require_fields(&value, fields)?;
        serde_json::from_value(value)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw `Authorization` header value
    pub fn authorization(&self) -> Option<&str> {
        self.header(header::AUTHORIZATION.as_str())
    }

    /// Token from an `Authorization: Bearer <token>` header
    pub fn bearer_token(&self) -> ApiResult<&str> {
        self.authorization()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing or invalid authorization token".to_string()))
    }
}

/// Fail with a 400 naming every missing field
pub fn require_fields(body: &Value, fields: &[&str]) -> ApiResult<()> {
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| match body.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )))
    }
}

/// One upstream adapter's slice of the HTTP surface
#[async_trait]
pub trait ApiRouter: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Exact paths this router owns
    fn routes(&self) -> &'static [&'static str];

    fn matches(&self, path: &str) -> bool {
        self.routes().iter().any(|route| *route == path)
    }

    /// Handle a request whose path is in [`routes`](Self::routes)
    ///
    /// `Ok` bodies are returned as-is with status 200.
    async fn handle(&self, request: ApiRequest) -> ApiResult<Value>;
}

/// Fixed, ordered list of routers
#[derive(Clone)]
pub struct Dispatcher {
    routers: Vec<Arc<dyn ApiRouter>>,
}

impl Dispatcher {
    pub fn new(routers: Vec<Arc<dyn ApiRouter>>) -> Self {
        Self { routers }
    }

    /// Every registered path, in dispatch order
    pub fn registered_paths(&self) -> Vec<&'static str> {
        self.routers
            .iter()
            .flat_map(|r| r.routes().iter().copied())
            .collect()
    }

    /// Route to the first matching router
    ///
    /// Returns `None` when no router owns the path.
    pub async fn dispatch(&self, request: ApiRequest) -> Option<Response> {
        let router = self.routers.iter().find(|r| r.matches(&request.path))?;

        info!(path = %request.path, router = router.name(), "Dispatching request");

        let response = match router.handle(request).await {
            Ok(body) => Json(body).into_response(),
            Err(err) => err.into_response(),
        };
        Some(response)
    }

    /// Dispatch, turning an unmatched path into a 404 envelope
    pub async fn dispatch_or_not_found(&self, request: ApiRequest) -> Response {
        let path = request.path.clone();
        match self.dispatch(request).await {
            Some(response) => response,
            None => {
                info!(path = %path, "No handler found");
                debug!(available = ?self.registered_paths(), "Registered paths");
                ApiError::not_found("API endpoint not found").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use serde_json::json;

    struct Fixed {
        name: &'static str,
        routes: &'static [&'static str],
    }

    #[async_trait]
    impl ApiRouter for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        fn routes(&self) -> &'static [&'static str] {
            self.routes
        }

        async fn handle(&self, _request: ApiRequest) -> ApiResult<Value> {
            Ok(json!({ "router": self.name }))
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_first_registered_router_wins() {
        let dispatcher = Dispatcher::new(vec![
            Arc::new(Fixed {
                name: "first",
                routes: &["/api/shared", "/api/first"],
            }),
            Arc::new(Fixed {
                name: "second",
                routes: &["/api/shared", "/api/second"],
            }),
        ]);

        let response = dispatcher
            .dispatch(ApiRequest::post_json("/api/shared", &json!({})))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["router"], "first");

        let response = dispatcher
            .dispatch(ApiRequest::post_json("/api/second", &json!({})))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["router"], "second");
    }

    #[tokio::test]
    async fn test_unmatched_path_is_none_then_404() {
        let dispatcher = Dispatcher::new(vec![Arc::new(Fixed {
            name: "only",
            routes: &["/api/only"],
        })]);

        assert!(dispatcher
            .dispatch(ApiRequest::post_json("/api/missing", &json!({})))
            .await
            .is_none());

        let response = dispatcher
            .dispatch_or_not_found(ApiRequest::post_json("/api/missing", &json!({})))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "API endpoint not found"
        );
    }

    #[test]
    fn test_require_fields_names_all_missing() {
        let body = json!({ "target": "https://example.com", "language_code": "", "limit": null });
        let err = require_fields(&body, &["target", "location_code", "language_code", "limit"])
            .unwrap_err();
        assert_eq!(
            err.message(),
            "Missing required parameters: location_code, language_code, limit"
        );
    }

    #[test]
    fn test_invalid_json_is_bad_request() {
        let request = ApiRequest::new(
            Method::POST,
            "/api/x",
            HeaderMap::new(),
            Bytes::from_static(b"{not json"),
        );
        assert!(matches!(request.json_value(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_bearer_token() {
        let mut request = ApiRequest::post_json("/api/x", &json!({}));
        assert!(matches!(request.bearer_token(), Err(ApiError::Unauthorized(_))));

        request
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(request.bearer_token().is_err());

        request
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(request.bearer_token().unwrap(), "tok-1");
    }
}
