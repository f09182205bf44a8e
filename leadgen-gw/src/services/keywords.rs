//! Keyword research adapter (DataForSEO Labs)
//!
//! `POST /api/keywords` forwards the caller's task to
//! `keywords_for_site/live` and returns the raw payload.
//! `POST /api/keywords/top` does the same call and reduces the result to
//! `{keyword, searchVolume}` pairs, highest volume first, capped at `limit`.

use async_trait::async_trait;
use leadgen_common::config::require_secrets;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::Upstream;
use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::router::{require_fields, ApiRequest, ApiRouter};

pub const DATAFORSEO: Upstream = Upstream {
    name: "DataForSEO",
    subject: "resource",
    access_help: "Check that your DataForSEO plan includes the Labs API, or ask the account owner to enable it.",
};

/// DataForSEO reports success inside the body with this code
const STATUS_OK: i64 = 20000;

const REQUIRED_FIELDS: &[&str] = &["target", "location_code", "language_code", "limit"];

const ROUTES: &[&str] = &["/api/keywords", "/api/keywords/top", "/api/dataforseo/status"];

/// One normalised keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordVolume {
    pub keyword: String,
    pub search_volume: u64,
}

pub struct KeywordsRouter {
    http: Client,
    base_url: String,
    login: String,
    password: String,
}

impl KeywordsRouter {
    pub fn new(config: &GatewayConfig, http: Client) -> leadgen_common::Result<Self> {
        let creds = &config.credentials;
        require_secrets(&[
            ("DATAFORSEO_LOGIN", creds.dataforseo_login.as_deref()),
            ("DATAFORSEO_PASSWORD", creds.dataforseo_password.as_deref()),
        ])?;

        Ok(Self {
            http,
            base_url: config.upstream.dataforseo.clone(),
            login: creds.dataforseo_login.clone().unwrap_or_default(),
            password: creds.dataforseo_password.clone().unwrap_or_default(),
        })
    }

    /// Validate and run one keywords-for-site task
    async fn fetch_keywords(&self, request: &ApiRequest) -> ApiResult<Value> {
        let task: Value = request.json_with(REQUIRED_FIELDS)?;

        info!(target_site = %task["target"], limit = %task["limit"], "Requesting keywords for site");

        let response = self
            .http
            .post(format!(
                "{}/v3/dataforseo_labs/google/keywords_for_site/live",
                self.base_url
            ))
            .basic_auth(&self.login, Some(&self.password))
            .json(&json!([task]))
            .send()
            .await?;

        let result = DATAFORSEO.json(response).await?;

        if result.get("status_code").and_then(Value::as_i64) != Some(STATUS_OK) {
            let status_message = result
                .get("status_message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ApiError::BadRequest(format!(
                "DataForSEO API error: {}",
                status_message
            )));
        }

        Ok(result)
    }

    async fn handle_top(&self, request: &ApiRequest) -> ApiResult<Value> {
        let body = request.json_value()?;
        require_fields(&body, REQUIRED_FIELDS)?;
        let limit = top_limit(&body)?;

        let result = self.fetch_keywords(request).await?;
        let (keywords, total) = top_keywords(&result, limit)?;

        Ok(json!({ "keywords": keywords, "totalItems": total }))
    }

    async fn handle_status(&self) -> ApiResult<Value> {
        self.check_status().await.map_err(|e| {
            warn!(error = %e, "DataForSEO status check failed");
            ApiError::Unavailable(e.to_string())
        })
    }

    async fn check_status(&self) -> ApiResult<Value> {
        let response = self
            .http
            .get(format!("{}/v3/appendix/status", self.base_url))
            .basic_auth(&self.login, Some(&self.password))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Unavailable(format!(
                "DataForSEO API status check failed: {}",
                response.status().as_u16()
            )));
        }

        let result: Value = response.json().await?;
        labs_live_status(&result)
    }
}

/// Interpret `/v3/appendix/status`: the Labs API's `live` endpoint must be ok
fn labs_live_status(result: &Value) -> ApiResult<Value> {
    if result.get("status_code").and_then(Value::as_i64) != Some(STATUS_OK) {
        let message = result
            .get("status_message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ApiError::Unavailable(format!("DataForSEO API error: {}", message)));
    }

    let apis = result
        .pointer("/tasks/0/result")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let labs = apis
        .iter()
        .find(|api| api.get("api").and_then(Value::as_str) == Some("dataforseo_labs"))
        .ok_or_else(|| ApiError::Unavailable("DataForSEO Labs API status not found".to_string()))?;

    let live_ok = labs
        .get("endpoints")
        .and_then(Value::as_array)
        .and_then(|endpoints| {
            endpoints
                .iter()
                .find(|e| e.get("endpoint").and_then(Value::as_str) == Some("live"))
        })
        .and_then(|e| e.get("status").and_then(Value::as_str))
        == Some("ok");

    if !live_ok {
        return Err(ApiError::Unavailable(
            "DataForSEO Labs live endpoint is not available".to_string(),
        ));
    }

    Ok(json!({
        "status": "operational",
        "api": "dataforseo_labs",
        "endpoint": "live",
        "response_time": result.get("time").cloned().unwrap_or(Value::Null),
        "message": "DataForSEO Keywords API is responding normally",
    }))
}

/// Reduce a keywords-for-site payload to the `limit` highest-volume keywords
///
/// Returns the kept keywords and the number of items before truncation.
/// Missing tasks, results or items yield an empty list; a task-level error
/// code is an error.
pub fn top_keywords(result: &Value, limit: usize) -> ApiResult<(Vec<KeywordVolume>, usize)> {
    let Some(task) = result.pointer("/tasks/0") else {
        return Ok((Vec::new(), 0));
    };

    if let Some(code) = task.get("status_code").and_then(Value::as_i64) {
        if code != STATUS_OK {
            let message = task
                .get("status_message")
                .and_then(Value::as_str)
                .unwrap_or("API task error");
            return Err(ApiError::BadRequest(message.to_string()));
        }
    }

    let items = task
        .pointer("/result/0/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let keywords = items
        .iter()
        .map(|item| KeywordVolume {
            keyword: item
                .get("keyword")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            search_volume: item
                .pointer("/keyword_info/search_volume")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
        .collect();

    let total = items.len();
    Ok((rank_keywords(keywords, limit), total))
}

/// Sort descending by volume (stable for ties) and keep the first `limit`
pub fn rank_keywords(mut keywords: Vec<KeywordVolume>, limit: usize) -> Vec<KeywordVolume> {
    keywords.sort_by(|a, b| b.search_volume.cmp(&a.search_volume));
    keywords.truncate(limit);
    keywords
}

/// Caller's `limit`, which must be a whole number of zero or more
pub fn top_limit(body: &Value) -> ApiResult<usize> {
    body.get("limit")
        .and_then(Value::as_u64)
        .and_then(|limit| usize::try_from(limit).ok())
        .ok_or_else(|| ApiError::BadRequest("limit must be a non-negative integer".to_string()))
}

#[async_trait]
impl ApiRouter for KeywordsRouter {
    fn name(&self) -> &'static str {
        "dataforseo"
    }

    fn routes(&self) -> &'static [&'static str] {
        ROUTES
    }

    async fn handle(&self, request: ApiRequest) -> ApiResult<Value> {
        match request.path.as_str() {
            "/api/keywords" => self.fetch_keywords(&request).await,
            "/api/keywords/top" => self.handle_top(&request).await,
            "/api/dataforseo/status" => self.handle_status().await,
            other => Err(ApiError::not_found(format!("No keywords handler for {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(keyword: &str, volume: u64) -> KeywordVolume {
        KeywordVolume {
            keyword: keyword.to_string(),
            search_volume: volume,
        }
    }

    #[test]
    fn test_rank_keywords_sorts_and_truncates() {
        let ranked = rank_keywords(vec![kv("a", 5), kv("b", 50)], 1);
        assert_eq!(ranked, vec![kv("b", 50)]);
    }

    #[test]
    fn test_rank_keywords_limit_larger_than_list() {
        let ranked = rank_keywords(vec![kv("a", 5), kv("b", 50), kv("c", 20)], 10);
        assert_eq!(ranked, vec![kv("b", 50), kv("c", 20), kv("a", 5)]);
    }

    #[test]
    fn test_top_limit_accepts_whole_numbers_only() {
        assert_eq!(top_limit(&json!({ "limit": 3 })).unwrap(), 3);
        assert_eq!(top_limit(&json!({ "limit": 0 })).unwrap(), 0);

        for bad in [json!("1"), json!(-1), json!(2.5)] {
            let err = top_limit(&json!({ "limit": bad })).unwrap_err();
            assert_eq!(err.message(), "limit must be a non-negative integer");
        }
    }

    #[test]
    fn test_top_keywords_defaults_missing_fields() {
        let payload = json!({
            "status_code": 20000,
            "tasks": [{
                "status_code": 20000,
                "result": [{
                    "items": [
                        { "keyword": "yoga", "keyword_info": { "search_volume": 900 } },
                        { "keyword_info": { "search_volume": 10 } },
                        { "keyword": "mats", "keyword_info": { "search_volume": null } }
                    ]
                }]
            }]
        });

        let (keywords, total) = top_keywords(&payload, 10).unwrap();
        assert_eq!(total, 3);
        assert_eq!(keywords, vec![kv("yoga", 900), kv("", 10), kv("mats", 0)]);
    }

    #[test]
    fn test_top_keywords_empty_shapes() {
        assert!(top_keywords(&json!({}), 5).unwrap().0.is_empty());
        assert!(top_keywords(&json!({ "tasks": [{ "status_code": 20000, "result": null }] }), 5)
            .unwrap()
            .0
            .is_empty());
    }

    #[test]
    fn test_top_keywords_task_error() {
        let payload = json!({ "tasks": [{ "status_code": 40501, "status_message": "Invalid Field" }] });
        let err = top_keywords(&payload, 5).unwrap_err();
        assert_eq!(err.message(), "Invalid Field");
    }

    #[test]
    fn test_labs_live_status() {
        let payload = json!({
            "status_code": 20000,
            "time": "0.1 sec.",
            "tasks": [{ "result": [
                { "api": "serp", "endpoints": [] },
                { "api": "dataforseo_labs", "endpoints": [{ "endpoint": "live", "status": "ok" }] }
            ]}]
        });
        let status = labs_live_status(&payload).unwrap();
        assert_eq!(status["status"], "operational");
        assert_eq!(status["response_time"], "0.1 sec.");

        let down = json!({
            "status_code": 20000,
            "tasks": [{ "result": [
                { "api": "dataforseo_labs", "endpoints": [{ "endpoint": "live", "status": "down" }] }
            ]}]
        });
        assert!(matches!(labs_live_status(&down), Err(ApiError::Unavailable(_))));
    }
}
