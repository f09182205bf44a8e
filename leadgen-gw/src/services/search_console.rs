//! Google Search Console adapter
//!
//! Queries search analytics for a single page on behalf of the signed-in
//! user. The property is always the domain property (`sc-domain:`) of the
//! page's registrable host, filtered down to rows for that exact page.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{encode_component, Upstream};
use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::router::{ApiRequest, ApiRouter};

pub const SEARCH_CONSOLE: Upstream = Upstream {
    name: "Search Console",
    subject: "URL",
    access_help: "Ask the property owner to add your Google account as a user in Search Console (Settings > Users and permissions), then sign in again with that account.",
};

const ROUTES: &[&str] = &["/api/search-console", "/api/search-console/status"];

const DEFAULT_ROW_LIMIT: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default = "default_dimensions")]
    dimensions: Vec<String>,
    #[serde(default = "default_row_limit")]
    row_limit: u64,
}

fn default_dimensions() -> Vec<String> {
    vec!["query".to_string()]
}

fn default_row_limit() -> u64 {
    DEFAULT_ROW_LIMIT
}

/// One normalised search-analytics row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryImpressions {
    pub query: String,
    /// Reported as a JSON number; whole impressions
    pub impressions: u64,
}

pub struct SearchConsoleRouter {
    http: Client,
    base_url: String,
    credentials_configured: bool,
}

impl SearchConsoleRouter {
    /// Always constructible; the status route reports missing credentials
    pub fn new(config: &GatewayConfig, http: Client) -> Self {
        let creds = &config.credentials;
        Self {
            http,
            base_url: config.upstream.search_console.clone(),
            credentials_configured: creds.google_client_id.is_some()
                && creds.google_client_secret.is_some(),
        }
    }

    async fn handle_query(&self, request: &ApiRequest) -> ApiResult<Value> {
        let body: QueryBody = request.json_with(&[])?;

        let url = body
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing URL parameter".to_string()))?;
        let page = Url::parse(&url).map_err(|_| ApiError::BadRequest("Invalid URL string.".to_string()))?;

        let (start_date, end_date) = match (body.start_date, body.end_date) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => (start, end),
            _ => return Err(ApiError::BadRequest("Missing date parameters".to_string())),
        };

        let token = request.bearer_token()?;
        let site = site_property(&page)?;

        info!(site = %site, page = %url, start = %start_date, end = %end_date, "Querying search analytics");

        let response = self
            .http
            .post(format!(
                "{}/webmasters/v3/sites/{}/searchAnalytics/query",
                self.base_url,
                encode_component(&site)
            ))
            .bearer_auth(token)
            .json(&json!({
                "startDate": start_date,
                "endDate": end_date,
                "dimensions": body.dimensions,
                "rowLimit": body.row_limit,
                "dimensionFilterGroups": [{
                    "filters": [{
                        "dimension": "page",
                        "operator": "equals",
                        "expression": url,
                    }]
                }],
            }))
            .send()
            .await?;

        let data = SEARCH_CONSOLE.json(response).await?;
        let rows = data.get("rows").cloned().unwrap_or_else(|| json!([]));
        let total_rows = rows.as_array().map_or(0, Vec::len);

        Ok(json!({
            "rows": rows,
            "totalRows": total_rows,
            "requestDetails": {
                "url": url,
                "startDate": start_date,
                "endDate": end_date,
                "dimensions": body.dimensions,
            },
            "queries": query_impressions(&rows),
        }))
    }

    fn handle_status(&self) -> ApiResult<Value> {
        if !self.credentials_configured {
            return Err(ApiError::Unavailable(
                "Search Console API credentials not configured".to_string(),
            ));
        }

        Ok(json!({
            "status": "operational",
            "api": "search_console",
            "message": "Google Search Console API endpoint is configured",
        }))
    }
}

/// `sc-domain:` property for the last two labels of the page's host
pub fn site_property(page: &Url) -> ApiResult<String> {
    let host = page
        .host_str()
        .ok_or_else(|| ApiError::BadRequest("Invalid URL string.".to_string()))?;
    let labels: Vec<&str> = host.split('.').collect();
    let domain = labels[labels.len().saturating_sub(2)..].join(".");
    Ok(format!("sc-domain:{}", domain))
}

/// `{query, impressions}` per row, highest impressions first
pub fn query_impressions(rows: &Value) -> Vec<QueryImpressions> {
    let mut queries: Vec<QueryImpressions> = rows
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| QueryImpressions {
                    query: row
                        .pointer("/keys/0")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    impressions: row
                        .get("impressions")
                        .and_then(Value::as_f64)
                        .map_or(0, |n| n.max(0.0) as u64),
                })
                .collect()
        })
        .unwrap_or_default();

    queries.sort_by(|a, b| b.impressions.cmp(&a.impressions));
    queries
}

#[async_trait]
impl ApiRouter for SearchConsoleRouter {
    fn name(&self) -> &'static str {
        "search-console"
    }

    fn routes(&self) -> &'static [&'static str] {
        ROUTES
    }

    async fn handle(&self, request: ApiRequest) -> ApiResult<Value> {
        match request.path.as_str() {
            "/api/search-console" => self.handle_query(&request).await,
            "/api/search-console/status" => self.handle_status(),
            other => Err(ApiError::not_found(format!("No search console handler for {}", other))),
        }
    }
}
