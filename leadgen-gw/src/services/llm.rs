//! OpenRouter LLM adapter
//!
//! `POST /api/llm/analyze` asks a chat model for a fixed number of SEO
//! keywords describing some page content and returns them as a string list.
//! The content is usually the output of `/api/jina-reader`, but the two calls
//! are made separately by the client.

use async_trait::async_trait;
use leadgen_common::config::require_secrets;
use leadgen_common::envelope::iso_timestamp;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::Upstream;
use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::router::{ApiRequest, ApiRouter};

pub const OPENROUTER: Upstream = Upstream {
    name: "OpenRouter",
    subject: "model",
    access_help: "Check that the OpenRouter API key is valid and allowed to use the selected model.",
};

pub const DEFAULT_KEYWORD_LIMIT: u64 = 10;

/// Model used by `/api/llm/test`
pub const DEFAULT_TEST_MODEL: &str = "openai/gpt-4o-mini";

const TEMPERATURE: f64 = 0.3;
const MAX_TOKENS: u64 = 200;

const TEST_CONTENTS: [&str; 3] = [
    "This is a test content piece one",
    "This is another test content piece two",
    "This is a third test content piece three",
];

const ROUTES: &[&str] = &[
    "/api/llm/analyze",
    "/api/llm/status",
    "/api/llm/test",
    "/api/llm/models",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    content: String,
    model: String,
    #[serde(default = "default_keyword_limit")]
    keyword_limit: u64,
}

fn default_keyword_limit() -> u64 {
    DEFAULT_KEYWORD_LIMIT
}

pub struct LlmRouter {
    http: Client,
    base_url: String,
    api_key: String,
    referer: String,
    title: String,
}

impl LlmRouter {
    pub fn new(config: &GatewayConfig, http: Client) -> leadgen_common::Result<Self> {
        let api_key = config.credentials.openrouter_api_key.clone();
        require_secrets(&[("OPENROUTER_API_KEY", api_key.as_deref())])?;

        Ok(Self {
            http,
            base_url: config.upstream.openrouter.clone(),
            api_key: api_key.unwrap_or_default(),
            referer: config.llm_referer.clone(),
            title: config.llm_title.clone(),
        })
    }

    /// One chat completion, parsed into a keyword list
    async fn analyze(
        &self,
        content: &str,
        model: &str,
        keyword_limit: u64,
        origin: Option<&str>,
    ) -> ApiResult<Value> {
        info!(
            model = %model,
            keyword_limit,
            content_length = content.chars().count(),
            "Requesting keyword analysis"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", origin.unwrap_or(self.referer.as_str()))
            .header("X-Title", self.title.as_str())
            .json(&completion_request(content, model, keyword_limit))
            .send()
            .await?;

        let result = OPENROUTER.json(response).await?;
        let completion = result
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::parse("Failed to parse LLM response", "missing message content"))?;
        debug!(completion = %completion, "LLM completion received");

        let keywords = parse_keywords(completion)
            .map_err(|e| ApiError::parse("Failed to parse LLM response", e))?;

        Ok(json!({
            "keywords": keywords,
            "model": result.get("model").cloned().unwrap_or(Value::Null),
            "usage": result.get("usage").cloned().unwrap_or(Value::Null),
        }))
    }

    async fn handle_analyze(&self, request: &ApiRequest) -> ApiResult<Value> {
        let body: AnalyzeBody = request.json_with(&["content", "model"])?;
        self.analyze(
            &body.content,
            &body.model,
            body.keyword_limit,
            request.header("origin"),
        )
        .await
    }

    async fn fetch_models(&self) -> ApiResult<Value> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        OPENROUTER.json(response).await
    }

    async fn handle_models(&self) -> ApiResult<Value> {
        let result = self.fetch_models().await?;
        Ok(json!({
            "models": result.get("data").cloned().unwrap_or(Value::Null),
            "timestamp": iso_timestamp(),
        }))
    }

    async fn handle_status(&self) -> ApiResult<Value> {
        let result = self.fetch_models().await.map_err(|e| {
            warn!(error = %e, "OpenRouter status check failed");
            ApiError::Unavailable(format!("OpenRouter API status check failed: {}", e.message()))
        })?;

        let models = result
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::Unavailable("Invalid API response format".to_string()))?;

        Ok(json!({
            "status": "operational",
            "api": "openrouter",
            "models": models.len(),
            "response_time": iso_timestamp(),
            "message": "OpenRouter API is responding normally",
        }))
    }

    /// Analyse fixed snippets; per-snippet failures are reported, not raised
    async fn handle_test(&self) -> ApiResult<Value> {
        let mut results = Vec::with_capacity(TEST_CONTENTS.len());

        for content in TEST_CONTENTS {
            let outcome = self
                .analyze(content, DEFAULT_TEST_MODEL, DEFAULT_KEYWORD_LIMIT, None)
                .await;
            let result = match outcome {
                Ok(analysis) => json!({
                    "contentLength": content.len(),
                    "success": true,
                    "keywords": analysis["keywords"],
                }),
                Err(e) => json!({
                    "contentLength": content.len(),
                    "success": false,
                    "error": e.message(),
                }),
            };
            results.push(result);
        }

        Ok(json!({
            "results": results,
            "timestamp": iso_timestamp(),
        }))
    }
}

fn system_prompt(keyword_limit: u64) -> String {
    format!(
        "You are a keyword analysis expert. Analyze the provided content and extract the most relevant keywords. \
         Format your response as a JSON array of strings containing exactly {} keywords. Do not include explanations or other text. \
         Keywords should be relevant for SEO and content marketing purposes. Include both broad and specific terms.",
        keyword_limit
    )
}

/// Chat completion body; JSON mode is requested except for `openai/` models
pub fn completion_request(content: &str, model: &str, keyword_limit: u64) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt(keyword_limit) },
            { "role": "user", "content": content },
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS,
        "stream": false,
    });

    if !model.starts_with("openai/") {
        body["response_format"] = json!({ "type": "json_object" });
    }
    body
}

/// Pull a keyword list out of a model completion
///
/// Accepts a bare JSON array, an object with a `keywords` array, or prose
/// with an array embedded between the first `[` and the last `]`. Every
/// element must be a string.
pub fn parse_keywords(completion: &str) -> Result<Vec<String>, String> {
    let parsed: Value = match serde_json::from_str(completion) {
        Ok(value) => value,
        Err(err) => {
            let start = completion.find('[');
            let end = completion.rfind(']');
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&completion[start..=end]).map_err(|e| e.to_string())?
                }
                _ => return Err(err.to_string()),
            }
        }
    };

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("keywords") {
            Some(Value::Array(items)) => items,
            _ => return Err("Invalid response format from LLM - not an array".to_string()),
        },
        _ => return Err("Invalid response format from LLM - not an array".to_string()),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::String(keyword) => Ok(keyword),
            _ => Err(format!("Invalid keyword at position {}: not a string", index)),
        })
        .collect()
}

#[async_trait]
impl ApiRouter for LlmRouter {
    fn name(&self) -> &'static str {
        "llm"
    }

    fn routes(&self) -> &'static [&'static str] {
        ROUTES
    }

    async fn handle(&self, request: ApiRequest) -> ApiResult<Value> {
        match request.path.as_str() {
            "/api/llm/analyze" => self.handle_analyze(&request).await,
            "/api/llm/status" => self.handle_status().await,
            "/api/llm/test" => self.handle_test().await,
            "/api/llm/models" => self.handle_models().await,
            other => Err(ApiError::not_found(format!("No LLM handler for {}", other))),
        }
    }
}
