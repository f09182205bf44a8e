//! Shared test helpers
//!
//! - [`FakeUpstream`]: a real HTTP server on an ephemeral port standing in for
//!   every third-party API, recording each request it receives
//! - [`MemoryStore`]: an in-memory [`SheetStore`] emulating one spreadsheet
//! - request builders and body extraction for `oneshot` tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use leadgen_common::leads::TabSpec;
use leadgen_gw::config::GatewayConfig;
use leadgen_gw::error::{ApiError, ApiResult};
use leadgen_gw::lead_writer::{CreatedSpreadsheet, SheetStore};
use leadgen_gw::{build_router, AppState};
use serde_json::Value;
use std::sync::{Arc, Mutex};

// =============================================================================
// Fake upstream server
// =============================================================================

/// One request as received by the fake upstream
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Raw (still percent-encoded) path
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("Upstream request body should be JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync>;

#[derive(Clone)]
struct FakeState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Responder,
}

/// Stand-in for the third-party APIs
pub struct FakeUpstream {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeUpstream {
    /// Start a server answering every request with `responder`'s `(status, body)`
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            requests: Arc::clone(&requests),
            responder: Arc::new(responder),
        };

        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Should bind ephemeral port");
        let addr = listener.local_addr().expect("Should have local address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    /// Server that answers every request with the same JSON
    pub async fn always(status: u16, body: Value) -> Self {
        let body = body.to_string();
        Self::start(move |_| (status, body.clone())).await
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Gateway router with every upstream pointed at this server
    pub fn gateway(&self) -> Router {
        build_router(
            AppState::from_config(&GatewayConfig::for_upstream(&self.base_url))
                .expect("Test config has every secret"),
        )
    }
}

async fn record(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let (status, body) = (state.responder)(&recorded);
    state.requests.lock().unwrap().push(recorded);

    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

// =============================================================================
// Request helpers
// =============================================================================

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

// =============================================================================
// In-memory sheet store
// =============================================================================

/// Spreadsheet state held by [`MemoryStore`]
#[derive(Debug, Default)]
pub struct MemorySheet {
    /// First column of `Lead Gen`, header included
    pub labels: Vec<String>,
    /// Every `write_rows` call as `(range, rows)`
    pub writes: Vec<(String, Vec<Vec<Value>>)>,
    /// Every `append_rows` call as `(range, rows)`
    pub appends: Vec<(String, Vec<Vec<Value>>)>,
    pub resizes: usize,
    pub created: Vec<String>,
}

/// [`SheetStore`] backed by memory, with switchable failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub sheet: Mutex<MemorySheet>,
    pub fail_read: bool,
    pub fail_resize: bool,
    pub fail_append: bool,
}

impl MemoryStore {
    /// Lead tab holding the header row plus `categories` (one row each)
    pub fn with_labels(categories: &[&str]) -> Self {
        let mut labels = vec!["Categories".to_string()];
        labels.extend(categories.iter().map(|c| c.to_string()));
        Self {
            sheet: Mutex::new(MemorySheet {
                labels,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.sheet.lock().unwrap().labels.clone()
    }

    pub fn writes(&self) -> Vec<(String, Vec<Vec<Value>>)> {
        self.sheet.lock().unwrap().writes.clone()
    }

    pub fn appends(&self) -> Vec<(String, Vec<Vec<Value>>)> {
        self.sheet.lock().unwrap().appends.clone()
    }
}

fn store_failure(what: &str) -> ApiError {
    ApiError::Upstream {
        message: format!("Google Sheets API error: {} failed", what),
        details: None,
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn read_column(&self, _spreadsheet_id: &str, _range: &str) -> ApiResult<Vec<String>> {
        if self.fail_read {
            return Err(store_failure("read"));
        }
        Ok(self.labels())
    }

    async fn write_rows(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()> {
        let mut sheet = self.sheet.lock().unwrap();

        // `values.update` overwrites from the anchor row down
        if let Some(row) = range
            .strip_prefix("Lead Gen!A")
            .and_then(|r| r.parse::<usize>().ok())
        {
            for (offset, values) in rows.iter().enumerate() {
                let index = row - 1 + offset;
                if sheet.labels.len() <= index {
                    sheet.labels.resize(index + 1, String::new());
                }
                sheet.labels[index] = values[0].as_str().unwrap_or_default().to_string();
            }
        }

        sheet.writes.push((range.to_string(), rows));
        Ok(())
    }

    async fn append_rows(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()> {
        if self.fail_append {
            return Err(store_failure("append"));
        }
        self.sheet
            .lock()
            .unwrap()
            .appends
            .push((range.to_string(), rows));
        Ok(())
    }

    async fn auto_resize_columns(
        &self,
        _spreadsheet_id: &str,
        _sheet_title: &str,
        _start: usize,
        _end: usize,
    ) -> ApiResult<()> {
        if self.fail_resize {
            return Err(store_failure("resize"));
        }
        self.sheet.lock().unwrap().resizes += 1;
        Ok(())
    }

    async fn create_spreadsheet(
        &self,
        title: &str,
        tabs: &[TabSpec],
    ) -> ApiResult<CreatedSpreadsheet> {
        self.sheet.lock().unwrap().created.push(title.to_string());
        Ok(CreatedSpreadsheet {
            spreadsheet_id: "mem-sheet-1".to_string(),
            sheets: tabs
                .iter()
                .enumerate()
                .map(|(i, tab)| (tab.title.to_string(), i as i64 * 100))
                .collect(),
        })
    }

    async fn format_header_rows(
        &self,
        _spreadsheet_id: &str,
        _tabs: &[(i64, usize)],
    ) -> ApiResult<()> {
        Ok(())
    }
}
