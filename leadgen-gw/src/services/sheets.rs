//! Google Sheets adapter
//!
//! Routes:
//! - `GET  /api/config`          public OAuth client id for the browser
//! - `POST /api/sheets/create`   raw spreadsheet create, caller's bearer token
//! - `POST /api/sheets/update`   raw values update, caller's bearer token
//! - `POST /api/leads/sheet`     create a lead spreadsheet, returns a session reference
//! - `POST /api/leads/save`      category-grouped save through [`LeadSheetWriter`]
//! - `POST /api/leads/log`       append one audit entry
//!
//! Sheets calls act on behalf of the signed-in user, so every outbound call
//! carries the caller's own token; the gateway holds no Google credentials
//! beyond the public client id.

use async_trait::async_trait;
use leadgen_common::config::require_secrets;
use leadgen_common::leads::{LeadBatch, LeadItem, SessionContext, SheetRef, TabSpec};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::Upstream;
use crate::config::GatewayConfig;
use crate::error::{ApiError, ApiResult};
use crate::lead_writer::{CreatedSpreadsheet, LeadSheetWriter, SheetStore};
use crate::router::{ApiRequest, ApiRouter};

pub const SHEETS: Upstream = Upstream {
    name: "Google Sheets",
    subject: "spreadsheet",
    access_help: "Ask the spreadsheet owner to share it with your Google account as an editor, then sign in again with that account.",
};

const ROUTES: &[&str] = &[
    "/api/config",
    "/api/sheets/create",
    "/api/sheets/update",
    "/api/leads/sheet",
    "/api/leads/save",
    "/api/leads/log",
];

pub struct SheetsRouter {
    http: Client,
    base_url: String,
    client_id: String,
}

impl SheetsRouter {
    pub fn new(config: &GatewayConfig, http: Client) -> leadgen_common::Result<Self> {
        let client_id = config.credentials.google_client_id.clone();
        require_secrets(&[("GOOGLE_CLIENT_ID", client_id.as_deref())])?;

        Ok(Self {
            http,
            base_url: config.upstream.sheets.clone(),
            client_id: client_id.unwrap_or_default(),
        })
    }

    fn writer(&self, token: &str) -> LeadSheetWriter<GoogleSheetsStore> {
        LeadSheetWriter::new(GoogleSheetsStore::new(
            self.http.clone(),
            &self.base_url,
            token,
        ))
    }

    async fn handle_config(&self) -> ApiResult<Value> {
        Ok(json!({ "clientId": self.client_id }))
    }

    async fn handle_create(&self, request: ApiRequest) -> ApiResult<Value> {
        #[derive(Deserialize)]
        struct CreateBody {
            title: String,
            headers: Value,
        }

        let body: CreateBody = request.json_with(&["title", "headers"])?;
        let token = request.bearer_token()?.to_string();
        let store = GoogleSheetsStore::new(self.http.clone(), &self.base_url, &token);

        let response = self
            .http
            .post(store.url(&["v4", "spreadsheets"])?)
            .bearer_auth(&token)
            .json(&json!({
                "properties": { "title": body.title },
                "sheets": body.headers,
            }))
            .send()
            .await?;

        SHEETS.json(response).await
    }

    async fn handle_update(&self, request: ApiRequest) -> ApiResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpdateBody {
            spreadsheet_id: String,
            range: String,
            values: Value,
        }

        let body: UpdateBody = request.json_with(&["spreadsheetId", "range", "values"])?;
        let token = request.bearer_token()?.to_string();
        let store = GoogleSheetsStore::new(self.http.clone(), &self.base_url, &token);

        let mut url = store.values_url(&body.spreadsheet_id, &body.range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let response = self
            .http
            .put(url)
            .bearer_auth(&token)
            .json(&json!({ "values": body.values }))
            .send()
            .await?;

        SHEETS.json(response).await
    }

    async fn handle_create_lead_sheet(&self, request: ApiRequest) -> ApiResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CreateLeadSheetBody {
            guest_name: String,
        }

        let body: CreateLeadSheetBody = request.json_with(&["guestName"])?;
        let token = request.bearer_token()?;

        let sheet = self.writer(token).create_sheet(&body.guest_name).await?;
        serde_json::to_value(sheet).map_err(|e| ApiError::Internal(e.to_string()))
    }

    async fn handle_save(&self, request: ApiRequest) -> ApiResult<Value> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct SaveBody {
            #[serde(default)]
            sheet: Option<SheetRef>,
            #[serde(default)]
            category: String,
            #[serde(default)]
            source: String,
            #[serde(default)]
            url: String,
            #[serde(default)]
            items: Vec<LeadItem>,
            #[serde(default)]
            log_message: Option<String>,
        }

        let body: SaveBody = request.json_with(&[])?;
        let token = request.bearer_token()?;

        let ctx = SessionContext::new(body.sheet);
        let batch = LeadBatch {
            category: body.category,
            source: body.source,
            url: body.url,
            items: body.items,
            log_message: body.log_message,
        };

        let outcome = self.writer(token).save(&ctx, &batch).await?;
        info!(
            insert_row = outcome.insert_row,
            rows = outcome.row_count,
            "Saved lead rows"
        );
        serde_json::to_value(outcome).map_err(|e| ApiError::Internal(e.to_string()))
    }

    async fn handle_log(&self, request: ApiRequest) -> ApiResult<Value> {
        #[derive(Deserialize)]
        struct LogBody {
            #[serde(default)]
            sheet: Option<SheetRef>,
            #[serde(default)]
            message: String,
        }

        let body: LogBody = request.json_with(&[])?;
        let token = request.bearer_token()?;

        let ctx = SessionContext::new(body.sheet);
        let entry = self.writer(token).log(&ctx, &body.message).await?;
        serde_json::to_value(entry).map_err(|e| ApiError::Internal(e.to_string()))
    }
}

#[async_trait]
impl ApiRouter for SheetsRouter {
    fn name(&self) -> &'static str {
        "sheets"
    }

    fn routes(&self) -> &'static [&'static str] {
        ROUTES
    }

    async fn handle(&self, request: ApiRequest) -> ApiResult<Value> {
        match request.path.as_str() {
            "/api/config" => {
                debug!("Config request received (client id present)");
                self.handle_config().await
            }
            "/api/sheets/create" => self.handle_create(request).await,
            "/api/sheets/update" => self.handle_update(request).await,
            "/api/leads/sheet" => self.handle_create_lead_sheet(request).await,
            "/api/leads/save" => self.handle_save(request).await,
            "/api/leads/log" => self.handle_log(request).await,
            other => Err(ApiError::not_found(format!("No sheets handler for {}", other))),
        }
    }
}

// ============================================================================
// Google Sheets REST store
// ============================================================================

/// [`SheetStore`] over the Sheets v4 REST API using one user's token
pub struct GoogleSheetsStore {
    http: Client,
    base_url: String,
    token: String,
}

impl GoogleSheetsStore {
    pub fn new(http: Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Base URL plus percent-encoded path segments
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Internal(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Internal("Sheets base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/v4/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> ApiResult<Url> {
        let range_segment = format!("{}{}", range, suffix);
        self.url(&["v4", "spreadsheets", spreadsheet_id, "values", &range_segment])
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> ApiResult<()> {
        let action = format!("{}:batchUpdate", spreadsheet_id);
        let response = self
            .http
            .post(self.url(&["v4", "spreadsheets", &action])?)
            .bearer_auth(&self.token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        SHEETS.check(response).await?;
        Ok(())
    }

    /// Numeric id of the tab titled `title`
    async fn sheet_id(&self, spreadsheet_id: &str, title: &str) -> ApiResult<i64> {
        let mut url = self.url(&["v4", "spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties");

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let metadata = SHEETS.json(response).await?;

        sheet_properties(&metadata)
            .into_iter()
            .find(|(name, _)| name == title)
            .map(|(_, id)| id)
            .ok_or_else(|| ApiError::not_found(format!("Sheet \"{}\" not found", title)))
    }
}

/// `(title, sheetId)` pairs from a spreadsheet resource
fn sheet_properties(spreadsheet: &Value) -> Vec<(String, i64)> {
    spreadsheet
        .get("sheets")
        .and_then(Value::as_array)
        .map(|sheets| {
            sheets
                .iter()
                .filter_map(|sheet| {
                    let props = sheet.get("properties")?;
                    let title = props.get("title")?.as_str()?.to_string();
                    let id = props.get("sheetId").and_then(Value::as_i64).unwrap_or(0);
                    Some((title, id))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// First cell of each row; blank rows come back as `[]` and read as `""`
fn first_column(range: &Value) -> Vec<String> {
    range
        .get("values")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| match row.get(0) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn read_column(&self, spreadsheet_id: &str, range: &str) -> ApiResult<Vec<String>> {
        let response = self
            .http
            .get(self.values_url(spreadsheet_id, range, "")?)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body = SHEETS.json(response).await?;
        Ok(first_column(&body))
    }

    async fn write_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()> {
        let mut url = self.values_url(spreadsheet_id, range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        SHEETS.check(response).await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()> {
        let mut url = self.values_url(spreadsheet_id, range, ":append")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        SHEETS.check(response).await?;
        Ok(())
    }

    async fn auto_resize_columns(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        start: usize,
        end: usize,
    ) -> ApiResult<()> {
        let sheet_id = self.sheet_id(spreadsheet_id, sheet_title).await?;
        self.batch_update(
            spreadsheet_id,
            vec![auto_resize_request(sheet_id, start, end)],
        )
        .await
    }

    async fn create_spreadsheet(
        &self,
        title: &str,
        tabs: &[TabSpec],
    ) -> ApiResult<CreatedSpreadsheet> {
        let sheets: Vec<Value> = tabs
            .iter()
            .map(|tab| {
                json!({
                    "properties": {
                        "title": tab.title,
                        "gridProperties": {
                            "frozenRowCount": 1,
                            "rowCount": 1000,
                            "columnCount": tab.column_count(),
                        }
                    }
                })
            })
            .collect();

        let response = self
            .http
            .post(self.url(&["v4", "spreadsheets"])?)
            .bearer_auth(&self.token)
            .json(&json!({
                "properties": { "title": title },
                "sheets": sheets,
            }))
            .send()
            .await?;
        let body = SHEETS.json(response).await?;

        let spreadsheet_id = body
            .get("spreadsheetId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Parse {
                message: "Invalid response from sheet creation".to_string(),
                details: None,
            })?
            .to_string();

        Ok(CreatedSpreadsheet {
            spreadsheet_id,
            sheets: sheet_properties(&body),
        })
    }

    async fn format_header_rows(
        &self,
        spreadsheet_id: &str,
        tabs: &[(i64, usize)],
    ) -> ApiResult<()> {
        let requests: Vec<Value> = tabs
            .iter()
            .flat_map(|&(sheet_id, columns)| {
                [
                    json!({
                        "repeatCell": {
                            "range": {
                                "sheetId": sheet_id,
                                "startRowIndex": 0,
                                "endRowIndex": 1,
                                "startColumnIndex": 0,
                                "endColumnIndex": columns,
                            },
                            "cell": {
                                "userEnteredFormat": {
                                    "textFormat": { "bold": true },
                                    "backgroundColor": { "red": 0.95, "green": 0.95, "blue": 0.95 },
                                }
                            },
                            "fields": "userEnteredFormat(textFormat,backgroundColor)",
                        }
                    }),
                    auto_resize_request(sheet_id, 0, columns),
                ]
            })
            .collect();

        if requests.is_empty() {
            return Ok(());
        }
        self.batch_update(spreadsheet_id, requests).await
    }
}

fn auto_resize_request(sheet_id: i64, start: usize, end: usize) -> Value {
    json!({
        "autoResizeDimensions": {
            "dimensions": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": start,
                "endIndex": end,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GoogleSheetsStore {
        GoogleSheetsStore::new(Client::new(), "https://sheets.example.com/", "tok")
    }

    #[test]
    fn test_values_url_encodes_range() {
        let url = store().values_url("S1", "Lead Gen!A:A", "").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/S1/values/Lead%20Gen!A:A"
        );
    }

    #[test]
    fn test_append_url_suffix() {
        let url = store().values_url("S1", "Logs!A:B", ":append").unwrap();
        assert!(url.as_str().ends_with("/values/Logs!A:B:append"));
    }

    #[test]
    fn test_first_column_handles_blank_rows() {
        let body = json!({ "values": [["Categories"], [], ["Fitness", "x"], [42]] });
        assert_eq!(first_column(&body), vec!["Categories", "", "Fitness", "42"]);
        assert!(first_column(&json!({ "range": "Lead Gen!A1:A1000" })).is_empty());
    }

    #[test]
    fn test_sheet_properties() {
        let body = json!({
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Bookings" } },
                { "properties": { "sheetId": 77, "title": "Lead Gen" } }
            ]
        });
        assert_eq!(
            sheet_properties(&body),
            vec![("Bookings".to_string(), 0), ("Lead Gen".to_string(), 77)]
        );
    }
}
