//! Lead Sheet Writer
//!
//! Saves batches of selected keywords/queries into the `Lead Gen` tab while
//! keeping each category's rows contiguous, then appends one audit entry to
//! `Logs`.
//!
//! The column read and the row write are not guarded by any lock or version
//! check. Two writers saving into the same sheet at once can interleave or
//! overwrite each other's blocks; one interactive user per sheet is assumed.
//!
//! Once rows are written the remaining steps are not rolled back: a failed
//! column resize is logged and ignored, and a failed log append leaves the
//! rows in place and reports the error.

use async_trait::async_trait;
use leadgen_common::leads::{
    insertion_row, lead_gen_anchor, lead_sheet_title, validate_guest_name, LeadBatch, LogEntry,
    SessionContext, SheetRef, TabSpec, LEAD_GEN_COLUMNS, LEAD_GEN_LABEL_RANGE, LEAD_GEN_SHEET,
    LEAD_SHEET_TABS, LOGS_APPEND_RANGE, LOGS_SHEET,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// Spreadsheet operations the writer needs
///
/// Implemented over the Google Sheets REST API by
/// [`GoogleSheetsStore`](crate::services::GoogleSheetsStore).
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// First cell of every row in `range`; blank rows read back as `""`
    async fn read_column(&self, spreadsheet_id: &str, range: &str) -> ApiResult<Vec<String>>;

    /// Overwrite a block starting at the top-left cell of `range`
    async fn write_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()>;

    /// Append below the last non-empty row of `range`
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> ApiResult<()>;

    /// Fit columns `[start, end)` of the named tab to their contents
    async fn auto_resize_columns(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
        start: usize,
        end: usize,
    ) -> ApiResult<()>;

    /// Create a spreadsheet with the given tabs, header row frozen
    async fn create_spreadsheet(
        &self,
        title: &str,
        tabs: &[TabSpec],
    ) -> ApiResult<CreatedSpreadsheet>;

    /// Bold + shade the header row of each tab and fit its columns
    async fn format_header_rows(
        &self,
        spreadsheet_id: &str,
        tabs: &[(i64, usize)],
    ) -> ApiResult<()>;
}

/// Result of [`SheetStore::create_spreadsheet`]
#[derive(Debug, Clone)]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    /// `(tab title, numeric sheet id)` in creation order
    pub sheets: Vec<(String, i64)>,
}

/// Lead writer errors
#[derive(Debug, Error)]
pub enum LeadWriteError {
    #[error("No active sheet found")]
    NoActiveSheet,

    #[error("{0}")]
    InvalidBatch(String),

    #[error(transparent)]
    Store(#[from] ApiError),
}

impl From<LeadWriteError> for ApiError {
    fn from(err: LeadWriteError) -> Self {
        match err {
            LeadWriteError::NoActiveSheet => ApiError::BadRequest("No active sheet found".to_string()),
            LeadWriteError::InvalidBatch(msg) => ApiError::BadRequest(msg),
            LeadWriteError::Store(inner) => inner,
        }
    }
}

fn invalid(err: leadgen_common::Error) -> LeadWriteError {
    match err {
        leadgen_common::Error::InvalidInput(msg) => LeadWriteError::InvalidBatch(msg),
        other => LeadWriteError::InvalidBatch(other.to_string()),
    }
}

/// What a save wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    /// 1-indexed row of the first written row
    pub insert_row: usize,
    pub row_count: usize,
    /// A1 anchor the block was written at
    pub range: String,
    pub log: LogEntry,
}

pub struct LeadSheetWriter<S> {
    store: S,
}

impl<S: SheetStore> LeadSheetWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Write `batch` into the active sheet's lead tab and log it
    ///
    /// Nothing is written unless the active sheet exists, the batch is valid
    /// and the label column could be read.
    pub async fn save(
        &self,
        ctx: &SessionContext,
        batch: &LeadBatch,
    ) -> Result<SaveOutcome, LeadWriteError> {
        let sheet = ctx
            .active_sheet()
            .map_err(|_| LeadWriteError::NoActiveSheet)?;
        batch.validate().map_err(invalid)?;

        let labels = self
            .store
            .read_column(&sheet.id, LEAD_GEN_LABEL_RANGE)
            .await?;

        let insert_row = insertion_row(&labels, batch.category());
        let rows = batch.rows();
        let row_count = rows.len();
        let range = lead_gen_anchor(insert_row);

        info!(
            spreadsheet = %sheet.id,
            category = %batch.category(),
            existing_rows = labels.len(),
            insert_row,
            rows = row_count,
            "Writing lead rows"
        );

        self.store.write_rows(&sheet.id, &range, rows).await?;

        if let Err(e) = self
            .store
            .auto_resize_columns(&sheet.id, LEAD_GEN_SHEET, 0, LEAD_GEN_COLUMNS)
            .await
        {
            warn!(spreadsheet = %sheet.id, error = %e, "Failed to auto-resize Lead Gen columns");
        }

        let log = self.append_log(&sheet.id, batch.log_message()).await?;

        Ok(SaveOutcome {
            insert_row,
            row_count,
            range,
            log,
        })
    }

    /// Append one audit entry to the active sheet
    pub async fn log(
        &self,
        ctx: &SessionContext,
        message: &str,
    ) -> Result<LogEntry, LeadWriteError> {
        let sheet = ctx
            .active_sheet()
            .map_err(|_| LeadWriteError::NoActiveSheet)?;
        if message.trim().is_empty() {
            return Err(LeadWriteError::InvalidBatch(
                "Log message is required".to_string(),
            ));
        }
        self.append_log(&sheet.id, message.to_string()).await
    }

    async fn append_log(&self, spreadsheet_id: &str, message: String) -> Result<LogEntry, LeadWriteError> {
        let entry = LogEntry::now(message);
        self.store
            .append_rows(spreadsheet_id, LOGS_APPEND_RANGE, vec![entry.to_row()])
            .await?;
        Ok(entry)
    }

    /// Create a new lead spreadsheet for a guest
    ///
    /// Returns the session reference the client should pass to later saves.
    pub async fn create_sheet(&self, guest_name: &str) -> Result<SheetRef, LeadWriteError> {
        validate_guest_name(guest_name).map_err(invalid)?;
        let title = lead_sheet_title(guest_name);

        let created = self
            .store
            .create_spreadsheet(&title, &LEAD_SHEET_TABS)
            .await?;
        let id = created.spreadsheet_id.clone();
        info!(spreadsheet = %id, title = %title, "Created lead spreadsheet");

        let header_tabs: Vec<(i64, usize)> = created
            .sheets
            .iter()
            .filter_map(|(name, sheet_id)| {
                LEAD_SHEET_TABS
                    .iter()
                    .find(|tab| tab.title == name.as_str())
                    .map(|tab| (*sheet_id, tab.column_count()))
            })
            .collect();
        if let Err(e) = self.store.format_header_rows(&id, &header_tabs).await {
            warn!(spreadsheet = %id, error = %e, "Failed to format header rows");
        }

        for tab in LEAD_SHEET_TABS.iter() {
            let headers: Vec<Value> = tab.headers.iter().map(|h| json!(h)).collect();
            self.store
                .write_rows(&id, &tab.header_range(), vec![headers])
                .await?;
        }

        let entry = LogEntry::now("Sheet created");
        self.store
            .write_rows(&id, &format!("{}!A2:B2", LOGS_SHEET), vec![entry.to_row()])
            .await?;

        Ok(SheetRef::new(id, title))
    }
}
