//! Lead sheet data model
//!
//! A lead spreadsheet has three tabs. `Lead Gen` holds category-grouped rows
//! shaped `[category, item fields.., source, url]`; `Logs` is an append-only
//! audit trail of `[timestamp, message]`; `Bookings` is owned by humans and
//! never written after creation.
//!
//! Rows for one category form a contiguous block. New rows for a known
//! category go directly below that category's last row; rows for a new
//! category go below the last row of the sheet.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Error, Result};

pub const LEAD_GEN_SHEET: &str = "Lead Gen";
pub const LOGS_SHEET: &str = "Logs";
pub const BOOKINGS_SHEET: &str = "Bookings";

/// First column of the lead tab, header included
pub const LEAD_GEN_LABEL_RANGE: &str = "Lead Gen!A:A";
pub const LOGS_APPEND_RANGE: &str = "Logs!A:B";

/// Number of columns on the lead tab (category, field, field, source, url)
pub const LEAD_GEN_COLUMNS: usize = 5;

pub const LEAD_GEN_HEADERS: [&str; LEAD_GEN_COLUMNS] =
    ["Categories", "Keywords", "Monthly Searches", "Source", "URL"];

pub const LOGS_HEADERS: [&str; 2] = ["Date/Time", "Event"];

pub const BOOKINGS_HEADERS: [&str; 13] = [
    "Confirmation Notes",
    "Name of Podcast",
    "Link to Podcast",
    "Name of Host",
    "Avg Listeners per Episode",
    "Monthly Listeners",
    "Followers Count",
    "Email",
    "Phone Number",
    "Date Booked",
    "Time Booked (CST)",
    "Link to Login to Interview",
    "Notes",
];

// ========================================
// Session reference
// ========================================

/// Identifies the spreadsheet a client session is writing to
///
/// Created once per "create sheet" action and replaced wholesale by the next
/// one. The client holds it and passes it back on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
}

impl SheetRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created: Utc::now(),
        }
    }
}

/// Explicit per-call context carrying the active sheet, if any
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    active_sheet: Option<SheetRef>,
}

impl SessionContext {
    pub fn new(active_sheet: Option<SheetRef>) -> Self {
        Self { active_sheet }
    }

    pub fn with_sheet(sheet: SheetRef) -> Self {
        Self {
            active_sheet: Some(sheet),
        }
    }

    /// The active sheet, or `NotFound("No active sheet found")`
    pub fn active_sheet(&self) -> Result<&SheetRef> {
        self.active_sheet
            .as_ref()
            .ok_or_else(|| Error::NotFound("No active sheet found".to_string()))
    }
}

// ========================================
// Lead items and rows
// ========================================

/// One selected result to be saved as a lead row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LeadItem {
    /// From the keyword-research service
    Keyword {
        keyword: String,
        #[serde(rename = "searchVolume", default)]
        search_volume: u64,
    },
    /// Extracted by the LLM; carries no volume
    Llm { keyword: String },
    /// From search analytics
    Query {
        query: String,
        #[serde(default)]
        impressions: u64,
    },
}

impl LeadItem {
    /// Source-specific middle columns of the row
    pub fn fields(&self) -> [Value; 2] {
        match self {
            LeadItem::Keyword {
                keyword,
                search_volume,
            } => [json!(keyword), json!(search_volume)],
            LeadItem::Llm { keyword } => [json!(keyword.to_lowercase()), json!(0)],
            LeadItem::Query { query, impressions } => [json!(query), json!(impressions)],
        }
    }

    /// Default audit message for a batch made of this kind of item
    pub fn default_log_template(&self) -> &'static str {
        match self {
            LeadItem::Keyword { .. } => "Added {count} keywords to category \"{category}\"",
            LeadItem::Llm { .. } => "Added {count} AI-analyzed keywords to category \"{category}\"",
            LeadItem::Query { .. } => "Added {count} queries to category \"{category}\"",
        }
    }
}

/// A batch of items saved under one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadBatch {
    pub category: String,
    /// "DataForSEO", "search console", or the LLM model id
    pub source: String,
    /// Page or site the items were derived from
    pub url: String,
    pub items: Vec<LeadItem>,
    /// Overrides the per-kind default; `{count}` and `{category}` are substituted
    #[serde(default)]
    pub log_message: Option<String>,
}

impl LeadBatch {
    /// Reject batches that must never reach the sheet
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::InvalidInput("Category name is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(Error::InvalidInput(
                "At least one item must be selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Category label as written to the sheet
    pub fn category(&self) -> &str {
        self.category.trim()
    }

    /// Rows shaped `[category, field, field, source, url]`
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let category = self.category();
        self.items
            .iter()
            .map(|item| {
                let [a, b] = item.fields();
                vec![json!(category), a, b, json!(self.source), json!(self.url)]
            })
            .collect()
    }

    pub fn log_message(&self) -> String {
        let template = match (&self.log_message, self.items.first()) {
            (Some(custom), _) if !custom.trim().is_empty() => custom.as_str(),
            (_, Some(item)) => item.default_log_template(),
            (_, None) => "Added {count} rows to category \"{category}\"",
        };
        format_log_message(template, self.items.len(), self.category())
    }
}

/// Substitute `{count}` and `{category}` in an audit template
pub fn format_log_message(template: &str, count: usize, category: &str) -> String {
    template
        .replace("{count}", &count.to_string())
        .replace("{category}", category)
}

// ========================================
// Insertion planning
// ========================================

/// 1-indexed sheet row at which a block for `category` should be written
///
/// `labels` is the full first column of the lead tab as read back from the
/// sheet, header included, so `labels[0]` is row 1.
///
/// A hit is only honoured when its index is strictly greater than zero: a
/// label equal to the category in row 1 falls through to an end-of-sheet
/// append. An empty column is treated as header-only.
pub fn insertion_row(labels: &[String], category: &str) -> usize {
    let last_row = labels.len().max(1);

    match labels.iter().rposition(|label| label == category) {
        Some(index) if index > 0 => index + 2,
        _ => last_row + 1,
    }
}

/// A1 reference of the first cell of a block on the lead tab
pub fn lead_gen_anchor(row: usize) -> String {
    format!("{}!A{}", LEAD_GEN_SHEET, row)
}

// ========================================
// Audit log
// ========================================

/// One audit log row. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

impl LogEntry {
    /// Entry stamped with the server's local time, e.g. `3/14/2025, 9:05:12 AM`
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
            message: message.into(),
        }
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![json!(self.timestamp), json!(self.message)]
    }
}

// ========================================
// Sheet creation
// ========================================

/// Title of a newly created lead spreadsheet
pub fn lead_sheet_title(guest_name: &str) -> String {
    format!("{} Lead List & Bookings", guest_name.trim())
}

/// Guest names may hold letters, digits, spaces, apostrophes and hyphens
pub fn validate_guest_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Guest name is required".to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == ' ' || c == '\'' || c == '-';
    if !name.chars().all(allowed) {
        return Err(Error::InvalidInput(
            "Guest name contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Layout of one tab in a new lead spreadsheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabSpec {
    pub title: &'static str,
    pub headers: &'static [&'static str],
}

impl TabSpec {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// A1 range covering the header row, e.g. `Lead Gen!A1:E1`
    pub fn header_range(&self) -> String {
        format!("{}!A1:{}1", self.title, column_letter(self.column_count()))
    }
}

/// Tabs of a lead spreadsheet in creation order
pub const LEAD_SHEET_TABS: [TabSpec; 3] = [
    TabSpec {
        title: BOOKINGS_SHEET,
        headers: &BOOKINGS_HEADERS,
    },
    TabSpec {
        title: LEAD_GEN_SHEET,
        headers: &LEAD_GEN_HEADERS,
    },
    TabSpec {
        title: LOGS_SHEET,
        headers: &LOGS_HEADERS,
    },
];

/// Spreadsheet column letter for a 1-based column number (1 → A, 27 → AA)
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_category_appends_after_last_row() {
        let existing = labels(&["Categories", "Fitness", "Fitness", "Travel"]);
        assert_eq!(insertion_row(&existing, "Cooking"), 5);
    }

    #[test]
    fn test_header_only_sheet_starts_at_row_two() {
        assert_eq!(insertion_row(&labels(&["Categories"]), "Fitness"), 2);
    }

    #[test]
    fn test_empty_column_is_treated_as_header_only() {
        assert_eq!(insertion_row(&[], "Fitness"), 2);
    }

    #[test]
    fn test_existing_category_inserts_below_its_last_row() {
        // rows: 1 header, 2-3 Fitness, 4-5 Travel
        let existing = labels(&["Categories", "Fitness", "Fitness", "Travel", "Travel"]);
        assert_eq!(insertion_row(&existing, "Fitness"), 4);
        assert_eq!(insertion_row(&existing, "Travel"), 6);
    }

    #[test]
    fn test_match_in_first_data_row() {
        let existing = labels(&["Categories", "Fitness", "Travel"]);
        assert_eq!(insertion_row(&existing, "Fitness"), 3);
    }

    #[test]
    fn test_match_at_index_zero_falls_through_to_append() {
        // Quirk kept on purpose: index 0 never counts as a hit.
        let existing = labels(&["Categories", "Travel", "Travel"]);
        assert_eq!(insertion_row(&existing, "Categories"), 4);
    }

    #[test]
    fn test_rows_are_shaped_category_fields_source_url() {
        let batch = LeadBatch {
            category: "  Fitness ".to_string(),
            source: "DataForSEO".to_string(),
            url: "https://example.com".to_string(),
            items: vec![LeadItem::Keyword {
                keyword: "yoga mats".to_string(),
                search_volume: 1200,
            }],
            log_message: None,
        };

        assert_eq!(
            batch.rows(),
            vec![vec![
                json!("Fitness"),
                json!("yoga mats"),
                json!(1200),
                json!("DataForSEO"),
                json!("https://example.com"),
            ]]
        );
    }

    #[test]
    fn test_llm_items_are_lowercased_with_zero_volume() {
        let item = LeadItem::Llm {
            keyword: "Trail Running".to_string(),
        };
        assert_eq!(item.fields(), [json!("trail running"), json!(0)]);
    }

    #[test]
    fn test_item_deserialization_uses_kind_tag() {
        let items: Vec<LeadItem> = serde_json::from_value(json!([
            {"kind": "keyword", "keyword": "a", "searchVolume": 5},
            {"kind": "llm", "keyword": "b"},
            {"kind": "query", "query": "c", "impressions": 7}
        ]))
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(
            items[2],
            LeadItem::Query {
                query: "c".to_string(),
                impressions: 7
            }
        );
    }

    #[test]
    fn test_log_message_defaults_per_kind() {
        let mut batch = LeadBatch {
            category: "Fitness".to_string(),
            source: "search console".to_string(),
            url: "https://example.com".to_string(),
            items: vec![
                LeadItem::Query {
                    query: "a".to_string(),
                    impressions: 1,
                },
                LeadItem::Query {
                    query: "b".to_string(),
                    impressions: 2,
                },
            ],
            log_message: None,
        };
        assert_eq!(batch.log_message(), "Added 2 queries to category \"Fitness\"");

        batch.log_message = Some("Saved {count} for {category}".to_string());
        assert_eq!(batch.log_message(), "Saved 2 for Fitness");
    }

    #[test]
    fn test_batch_validation() {
        let mut batch = LeadBatch {
            category: " ".to_string(),
            source: "DataForSEO".to_string(),
            url: String::new(),
            items: vec![],
            log_message: None,
        };
        assert!(matches!(batch.validate(), Err(Error::InvalidInput(m)) if m == "Category name is required"));

        batch.category = "Fitness".to_string();
        assert!(matches!(batch.validate(), Err(Error::InvalidInput(m)) if m == "At least one item must be selected"));
    }

    #[test]
    fn test_session_without_sheet() {
        let ctx = SessionContext::default();
        assert!(matches!(ctx.active_sheet(), Err(Error::NotFound(_))));

        let ctx = SessionContext::with_sheet(SheetRef::new("S1", "Jane Lead List & Bookings"));
        assert_eq!(ctx.active_sheet().unwrap().id, "S1");
    }

    #[test]
    fn test_guest_name_validation() {
        assert!(validate_guest_name("Jane O'Neil-Smith 2").is_ok());
        assert!(validate_guest_name("").is_err());
        assert!(validate_guest_name("Jane; DROP").is_err());
    }

    #[test]
    fn test_header_ranges() {
        assert_eq!(LEAD_SHEET_TABS[0].header_range(), "Bookings!A1:M1");
        assert_eq!(LEAD_SHEET_TABS[1].header_range(), "Lead Gen!A1:E1");
        assert_eq!(LEAD_SHEET_TABS[2].header_range(), "Logs!A1:B1");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn test_log_entry_row() {
        let entry = LogEntry::now("Sheet created");
        let row = entry.to_row();
        assert_eq!(row[1], json!("Sheet created"));
        assert!(!entry.timestamp.is_empty());
    }
}
