//! Debtor context resolution.
//!
//! The subject of a call comes from a spreadsheet of debtors. The first row
//! whose `Call` column reads `true` (any case) is the person to call next.
//! Resolution never fails from the caller's point of view: any
//! [`ResolutionFailure`] is logged and replaced by [`DebtorRecord::fallback`].

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NAME_COLUMN: &str = "name";
const DEBT_COLUMN: &str = "outstanding debt";
const DUE_DATE_COLUMN: &str = "due date";
const CALL_COLUMN: &str = "call";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtorRecord {
    pub name: String,
    pub outstanding_debt: String,
    pub due_date: String,
}

impl DebtorRecord {
    pub fn new(
        name: impl Into<String>,
        outstanding_debt: impl Into<String>,
        due_date: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            outstanding_debt: outstanding_debt.into(),
            due_date: due_date.into(),
        }
    }

    /// Record used whenever no eligible debtor can be resolved.
    pub fn fallback() -> Self {
        Self::new("Spiderman", "50,000", "01/01/2025")
    }
}

/// A debtor row as read from the source, before eligibility is decided.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebtorRow {
    pub name: String,
    pub outstanding_debt: String,
    pub due_date: String,
    pub call: String,
}

impl DebtorRow {
    pub fn is_eligible(&self) -> bool {
        self.call.trim().eq_ignore_ascii_case("true")
    }
}

#[derive(Error, Debug)]
pub enum ResolutionFailure {
    #[error("No debtor source configured")]
    NoSource,

    #[error("Debtor lookup request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Debtor source rejected credentials ({code})")]
    Auth { code: u16 },

    #[error("Debtor source error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Debtor source returned no records")]
    EmptyDataSet,

    #[error("Debtor sheet has no '{0}' column")]
    MissingColumn(String),

    #[error("No debtor record is flagged for a call")]
    NoEligibleRecord,

    #[error("Invalid debtor source URL: {0}")]
    InvalidUrl(String),
}

/// Where debtor rows come from.
#[async_trait]
pub trait DebtorSource: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<DebtorRow>, ResolutionFailure>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// First eligible row, in source order.
pub fn select_eligible(rows: &[DebtorRow]) -> Result<DebtorRecord, ResolutionFailure> {
    if rows.is_empty() {
        return Err(ResolutionFailure::EmptyDataSet);
    }
    rows.iter()
        .find(|row| row.is_eligible())
        .map(|row| DebtorRecord::new(&row.name, &row.outstanding_debt, &row.due_date))
        .ok_or(ResolutionFailure::NoEligibleRecord)
}

// ============================================================================
// DebtorContextProvider
// ============================================================================

pub struct DebtorContextProvider {
    source: Option<Box<dyn DebtorSource>>,
}

impl DebtorContextProvider {
    pub fn new(source: Box<dyn DebtorSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A provider that always resolves to the fallback record.
    pub fn without_source() -> Self {
        Self { source: None }
    }

    pub fn source_name(&self) -> &str {
        self.source.as_deref().map_or("fallback", |s| s.name())
    }

    pub async fn try_resolve(&self) -> Result<DebtorRecord, ResolutionFailure> {
        let source = self.source.as_deref().ok_or(ResolutionFailure::NoSource)?;
        let rows = source.fetch_rows().await?;
        select_eligible(&rows)
    }

    pub async fn resolve(&self) -> DebtorRecord {
        or_fallback(self.try_resolve().await)
    }
}

/// Substitute the fallback record for a failed resolution.
pub fn or_fallback(result: Result<DebtorRecord, ResolutionFailure>) -> DebtorRecord {
    match result {
        Ok(record) => {
            tracing::info!(debtor = %record.name, "Resolved debtor context");
            record
        }
        Err(e) => {
            tracing::warn!(reason = %e, "Debtor resolution failed — using fallback record");
            DebtorRecord::fallback()
        }
    }
}

// ============================================================================
// SheetsDebtorSource
// ============================================================================

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub api_key: String,
    pub spreadsheet_id: String,
    pub range: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct SheetsErrorResponse {
    error: Option<SheetsErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SheetsErrorDetail {
    message: String,
}

/// Reads debtor rows from a spreadsheet through the Sheets values API.
#[derive(Debug, Clone)]
pub struct SheetsDebtorSource {
    client: Client,
    config: SheetsConfig,
    base_url: String,
}

impl SheetsDebtorSource {
    pub fn new(config: SheetsConfig) -> Result<Self, ResolutionFailure> {
        Self::with_base_url(config, "https://sheets.googleapis.com/v4".to_string())
    }

    pub fn with_base_url(config: SheetsConfig, base_url: String) -> Result<Self, ResolutionFailure> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/spreadsheets/{id}/values/{range}`, with id and range
    /// escaped as single path segments (a range may name a sheet like `Q1/Q2`).
    fn values_url(&self) -> Result<Url, ResolutionFailure> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| ResolutionFailure::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ResolutionFailure::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend([
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                self.config.range.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl DebtorSource for SheetsDebtorSource {
    async fn fetch_rows(&self) -> Result<Vec<DebtorRow>, ResolutionFailure> {
        let url = self.values_url()?;

        let response = self
            .client
            .get(url)
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ResolutionFailure::Auth {
                code: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SheetsErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(ResolutionFailure::Api {
                code: status.as_u16(),
                message,
            });
        }

        let range: ValueRange = response.json().await?;
        parse_rows(&range.values)
    }

    fn name(&self) -> &str {
        "sheets"
    }
}

/// Map a header row plus data rows onto [`DebtorRow`]s. Columns are matched
/// by trimmed, case-insensitive header name; short rows read as empty cells.
pub fn parse_rows(values: &[Vec<serde_json::Value>]) -> Result<Vec<DebtorRow>, ResolutionFailure> {
    let (header, data) = values.split_first().ok_or(ResolutionFailure::EmptyDataSet)?;

    let column = |name: &str| -> Result<usize, ResolutionFailure> {
        header
            .iter()
            .position(|h| cell_text(Some(h)).trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| ResolutionFailure::MissingColumn(name.to_string()))
    };
    let name_idx = column(NAME_COLUMN)?;
    let debt_idx = column(DEBT_COLUMN)?;
    let due_idx = column(DUE_DATE_COLUMN)?;
    let call_idx = column(CALL_COLUMN)?;

    Ok(data
        .iter()
        .map(|row| DebtorRow {
            name: cell_text(row.get(name_idx)),
            outstanding_debt: cell_text(row.get(debt_idx)),
            due_date: cell_text(row.get(due_idx)),
            call: cell_text(row.get(call_idx)),
        })
        .collect())
}

fn cell_text(cell: Option<&serde_json::Value>) -> String {
    match cell {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
