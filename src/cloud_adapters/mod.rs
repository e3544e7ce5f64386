//! Adapters for the external stores the bot writes to: the spreadsheet
//! holding each group's ledger and the folder holding attachments.

pub mod auth;
pub mod drive;
pub mod file;
pub mod google_sheets4;
pub mod retry;

pub use drive::{AttachmentStore, GoogleDriveStore, MemoryAttachmentStore, UploadError};
pub use file::{FileAdapter, FolderAttachmentStore};
pub use retry::RetryingService;

use std::collections::HashMap;

/// Represents errors that can occur when interacting with a spreadsheet
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetError {
    /// The requested sheet does not exist.
    SheetNotFound,
    /// The requested row does not exist.
    RowNotFound,
    /// A failure that may succeed when retried (network, 5xx, token refresh).
    Transient(String),
    /// A failure that will not go away by retrying.
    Permanent(String),
}

impl SpreadsheetError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpreadsheetError::Transient(_))
    }
}

impl std::fmt::Display for SpreadsheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadsheetError::SheetNotFound => write!(f, "sheet not found"),
            SpreadsheetError::RowNotFound => write!(f, "row not found"),
            SpreadsheetError::Transient(msg) => write!(f, "transient error: {msg}"),
            SpreadsheetError::Permanent(msg) => write!(f, "permanent error: {msg}"),
        }
    }
}

impl std::error::Error for SpreadsheetError {}

/// Abstraction over cloud spreadsheet services.
///
/// Row numbers are 1-based, matching what a spreadsheet user sees; row 1 is
/// normally the header.
pub trait CloudSpreadsheetService {
    /// Appends a row and returns the row number it landed on.
    fn append_row(&mut self, sheet_id: &str, values: Vec<String>)
    -> Result<usize, SpreadsheetError>;
    /// Reads a specific row from the spreadsheet.
    fn read_row(&self, sheet_id: &str, row: usize) -> Result<Vec<String>, SpreadsheetError>;
    /// Lists all rows from the spreadsheet, header included.
    fn list_rows(&self, sheet_id: &str) -> Result<Vec<Vec<String>>, SpreadsheetError>;
    /// Overwrites an existing row.
    fn update_row(
        &mut self,
        sheet_id: &str,
        row: usize,
        values: Vec<String>,
    ) -> Result<(), SpreadsheetError>;
}

/// In-memory spreadsheet used by tests and dry runs.
#[derive(Default)]
pub struct MemorySheetsAdapter {
    sheets: HashMap<String, Vec<Vec<String>>>,
}

impl MemorySheetsAdapter {
    /// Creates an adapter without any sheets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty sheet under `sheet_id`, replacing any existing one.
    pub fn add_sheet(&mut self, sheet_id: impl Into<String>) {
        self.sheets.insert(sheet_id.into(), Vec::new());
    }

    /// Registers a sheet whose first row is `header`.
    pub fn add_sheet_with_header(&mut self, sheet_id: impl Into<String>, header: &[&str]) {
        self.sheets.insert(
            sheet_id.into(),
            vec![header.iter().map(|h| h.to_string()).collect()],
        );
    }

    /// Number of rows currently in `sheet_id`, header included.
    pub fn row_count(&self, sheet_id: &str) -> usize {
        self.sheets.get(sheet_id).map_or(0, Vec::len)
    }
}

impl CloudSpreadsheetService for MemorySheetsAdapter {
    fn append_row(
        &mut self,
        sheet_id: &str,
        values: Vec<String>,
    ) -> Result<usize, SpreadsheetError> {
        match self.sheets.get_mut(sheet_id) {
            Some(rows) => {
                rows.push(values);
                Ok(rows.len())
            }
            None => Err(SpreadsheetError::SheetNotFound),
        }
    }

    fn read_row(&self, sheet_id: &str, row: usize) -> Result<Vec<String>, SpreadsheetError> {
        let rows = self
            .sheets
            .get(sheet_id)
            .ok_or(SpreadsheetError::SheetNotFound)?;
        row.checked_sub(1)
            .and_then(|i| rows.get(i))
            .cloned()
            .ok_or(SpreadsheetError::RowNotFound)
    }

    fn list_rows(&self, sheet_id: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        match self.sheets.get(sheet_id) {
            Some(rows) => Ok(rows.clone()),
            None => Err(SpreadsheetError::SheetNotFound),
        }
    }

    fn update_row(
        &mut self,
        sheet_id: &str,
        row: usize,
        values: Vec<String>,
    ) -> Result<(), SpreadsheetError> {
        let rows = self
            .sheets
            .get_mut(sheet_id)
            .ok_or(SpreadsheetError::SheetNotFound)?;
        let slot = row
            .checked_sub(1)
            .and_then(|i| rows.get_mut(i))
            .ok_or(SpreadsheetError::RowNotFound)?;
        *slot = values;
        Ok(())
    }
}
