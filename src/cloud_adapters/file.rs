use crate::cloud_adapters::drive::{AttachmentStore, MAX_ATTACHMENT_BYTES, UploadError};
use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Adapter that keeps each ledger in a local CSV file, `{sheet_id}.csv`
/// under `base_dir`. Useful for running the bot without Google access.
pub struct FileAdapter {
    base_dir: PathBuf,
}

impl FileAdapter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Creates `{sheet_id}.csv` with `header` as its first row unless the
    /// file already exists.
    pub fn ensure_sheet(&self, sheet_id: &str, header: &[&str]) -> Result<(), SpreadsheetError> {
        let path = self.sheet_path(sheet_id);
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|e| SpreadsheetError::Permanent(e.to_string()))?;
        wtr.write_record(header)
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        wtr.flush()
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))
    }

    fn sheet_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.csv"))
    }

    fn write_all(&self, sheet_id: &str, rows: &[Vec<String>]) -> Result<(), SpreadsheetError> {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(self.sheet_path(sheet_id))
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        for row in rows {
            wtr.write_record(row)
                .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        }
        wtr.flush()
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))
    }
}

/// Attachment store writing into `{base_dir}/{folder_id}/{name}`.
pub struct FolderAttachmentStore {
    base_dir: PathBuf,
}

impl FolderAttachmentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl AttachmentStore for FolderAttachmentStore {
    fn upload(
        &mut self,
        folder_id: &str,
        name: &str,
        _mime: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let size = bytes.len() as u64;
        if size > MAX_ATTACHMENT_BYTES {
            return Err(UploadError::TooLarge {
                size,
                limit: MAX_ATTACHMENT_BYTES,
            });
        }
        let folder = if folder_id.is_empty() {
            "attachments"
        } else {
            folder_id
        };
        let dir = self.base_dir.join(folder);
        std::fs::create_dir_all(&dir).map_err(|e| UploadError::Transient(e.to_string()))?;
        // Names come from user input; keep only the last path component.
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let path = dir.join(file_name);
        std::fs::write(&path, bytes).map_err(|e| UploadError::Transient(e.to_string()))?;
        debug!(path = %path.display(), size, "Stored attachment locally");
        Ok(format!("file://{}", path.display()))
    }
}

impl CloudSpreadsheetService for FileAdapter {
    fn append_row(
        &mut self,
        sheet_id: &str,
        values: Vec<String>,
    ) -> Result<usize, SpreadsheetError> {
        let count = self.list_rows(sheet_id)?.len();
        let file = std::fs::OpenOptions::new()
            .append(true)
            .open(self.sheet_path(sheet_id))
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        wtr.write_record(values)
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        wtr.flush()
            .map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        Ok(count + 1)
    }

    fn read_row(&self, sheet_id: &str, row: usize) -> Result<Vec<String>, SpreadsheetError> {
        let rows = self.list_rows(sheet_id)?;
        row.checked_sub(1)
            .and_then(|i| rows.into_iter().nth(i))
            .ok_or(SpreadsheetError::RowNotFound)
    }

    fn list_rows(&self, sheet_id: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        let path = self.sheet_path(sheet_id);
        if !path.exists() {
            return Err(SpreadsheetError::SheetNotFound);
        }
        let file =
            std::fs::File::open(&path).map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        let mut rows = Vec::new();
        for record in rdr.records() {
            let rec = record.map_err(|e| SpreadsheetError::Transient(e.to_string()))?;
            rows.push(rec.iter().map(|s| s.to_string()).collect());
        }
        Ok(rows)
    }

    fn update_row(
        &mut self,
        sheet_id: &str,
        row: usize,
        values: Vec<String>,
    ) -> Result<(), SpreadsheetError> {
        let mut rows = self.list_rows(sheet_id)?;
        let slot = row
            .checked_sub(1)
            .and_then(|i| rows.get_mut(i))
            .ok_or(SpreadsheetError::RowNotFound)?;
        *slot = values;
        self.write_all(sheet_id, &rows)
    }
}
