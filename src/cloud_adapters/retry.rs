use std::cell::RefCell;
use std::thread::sleep;
use std::time::Duration;

use tracing::warn;

use super::{CloudSpreadsheetService, SpreadsheetError};

/// Spreadsheet service wrapper that retries transient failures.
///
/// The first retry waits `base_delay`; each further retry doubles it, up to
/// `max_retries` retries.
pub struct RetryingService<S> {
    inner: RefCell<S>,
    max_retries: u32,
    base_delay: Duration,
}

impl<S> RetryingService<S> {
    pub fn new(inner: S, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner: RefCell::new(inner),
            max_retries,
            base_delay,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    fn with_retry<T, F>(&self, what: &str, mut op: F) -> Result<T, SpreadsheetError>
    where
        F: FnMut(&mut S) -> Result<T, SpreadsheetError>,
    {
        let mut attempt = 0;
        loop {
            let result = op(&mut self.inner.borrow_mut());
            match result {
                Ok(val) => return Ok(val),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(operation = what, attempt = attempt + 1, error = %e, ?delay, "Retrying spreadsheet call");
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<S: CloudSpreadsheetService> CloudSpreadsheetService for RetryingService<S> {
    fn append_row(
        &mut self,
        sheet_id: &str,
        values: Vec<String>,
    ) -> Result<usize, SpreadsheetError> {
        self.with_retry("append_row", |inner| {
            inner.append_row(sheet_id, values.clone())
        })
    }

    fn read_row(&self, sheet_id: &str, row: usize) -> Result<Vec<String>, SpreadsheetError> {
        self.with_retry("read_row", |inner| inner.read_row(sheet_id, row))
    }

    fn list_rows(&self, sheet_id: &str) -> Result<Vec<Vec<String>>, SpreadsheetError> {
        self.with_retry("list_rows", |inner| inner.list_rows(sheet_id))
    }

    fn update_row(
        &mut self,
        sheet_id: &str,
        row: usize,
        values: Vec<String>,
    ) -> Result<(), SpreadsheetError> {
        self.with_retry("update_row", |inner| {
            inner.update_row(sheet_id, row, values.clone())
        })
    }
}
