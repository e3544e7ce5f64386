//! The ledger table: its 16-column row contract and the store port the
//! reconciler is written against.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{InvoiceStatus, TransactionType};
use crate::cloud_adapters::{CloudSpreadsheetService, SpreadsheetError};

/// Column headers in sheet order (A..P).
pub const COLUMNS: [&str; 16] = [
    "Tanggal",
    "Jenis Transaksi",
    "No. Invoice",
    "Keterangan",
    "Supplier",
    "Customer",
    "Nominal",
    "No. Rekening",
    "Nama Rekening",
    "Status",
    "Lampiran",
    "Bukti Transfer",
    "Waktu input",
    "Waktu update",
    "Pengirim",
    "IsIklan",
];

/// Label shown for attachment links.
pub const ATTACHMENT_LABEL: &str = "Lihat Lampiran";
/// Label shown for proof-of-transfer links.
pub const PROOF_LABEL: &str = "Bukti Transfer";

static DATE_FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^=DATE\(\s*(\d{4})\s*[,;]\s*(\d{1,2})\s*[,;]\s*(\d{1,2})\s*\)$")
        .expect("valid regex")
});

/// One data row of the ledger, as stored.
///
/// Cells are kept in the form the store returned them (formulas included) so
/// that rewriting a row leaves untouched columns as they were.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerRow {
    /// 1-based sheet row number. Ignored when appending.
    pub row: usize,
    pub date: String,
    pub kind: Option<TransactionType>,
    pub invoice_number: String,
    pub description: String,
    pub supplier: String,
    pub customer: String,
    pub amount: u64,
    pub account_number: String,
    pub account_holder: String,
    pub status: Option<InvoiceStatus>,
    pub attachment: String,
    pub proof: String,
    pub input_stamp: String,
    pub update_stamp: String,
    pub submitter: String,
    pub is_advertisement: bool,
}

impl LedgerRow {
    /// Builds a row from raw cells. Short rows are padded with blanks.
    pub fn from_cells(row: usize, cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).map(|c| c.trim().to_string()).unwrap_or_default();
        Self {
            row,
            date: cell(0),
            kind: TransactionType::from_cell(&cell(1)),
            invoice_number: cell(2),
            description: cell(3),
            supplier: cell(4),
            customer: cell(5),
            amount: amount_cell(row, &cell(6)),
            account_number: cell(7),
            account_holder: cell(8),
            status: InvoiceStatus::from_cell(&cell(9)),
            attachment: cell(10),
            proof: cell(11),
            input_stamp: cell(12),
            update_stamp: cell(13),
            submitter: cell(14),
            is_advertisement: matches!(cell(15).as_str(), "1" | "TRUE" | "true"),
        }
    }

    /// Renders the row as the 16 cells written to the store.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
            self.invoice_number.clone(),
            self.description.clone(),
            self.supplier.clone(),
            self.customer.clone(),
            self.amount.to_string(),
            self.account_number.clone(),
            self.account_holder.clone(),
            self.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
            self.attachment.clone(),
            self.proof.clone(),
            self.input_stamp.clone(),
            self.update_stamp.clone(),
            self.submitter.clone(),
            if self.is_advertisement { "1" } else { "0" }.to_string(),
        ]
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == Some(TransactionType::Purchase)
    }

    /// Whether this row carries `invoice` (trimmed, case-sensitive).
    pub fn matches_invoice(&self, invoice: &str) -> bool {
        !self.invoice_number.is_empty() && self.invoice_number == invoice.trim()
    }
}

/// Reads the amount column. Unreadable cells count as zero and are logged.
fn amount_cell(row: usize, raw: &str) -> u64 {
    if raw.is_empty() {
        return 0;
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.parse() {
        Ok(amount) => amount,
        Err(e) => {
            warn!(row, cell = raw, error = %e, "Unreadable amount cell");
            0
        }
    }
}

/// Builds a `=HYPERLINK("url";"label")` cell. Blank for an empty URL.
pub fn hyperlink(url: &str, label: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    format!("=HYPERLINK(\"{}\";\"{label}\")", url.replace('"', "\"\""))
}

/// Cell value for a calendar date. ISO form is unambiguous for the store's
/// parser regardless of spreadsheet locale.
pub fn date_cell(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Renders a date cell as `DD-MM-YYYY`. Accepts ISO dates, `D/M/YYYY` and
/// `=DATE(y,m,d)` formulas; anything else is returned unchanged.
pub fn display_sheet_date(cell: &str) -> String {
    let cell = cell.trim();
    let parsed = NaiveDate::parse_from_str(cell, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(cell, "%d/%m/%Y"))
        .ok()
        .or_else(|| {
            let caps = DATE_FORMULA.captures(cell)?;
            NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )
        });
    match parsed {
        Some(date) => date.format("%d-%m-%Y").to_string(),
        None => cell.to_string(),
    }
}

/// Port over the ledger table. The reconciler only ever talks to this.
pub trait LedgerStore {
    /// Snapshot of every data row, in sheet order.
    fn rows(&self) -> Result<Vec<LedgerRow>, SpreadsheetError>;
    /// Appends `row` and returns its 1-based row number.
    fn append(&mut self, row: &LedgerRow) -> Result<usize, SpreadsheetError>;
    /// Overwrites the stored row at `row.row`.
    fn update_row(&mut self, row: &LedgerRow) -> Result<(), SpreadsheetError>;

    /// First row carrying `invoice`, of any transaction type.
    fn find_by_invoice(&self, invoice: &str) -> Result<Option<LedgerRow>, SpreadsheetError> {
        Ok(self.rows()?.into_iter().find(|r| r.matches_invoice(invoice)))
    }

    /// First purchase row carrying `invoice`.
    fn find_purchase_by_invoice(
        &self,
        invoice: &str,
    ) -> Result<Option<LedgerRow>, SpreadsheetError> {
        Ok(self
            .rows()?
            .into_iter()
            .find(|r| r.is_purchase() && r.matches_invoice(invoice)))
    }
}

/// [`LedgerStore`] backed by one spreadsheet of a [`CloudSpreadsheetService`].
///
/// Sheet row 1 is the header and never surfaces as a [`LedgerRow`].
pub struct SheetLedger<'a, S: CloudSpreadsheetService + ?Sized> {
    service: &'a mut S,
    sheet_id: &'a str,
}

impl<'a, S: CloudSpreadsheetService + ?Sized> SheetLedger<'a, S> {
    pub fn new(service: &'a mut S, sheet_id: &'a str) -> Self {
        Self { service, sheet_id }
    }
}

impl<S: CloudSpreadsheetService + ?Sized> LedgerStore for SheetLedger<'_, S> {
    fn rows(&self) -> Result<Vec<LedgerRow>, SpreadsheetError> {
        let raw = self.service.list_rows(self.sheet_id)?;
        Ok(raw
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| LedgerRow::from_cells(i + 1, cells))
            .collect())
    }

    fn append(&mut self, row: &LedgerRow) -> Result<usize, SpreadsheetError> {
        let number = self.service.append_row(self.sheet_id, row.to_cells())?;
        debug!(sheet_id = self.sheet_id, row = number, invoice = %row.invoice_number, "Appended ledger row");
        Ok(number)
    }

    fn update_row(&mut self, row: &LedgerRow) -> Result<(), SpreadsheetError> {
        if row.row < 2 {
            return Err(SpreadsheetError::RowNotFound);
        }
        self.service
            .update_row(self.sheet_id, row.row, row.to_cells())?;
        debug!(sheet_id = self.sheet_id, row = row.row, invoice = %row.invoice_number, "Updated ledger row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud_adapters::MemorySheetsAdapter;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn reads_status_from_status_column() {
        let row = LedgerRow::from_cells(
            2,
            &cells(&[
                "2024-06-01", "Pembelian", "PB-1", "Bahan", "Toko A", "", "1500000", "", "", "Lunas",
            ]),
        );
        assert_eq!(row.status, Some(InvoiceStatus::Paid));
        assert_eq!(row.kind, Some(TransactionType::Purchase));
        assert_eq!(row.amount, 1_500_000);
        assert!(!row.is_advertisement);
        assert_eq!(row.to_cells().len(), COLUMNS.len());
    }

    #[test]
    fn formatted_amount_cells_are_read_as_digits() {
        let row = LedgerRow::from_cells(3, &cells(&["", "", "", "", "", "", "Rp 2.000"]));
        assert_eq!(row.amount, 2_000);
    }

    #[test]
    fn unreadable_amount_cells_count_as_zero() {
        for raw in ["n/a", "99999999999999999999999", ""] {
            let row = LedgerRow::from_cells(4, &cells(&["", "", "", "", "", "", raw]));
            assert_eq!(row.amount, 0, "cell {raw:?}");
        }
    }

    #[test]
    fn hyperlink_escapes_quotes() {
        assert_eq!(
            hyperlink("https://x/a\"b", PROOF_LABEL),
            "=HYPERLINK(\"https://x/a\"\"b\";\"Bukti Transfer\")"
        );
        assert_eq!(hyperlink("", ATTACHMENT_LABEL), "");
    }

    #[test]
    fn displays_sheet_dates() {
        assert_eq!(display_sheet_date("2024-06-01"), "01-06-2024");
        assert_eq!(display_sheet_date("1/6/2024"), "01-06-2024");
        assert_eq!(display_sheet_date("=DATE(2024,6,1)"), "01-06-2024");
        assert_eq!(display_sheet_date("kemarin"), "kemarin");
    }

    #[test]
    fn sheet_ledger_skips_header_and_numbers_rows() {
        let mut sheets = MemorySheetsAdapter::new();
        sheets.add_sheet_with_header("s", &COLUMNS);
        let mut ledger = SheetLedger::new(&mut sheets, "s");
        let row = LedgerRow {
            invoice_number: "INV-1".into(),
            kind: Some(TransactionType::Sale),
            ..LedgerRow::default()
        };
        assert_eq!(ledger.append(&row).unwrap(), 2);
        let rows = ledger.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 2);
        assert!(ledger.find_by_invoice(" INV-1 ").unwrap().is_some());
        assert!(ledger.find_by_invoice("inv-1").unwrap().is_none());
        assert!(ledger.find_purchase_by_invoice("INV-1").unwrap().is_none());
    }
}
