//! Core bookkeeping logic: amounts, validation, the ledger port and the
//! invoice lifecycle rules enforced against it.

pub mod amount;
pub mod ledger;
pub mod pending;
pub mod rate_limit;
pub mod reconcile;
pub mod scheduler;
pub mod time;
pub mod validate;

pub use amount::{format_rupiah, normalize_amount};
pub use ledger::{LedgerRow, LedgerStore, SheetLedger};
pub use pending::{PendingInvoice, PendingInvoiceGroup, PendingReport};
pub use rate_limit::SlidingWindowGuard;
pub use reconcile::{
    BatchEntry, BatchIssue, BatchOutcome, BatchValidation, ReconcileError, Reconciler,
};
pub use scheduler::NotificationSchedule;
pub use validate::{AmountError, DateError, validate_amount, validate_date};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// What a submitted command describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Sale,
    Purchase,
    /// Ad spend; persisted as a purchase with the advertisement flag set.
    Advertisement,
}

impl TransactionKind {
    /// The ledger transaction type this kind is stored as.
    pub fn ledger_type(self) -> TransactionType {
        match self {
            TransactionKind::Sale => TransactionType::Sale,
            TransactionKind::Purchase | TransactionKind::Advertisement => {
                TransactionType::Purchase
            }
        }
    }

    pub fn is_advertisement(self) -> bool {
        self == TransactionKind::Advertisement
    }
}

/// Value of the `Jenis Transaksi` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Sale,
    Purchase,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Sale => "Penjualan",
            TransactionType::Purchase => "Pembelian",
        }
    }

    /// Case-insensitive parse of a ledger cell.
    pub fn from_cell(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if cell.eq_ignore_ascii_case("Penjualan") {
            Some(TransactionType::Sale)
        } else if cell.eq_ignore_ascii_case("Pembelian") {
            Some(TransactionType::Purchase)
        } else {
            None
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of the `Status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    /// Terminal state of a sale.
    Sold,
    Unpaid,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Sold => "Terjual",
            InvoiceStatus::Unpaid => "Belum Lunas",
            InvoiceStatus::Paid => "Lunas",
        }
    }

    pub fn from_cell(cell: &str) -> Option<Self> {
        match cell.trim() {
            "Terjual" => Some(InvoiceStatus::Sold),
            "Belum Lunas" => Some(InvoiceStatus::Unpaid),
            "Lunas" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed and validated transaction, ready to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub description: String,
    /// Populated for sales only.
    pub customer: String,
    /// Populated for purchases and advertisements only.
    pub supplier: String,
    pub amount: u64,
    pub account_number: String,
    pub account_holder: String,
    /// Empty until the attachment has been uploaded.
    pub attachment_url: String,
    pub submitter: String,
    pub submitted_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    pub fn is_advertisement(&self) -> bool {
        self.kind.is_advertisement()
    }

    /// Customer for sales, supplier otherwise.
    pub fn counterparty(&self) -> &str {
        match self.kind {
            TransactionKind::Sale => &self.customer,
            _ => &self.supplier,
        }
    }
}
