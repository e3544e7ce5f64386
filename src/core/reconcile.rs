//! Invoice lifecycle rules applied against a [`LedgerStore`].
//!
//! Per invoice the states are `NonExistent -> Unpaid -> Paid` for purchases
//! and the terminal `Sold` for sales. Every precondition is a read followed
//! by a separate write; two submissions racing on the same invoice can both
//! pass the check. The store offers no transaction to close that window.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use super::ledger::{ATTACHMENT_LABEL, LedgerRow, LedgerStore, PROOF_LABEL, date_cell, hyperlink};
use super::time::audit_stamp;
use super::{InvoiceStatus, TransactionKind, TransactionRecord};
use crate::cloud_adapters::SpreadsheetError;

/// Broad class of a [`ReconcileError`], used to pick the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Conflict,
    NotFound,
    TransientIo,
}

/// Why a ledger operation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The invoice already exists at `row`.
    Duplicate { invoice: String, row: usize },
    NotFound { invoice: String },
    /// Only purchases can be settled.
    NotPurchase { invoice: String, row: usize },
    AlreadySettled { invoice: String, row: usize },
    /// At least one batch entry failed validation; nothing was written.
    BatchRejected(Vec<(String, BatchIssue)>),
    /// No paid purchase carries this VA.
    AdvertisementNotPaid { invoice: String },
    /// The ledger store failed.
    Store(SpreadsheetError),
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Duplicate { .. }
            | ReconcileError::NotPurchase { .. }
            | ReconcileError::AlreadySettled { .. }
            | ReconcileError::BatchRejected(_) => ErrorClass::Conflict,
            ReconcileError::NotFound { .. } | ReconcileError::AdvertisementNotPaid { .. } => {
                ErrorClass::NotFound
            }
            ReconcileError::Store(_) => ErrorClass::TransientIo,
        }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Duplicate { invoice, row } => {
                write!(f, "invoice {invoice} already exists at row {row}")
            }
            ReconcileError::NotFound { invoice } => write!(f, "invoice {invoice} not found"),
            ReconcileError::NotPurchase { invoice, row } => {
                write!(f, "invoice {invoice} at row {row} is not a purchase")
            }
            ReconcileError::AlreadySettled { invoice, row } => {
                write!(f, "invoice {invoice} at row {row} is already settled")
            }
            ReconcileError::BatchRejected(issues) => {
                write!(f, "batch rejected: {} invalid entries", issues.len())
            }
            ReconcileError::AdvertisementNotPaid { invoice } => {
                write!(f, "no paid advertisement with VA {invoice}")
            }
            ReconcileError::Store(e) => write!(f, "ledger store error: {e}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SpreadsheetError> for ReconcileError {
    fn from(e: SpreadsheetError) -> Self {
        ReconcileError::Store(e)
    }
}

/// Why a batch entry cannot be settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchIssue {
    NotFound,
    NotPurchase,
    AlreadyPaid,
    /// The entry's supplier differs from the first valid entry's.
    SupplierMismatch { supplier: String, expected: String },
}

impl std::fmt::Display for BatchIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchIssue::NotFound => write!(f, "tidak ditemukan"),
            BatchIssue::NotPurchase => write!(f, "bukan transaksi pembelian"),
            BatchIssue::AlreadyPaid => write!(f, "sudah lunas"),
            BatchIssue::SupplierMismatch { supplier, expected } => {
                write!(f, "supplier {supplier} berbeda dengan {expected}")
            }
        }
    }
}

/// Classification of one batch identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntry {
    Valid {
        invoice: String,
        row: usize,
        supplier: String,
        amount: u64,
    },
    Invalid {
        invoice: String,
        issue: BatchIssue,
    },
}

/// Result of the validation phase of a batch settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchValidation {
    /// One entry per input identifier, in input order.
    pub entries: Vec<BatchEntry>,
    /// Supplier fixed by the first valid entry.
    pub supplier: Option<String>,
}

impl BatchValidation {
    /// True when no entry is invalid.
    pub fn is_clean(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e, BatchEntry::Valid { .. }))
    }

    pub fn invalid(&self) -> Vec<(String, BatchIssue)> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                BatchEntry::Invalid { invoice, issue } => Some((invoice.clone(), issue.clone())),
                BatchEntry::Valid { .. } => None,
            })
            .collect()
    }

    pub fn valid_invoices(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                BatchEntry::Valid { invoice, .. } => Some(invoice.clone()),
                BatchEntry::Invalid { .. } => None,
            })
            .collect()
    }

    pub fn total_amount(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e {
                BatchEntry::Valid { amount, .. } => *amount,
                BatchEntry::Invalid { .. } => 0,
            })
            .sum()
    }
}

/// Result of the commit phase. Per-item failures land in a bucket instead of
/// aborting the remaining items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub settled: Vec<LedgerRow>,
    pub not_found: Vec<String>,
    pub already_paid: Vec<String>,
    /// Invoice and the store error that stopped it.
    pub failed: Vec<(String, String)>,
}

impl BatchOutcome {
    pub fn settled_amount(&self) -> u64 {
        self.settled.iter().map(|r| r.amount).sum()
    }
}

/// Applies the invoice lifecycle to a ledger.
pub struct Reconciler<L> {
    store: L,
    tz: Tz,
}

impl<L: LedgerStore> Reconciler<L> {
    /// `tz` is the zone audit stamps are rendered in.
    pub fn new(store: L, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub fn store(&self) -> &L {
        &self.store
    }

    pub fn into_inner(self) -> L {
        self.store
    }

    /// Fails with [`ReconcileError::Duplicate`] if `invoice` exists anywhere in
    /// the ledger.
    pub fn ensure_unique(&self, invoice: &str) -> Result<(), ReconcileError> {
        match self.store.find_by_invoice(invoice)? {
            Some(existing) => Err(ReconcileError::Duplicate {
                invoice: invoice.trim().to_string(),
                row: existing.row,
            }),
            None => Ok(()),
        }
    }

    /// Appends `record` as a new row and returns its row number.
    pub fn create(&mut self, record: &TransactionRecord) -> Result<usize, ReconcileError> {
        self.ensure_unique(&record.invoice_number)?;

        let (status, update_stamp) = match record.kind {
            TransactionKind::Sale => (InvoiceStatus::Sold, "-".to_string()),
            TransactionKind::Purchase | TransactionKind::Advertisement => {
                (InvoiceStatus::Unpaid, String::new())
            }
        };
        let row = LedgerRow {
            row: 0,
            date: date_cell(record.date),
            kind: Some(record.kind.ledger_type()),
            invoice_number: record.invoice_number.trim().to_string(),
            description: record.description.clone(),
            supplier: record.supplier.clone(),
            customer: record.customer.clone(),
            amount: record.amount,
            account_number: record.account_number.clone(),
            account_holder: record.account_holder.clone(),
            status: Some(status),
            attachment: hyperlink(&record.attachment_url, ATTACHMENT_LABEL),
            proof: String::new(),
            input_stamp: audit_stamp(&record.submitter, record.submitted_at, self.tz),
            update_stamp,
            submitter: record.submitter.clone(),
            is_advertisement: record.is_advertisement(),
        };
        let number = self.store.append(&row)?;
        info!(
            invoice = %row.invoice_number,
            row = number,
            submitter = %record.submitter,
            status = %status,
            "Recorded transaction"
        );
        Ok(number)
    }

    /// Checks that `invoice` is an unpaid purchase and returns its row.
    pub fn check_settleable(&self, invoice: &str) -> Result<LedgerRow, ReconcileError> {
        let invoice = invoice.trim();
        let row = self
            .store
            .find_by_invoice(invoice)?
            .ok_or_else(|| ReconcileError::NotFound {
                invoice: invoice.to_string(),
            })?;
        if !row.is_purchase() {
            return Err(ReconcileError::NotPurchase {
                invoice: invoice.to_string(),
                row: row.row,
            });
        }
        if row.status == Some(InvoiceStatus::Paid) {
            return Err(ReconcileError::AlreadySettled {
                invoice: invoice.to_string(),
                row: row.row,
            });
        }
        Ok(row)
    }

    /// Marks `invoice` as paid, linking `proof_url` and stamping `settler`.
    /// Creation-time columns are written back unchanged.
    pub fn settle(
        &mut self,
        invoice: &str,
        proof_url: &str,
        settler: &str,
        settled_at: DateTime<Utc>,
    ) -> Result<LedgerRow, ReconcileError> {
        let mut row = self.check_settleable(invoice)?;
        self.mark_paid(&mut row, proof_url, settler, settled_at)?;
        info!(invoice = %row.invoice_number, row = row.row, settler, "Settled invoice");
        Ok(row)
    }

    fn mark_paid(
        &mut self,
        row: &mut LedgerRow,
        proof_url: &str,
        settler: &str,
        settled_at: DateTime<Utc>,
    ) -> Result<(), SpreadsheetError> {
        row.status = Some(InvoiceStatus::Paid);
        row.proof = hyperlink(proof_url, PROOF_LABEL);
        row.update_stamp = audit_stamp(settler, settled_at, self.tz);
        self.store.update_row(row)
    }

    /// First phase of a batch settlement: classifies every identifier against
    /// one snapshot of the ledger. Writes nothing.
    pub fn validate_batch(&self, invoices: &[String]) -> Result<BatchValidation, ReconcileError> {
        let rows = self.store.rows()?;
        let mut validation = BatchValidation::default();

        for invoice in invoices {
            let invoice = invoice.trim().to_string();
            let purchase = rows
                .iter()
                .find(|r| r.is_purchase() && r.matches_invoice(&invoice));
            let issue = match purchase {
                None if rows.iter().any(|r| r.matches_invoice(&invoice)) => {
                    Some(BatchIssue::NotPurchase)
                }
                None => Some(BatchIssue::NotFound),
                Some(row) if row.status == Some(InvoiceStatus::Paid) => {
                    Some(BatchIssue::AlreadyPaid)
                }
                Some(row) => match &validation.supplier {
                    Some(expected) if *expected != row.supplier => {
                        Some(BatchIssue::SupplierMismatch {
                            supplier: row.supplier.clone(),
                            expected: expected.clone(),
                        })
                    }
                    _ => None,
                },
            };

            let entry = match (issue, purchase) {
                (Some(issue), _) => BatchEntry::Invalid { invoice, issue },
                (None, Some(row)) => {
                    validation
                        .supplier
                        .get_or_insert_with(|| row.supplier.clone());
                    BatchEntry::Valid {
                        invoice,
                        row: row.row,
                        supplier: row.supplier.clone(),
                        amount: row.amount,
                    }
                }
                (None, None) => BatchEntry::Invalid {
                    invoice,
                    issue: BatchIssue::NotFound,
                },
            };
            validation.entries.push(entry);
        }
        Ok(validation)
    }

    /// Second phase of a batch settlement: re-resolves and settles each
    /// invoice independently. The ledger may have changed since validation,
    /// so this is best effort, not atomic.
    pub fn commit_batch(
        &mut self,
        invoices: &[String],
        proof_url: &str,
        settler: &str,
        settled_at: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for invoice in invoices {
            let invoice = invoice.trim();
            let found = match self.store.find_purchase_by_invoice(invoice) {
                Ok(found) => found,
                Err(e) => {
                    warn!(invoice, error = %e, "Batch lookup failed");
                    outcome.failed.push((invoice.to_string(), e.to_string()));
                    continue;
                }
            };
            let Some(mut row) = found else {
                outcome.not_found.push(invoice.to_string());
                continue;
            };
            if row.status == Some(InvoiceStatus::Paid) {
                outcome.already_paid.push(invoice.to_string());
                continue;
            }
            match self.mark_paid(&mut row, proof_url, settler, settled_at) {
                Ok(()) => outcome.settled.push(row),
                Err(e) => {
                    warn!(invoice, error = %e, "Batch settlement write failed");
                    outcome.failed.push((invoice.to_string(), e.to_string()));
                }
            }
        }
        info!(
            settler,
            settled = outcome.settled.len(),
            not_found = outcome.not_found.len(),
            already_paid = outcome.already_paid.len(),
            failed = outcome.failed.len(),
            "Committed batch settlement"
        );
        outcome
    }

    /// Both phases back to back. Any invalid entry rejects the whole batch
    /// before a single row is touched.
    pub fn settle_batch(
        &mut self,
        invoices: &[String],
        proof_url: &str,
        settler: &str,
        settled_at: DateTime<Utc>,
    ) -> Result<BatchOutcome, ReconcileError> {
        let validation = self.validate_batch(invoices)?;
        if !validation.is_clean() {
            return Err(ReconcileError::BatchRejected(validation.invalid()));
        }
        Ok(self.commit_batch(&validation.valid_invoices(), proof_url, settler, settled_at))
    }

    /// Finds a paid row for `invoice` whose description mentions "iklan" or
    /// that is a purchase. In practice any paid purchase qualifies.
    pub fn find_paid_advertisement(
        &self,
        invoice: &str,
    ) -> Result<Option<LedgerRow>, ReconcileError> {
        let invoice = invoice.trim();
        Ok(self.store.rows()?.into_iter().find(|r| {
            r.matches_invoice(invoice)
                && r.status == Some(InvoiceStatus::Paid)
                && (r.description.to_lowercase().contains("iklan") || r.is_purchase())
        }))
    }

    /// Links the advertisement's invoice document in the attachment column.
    /// Settlement columns are left as they are.
    pub fn attach_advertisement_invoice(
        &mut self,
        invoice: &str,
        url: &str,
    ) -> Result<LedgerRow, ReconcileError> {
        let mut row =
            self.find_paid_advertisement(invoice)?
                .ok_or_else(|| ReconcileError::AdvertisementNotPaid {
                    invoice: invoice.trim().to_string(),
                })?;
        row.attachment = hyperlink(url, ATTACHMENT_LABEL);
        self.store.update_row(&row)?;
        info!(invoice = %row.invoice_number, row = row.row, "Attached advertisement invoice");
        Ok(row)
    }
}
