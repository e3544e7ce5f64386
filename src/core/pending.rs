//! Unpaid-purchase summary per supplier.

use std::collections::BTreeMap;

use super::ledger::{LedgerRow, display_sheet_date};
use super::InvoiceStatus;

/// Bucket for rows without a supplier.
pub const UNKNOWN_SUPPLIER: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvoice {
    pub invoice_number: String,
    /// `DD-MM-YYYY` when the cell could be read as a date.
    pub date: String,
    pub amount: u64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInvoiceGroup {
    pub supplier: String,
    /// Taken from the first row seen for this supplier.
    pub account_number: String,
    pub account_holder: String,
    pub total_amount: u64,
    pub invoices: Vec<PendingInvoice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingReport {
    /// Sorted by supplier name, ascending.
    pub groups: Vec<PendingInvoiceGroup>,
    pub grand_total: u64,
    pub invoice_count: usize,
}

impl PendingReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Groups unpaid purchases in `rows` by supplier. Pure; the same snapshot
/// always yields the same report.
pub fn aggregate(rows: &[LedgerRow]) -> PendingReport {
    let mut by_supplier: BTreeMap<String, PendingInvoiceGroup> = BTreeMap::new();

    for row in rows
        .iter()
        .filter(|r| r.is_purchase() && r.status == Some(InvoiceStatus::Unpaid))
    {
        let supplier = if row.supplier.is_empty() {
            UNKNOWN_SUPPLIER.to_string()
        } else {
            row.supplier.clone()
        };
        let group = by_supplier
            .entry(supplier.clone())
            .or_insert_with(|| PendingInvoiceGroup {
                supplier,
                account_number: row.account_number.clone(),
                account_holder: row.account_holder.clone(),
                total_amount: 0,
                invoices: Vec::new(),
            });
        group.total_amount += row.amount;
        group.invoices.push(PendingInvoice {
            invoice_number: row.invoice_number.clone(),
            date: display_sheet_date(&row.date),
            amount: row.amount,
            description: row.description.clone(),
        });
    }

    let groups: Vec<PendingInvoiceGroup> = by_supplier.into_values().collect();
    PendingReport {
        grand_total: groups.iter().map(|g| g.total_amount).sum(),
        invoice_count: groups.iter().map(|g| g.invoices.len()).sum(),
        groups,
    }
}
