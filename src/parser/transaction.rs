//! `/penjualan`, `/pembelian` and `/iklan`.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::{CommandKind, INVOICE_LABEL, ParseError, VA_LABEL, content_lines, labeled, starts_with_command};
use crate::core::validate::{validate_amount, validate_date};
use crate::core::{TransactionKind, TransactionRecord};

static DATE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Tanggal|Date)\s*:").expect("valid regex"));
static DESCRIPTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Keterangan|Description)\s*:").expect("valid regex"));
static CUSTOMER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Customer\s*:").expect("valid regex"));
static SUPPLIER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Supplier\s*:").expect("valid regex"));
static AMOUNT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:Nominal|Amount)\s*:").expect("valid regex"));
// "Nama Rekening Penerima:", "Nama Rekening:"
static HOLDER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Nama\s+Rekening(?:\s+[^:]*)?:").expect("valid regex"));
// "No. Rekening Tujuan:", "No Rekening:", "Rekening Penerima:"
static ACCOUNT_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:No\.?\s*)?Rekening(?:\s+[^:]*)?:").expect("valid regex")
});

/// Field labels as reported in [`ParseError::Fields`].
pub const LABEL_DATE: &str = "Tanggal";
pub const LABEL_INVOICE: &str = "No. INV";
pub const LABEL_VA: &str = "No. VA";
pub const LABEL_DESCRIPTION: &str = "Keterangan";
pub const LABEL_CUSTOMER: &str = "Customer";
pub const LABEL_SUPPLIER: &str = "Supplier";
pub const LABEL_AMOUNT: &str = "Nominal";

/// A transaction as entered, before submitter and attachment are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub invoice_number: String,
    pub description: String,
    /// Empty unless `kind` is a sale.
    pub customer: String,
    /// Empty when `kind` is a sale.
    pub supplier: String,
    pub amount: u64,
    pub account_number: String,
    pub account_holder: String,
}

impl TransactionDraft {
    pub fn is_advertisement(&self) -> bool {
        self.kind.is_advertisement()
    }

    pub fn counterparty(&self) -> &str {
        match self.kind {
            TransactionKind::Sale => &self.customer,
            _ => &self.supplier,
        }
    }

    pub fn into_record(
        self,
        submitter: impl Into<String>,
        submitted_at: DateTime<Utc>,
        attachment_url: impl Into<String>,
    ) -> TransactionRecord {
        TransactionRecord {
            kind: self.kind,
            date: self.date,
            invoice_number: self.invoice_number,
            description: self.description,
            customer: self.customer,
            supplier: self.supplier,
            amount: self.amount,
            account_number: self.account_number,
            account_holder: self.account_holder,
            attachment_url: attachment_url.into(),
            submitter: submitter.into(),
            submitted_at,
            settled_at: None,
        }
    }
}

/// A required field. Once a line for it has failed, a later good line does
/// not clear the failure.
struct Slot<T> {
    label: &'static str,
    value: Option<T>,
    failed: bool,
}

impl<T> Slot<T> {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            value: None,
            failed: false,
        }
    }

    fn accept(&mut self, value: T) {
        self.value = Some(value);
    }

    fn reject(&mut self) {
        self.failed = true;
    }

    fn is_missing(&self) -> bool {
        self.failed || self.value.is_none()
    }

    fn into_value(self) -> Option<T> {
        if self.failed { None } else { self.value }
    }
}

fn command_kind(kind: TransactionKind) -> CommandKind {
    match kind {
        TransactionKind::Sale => CommandKind::Sale,
        TransactionKind::Purchase => CommandKind::Purchase,
        TransactionKind::Advertisement => CommandKind::Advertisement,
    }
}

fn detect_kind(text: &str) -> Option<TransactionKind> {
    [
        TransactionKind::Sale,
        TransactionKind::Purchase,
        TransactionKind::Advertisement,
    ]
    .into_iter()
    .find(|kind| starts_with_command(text, command_kind(*kind).token()))
}

/// Parses a transaction-entry command.
pub fn parse(text: &str) -> Option<Result<TransactionDraft, ParseError>> {
    let kind = detect_kind(text)?;
    let is_sale = kind == TransactionKind::Sale;
    let is_ad = kind.is_advertisement();

    let mut date = Slot::new(LABEL_DATE);
    let mut invoice = Slot::new(if is_ad { LABEL_VA } else { LABEL_INVOICE });
    let mut description = Slot::new(LABEL_DESCRIPTION);
    let mut counterparty = Slot::new(if is_sale { LABEL_CUSTOMER } else { LABEL_SUPPLIER });
    let mut amount = Slot::new(LABEL_AMOUNT);
    let mut account_number = String::new();
    let mut account_holder = String::new();
    let mut error_messages = BTreeMap::new();

    for line in content_lines(text).into_iter().skip(1) {
        if let Some(value) = labeled(line, &DATE_LABEL) {
            if value.is_empty() {
                date.reject();
                continue;
            }
            match validate_date(value) {
                Ok(d) => date.accept(d),
                Err(e) => {
                    date.reject();
                    error_messages.insert(LABEL_DATE.to_string(), e.to_string());
                }
            }
        } else if let Some(value) = labeled(line, &INVOICE_LABEL) {
            if !is_ad {
                text_field(&mut invoice, value);
            }
        } else if let Some(value) = labeled(line, &VA_LABEL) {
            if is_ad {
                text_field(&mut invoice, value);
            }
        } else if let Some(value) = labeled(line, &DESCRIPTION_LABEL) {
            text_field(&mut description, value);
        } else if let Some(value) = labeled(line, &CUSTOMER_LABEL) {
            if is_sale {
                text_field(&mut counterparty, value);
            }
        } else if let Some(value) = labeled(line, &SUPPLIER_LABEL) {
            if !is_sale {
                text_field(&mut counterparty, value);
            }
        } else if let Some(value) = labeled(line, &AMOUNT_LABEL) {
            if value.is_empty() {
                amount.reject();
                continue;
            }
            match validate_amount(value) {
                Ok(a) => amount.accept(a),
                Err(e) => {
                    amount.reject();
                    error_messages.insert(LABEL_AMOUNT.to_string(), e.to_string());
                }
            }
        } else if let Some(value) = labeled(line, &HOLDER_LABEL) {
            account_holder = value.to_string();
        } else if let Some(value) = labeled(line, &ACCOUNT_LABEL) {
            account_number = value.to_string();
        }
    }

    let missing_fields: Vec<String> = [
        (date.label, date.is_missing()),
        (invoice.label, invoice.is_missing()),
        (description.label, description.is_missing()),
        (counterparty.label, counterparty.is_missing()),
        (amount.label, amount.is_missing()),
    ]
    .into_iter()
    .filter(|(_, missing)| *missing)
    .map(|(label, _)| label.to_string())
    .collect();

    let values = (
        date.into_value(),
        invoice.into_value(),
        description.into_value(),
        counterparty.into_value(),
        amount.into_value(),
    );
    match values {
        (Some(date), Some(invoice_number), Some(description), Some(counterparty), Some(amount))
            if missing_fields.is_empty() =>
        {
            let (customer, supplier) = if is_sale {
                (counterparty, String::new())
            } else {
                (String::new(), counterparty)
            };
            Some(Ok(TransactionDraft {
                kind,
                date,
                invoice_number,
                description,
                customer,
                supplier,
                amount,
                account_number,
                account_holder,
            }))
        }
        _ => Some(Err(ParseError::Fields {
            command: command_kind(kind),
            missing_fields,
            error_messages,
        })),
    }
}

fn text_field(slot: &mut Slot<String>, value: &str) {
    if value.is_empty() {
        slot.reject();
    } else {
        slot.accept(value.to_string());
    }
}
