//! `/pelunasan` and `/pelunasanmassal`.

use super::{
    CommandKind, INVOICE_LABEL, LABEL_LIKE, ParseError, VA_LABEL, content_lines, labeled,
    starts_with_command,
};
use super::transaction::{LABEL_INVOICE, LABEL_VA};

/// Reported when no identifier could be found at all.
pub const LABEL_ANY_IDENTIFIER: &str = "Nomor Invoice/VA";

/// Parses a single settlement. The identifier comes from a `No. INV:` or
/// `No. VA:` line, or else from the first line that is not a `Label:` line.
pub fn parse_single(text: &str) -> Option<Result<String, ParseError>> {
    if !starts_with_command(text, CommandKind::Settlement.token()) {
        return None;
    }

    let mut invoice: Option<String> = None;
    let mut missing: Vec<String> = Vec::new();
    let mut note_missing = |label: &str| {
        if !missing.iter().any(|m| m == label) {
            missing.push(label.to_string());
        }
    };

    for line in content_lines(text).into_iter().skip(1) {
        if let Some(value) = labeled(line, &INVOICE_LABEL) {
            if value.is_empty() {
                note_missing(LABEL_INVOICE);
            } else {
                invoice = Some(value.to_string());
            }
        } else if let Some(value) = labeled(line, &VA_LABEL) {
            if value.is_empty() {
                note_missing(LABEL_VA);
            } else {
                invoice = Some(value.to_string());
            }
        } else if invoice.is_none() && !LABEL_LIKE.is_match(line) {
            invoice = Some(line.to_string());
        }
    }

    if invoice.is_none() {
        note_missing(LABEL_ANY_IDENTIFIER);
    }
    match invoice {
        Some(invoice) if missing.is_empty() => Some(Ok(invoice)),
        _ => Some(Err(ParseError::fields(CommandKind::Settlement, missing))),
    }
}

/// Parses a batch settlement: one identifier per line, bare or labeled.
/// Order is preserved and repeats are kept.
pub fn parse_batch(text: &str) -> Option<Result<Vec<String>, ParseError>> {
    if !starts_with_command(text, CommandKind::BatchSettlement.token()) {
        return None;
    }

    let mut invoices = Vec::new();
    for line in content_lines(text).into_iter().skip(1) {
        let value = labeled(line, &INVOICE_LABEL)
            .or_else(|| labeled(line, &VA_LABEL))
            .or_else(|| (!LABEL_LIKE.is_match(line)).then_some(line));
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            invoices.push(value.to_string());
        }
    }

    if invoices.is_empty() {
        Some(Err(ParseError::NoInvoices))
    } else {
        Some(Ok(invoices))
    }
}
