//! `/invoiceiklan`.
//!
//! The VA comes from a `No. VA:` line or, failing that, from the second line
//! of the message only. Other lines are not scanned for a bare identifier.

use super::transaction::LABEL_VA;
use super::{CommandKind, ParseError, VA_LABEL, content_lines, labeled, starts_with_command};

pub fn parse(text: &str) -> Option<Result<String, ParseError>> {
    if !starts_with_command(text, CommandKind::AdInvoice.token()) {
        return None;
    }

    let mut va: Option<String> = None;
    let mut failed = false;
    for (index, line) in content_lines(text).into_iter().enumerate().skip(1) {
        if let Some(value) = labeled(line, &VA_LABEL) {
            if value.is_empty() {
                failed = true;
            } else {
                va = Some(value.to_string());
            }
        } else if index == 1 && va.is_none() {
            va = Some(line.to_string());
        }
    }

    match va {
        Some(va) if !failed => Some(Ok(va)),
        _ => Some(Err(ParseError::fields(
            CommandKind::AdInvoice,
            vec![LABEL_VA.to_string()],
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_or_second_line() {
        assert_eq!(parse("/invoiceiklan\nNo. VA: 8800"), Some(Ok("8800".into())));
        assert_eq!(parse("/invoiceiklan\n8800"), Some(Ok("8800".into())));
    }

    #[test]
    fn third_line_is_not_scanned() {
        assert!(matches!(
            parse("/invoiceiklan\nNo. VA:\n8800"),
            Some(Err(ParseError::Fields { .. }))
        ));
        assert!(matches!(parse("/invoiceiklan"), Some(Err(_))));
        assert_eq!(parse("/iklan\n8800"), None);
    }
}
