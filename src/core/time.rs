//! Audit timestamps rendered in the ledger's time zone.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Formats `at` as `DD/MM/YYYY HH.MM` in `tz`.
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%d/%m/%Y %H.%M").to_string()
}

/// Audit cell content: `"{actor} ({timestamp})"`.
pub fn audit_stamp(actor: &str, at: DateTime<Utc>, tz: Tz) -> String {
    format!("{actor} ({})", format_timestamp(at, tz))
}

/// Calendar date of `at` in `tz`.
pub fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}
