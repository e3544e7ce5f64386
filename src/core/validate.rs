//! Field validators for the transaction-entry commands.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use super::amount::normalize_amount;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid regex"));

/// Reasons a date token is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    /// Not in `D/M/YYYY` or `DD/MM/YYYY` form.
    Format,
    /// Day outside 1-31.
    DayOutOfRange,
    /// Month outside 1-12.
    MonthOutOfRange,
    /// Year before 2000.
    YearTooEarly,
    /// The day does not exist in that month and year.
    NotOnCalendar,
}

impl std::fmt::Display for DateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateError::Format => write!(f, "Format tanggal harus DD/MM/YYYY"),
            DateError::DayOutOfRange => write!(f, "Tanggal harus antara 1-31"),
            DateError::MonthOutOfRange => write!(f, "Bulan harus antara 1-12"),
            DateError::YearTooEarly => write!(f, "Tahun tidak valid (harus >= 2000)"),
            DateError::NotOnCalendar => write!(f, "Tanggal tidak valid untuk bulan yang dipilih"),
        }
    }
}

impl std::error::Error for DateError {}

/// Reasons an amount token is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Nothing was entered.
    Empty,
    /// The normalizer could not produce a number.
    Unparseable,
    /// The amount normalized to zero.
    NotPositive,
}

impl std::fmt::Display for AmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmountError::Empty => write!(f, "Nominal tidak boleh kosong"),
            AmountError::Unparseable => write!(f, "Format nominal tidak valid"),
            AmountError::NotPositive => write!(f, "Nominal harus lebih dari 0"),
        }
    }
}

impl std::error::Error for AmountError {}

/// Validates a `D/M/YYYY` token and returns the calendar date it names.
pub fn validate_date(token: &str) -> Result<NaiveDate, DateError> {
    let token = token.trim();
    if !DATE_SHAPE.is_match(token) {
        return Err(DateError::Format);
    }
    let mut parts = token.split('/').map(|p| p.parse::<u32>());
    let (Some(Ok(day)), Some(Ok(month)), Some(Ok(year))) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(DateError::Format);
    };

    if !(1..=31).contains(&day) {
        return Err(DateError::DayOutOfRange);
    }
    if !(1..=12).contains(&month) {
        return Err(DateError::MonthOutOfRange);
    }
    if year < 2000 {
        return Err(DateError::YearTooEarly);
    }

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or(DateError::NotOnCalendar)?;
    // Reconstructed components must round-trip.
    if date.day() != day || date.month() != month || date.year() != year as i32 {
        return Err(DateError::NotOnCalendar);
    }
    Ok(date)
}

/// Validates an amount token, returning the positive whole amount.
pub fn validate_amount(token: &str) -> Result<u64, AmountError> {
    if token.trim().is_empty() {
        return Err(AmountError::Empty);
    }
    match normalize_amount(token) {
        None => Err(AmountError::Unparseable),
        Some(0) => Err(AmountError::NotPositive),
        Some(value) => Ok(value),
    }
}
