//! Normalization of human-entered rupiah amounts.
//!
//! Accepted notations include `Rp 1.000.000`, `Rp1,000,000`,
//! `Rp. 1.000.000,00`, `IDR 1.000.000`, `1000000`, and the shorthand
//! forms `1jt`, `1,5jt`, `2rb`, `1.5M`. Fractions are truncated.
//!
//! The separator heuristic is ambiguous for inputs such as `1,234` (read as
//! one thousand two hundred thirty-four) and that is accepted.

use regex::Regex;
use std::sync::LazyLock;

static CURRENCY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:rp\.?|idr)\s*").expect("valid regex"));

static SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<coef>\d[\d.,]*)\s*(?P<unit>jt|j|rb|r|m)$").expect("valid regex")
});

/// Parses `input` into a non-negative whole rupiah amount.
///
/// Returns `None` when nothing numeric remains after normalization or the
/// value does not fit in a `u64`.
pub fn normalize_amount(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let stripped = CURRENCY_PREFIX.replace(trimmed, "");
    let token = stripped.trim();

    if let Some(caps) = SHORTHAND.captures(token) {
        let multiplier: u128 = match caps["unit"].to_ascii_lowercase().as_str() {
            "jt" | "j" => 1_000_000,
            "rb" | "r" => 1_000,
            _ => 1_000_000_000,
        };
        return scale_coefficient(&caps["coef"], multiplier);
    }

    let digits: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let canonical = resolve_separators(&digits);
    let whole = canonical.split('.').next().unwrap_or_default();
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    whole.parse().ok()
}

/// Multiplies a shorthand coefficient such as `1,5` by `multiplier` without
/// going through floating point. The last separator is the decimal mark;
/// earlier separators are dropped.
fn scale_coefficient(coef: &str, multiplier: u128) -> Option<u64> {
    let (int_part, frac_part) = match coef.rfind(['.', ',']) {
        Some(pos) => (&coef[..pos], &coef[pos + 1..]),
        None => (coef, ""),
    };
    let int_digits: String = int_part.chars().filter(char::is_ascii_digit).collect();
    let int_value: u128 = if int_digits.is_empty() {
        0
    } else {
        int_digits.parse().ok()?
    };

    let mut value = int_value.checked_mul(multiplier)?;
    if !frac_part.is_empty() {
        // Digits beyond the multiplier's precision cannot change the whole part.
        let precision = multiplier.ilog10() as usize;
        let kept = &frac_part[..frac_part.len().min(precision)];
        let frac_value: u128 = kept.parse().ok()?;
        let scale = 10u128.pow(kept.len() as u32);
        value = value.checked_add(frac_value * multiplier / scale)?;
    }
    u64::try_from(value).ok()
}

/// Rewrites `.`/`,` so that at most one `.` remains, acting as the decimal
/// mark.
fn resolve_separators(digits: &str) -> String {
    let has_dot = digits.contains('.');
    let has_comma = digits.contains(',');

    if has_dot && has_comma {
        // 1.000.000,00
        return digits.replace('.', "").replacen(',', ".", 1);
    }
    if has_dot {
        return if is_grouping(digits, '.') {
            digits.replace('.', "")
        } else {
            digits.to_string()
        };
    }
    if has_comma {
        return if is_grouping(digits, ',') {
            digits.replace(',', "")
        } else {
            digits.replacen(',', ".", 1)
        };
    }
    digits.to_string()
}

fn is_grouping(digits: &str, sep: char) -> bool {
    let groups: Vec<&str> = digits.split(sep).collect();
    groups.len() > 2 || groups.last().is_some_and(|g| g.len() == 3)
}

/// Formats an amount with `.` thousand separators, e.g. `Rp 1.500.000`.
pub fn format_rupiah(amount: u64) -> String {
    format!("Rp {}", group_thousands(amount))
}

fn group_thousands(amount: u64) -> String {
    let raw = amount.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_units() {
        assert_eq!(normalize_amount("1.5jt"), Some(1_500_000));
        assert_eq!(normalize_amount("1,5jt"), Some(1_500_000));
        assert_eq!(normalize_amount("2rb"), Some(2_000));
        assert_eq!(normalize_amount("2r"), Some(2_000));
        assert_eq!(normalize_amount("1M"), Some(1_000_000_000));
        assert_eq!(normalize_amount("1.25m"), Some(1_250_000_000));
        assert_eq!(normalize_amount("3J"), Some(3_000_000));
    }

    #[test]
    fn shorthand_is_exact_for_decimal_fractions() {
        assert_eq!(normalize_amount("1.1jt"), Some(1_100_000));
        assert_eq!(normalize_amount("0,3rb"), Some(300));
        assert_eq!(normalize_amount("1.2345rb"), Some(1_234));
    }

    #[test]
    fn shorthand_with_several_separators_keeps_the_last_as_decimal() {
        assert_eq!(normalize_amount("1.000,5rb"), Some(1_000_500));
    }

    #[test]
    fn currency_prefixes_are_stripped() {
        assert_eq!(normalize_amount("Rp 1.000.000"), Some(1_000_000));
        assert_eq!(normalize_amount("Rp1.000.000"), Some(1_000_000));
        assert_eq!(normalize_amount("Rp. 1.000.000"), Some(1_000_000));
        assert_eq!(normalize_amount("IDR 1.000.000"), Some(1_000_000));
        assert_eq!(normalize_amount("rp 2jt"), Some(2_000_000));
    }

    #[test]
    fn separator_disambiguation() {
        assert_eq!(normalize_amount("1.000.000,00"), Some(1_000_000));
        assert_eq!(normalize_amount("1,000,000"), Some(1_000_000));
        assert_eq!(normalize_amount("1,234"), Some(1_234));
        assert_eq!(normalize_amount("1.234"), Some(1_234));
        assert_eq!(normalize_amount("12,5"), Some(12));
        assert_eq!(normalize_amount("12.50"), Some(12));
        assert_eq!(normalize_amount("1000000"), Some(1_000_000));
    }

    #[test]
    fn rejects_non_numeric() {
        assert_eq!(normalize_amount(""), None);
        assert_eq!(normalize_amount("Rp"), None);
        assert_eq!(normalize_amount("abc"), None);
        assert_eq!(normalize_amount(".5"), None);
    }

    #[test]
    fn formats_with_dots() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(999), "Rp 999");
        assert_eq!(format_rupiah(1_500_000), "Rp 1.500.000");
        assert_eq!(format_rupiah(12_345_678), "Rp 12.345.678");
    }
}
