//! Shared parsing utilities for statistical API rows.
//!
//! Numeric fields arrive as strings with thousands separators (`"1,234"`),
//! occasionally with a fractional part, and `"null"`/`"-"`/empty for
//! missing values. Currency fields are reported in units of 10,000.

use crate::SourceError;

/// Multiplier turning a reported currency figure into currency units.
pub const CURRENCY_UNIT: i64 = 10_000;

/// Returns `true` if a row's district code and name are usable: both
/// non-empty and not the literal `"null"`.
#[must_use]
pub fn is_valid_district(code: &str, name: &str) -> bool {
    is_present(code) && is_present(name)
}

fn is_present(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
}

/// Parses a count or figure, stripping thousands separators and
/// whitespace. Fractional values are rounded to the nearest integer.
///
/// Returns `Ok(None)` for missing values (empty, `"null"`, `"-"`).
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the value is not numeric.
pub fn parse_number(field: &'static str, raw: &str) -> Result<Option<i64>, SourceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() || cleaned == "-" || cleaned.eq_ignore_ascii_case("null") {
        return Ok(None);
    }

    if let Ok(value) = cleaned.parse::<i64>() {
        return Ok(Some(value));
    }

    match cleaned.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(value) if value.is_finite() && value.abs() < 9.0e15 => Ok(Some(value.round() as i64)),
        _ => Err(SourceError::Parse {
            field,
            value: raw.to_string(),
        }),
    }
}

/// Parses a currency figure reported in units of 10,000 and converts it
/// to currency units.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the value is not numeric or the
/// converted amount overflows.
pub fn parse_currency(field: &'static str, raw: &str) -> Result<Option<i64>, SourceError> {
    parse_number(field, raw)?
        .map(|v| {
            v.checked_mul(CURRENCY_UNIT).ok_or_else(|| SourceError::Parse {
                field,
                value: raw.to_string(),
            })
        })
        .transpose()
}
