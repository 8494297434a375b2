use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::schema::ColumnKind;

/// A coerced spreadsheet cell. `None` at the row level is the designated
/// "empty" sentinel that lets validators skip legitimately blank cells.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(f) => format_amount(*f),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Parses a monetary cell, normalizing the localized comma decimal
/// separator to a period first. Unparseable input yields `None` so the
/// semantic validator decides whether missingness is tolerated.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    normalized.parse::<f64>().ok()
}

/// Parses a date cell with the schema's declared day/month/year format.
pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, format).ok()
}

/// Lenient date parsing for collaborator sheets (availability calendar,
/// expense ledger) whose exports are not format-stable.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    // Datetime exports carry a time component; the date prefix is enough.
    let date_part = trimmed.split_whitespace().next().unwrap_or(trimmed);
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(date_part, fmt) {
            return Some(parsed);
        }
    }
    None
}

/// Coerces one raw cell according to its declared column kind.
pub fn coerce_cell(raw: &str, kind: &ColumnKind) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match kind {
        ColumnKind::String => Some(Value::String(trimmed.to_string())),
        ColumnKind::Numeric { .. } => parse_decimal(trimmed).map(Value::Float),
        ColumnKind::Date { format } => parse_date(trimmed, format).map(Value::Date),
    }
}

/// Coerces a projected row positionally against the required column kinds.
pub fn coerce_row(raw: &[String], kinds: &[ColumnKind]) -> Result<Vec<Option<Value>>> {
    if raw.len() != kinds.len() {
        return Err(anyhow!(
            "cannot coerce row with {} cell(s) against {} column(s)",
            raw.len(),
            kinds.len()
        ));
    }
    Ok(raw
        .iter()
        .zip(kinds.iter())
        .map(|(cell, kind)| coerce_cell(cell, kind))
        .collect())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders a monetary figure the way the canonical CSV expects it: two
/// decimals at most, no long float tail for whole amounts.
pub fn format_amount(value: f64) -> String {
    let rounded = round2(value);
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        let text = format!("{:.2}", rounded);
        text.trim_end_matches('0').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decimal_normalizes_comma_separator() {
        assert_eq!(parse_decimal("1234,56"), Some(1234.56));
        assert_eq!(parse_decimal("1234.56"), Some(1234.56));
        assert_eq!(parse_decimal(" -3,5 "), Some(-3.5));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn parse_date_honours_declared_format() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_date("01/03/2024", "%d/%m/%Y"), Some(expected));
        assert_eq!(parse_date("2024-03-01", "%d/%m/%Y"), None);
        assert_eq!(parse_date("", "%d/%m/%Y"), None);
    }

    #[test]
    fn parse_date_lenient_accepts_datetime_suffix() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_date_lenient("2024-05-06 00:00:00"), Some(expected));
        assert_eq!(parse_date_lenient("06/05/2024"), Some(expected));
    }

    #[test]
    fn coerce_cell_uses_empty_sentinel() {
        let numeric = ColumnKind::Numeric {
            can_be_negative: false,
        };
        assert_eq!(coerce_cell("  ", &numeric), None);
        assert_eq!(coerce_cell("12,5", &numeric), Some(Value::Float(12.5)));
        // Unparseable numerics stay missing rather than erroring here.
        assert_eq!(coerce_cell("abc", &numeric), None);
    }

    #[test]
    fn format_amount_trims_trailing_zeroes() {
        assert_eq!(format_amount(950.0), "950.0");
        assert_eq!(format_amount(81.9672131), "81.97");
        assert_eq!(format_amount(100.10), "100.1");
    }
}
