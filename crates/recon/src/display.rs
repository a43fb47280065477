//! Shared cell formatting for the text and HTML reports.

use crate::config::NumberLocale;
use crate::model::{ComparisonResult, NormalizedValue, Severity};

/// `12450.0` → `"12.450,00"` in the default locale; absence → `"-"`.
pub fn format_value(value: NormalizedValue, locale: &NumberLocale) -> String {
    match value {
        NormalizedValue::Number(v) => format_number(v, locale),
        NormalizedValue::Absent => "-".to_string(),
    }
}

pub fn format_number(v: f64, locale: &NumberLocale) -> String {
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(locale.thousands);
        }
        grouped.push(c);
    }

    let negative = v < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0');
    format!(
        "{}{grouped}{}{frac_part}",
        if negative { "-" } else { "" },
        locale.decimal
    )
}

pub fn format_deviation(deviation: Option<f64>) -> String {
    match deviation {
        Some(d) => format!("%{d:.2}"),
        None => "-".to_string(),
    }
}

/// Short pass/warn/fail marker for a result row.
pub fn status_marker(result: &ComparisonResult) -> &'static str {
    match (result.matched, result.severity) {
        (true, _) => "OK",
        (false, Severity::Warning) => "WARN",
        (false, _) => "FAIL",
    }
}
