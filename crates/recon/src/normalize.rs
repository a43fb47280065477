//! Raw collaborator values → [`NormalizedValue`].
//!
//! Parsing is lenient: anything that does not read as a number after
//! cleanup becomes `Absent`. Scraped input is unreliable and one bad cell
//! must not abort a run.

use crate::config::NumberLocale;
use crate::model::{NormalizedValue, RawValue};

const CURRENCY_GLYPHS: [char; 4] = ['₺', '$', '€', '£'];
const CURRENCY_CODE: &str = "TL";
const EMPTY_SENTINELS: [&str; 3] = ["-", "–", "—"];

/// Normalize using the source systems' default locale.
pub fn normalize(raw: &RawValue) -> NormalizedValue {
    normalize_with(raw, &NumberLocale::default())
}

pub fn normalize_with(raw: &RawValue, locale: &NumberLocale) -> NormalizedValue {
    match raw {
        RawValue::Number(v) => NormalizedValue::from(Some(*v)),
        RawValue::Text(s) => NormalizedValue::from(parse_locale_number(s, locale)),
        RawValue::Absent => NormalizedValue::Absent,
    }
}

/// Parse a locale-formatted number such as `"₺12.450,00"` or `"%12,4"`.
pub fn parse_locale_number(text: &str, locale: &NumberLocale) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || EMPTY_SENTINELS.contains(&trimmed) {
        return None;
    }

    let mut s: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%' && !CURRENCY_GLYPHS.contains(c))
        .collect();
    s = strip_currency_code(&s).to_string();

    // "1.250,00-" is how some panels render a trailing sign placeholder
    if s.len() > 1 && s.ends_with('-') {
        s.pop();
    }

    let mut cleaned = String::with_capacity(s.len());
    let mut seen_decimal = false;
    for c in s.chars() {
        if c == locale.thousands {
            continue;
        }
        if c == locale.decimal && !seen_decimal {
            cleaned.push('.');
            seen_decimal = true;
            continue;
        }
        cleaned.push(c);
    }

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn strip_currency_code(s: &str) -> &str {
    let len = CURRENCY_CODE.len();
    if s.len() > len && s.is_char_boundary(s.len() - len) {
        let (head, tail) = s.split_at(s.len() - len);
        if tail.eq_ignore_ascii_case(CURRENCY_CODE) {
            return head;
        }
    }
    if s.len() > len && s.is_char_boundary(len) {
        let (head, tail) = s.split_at(len);
        if head.eq_ignore_ascii_case(CURRENCY_CODE) {
            return tail;
        }
    }
    s
}
