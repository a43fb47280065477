use crate::config::{NumberLocale, ToleranceTable, VerifyConfig};
use crate::model::{
    ComparisonResult, NormalizedValue, PairDelta, RawValue, Severity, SourceRole, ValueType,
};
use crate::normalize::normalize_with;

pub const ALL_MISSING_NOTE: &str = "all values null/missing";

/// Pairs in evaluation order. The first role is the deviation reference.
const PAIRS: [(SourceRole, SourceRole); 3] = [
    (SourceRole::Database, SourceRole::Frontend),
    (SourceRole::Database, SourceRole::Marketplace),
    (SourceRole::Frontend, SourceRole::Marketplace),
];

/// Compares one field across the three sources under a tolerance table.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    table: ToleranceTable,
    locale: NumberLocale,
}

impl Comparator {
    pub fn new(table: ToleranceTable, locale: NumberLocale) -> Self {
        Self { table, locale }
    }

    pub fn from_config(config: &VerifyConfig) -> Self {
        Self::new(config.tolerance.clone(), config.locale)
    }

    pub fn tolerances(&self) -> &ToleranceTable {
        &self.table
    }

    pub fn locale(&self) -> &NumberLocale {
        &self.locale
    }

    pub fn compare(
        &self,
        field: impl Into<String>,
        db: impl Into<RawValue>,
        frontend: impl Into<RawValue>,
        marketplace: impl Into<RawValue>,
        value_type: ValueType,
    ) -> ComparisonResult {
        let field = field.into();
        let db_value = normalize_with(&db.into(), &self.locale);
        let frontend_value = normalize_with(&frontend.into(), &self.locale);
        let marketplace_value = normalize_with(&marketplace.into(), &self.locale);

        let mut result = ComparisonResult {
            field,
            value_type,
            db_value,
            frontend_value,
            marketplace_value,
            matched: true,
            deviation: None,
            severity: Severity::Info,
            note: None,
            disagreements: Vec::new(),
        };

        if db_value.is_absent() && frontend_value.is_absent() && marketplace_value.is_absent() {
            result.note = Some(ALL_MISSING_NOTE.to_string());
            return result;
        }

        let rule = self.table.rule(value_type);
        let mut evaluated = 0;
        for (left, right) in PAIRS {
            let (NormalizedValue::Number(a), NormalizedValue::Number(b)) =
                (result.value(left), result.value(right))
            else {
                continue;
            };
            evaluated += 1;

            let diff = clamp_finite((a - b).abs());
            if !rule.exceeds(diff) {
                continue;
            }
            let deviation = deviation_pct(a, b);
            result.disagreements.push(PairDelta {
                left,
                right,
                diff,
                deviation,
                severity: rule.classify(diff, deviation),
            });
        }

        result.severity = result
            .disagreements
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(Severity::Info);
        result.matched = result.severity == Severity::Info;

        result.deviation = if evaluated == 0 {
            None
        } else if result.matched {
            Some(0.0)
        } else {
            let worst = result
                .disagreements
                .iter()
                .filter(|d| d.severity > Severity::Info)
                .map(|d| d.deviation)
                .fold(0.0_f64, f64::max);
            Some(round2(worst))
        };

        if !result.disagreements.is_empty() {
            result.note = Some(render_note(&result.disagreements));
        }

        if !result.matched {
            log::debug!(
                "{}: {} ({}) deviation {:?}, {}",
                result.field,
                result.severity,
                value_type,
                result.deviation,
                result.note.as_deref().unwrap_or_default(),
            );
        }

        result
    }

    /// Database vs frontend only; the marketplace is treated as absent.
    pub fn compare_two_way(
        &self,
        field: impl Into<String>,
        db: impl Into<RawValue>,
        frontend: impl Into<RawValue>,
        value_type: ValueType,
    ) -> ComparisonResult {
        self.compare(field, db, frontend, RawValue::Absent, value_type)
    }
}

/// Compare with the default tolerance table and locale.
pub fn compare(
    field: impl Into<String>,
    db: impl Into<RawValue>,
    frontend: impl Into<RawValue>,
    marketplace: impl Into<RawValue>,
    value_type: ValueType,
) -> ComparisonResult {
    Comparator::default().compare(field, db, frontend, marketplace, value_type)
}

pub fn compare_two_way(
    field: impl Into<String>,
    db: impl Into<RawValue>,
    frontend: impl Into<RawValue>,
    value_type: ValueType,
) -> ComparisonResult {
    Comparator::default().compare_two_way(field, db, frontend, value_type)
}

/// Relative deviation of `b` from `a`, in percent. Always finite.
pub fn deviation_pct(a: f64, b: f64) -> f64 {
    if a == 0.0 && b == 0.0 {
        0.0
    } else if a == 0.0 {
        100.0
    } else {
        clamp_finite(((b - a) / a).abs() * 100.0)
    }
}

/// JSON has no infinity; an overflowed gap is stored as `f64::MAX` so the
/// dump stays loadable.
fn clamp_finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        f64::MAX
    }
}

fn round2(v: f64) -> f64 {
    let scaled = (v * 100.0).round();
    if scaled.is_finite() {
        scaled / 100.0
    } else {
        v
    }
}

fn render_note(deltas: &[PairDelta]) -> String {
    deltas
        .iter()
        .map(|d| {
            let mut s = format!("{} vs {}: diff={:.2}", d.left.short(), d.right.short(), d.diff);
            if d.severity == Severity::Info {
                s.push_str(" (rounding)");
            }
            s
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: RawValue = RawValue::Absent;

    #[test]
    fn all_absent_is_trivial_match() {
        let r = compare("x", NONE, "", "-", ValueType::Count);
        assert!(r.matched);
        assert_eq!(r.severity, Severity::Info);
        assert_eq!(r.deviation, None);
        assert_eq!(r.note.as_deref(), Some(ALL_MISSING_NOTE));
    }

    #[test]
    fn count_requires_exact_equality() {
        let r = compare("x", 100, 100, 100, ValueType::Count);
        assert!(r.matched);
        assert_eq!(r.deviation, Some(0.0));

        let r = compare("x", 100, 100.001, 100, ValueType::Count);
        assert!(!r.matched);
        assert_eq!(r.severity, Severity::Critical);
    }

    #[test]
    fn money_tolerates_sub_unit_rounding() {
        let r = compare("x", 100, 100.001, 100, ValueType::Money);
        assert!(r.matched);
        assert_eq!(r.severity, Severity::Info);
    }

    #[test]
    fn revenue_within_kurus() {
        let r = compare("Bugun - Ciro", 12450.00, 12449.99, 12450.00, ValueType::Money);
        assert!(r.matched);
        assert_eq!(r.severity, Severity::Info);
        assert!(r.disagreements.is_empty());
    }

    #[test]
    fn order_count_off_by_one() {
        let r = compare("Siparis Sayisi", 45, 44, NONE, ValueType::Count);
        assert!(!r.matched);
        assert_eq!(r.severity, Severity::Critical);
        assert_eq!(r.deviation, Some(2.22));
        assert_eq!(r.note.as_deref(), Some("DB vs FE: diff=1.00"));
    }

    #[test]
    fn margin_gap_is_warning() {
        let r = compare("Kar Marji", 12.4, 12.6, NONE, ValueType::Percent);
        assert!(!r.matched);
        assert_eq!(r.severity, Severity::Warning);
        assert_eq!(r.deviation, Some(1.61));
    }

    #[test]
    fn margin_gap_beyond_one_point_is_critical() {
        let r = compare("Kar Marji", 12.4, 14.0, NONE, ValueType::Percent);
        assert_eq!(r.severity, Severity::Critical);
    }

    #[test]
    fn one_sided_presence_never_fails() {
        let r = compare("x", 50, NONE, NONE, ValueType::Money);
        assert!(r.matched);
        assert_eq!(r.severity, Severity::Info);
        assert_eq!(r.deviation, None);
        assert_eq!(r.note, None);
    }

    #[test]
    fn missing_marketplace_is_skipped() {
        let r = compare("x", "1.000,00", "₺1.000,00", "", ValueType::Money);
        assert!(r.matched);
        assert_eq!(r.deviation, Some(0.0));
        assert!(r.marketplace_value.is_absent());
    }

    #[test]
    fn money_small_relative_gap_is_rounding() {
        // 1.00 on 100k is 0.001%: outside the absolute tolerance but in the info band
        let r = compare("x", 100_000.0, 100_001.0, NONE, ValueType::Money);
        assert!(r.matched);
        assert_eq!(r.severity, Severity::Info);
        assert_eq!(r.disagreements.len(), 1);
        assert_eq!(r.note.as_deref(), Some("DB vs FE: diff=1.00 (rounding)"));
    }

    #[test]
    fn money_warning_and_critical_bands() {
        let warn = compare("x", 1000.0, 1005.0, NONE, ValueType::Money);
        assert_eq!(warn.severity, Severity::Warning);
        assert_eq!(warn.deviation, Some(0.5));

        let crit = compare("x", 1000.0, 1100.0, NONE, ValueType::Money);
        assert_eq!(crit.severity, Severity::Critical);
        assert_eq!(crit.deviation, Some(10.0));
    }

    #[test]
    fn zero_reference_is_full_deviation() {
        let r = compare("x", 0, 5, NONE, ValueType::Count);
        assert_eq!(r.deviation, Some(100.0));
        assert_eq!(deviation_pct(0.0, 0.0), 0.0);
    }

    #[test]
    fn worst_pair_wins_and_all_pairs_noted() {
        let r = compare("x", 1000.0, 1005.0, 1200.0, ValueType::Money);
        assert_eq!(r.severity, Severity::Critical);
        assert_eq!(r.deviation, Some(20.0));
        assert_eq!(r.disagreements.len(), 3);
        assert_eq!(
            r.note.as_deref(),
            Some("DB vs FE: diff=5.00; DB vs MP: diff=200.00; FE vs MP: diff=195.00")
        );
    }

    #[test]
    fn unparseable_side_is_treated_as_absent() {
        let r = compare("x", 10, "n/a", NONE, ValueType::Count);
        assert!(r.matched);
        assert_eq!(r.deviation, None);
    }

    #[test]
    fn overflowing_gaps_stay_finite() {
        let tiny = compare("x", 1e-300, 1e10, NONE, ValueType::Money);
        assert_eq!(tiny.severity, Severity::Critical);
        assert_eq!(tiny.deviation, Some(f64::MAX));
        assert!(tiny.disagreements.iter().all(|d| d.deviation.is_finite()));

        let wide = compare("x", 1e308, -1e308, NONE, ValueType::Money);
        assert_eq!(wide.severity, Severity::Critical);
        assert!(wide.disagreements.iter().all(|d| d.diff.is_finite() && d.deviation.is_finite()));
        assert!(wide.deviation.is_some_and(f64::is_finite));
    }

    #[test]
    fn count_off_by_one_on_huge_values_is_critical() {
        let r = compare("n", 1e12, 1e12 + 1.0, NONE, ValueType::Count);
        assert!(!r.matched);
        assert_eq!(r.severity, Severity::Critical);
    }

    #[test]
    fn two_way_shorthand() {
        let r = compare_two_way("x", 10, 12, ValueType::Count);
        assert!(!r.matched);
        assert!(r.marketplace_value.is_absent());
    }
}
