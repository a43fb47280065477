use std::iter::Sum;
use std::ops::{Add, AddAssign};

use crate::model::{ComparisonResult, ComparisonSummary, Severity, Totals, VerificationReport};

/// Reduce results into a summary. Result order is kept as display order.
pub fn aggregate(results: Vec<ComparisonResult>) -> ComparisonSummary {
    let totals = tally(&results);
    ComparisonSummary {
        total: totals.total,
        matching: totals.matching,
        warnings: totals.warnings,
        critical: totals.critical,
        results,
    }
}

/// Count results by match flag and severity.
pub fn tally(results: &[ComparisonResult]) -> Totals {
    let mut totals = Totals {
        total: results.len(),
        ..Totals::default()
    };
    for r in results {
        if r.matched {
            totals.matching += 1;
        }
        match r.severity {
            Severity::Info => {}
            Severity::Warning => totals.warnings += 1,
            Severity::Critical => totals.critical += 1,
        }
    }
    totals
}

impl Totals {
    /// Share of matching checks in percent; 0 when nothing was checked.
    pub fn match_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matching as f64 / self.total as f64 * 100.0
        }
    }

    pub fn has_failures(&self) -> bool {
        self.warnings > 0 || self.critical > 0
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            total: self.total + rhs.total,
            matching: self.matching + rhs.matching,
            warnings: self.warnings + rhs.warnings,
            critical: self.critical + rhs.critical,
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        *self = *self + rhs;
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Totals {
        iter.fold(Totals::default(), Add::add)
    }
}

impl ComparisonSummary {
    pub fn totals(&self) -> Totals {
        Totals {
            total: self.total,
            matching: self.matching,
            warnings: self.warnings,
            critical: self.critical,
        }
    }
}

impl VerificationReport {
    /// Counters across every accumulated section.
    pub fn totals(&self) -> Totals {
        self.sections.iter().map(|s| s.summary.totals()).sum()
    }
}
