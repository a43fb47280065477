use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::model::{Severity, ValueType};

/// Absorbs binary floating-point residue (12450.00 - 12449.99 > 0.01).
pub const EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub locale: NumberLocale,
    #[serde(default)]
    pub tolerance: ToleranceTable,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Identity written into a fresh report and where run directories live.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default = "default_store_name")]
    pub store_name: String,
    #[serde(default = "default_store_email")]
    pub store_email: String,
    #[serde(default = "default_reports_root")]
    pub reports_root: PathBuf,
    /// How long a cross-process append waits for the run lock.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

fn default_store_name() -> String {
    "Test Store".into()
}

fn default_store_email() -> String {
    "test@example.com".into()
}

fn default_reports_root() -> PathBuf {
    PathBuf::from("verification-reports")
}

fn default_lock_timeout_secs() -> u64 {
    30
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            store_name: default_store_name(),
            store_email: default_store_email(),
            reports_root: default_reports_root(),
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// Separators used by the source systems when formatting numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NumberLocale {
    #[serde(default = "default_thousands")]
    pub thousands: char,
    #[serde(default = "default_decimal")]
    pub decimal: char,
}

fn default_thousands() -> char {
    '.'
}

fn default_decimal() -> char {
    ','
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self {
            thousands: default_thousands(),
            decimal: default_decimal(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

/// What a rule's severity bands are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBasis {
    /// Relative deviation in percent.
    Relative,
    /// Absolute difference in the value's own unit.
    Absolute,
}

/// Tolerance and severity bands for one value type.
///
/// A pair whose absolute difference is within `tolerance` agrees. Otherwise
/// the basis metric is at most `info_max` → info, at most `warning_max` →
/// warning, above → critical.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TypeRule {
    pub tolerance: f64,
    pub basis: SeverityBasis,
    pub info_max: f64,
    pub warning_max: f64,
}

impl TypeRule {
    /// Kuruş rounding: 0.01 absolute, bands on relative deviation.
    pub fn money() -> Self {
        Self {
            tolerance: 0.01,
            basis: SeverityBasis::Relative,
            info_max: 0.01,
            warning_max: 1.0,
        }
    }

    /// 0.1 percentage points, bands on the point gap.
    pub fn percent() -> Self {
        Self {
            tolerance: 0.1,
            basis: SeverityBasis::Absolute,
            info_max: 0.1,
            warning_max: 1.0,
        }
    }

    /// Exact equality; any mismatch is critical. Banded on the raw gap so
    /// a one-off on a huge count never shrinks below the epsilon.
    pub fn count() -> Self {
        Self {
            tolerance: 0.0,
            basis: SeverityBasis::Absolute,
            info_max: 0.0,
            warning_max: 0.0,
        }
    }

    pub fn exceeds(&self, diff: f64) -> bool {
        diff > self.tolerance + EPSILON
    }

    pub fn classify(&self, diff: f64, deviation: f64) -> Severity {
        let metric = match self.basis {
            SeverityBasis::Relative => deviation,
            SeverityBasis::Absolute => diff,
        };
        if metric <= self.info_max + EPSILON {
            Severity::Info
        } else if metric <= self.warning_max + EPSILON {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }

    fn validate(&self, name: &str) -> Result<(), ReportError> {
        for (label, v) in [
            ("tolerance", self.tolerance),
            ("info_max", self.info_max),
            ("warning_max", self.warning_max),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ReportError::ConfigValidation(format!(
                    "tolerance.{name}.{label} must be a non-negative number, got {v}"
                )));
            }
        }
        if self.info_max > self.warning_max {
            return Err(ReportError::ConfigValidation(format!(
                "tolerance.{name}: info_max ({}) exceeds warning_max ({})",
                self.info_max, self.warning_max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToleranceTable {
    #[serde(default = "TypeRule::money")]
    pub money: TypeRule,
    #[serde(default = "TypeRule::percent")]
    pub percent: TypeRule,
    #[serde(default = "TypeRule::count")]
    pub count: TypeRule,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self {
            money: TypeRule::money(),
            percent: TypeRule::percent(),
            count: TypeRule::count(),
        }
    }
}

impl ToleranceTable {
    pub fn rule(&self, value_type: ValueType) -> &TypeRule {
        match value_type {
            ValueType::Money => &self.money,
            ValueType::Percent => &self.percent,
            ValueType::Count => &self.count,
        }
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        self.money.validate("money")?;
        self.percent.validate("percent")?;
        self.count.validate("count")
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl VerifyConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReportError> {
        let config: VerifyConfig =
            toml::from_str(input).map_err(|e| ReportError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let input = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.locale.thousands == self.locale.decimal {
            return Err(ReportError::ConfigValidation(format!(
                "locale: thousands and decimal separators are both '{}'",
                self.locale.decimal
            )));
        }
        if self.locale.decimal.is_ascii_digit() || self.locale.thousands.is_ascii_digit() {
            return Err(ReportError::ConfigValidation(
                "locale: separators cannot be digits".into(),
            ));
        }
        if self.report.lock_timeout_secs == 0 {
            return Err(ReportError::ConfigValidation(
                "report.lock_timeout_secs must be at least 1".into(),
            ));
        }
        self.tolerance.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
