use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A value as a collaborator produced it: a native number, a formatted
/// string, or nothing at all.
///
/// Deserializes from JSON `number | string | null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    #[default]
    Absent,
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for RawValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Absent)
    }
}

/// A normalized value. `Absent` is distinct from zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum NormalizedValue {
    Number(f64),
    #[default]
    Absent,
}

impl NormalizedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Option<f64>> for NormalizedValue {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(n) if n.is_finite() => Self::Number(n),
            _ => Self::Absent,
        }
    }
}

impl From<NormalizedValue> for Option<f64> {
    fn from(v: NormalizedValue) -> Self {
        v.as_f64()
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Declared kind of a compared value. Never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Money,
    Percent,
    Count,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Money => write!(f, "money"),
            Self::Percent => write!(f, "percent"),
            Self::Count => write!(f, "count"),
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "money" => Ok(Self::Money),
            "percent" => Ok(Self::Percent),
            "count" => Ok(Self::Count),
            other => Err(format!(
                "unknown value type \"{other}\" (expected money, percent or count)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Which system a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Canonical records (database).
    Database,
    /// Values rendered by the web dashboard.
    Frontend,
    /// The third-party marketplace panel.
    Marketplace,
}

impl SourceRole {
    pub fn short(&self) -> &'static str {
        match self {
            Self::Database => "DB",
            Self::Frontend => "FE",
            Self::Marketplace => "MP",
        }
    }
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Frontend => write!(f, "frontend"),
            Self::Marketplace => write!(f, "marketplace"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One source pair whose difference exceeded the type's tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDelta {
    pub left: SourceRole,
    pub right: SourceRole,
    pub diff: f64,
    /// Relative deviation in percent, measured against `left`.
    pub deviation: f64,
    pub severity: Severity,
}

/// One compared field.
///
/// `matched` is true exactly when `severity` is `Info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub field: String,
    pub value_type: ValueType,
    pub db_value: NormalizedValue,
    pub frontend_value: NormalizedValue,
    pub marketplace_value: NormalizedValue,
    #[serde(rename = "match")]
    pub matched: bool,
    /// `None` when no two sources were both present.
    pub deviation: Option<f64>,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disagreements: Vec<PairDelta>,
}

impl ComparisonResult {
    pub fn value(&self, role: SourceRole) -> NormalizedValue {
        match role {
            SourceRole::Database => self.db_value,
            SourceRole::Frontend => self.frontend_value,
            SourceRole::Marketplace => self.marketplace_value,
        }
    }
}

/// Run-level counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub total: usize,
    pub matching: usize,
    pub warnings: usize,
    pub critical: usize,
}

/// Counters plus the results that produced them, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total: usize,
    pub matching: usize,
    pub warnings: usize,
    pub critical: usize,
    pub results: Vec<ComparisonResult>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// One business-area check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub summary: ComparisonSummary,
    /// File names under the run's screenshot folder.
    #[serde(default)]
    pub screenshots: Vec<String>,
}

impl ReportSection {
    pub fn new(title: impl Into<String>, summary: ComparisonSummary) -> Self {
        Self {
            title: title.into(),
            summary,
            screenshots: Vec::new(),
        }
    }

    pub fn with_screenshots(mut self, screenshots: Vec<String>) -> Self {
        self.screenshots = screenshots;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub store_name: String,
    pub store_email: String,
    pub run_at: String,
    pub engine_version: String,
}

/// Everything accumulated in one run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub meta: ReportMeta,
    pub sections: Vec<ReportSection>,
}

impl VerificationReport {
    pub fn new(meta: ReportMeta) -> Self {
        Self {
            meta,
            sections: Vec::new(),
        }
    }
}
