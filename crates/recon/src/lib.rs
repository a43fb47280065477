//! `triverify-recon` is a three-source value reconciliation engine.
//!
//! Takes values pulled from a database, a rendered dashboard and a
//! marketplace panel, normalizes them, compares them under per-type
//! tolerance rules, and accumulates the results into a run report.
//!
//! The normalizer, comparator and aggregator are pure. The report store is
//! the only stateful component and serializes writes per run directory.

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod display;
pub mod error;
pub mod html;
pub mod lock;
pub mod markdown;
pub mod model;
pub mod normalize;
pub mod store;

pub use aggregate::aggregate;
pub use compare::{compare, compare_two_way, Comparator};
pub use config::{NumberLocale, ToleranceTable, VerifyConfig};
pub use error::ReportError;
pub use lock::{FileLock, InProcessLocks, Layered, LockGuard, LockProvider};
pub use model::{
    ComparisonResult, ComparisonSummary, NormalizedValue, RawValue, ReportSection, Severity,
    Totals, ValueType, VerificationReport,
};
pub use normalize::normalize;
pub use store::{ReportStore, RunDirectory};
