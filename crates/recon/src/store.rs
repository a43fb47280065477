//! Run directories and the accumulating report written into them.
//!
//! Layout of one run:
//!
//! ```text
//! <reports_root>/<YYYY-MM-DDTHH-MM>/
//!     raw-data.json     lossless dump, re-read on every append
//!     report.md         tabular summary
//!     report.html       styled summary
//!     screenshots/      captures referenced by name from sections
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::config::{NumberLocale, VerifyConfig};
use crate::error::ReportError;
use crate::html::render_html;
use crate::lock::{InProcessLocks, LockProvider};
use crate::markdown::render_markdown;
use crate::model::{ReportMeta, ReportSection, VerificationReport};

pub const REPORT_JSON: &str = "raw-data.json";
pub const REPORT_MARKDOWN: &str = "report.md";
pub const REPORT_HTML: &str = "report.html";
pub const SCREENSHOT_DIR: &str = "screenshots";

// ---------------------------------------------------------------------------
// Run directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create a fresh timestamp-named run under `root`.
    ///
    /// An existing directory with the same name is never reused; `-2`, `-3`,
    /// ... are appended until an unused name is found.
    pub fn create(root: &Path, started: NaiveDateTime) -> Result<Self, ReportError> {
        fs::create_dir_all(root).map_err(|e| ReportError::io(root, e))?;
        let stem = started.format("%Y-%m-%dT%H-%M").to_string();

        let mut attempt = 1;
        let path = loop {
            let name = if attempt == 1 {
                stem.clone()
            } else {
                format!("{stem}-{attempt}")
            };
            let candidate = root.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(ReportError::io(&candidate, e)),
            }
        };

        let run = Self { path };
        run.ensure_screenshot_dir()?;
        log::info!("created run directory {}", run.path.display());
        Ok(run)
    }

    /// Adopt an existing run directory, creating it if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ReportError> {
        let run = Self { path: path.into() };
        fs::create_dir_all(&run.path).map_err(|e| ReportError::io(&run.path, e))?;
        run.ensure_screenshot_dir()?;
        Ok(run)
    }

    fn ensure_screenshot_dir(&self) -> Result<(), ReportError> {
        let dir = self.screenshot_dir();
        fs::create_dir_all(&dir).map_err(|e| ReportError::io(&dir, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn json_path(&self) -> PathBuf {
        self.path.join(REPORT_JSON)
    }

    pub fn markdown_path(&self) -> PathBuf {
        self.path.join(REPORT_MARKDOWN)
    }

    pub fn html_path(&self) -> PathBuf {
        self.path.join(REPORT_HTML)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.path.join(SCREENSHOT_DIR)
    }

    /// Where a collaborator should save the capture named `name`.
    pub fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshot_dir().join(name)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Appends sections to run reports, one writer per run directory at a time.
pub struct ReportStore {
    locks: Arc<dyn LockProvider>,
    store_name: String,
    store_email: String,
    locale: NumberLocale,
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::from_config(&VerifyConfig::default())
    }
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity and locale from config; process-wide in-process locking.
    pub fn from_config(config: &VerifyConfig) -> Self {
        Self {
            locks: InProcessLocks::shared(),
            store_name: config.report.store_name.clone(),
            store_email: config.report.store_email.clone(),
            locale: config.locale,
        }
    }

    pub fn with_locks(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_identity(mut self, store_name: impl Into<String>, store_email: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self.store_email = store_email.into();
        self
    }

    /// Append `section` to the run's report and regenerate every artifact.
    ///
    /// The run lock is held across load, append and write. A run without a
    /// dump yet starts a fresh report.
    pub fn append_section(
        &self,
        section: ReportSection,
        run: &RunDirectory,
    ) -> Result<VerificationReport, ReportError> {
        let _guard = self.locks.acquire(run.path())?;

        let mut report = self.load(run)?.unwrap_or_else(|| self.fresh_report());
        log::info!(
            "appending section \"{}\" ({} results) to {}",
            section.title,
            section.summary.total,
            run.path().display()
        );
        report.sections.push(section);
        self.write_all(&report, run)?;
        Ok(report)
    }

    /// Read the persisted report, if any.
    ///
    /// A missing dump is `None`. An unreadable or corrupt one is an error: it
    /// holds other checks' sections and must not be silently replaced.
    pub fn load(&self, run: &RunDirectory) -> Result<Option<VerificationReport>, ReportError> {
        let path = run.json_path();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ReportError::io(&path, e)),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| ReportError::CorruptReport {
                path,
                message: e.to_string(),
            })
    }

    /// Regenerate the text and HTML reports from the dump.
    pub fn render(&self, run: &RunDirectory) -> Result<VerificationReport, ReportError> {
        let _guard = self.locks.acquire(run.path())?;
        let report = self
            .load(run)?
            .ok_or_else(|| ReportError::MissingReport(run.path().to_path_buf()))?;
        write_atomic(&run.markdown_path(), &render_markdown(&report, &self.locale))?;
        write_atomic(&run.html_path(), &render_html(&report, &self.locale))?;
        Ok(report)
    }

    fn fresh_report(&self) -> VerificationReport {
        VerificationReport::new(ReportMeta {
            store_name: self.store_name.clone(),
            store_email: self.store_email.clone(),
            run_at: chrono::Utc::now().to_rfc3339(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn write_all(&self, report: &VerificationReport, run: &RunDirectory) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::Serialize(e.to_string()))?;
        write_atomic(&run.json_path(), &json)?;
        write_atomic(&run.markdown_path(), &render_markdown(report, &self.locale))?;
        write_atomic(&run.html_path(), &render_html(report, &self.locale))?;
        Ok(())
    }
}

/// Write to a sibling temp file, sync, then rename over the target.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ReportError> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    {
        let mut file = fs::File::create(&temp_path).map_err(|e| ReportError::io(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| ReportError::io(&temp_path, e))?;
        file.sync_all().map_err(|e| ReportError::io(&temp_path, e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| ReportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(14, 5, 33)
            .unwrap()
    }

    #[test]
    fn run_directory_is_timestamp_named() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::create(root.path(), started()).unwrap();
        assert_eq!(run.path(), root.path().join("2026-10-19T14-05"));
        assert!(run.screenshot_dir().is_dir());
    }

    #[test]
    fn rerun_never_reuses_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let first = RunDirectory::create(root.path(), started()).unwrap();
        let second = RunDirectory::create(root.path(), started()).unwrap();
        let third = RunDirectory::create(root.path(), started()).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.path(), root.path().join("2026-10-19T14-05-2"));
        assert_eq!(third.path(), root.path().join("2026-10-19T14-05-3"));
    }

    #[test]
    fn load_missing_is_none() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::open(root.path().join("run")).unwrap();
        assert!(ReportStore::new().load(&run).unwrap().is_none());
    }

    #[test]
    fn corrupt_dump_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::open(root.path()).unwrap();
        fs::write(run.json_path(), "{ not json").unwrap();
        let err = ReportStore::new().load(&run).unwrap_err();
        assert!(matches!(err, ReportError::CorruptReport { .. }));
    }

    #[test]
    fn render_without_dump_fails() {
        let root = tempfile::tempdir().unwrap();
        let run = RunDirectory::open(root.path()).unwrap();
        let err = ReportStore::new().render(&run).unwrap_err();
        assert!(matches!(err, ReportError::MissingReport(_)));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("report.md");
        write_atomic(&target, "hello").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert!(!root.path().join("report.md.tmp").exists());
    }
}
