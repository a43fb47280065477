use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ReportError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (inverted bands, bad locale, etc.).
    ConfigValidation(String),
    /// Filesystem error on a run directory artifact.
    Io { path: PathBuf, message: String },
    /// A persisted report exists but cannot be decoded.
    CorruptReport { path: PathBuf, message: String },
    /// No persisted report in a run directory that must have one.
    MissingReport(PathBuf),
    /// JSON serialization error.
    Serialize(String),
    /// Another writer held the run lock for longer than allowed.
    LockTimeout { path: PathBuf, waited_ms: u128 },
}

impl ReportError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io { path, message } => write!(f, "{}: {message}", path.display()),
            Self::CorruptReport { path, message } => {
                write!(f, "cannot decode report {}: {message}", path.display())
            }
            Self::MissingReport(dir) => {
                write!(f, "no report has been written to {} yet", dir.display())
            }
            Self::Serialize(msg) => write!(f, "JSON serialization error: {msg}"),
            Self::LockTimeout { path, waited_ms } => {
                write!(f, "timed out after {waited_ms}ms waiting for lock {}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {}
