//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: CI jobs gate on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, bad input)    |
//! | 60-69   | verify           | Verification outcome and report store    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use triverify_recon::ReportError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable or malformed input file.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Verify (60-69)
// =============================================================================

/// At least one critical row in the appended section.
pub const EXIT_VERIFY_CRITICAL: u8 = 60;

/// Warning rows present and `--fail-on warning` was requested.
pub const EXIT_VERIFY_WARNING: u8 = 61;

/// Config file failed to parse or validate.
pub const EXIT_VERIFY_INVALID_CONFIG: u8 = 62;

/// Report store failure (IO, corrupt dump, missing report).
pub const EXIT_VERIFY_RUNTIME: u8 = 63;

/// Another writer held the run directory lock past the timeout.
pub const EXIT_VERIFY_LOCK_TIMEOUT: u8 = 64;

/// Map an engine error to its exit code.
pub fn report_exit_code(err: &ReportError) -> u8 {
    match err {
        ReportError::ConfigParse(_) | ReportError::ConfigValidation(_) => EXIT_VERIFY_INVALID_CONFIG,
        ReportError::LockTimeout { .. } => EXIT_VERIFY_LOCK_TIMEOUT,
        ReportError::Io { .. }
        | ReportError::CorruptReport { .. }
        | ReportError::MissingReport(_)
        | ReportError::Serialize(_) => EXIT_VERIFY_RUNTIME,
    }
}
