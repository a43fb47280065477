//! Run directory commands: new-run, append, render, summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use triverify_recon::markdown::section_line;
use triverify_recon::{
    aggregate, Comparator, ComparisonSummary, FileLock, Layered, ReportError, ReportSection,
    ReportStore, RunDirectory, VerificationReport, VerifyConfig,
};

use crate::exit_codes::{EXIT_VERIFY_CRITICAL, EXIT_VERIFY_WARNING};
use crate::input::load_rows;
use crate::{CliError, FailOn};

/// Store for CLI writers: other threads and other processes may append to
/// the same run, so both lock layers are taken.
fn store(config: &VerifyConfig) -> ReportStore {
    let file = FileLock::with_timeout(Duration::from_secs(config.report.lock_timeout_secs));
    ReportStore::from_config(config).with_locks(Arc::new(Layered::process_and_file(file)))
}

fn to_json(value: &impl serde::Serialize) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CliError::report(ReportError::Serialize(e.to_string())))
}

pub fn cmd_new_run(config: &VerifyConfig, root: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let root = root.unwrap_or_else(|| config.report.reports_root.clone());
    let run = RunDirectory::create(&root, chrono::Local::now().naive_local())?;

    if json {
        let out = json!({
            "run_dir": run.path().display().to_string(),
            "screenshots": run.screenshot_dir().display().to_string(),
        });
        println!("{}", to_json(&out)?);
    } else {
        println!("{}", run.path().display());
    }
    Ok(())
}

pub fn cmd_append(
    config: &VerifyConfig,
    run_dir: PathBuf,
    title: String,
    input: PathBuf,
    screenshots: Vec<String>,
    fail_on: FailOn,
    json: bool,
) -> Result<(), CliError> {
    if title.trim().is_empty() {
        return Err(CliError::args("--title cannot be empty"));
    }
    let rows = load_rows(&input)?;
    if rows.is_empty() {
        log::warn!("{} has no rows; appending an empty section", input.display());
    }

    let comparator = Comparator::from_config(config);
    let results = rows
        .into_iter()
        .map(|row| comparator.compare(row.field, row.db, row.frontend, row.marketplace, row.value_type))
        .collect();
    let summary = aggregate(results);
    let section = ReportSection::new(title, summary).with_screenshots(screenshots);

    let run = RunDirectory::open(run_dir)?;
    let report = store(config).append_section(section, &run)?;
    // The lock was held through the push, so ours is last
    let Some(added) = report.sections.last() else {
        return Err(CliError::report(ReportError::MissingReport(run.path().to_path_buf())));
    };

    if json {
        println!("{}", to_json(added)?);
    }
    eprintln!("{}: {}", added.title, section_line(&added.summary));
    print_failures(&added.summary);
    let totals = report.totals();
    eprintln!(
        "run: {} sections, {} checks, {} warnings, {} critical ({})",
        report.sections.len(),
        totals.total,
        totals.warnings,
        totals.critical,
        run.path().display()
    );

    check_outcome(&added.title, &added.summary, fail_on)
}

fn print_failures(summary: &ComparisonSummary) {
    for r in summary.results.iter().filter(|r| !r.matched) {
        eprintln!(
            "  {} {} ({}): {}",
            triverify_recon::display::status_marker(r),
            r.field,
            r.value_type,
            r.note.as_deref().unwrap_or("")
        );
    }
}

fn check_outcome(title: &str, summary: &ComparisonSummary, fail_on: FailOn) -> Result<(), CliError> {
    let fail_critical = fail_on != FailOn::Never && summary.critical > 0;
    let fail_warning = fail_on == FailOn::Warning && summary.warnings > 0;

    if fail_critical {
        Err(CliError::verify(
            EXIT_VERIFY_CRITICAL,
            format!("{} critical mismatch(es) in \"{title}\"", summary.critical),
        ))
    } else if fail_warning {
        Err(CliError::verify(
            EXIT_VERIFY_WARNING,
            format!("{} warning(s) in \"{title}\"", summary.warnings),
        ))
    } else {
        Ok(())
    }
}

pub fn cmd_render(config: &VerifyConfig, run_dir: PathBuf) -> Result<(), CliError> {
    let run = existing_run(run_dir)?;
    let report = store(config).render(&run)?;
    eprintln!(
        "rendered {} section(s) to {} and {}",
        report.sections.len(),
        run.markdown_path().display(),
        run.html_path().display()
    );
    Ok(())
}

pub fn cmd_summary(config: &VerifyConfig, run_dir: PathBuf, json: bool) -> Result<(), CliError> {
    let run = existing_run(run_dir)?;
    let report = store(config)
        .load(&run)?
        .ok_or_else(|| CliError::report(ReportError::MissingReport(run.path().to_path_buf())))?;

    if json {
        println!("{}", to_json(&summary_json(&report))?);
    } else {
        println!("{} <{}>  {}", report.meta.store_name, report.meta.store_email, report.meta.run_at);
        for section in &report.sections {
            println!("  {}: {}", section.title, section_line(&section.summary));
        }
        let totals = report.totals();
        println!(
            "total: {} checks, {} matching ({:.1}%), {} warnings, {} critical",
            totals.total,
            totals.matching,
            totals.match_pct(),
            totals.warnings,
            totals.critical
        );
    }
    Ok(())
}

fn summary_json(report: &VerificationReport) -> serde_json::Value {
    let sections: Vec<_> = report
        .sections
        .iter()
        .map(|s| {
            json!({
                "title": s.title,
                "total": s.summary.total,
                "matching": s.summary.matching,
                "warnings": s.summary.warnings,
                "critical": s.summary.critical,
                "screenshots": s.screenshots,
            })
        })
        .collect();
    let totals = report.totals();
    json!({
        "meta": report.meta,
        "sections": sections,
        "totals": {
            "total": totals.total,
            "matching": totals.matching,
            "warnings": totals.warnings,
            "critical": totals.critical,
            "match_pct": totals.match_pct(),
        },
    })
}

/// Read-only commands never create a run directory.
fn existing_run(run_dir: PathBuf) -> Result<RunDirectory, CliError> {
    if !run_dir.is_dir() {
        return Err(CliError::args(format!("no run directory at {}", run_dir.display()))
            .with_hint("create one with `triverify new-run`"));
    }
    Ok(RunDirectory::open(run_dir)?)
}
