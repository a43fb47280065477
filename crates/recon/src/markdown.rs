use std::fmt::Write;

use crate::config::NumberLocale;
use crate::display::{format_deviation, format_value, status_marker};
use crate::model::{ComparisonSummary, VerificationReport};

/// Plain-text tabular report: overall counters, then one table per section.
pub fn render_markdown(report: &VerificationReport, locale: &NumberLocale) -> String {
    let totals = report.totals();
    let mut md = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(md, "# Verification Report\n");
    let _ = writeln!(md, "Date: {}", report.meta.run_at);
    let _ = writeln!(md, "Store: {} ({})\n", report.meta.store_name, report.meta.store_email);
    let _ = writeln!(md, "## Summary\n");
    let _ = writeln!(md, "- Total checks: {}", totals.total);
    let _ = writeln!(md, "- Matching: {} ({:.1}%)", totals.matching, totals.match_pct());
    let _ = writeln!(md, "- Warnings: {}", totals.warnings);
    let _ = writeln!(md, "- Critical: {}\n", totals.critical);

    for section in &report.sections {
        let _ = writeln!(md, "## {}\n", cell(&section.title));
        let _ = writeln!(md, "| # | Field | DB | Frontend | Marketplace | Deviation | Result |");
        let _ = writeln!(md, "|---|-------|----|----------|-------------|-----------|--------|");

        for (i, r) in section.summary.results.iter().enumerate() {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} | {} |",
                i + 1,
                cell(&r.field),
                format_value(r.db_value, locale),
                format_value(r.frontend_value, locale),
                format_value(r.marketplace_value, locale),
                format_deviation(r.deviation),
                status_marker(r),
            );
        }

        if !section.screenshots.is_empty() {
            let names: Vec<String> = section.screenshots.iter().map(|n| cell(n)).collect();
            let _ = writeln!(md, "\nScreenshots: {}", names.join(", "));
        }

        let _ = writeln!(md, "\n**Result**: {}\n", section_line(&section.summary));
    }

    md
}

/// `"8/10 matching, 1 warnings, 1 critical"`; zero counters are omitted.
pub fn section_line(summary: &ComparisonSummary) -> String {
    let mut line = format!("{}/{} matching", summary.matching, summary.total);
    if summary.warnings > 0 {
        line.push_str(&format!(", {} warnings", summary.warnings));
    }
    if summary.critical > 0 {
        line.push_str(&format!(", {} critical", summary.critical));
    }
    line
}

/// Keep free-text field labels from breaking the table.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
