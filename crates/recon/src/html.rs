use std::fmt::Write;

use crate::config::NumberLocale;
use crate::display::{format_value, status_marker};
use crate::markdown::section_line;
use crate::model::{ComparisonResult, VerificationReport};
use crate::store::SCREENSHOT_DIR;

const STYLE: &str = r#"
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; padding: 24px; background: #f8f9fa; color: #1a1a2e; }
  .container { max-width: 1200px; margin: 0 auto; }
  h1 { font-size: 24px; margin-bottom: 8px; }
  h2 { font-size: 18px; margin: 24px 0 12px; padding-bottom: 8px; border-bottom: 2px solid #e0e0e0; }
  .meta { color: #666; font-size: 14px; margin-bottom: 24px; }
  .summary-cards { display: flex; gap: 16px; margin-bottom: 24px; flex-wrap: wrap; }
  .summary-card { flex: 1; min-width: 150px; padding: 16px; border-radius: 8px; background: white; border: 1px solid #e0e0e0; text-align: center; }
  .summary-card .num { font-size: 28px; font-weight: 700; }
  .summary-card .label { font-size: 12px; color: #666; margin-top: 4px; }
  .match { color: #16a34a; }
  .warn { color: #f59e0b; }
  .err { color: #dc2626; }
  table { width: 100%; border-collapse: collapse; background: white; margin-bottom: 24px; border: 1px solid #e0e0e0; }
  th { background: #f1f5f9; text-align: left; padding: 10px 12px; font-size: 12px; font-weight: 600; color: #475569; text-transform: uppercase; }
  td { padding: 10px 12px; font-size: 13px; border-top: 1px solid #f1f5f9; }
  td small { color: #999; }
  .status { padding: 2px 8px; border-radius: 12px; font-size: 11px; font-weight: 600; }
  .status-match { background: #dcfce7; color: #16a34a; }
  .status-warn { background: #fef3c7; color: #d97706; }
  .status-err { background: #fecaca; color: #dc2626; }
  .section-summary { font-size: 13px; color: #666; margin-bottom: 16px; }
  .screenshots { font-size: 13px; margin-bottom: 16px; }
  .text-right { text-align: right; }
"#;

/// Self-contained HTML page with summary cards and one table per section.
pub fn render_html(report: &VerificationReport, locale: &NumberLocale) -> String {
    let totals = report.totals();
    let title = format!("Verification Report - {}", escape_html(&report.meta.run_at));
    let mut html = String::new();

    let _ = writeln!(html, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
    let _ = writeln!(html, "<meta charset=\"UTF-8\">");
    let _ = writeln!(
        html,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
    );
    let _ = writeln!(html, "<title>{title}</title>\n<style>{STYLE}</style>\n</head>");
    let _ = writeln!(html, "<body>\n<div class=\"container\">");
    let _ = writeln!(html, "  <h1>Verification Report</h1>");
    let _ = writeln!(
        html,
        "  <div class=\"meta\">{} | {} ({})</div>",
        escape_html(&report.meta.run_at),
        escape_html(&report.meta.store_name),
        escape_html(&report.meta.store_email),
    );

    let _ = writeln!(html, "  <div class=\"summary-cards\">");
    summary_card(&mut html, "", &totals.total.to_string(), "Total Checks");
    summary_card(
        &mut html,
        "match",
        &format!("{} ({:.1}%)", totals.matching, totals.match_pct()),
        "Matching",
    );
    summary_card(&mut html, "warn", &totals.warnings.to_string(), "Warnings");
    summary_card(&mut html, "err", &totals.critical.to_string(), "Critical");
    let _ = writeln!(html, "  </div>");

    for section in &report.sections {
        let _ = writeln!(html, "  <h2>{}</h2>", escape_html(&section.title));
        let _ = writeln!(
            html,
            "  <div class=\"section-summary\">{}</div>",
            section_line(&section.summary)
        );

        if !section.screenshots.is_empty() {
            let links: Vec<String> = section
                .screenshots
                .iter()
                .map(|name| {
                    let href = encode_path_segment(name);
                    let label = escape_html(name);
                    format!("<a href=\"{SCREENSHOT_DIR}/{href}\">{label}</a>")
                })
                .collect();
            let _ = writeln!(html, "  <div class=\"screenshots\">{}</div>", links.join(" | "));
        }

        let _ = writeln!(html, "  <table>\n    <thead>\n      <tr>");
        let _ = writeln!(
            html,
            "        <th>#</th><th>Field</th><th class=\"text-right\">DB</th>\
             <th class=\"text-right\">Frontend</th><th class=\"text-right\">Marketplace</th>\
             <th class=\"text-right\">Deviation</th><th>Result</th>"
        );
        let _ = writeln!(html, "      </tr>\n    </thead>\n    <tbody>");
        for (i, r) in section.summary.results.iter().enumerate() {
            result_row(&mut html, i + 1, r, locale);
        }
        let _ = writeln!(html, "    </tbody>\n  </table>");
    }

    let _ = writeln!(html, "</div>\n</body>\n</html>");
    html
}

fn summary_card(html: &mut String, class: &str, num: &str, label: &str) {
    let _ = writeln!(
        html,
        "    <div class=\"summary-card\"><div class=\"num {class}\">{num}</div><div class=\"label\">{label}</div></div>"
    );
}

fn result_row(html: &mut String, index: usize, r: &ComparisonResult, locale: &NumberLocale) {
    let status_class = match status_marker(r) {
        "OK" => "status-match",
        "WARN" => "status-warn",
        _ => "status-err",
    };
    let note = r
        .note
        .as_deref()
        .map(|n| format!("<br><small>{}</small>", escape_html(n)))
        .unwrap_or_default();
    let deviation = match r.deviation {
        Some(d) if d > 0.0 => format!("%{d:.2}"),
        _ => "-".to_string(),
    };

    let _ = writeln!(
        html,
        "      <tr><td>{index}</td><td>{}{note}</td>\
         <td class=\"text-right\">{}</td><td class=\"text-right\">{}</td>\
         <td class=\"text-right\">{}</td><td class=\"text-right\">{deviation}</td>\
         <td><span class=\"status {status_class}\">{}</span></td></tr>",
        escape_html(&r.field),
        format_value(r.db_value, locale),
        format_value(r.frontend_value, locale),
        format_value(r.marketplace_value, locale),
        status_marker(r),
    );
}

/// Escape text for HTML element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Percent-encode a file name for use as one URL path segment. Only RFC 3986
/// unreserved characters pass through, so the result is also HTML-safe.
pub fn encode_path_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(b as char),
            _ => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}
