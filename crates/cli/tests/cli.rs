// End-to-end tests driving the triverify binary.
//
// stdout carries command output only (paths, JSON); summaries and
// diagnostics go to stderr.
//
// Run with: cargo test -p triverify-cli --test cli -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

fn triverify(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_triverify"));
    cmd.current_dir(cwd);
    cmd.env_remove("TRIVERIFY_CONFIG");
    cmd.env_remove("TRIVERIFY_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn parse_json(output: &Output) -> serde_json::Value {
    let text = stdout(output);
    serde_json::from_str(text.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{text}"))
}

const CARDS_CSV: &str = "\
field,type,db,frontend,marketplace
Bugun - Ciro,money,12450.00,\"12.450,00 ₺\",12450
Kar Marji,percent,12.4,\"%12,6\",
";

const ORDERS_CSV: &str = "\
field,type,db,frontend
Siparis Sayisi,count,45,44
Iade Sayisi,count,3,3
";

// ===========================================================================
// new-run
// ===========================================================================

#[test]
fn new_run_prints_created_directory() {
    let dir = tempfile::tempdir().unwrap();
    let out = triverify(dir.path()).args(["new-run", "--root", "reports"]).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));

    let path = stdout(&out).trim().to_string();
    assert!(path.starts_with("reports"), "{path}");
    let run = dir.path().join(&path);
    assert!(run.is_dir());
    assert!(run.join("screenshots").is_dir());
}

#[test]
fn new_run_twice_gives_distinct_directories() {
    let dir = tempfile::tempdir().unwrap();
    let first = parse_json(&triverify(dir.path()).args(["new-run", "--root", "r", "--json"]).output().unwrap());
    let second = parse_json(&triverify(dir.path()).args(["new-run", "--root", "r", "--json"]).output().unwrap());
    assert_ne!(first["run_dir"], second["run_dir"]);
}

// ===========================================================================
// compare
// ===========================================================================

#[test]
fn compare_json_matches_with_rounding() {
    let dir = tempfile::tempdir().unwrap();
    let out = triverify(dir.path())
        .args([
            "compare", "Bugun - Ciro", "-t", "money",
            "--db", "12450.00", "--frontend", "12.450,00 ₺", "--marketplace", "12.449,99",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));

    let v = parse_json(&out);
    assert_eq!(v["field"], "Bugun - Ciro");
    assert_eq!(v["match"], true);
    assert_eq!(v["severity"], "info");
    assert_eq!(v["db_value"], 12450.0);
    assert_eq!(v["frontend_value"], 12450.0);
}

#[test]
fn compare_reports_critical_count() {
    let dir = tempfile::tempdir().unwrap();
    let out = triverify(dir.path())
        .args(["compare", "Siparis Sayisi", "-t", "count", "--db", "45", "--frontend", "44"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.starts_with("Siparis Sayisi: FAIL (critical, deviation %2.22)"), "{text}");
    assert!(text.contains("DB vs FE: diff=1.00"));
}

#[test]
fn compare_rejects_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let out = triverify(dir.path())
        .args(["compare", "x", "-t", "ratio", "--db", "1"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}

// ===========================================================================
// append / render / summary
// ===========================================================================

#[test]
fn append_accumulates_sections() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cards.csv"), CARDS_CSV).unwrap();

    for title in ["Dashboard Cards", "Products"] {
        let out = triverify(dir.path())
            .args(["append", "--run-dir", "run", "--title", title, "--input", "cards.csv"])
            .output()
            .unwrap();
        // Kar Marji is only a warning
        assert!(out.status.success(), "{}", stderr(&out));
        assert!(stderr(&out).contains("1/2 matching, 1 warnings"));
    }

    let run = dir.path().join("run");
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run.join("raw-data.json")).unwrap()).unwrap();
    let sections = raw["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0]["title"], "Dashboard Cards");
    assert_eq!(sections[1]["title"], "Products");

    let md = std::fs::read_to_string(run.join("report.md")).unwrap();
    assert!(md.contains("- Total checks: 4"));
    assert!(run.join("report.html").is_file());
}

#[test]
fn append_exits_60_on_critical_but_still_records() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("orders.csv"), ORDERS_CSV).unwrap();

    let out = triverify(dir.path())
        .args(["append", "--run-dir", "run", "--title", "Orders", "--input", "orders.csv"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(60));
    assert!(stderr(&out).contains("error: 1 critical mismatch(es) in \"Orders\""));

    let summary = triverify(dir.path())
        .args(["summary", "--run-dir", "run", "--json"])
        .output()
        .unwrap();
    assert!(summary.status.success(), "{}", stderr(&summary));
    let v = parse_json(&summary);
    assert_eq!(v["totals"]["total"], 2);
    assert_eq!(v["totals"]["critical"], 1);
    assert_eq!(v["sections"][0]["title"], "Orders");
}

#[test]
fn append_fail_on_warning_exits_61() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cards.csv"), CARDS_CSV).unwrap();
    let out = triverify(dir.path())
        .args([
            "append", "--run-dir", "run", "--title", "Cards", "--input", "cards.csv",
            "--fail-on", "warning",
        ])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(61));
}

#[test]
fn append_json_prints_section_and_screenshots() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("products.json"),
        r#"[{"field": "Urun Sayisi", "type": "count", "db": 120, "frontend": "120", "marketplace": null}]"#,
    )
    .unwrap();
    let out = triverify(dir.path())
        .args([
            "append", "--run-dir", "run", "--title", "Products", "--input", "products.json",
            "--screenshot", "02-products-frontend.png", "--json",
        ])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    let v = parse_json(&out);
    assert_eq!(v["title"], "Products");
    assert_eq!(v["summary"]["matching"], 1);
    assert_eq!(v["screenshots"][0], "02-products-frontend.png");
}

#[test]
fn append_rejects_duplicate_fields() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("dup.csv"),
        "field,type,db,frontend\nA,count,1,1\nA,count,2,2\n",
    )
    .unwrap();
    let out = triverify(dir.path())
        .args(["append", "--run-dir", "run", "--title", "Dup", "--input", "dup.csv"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.path().join("run").join("raw-data.json").exists());
}

#[test]
fn corrupt_dump_exits_63_and_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cards.csv"), CARDS_CSV).unwrap();
    std::fs::create_dir(dir.path().join("run")).unwrap();
    std::fs::write(dir.path().join("run").join("raw-data.json"), "{\"meta\":").unwrap();

    let out = triverify(dir.path())
        .args(["append", "--run-dir", "run", "--title", "Cards", "--input", "cards.csv"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(63));
    assert!(stderr(&out).contains("hint:"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("run").join("raw-data.json")).unwrap(),
        "{\"meta\":"
    );
}

#[test]
fn render_rebuilds_reports() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cards.csv"), CARDS_CSV).unwrap();
    let out = triverify(dir.path())
        .args(["append", "--run-dir", "run", "--title", "Cards", "--input", "cards.csv"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));

    let run = dir.path().join("run");
    std::fs::remove_file(run.join("report.md")).unwrap();
    std::fs::remove_file(run.join("report.html")).unwrap();

    let out = triverify(dir.path()).args(["render", "--run-dir", "run"]).output().unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert!(run.join("report.md").is_file());
    assert!(run.join("report.html").is_file());
}

#[test]
fn summary_of_missing_run_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = triverify(dir.path())
        .args(["summary", "--run-dir", "nope"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.path().join("nope").exists());
}

// ===========================================================================
// config
// ===========================================================================

#[test]
fn config_identity_lands_in_report() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("triverify.toml"),
        "[report]\nstore_name = \"Demo Shop\"\nstore_email = \"ops@demo.test\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("cards.csv"), CARDS_CSV).unwrap();

    let out = triverify(dir.path())
        .args(["append", "--run-dir", "run", "--title", "Cards", "--input", "cards.csv"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));

    let out = triverify(dir.path())
        .args(["summary", "--run-dir", "run", "--json"])
        .output()
        .unwrap();
    let v = parse_json(&out);
    assert_eq!(v["meta"]["store_name"], "Demo Shop");
    assert_eq!(v["meta"]["store_email"], "ops@demo.test");
}

#[test]
fn invalid_config_exits_62() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("bad.toml"),
        "[locale]\nthousands = \",\"\ndecimal = \",\"\n",
    )
    .unwrap();
    let out = triverify(dir.path())
        .args(["--config", "bad.toml", "new-run", "--root", "r"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(62));
    assert!(stderr(&out).contains("hint:  check bad.toml"));
}
