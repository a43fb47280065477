//! Field rows read from `--input` files.
//!
//! CSV columns: `field,type,db,frontend,marketplace` (marketplace optional).
//! The `db` column carries machine numbers (`12450.00`); the frontend and
//! marketplace columns carry display text as scraped (`12.450,00 ₺`).
//!
//! JSON: an array of `{"field", "type", "db", "frontend", "marketplace"}`
//! where each value is a number, a string, or null.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use triverify_recon::{RawValue, ValueType};

use crate::CliError;

/// One field to compare across the three sources.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldRow {
    pub field: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub db: RawValue,
    #[serde(default)]
    pub frontend: RawValue,
    #[serde(default)]
    pub marketplace: RawValue,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    field: String,
    #[serde(rename = "type")]
    value_type: String,
    db: Option<String>,
    frontend: Option<String>,
    marketplace: Option<String>,
}

/// Read rows from a `.csv` or `.json` file, by extension.
pub fn load_rows(path: &Path) -> Result<Vec<FieldRow>, CliError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let rows = match ext.as_deref() {
        Some("csv") => {
            let file = std::fs::File::open(path)
                .map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))?;
            parse_csv(file)?
        }
        Some("json") => {
            let data = std::fs::read_to_string(path)
                .map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))?;
            parse_json(&data)?
        }
        _ => {
            return Err(CliError::args(format!(
                "unsupported input file: {}",
                path.display()
            ))
            .with_hint("use a .csv or .json file"))
        }
    };

    check_unique(&rows)?;
    Ok(rows)
}

pub fn parse_csv<R: std::io::Read>(reader: R) -> Result<Vec<FieldRow>, CliError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, record) in csv.deserialize::<CsvRow>().enumerate() {
        // Header is line 1
        let line = i + 2;
        let row = record.map_err(|e| CliError::args(format!("line {line}: {e}")))?;
        let value_type = row
            .value_type
            .parse::<ValueType>()
            .map_err(|e: String| CliError::args(format!("line {line}: {e}")))?;
        rows.push(FieldRow {
            field: row.field.trim().to_string(),
            value_type,
            db: db_value(row.db.as_deref()),
            frontend: text_value(row.frontend),
            marketplace: text_value(row.marketplace),
        });
    }
    Ok(rows)
}

pub fn parse_json(data: &str) -> Result<Vec<FieldRow>, CliError> {
    serde_json::from_str(data).map_err(|e| {
        CliError::args(format!("invalid JSON input: {e}"))
            .with_hint("expected an array of {\"field\", \"type\", \"db\", \"frontend\", \"marketplace\"}")
    })
}

/// Database values are machine formatted. Anything that does not parse as
/// a plain number falls through to the locale-aware normalizer.
pub fn db_value(text: Option<&str>) -> RawValue {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return RawValue::Absent;
    };
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => RawValue::Number(v),
        _ => RawValue::Text(text.to_string()),
    }
}

pub fn text_value(text: Option<String>) -> RawValue {
    match text {
        Some(t) if !t.trim().is_empty() => RawValue::Text(t),
        _ => RawValue::Absent,
    }
}

fn check_unique(rows: &[FieldRow]) -> Result<(), CliError> {
    let mut seen = HashSet::new();
    for row in rows {
        if !seen.insert(row.field.as_str()) {
            return Err(CliError::args(format!(
                "duplicate field \"{}\" in input",
                row.field
            ))
            .with_hint("field labels must be unique within a section"));
        }
    }
    Ok(())
}
