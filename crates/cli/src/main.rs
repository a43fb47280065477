// triverify - three-source verification from the command line

mod exit_codes;
mod input;
mod run;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use triverify_recon::display::{format_deviation, status_marker};
use triverify_recon::{Comparator, ReportError, ValueType, VerifyConfig};

use exit_codes::*;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "triverify.toml";

#[derive(Parser)]
#[command(name = "triverify")]
#[command(about = "Cross-check database, dashboard and marketplace values")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// TOML config (tolerances, locale, report identity)
    #[arg(long, global = true, env = "TRIVERIFY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh timestamp-named run directory
    #[command(after_help = "\
Examples:
  triverify new-run
  triverify new-run --root ./reports --json
  RUN=$(triverify new-run) && triverify append --run-dir \"$RUN\" ...")]
    NewRun {
        /// Parent directory for runs (default: report.reports_root)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Print the run directory as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare one field across the three sources
    #[command(after_help = "\
Examples:
  triverify compare 'Bugun - Ciro' -t money --db 12450.00 --frontend '12.450,00 ₺'
  triverify compare 'Kar Marji' -t percent --db 12.4 --frontend '%12,6' --json
  triverify compare 'Siparis Sayisi' -t count --db 45 --frontend 44 --marketplace 45

The --db value is read as a machine number (12450.00). The --frontend and
--marketplace values are display text, parsed with the configured locale.")]
    Compare {
        /// Field label
        field: String,

        /// Value type: money, percent or count
        #[arg(long = "type", short = 't')]
        value_type: ValueType,

        #[arg(long)]
        db: Option<String>,

        #[arg(long)]
        frontend: Option<String>,

        #[arg(long)]
        marketplace: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare a batch of fields and append them to a run as one section
    #[command(after_help = "\
Examples:
  triverify append --run-dir reports/2026-10-19T09-30 --title 'Dashboard Cards' --input cards.csv
  triverify append --run-dir \"$RUN\" --title Products --input products.json \\
      --screenshot 02-products-frontend.png --screenshot 02-products-marketplace.png
  triverify append --run-dir \"$RUN\" --title Orders --input orders.csv --fail-on warning

Input columns: field,type,db,frontend[,marketplace]

Exit codes:
  0   Section appended, no failing rows at the --fail-on level
  60  Critical rows present
  61  Warning rows present (with --fail-on warning)
  62  Invalid config
  63  Report store error
  64  Timed out waiting for the run lock")]
    Append {
        /// Run directory (created if missing)
        #[arg(long)]
        run_dir: PathBuf,

        /// Section title (business area)
        #[arg(long)]
        title: String,

        /// Field rows (.csv or .json)
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Screenshot file name under <run-dir>/screenshots (repeatable)
        #[arg(long = "screenshot")]
        screenshots: Vec<String>,

        /// Lowest severity that makes the command fail
        #[arg(long, value_enum, default_value = "critical")]
        fail_on: FailOn,

        /// Print the appended section as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regenerate report.md and report.html from raw-data.json
    Render {
        #[arg(long)]
        run_dir: PathBuf,
    },

    /// Print per-section and overall counters of a run
    #[command(after_help = "\
Examples:
  triverify summary --run-dir reports/2026-10-19T09-30
  triverify summary --run-dir \"$RUN\" --json | jq '.totals.critical'")]
    Summary {
        #[arg(long)]
        run_dir: PathBuf,

        /// Print counters as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FailOn {
    Critical,
    Warning,
    Never,
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Diagnostics go to stderr; stdout is reserved for command output.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TRIVERIFY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // Also installs the `log` bridge the engine logs through
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: triverify <command> [options]");
            eprintln!("       triverify --help for more information");
            Ok(())
        }
        Some(command) => load_config(cli.config.as_deref()).and_then(|config| match command {
            Commands::NewRun { root, json } => run::cmd_new_run(&config, root, json),
            Commands::Compare {
                field,
                value_type,
                db,
                frontend,
                marketplace,
                json,
            } => cmd_compare(&config, field, value_type, db, frontend, marketplace, json),
            Commands::Append {
                run_dir,
                title,
                input,
                screenshots,
                fail_on,
                json,
            } => run::cmd_append(&config, run_dir, title, input, screenshots, fail_on, json),
            Commands::Render { run_dir } => run::cmd_render(&config, run_dir),
            Commands::Summary { run_dir, json } => run::cmd_summary(&config, run_dir, json),
        }),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<VerifyConfig, CliError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !local.is_file() {
                return Ok(VerifyConfig::default());
            }
            local
        }
    };
    log::debug!("loading config from {}", path.display());
    VerifyConfig::load(&path).map_err(|e| {
        let hint = format!("check {}", path.display());
        CliError::report(e).with_hint(hint)
    })
}

fn cmd_compare(
    config: &VerifyConfig,
    field: String,
    value_type: ValueType,
    db: Option<String>,
    frontend: Option<String>,
    marketplace: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let comparator = Comparator::from_config(config);
    let result = comparator.compare(
        field,
        input::db_value(db.as_deref()),
        input::text_value(frontend),
        input::text_value(marketplace),
        value_type,
    );

    if json {
        let out = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::report(ReportError::Serialize(e.to_string())))?;
        println!("{out}");
    } else {
        println!(
            "{}: {} ({}, deviation {})",
            result.field,
            status_marker(&result),
            result.severity,
            format_deviation(result.deviation)
        );
        if let Some(note) = &result.note {
            println!("  {note}");
        }
    }
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Engine error with its registered exit code.
    pub fn report(err: ReportError) -> Self {
        let code = report_exit_code(&err);
        let hint = match &err {
            ReportError::LockTimeout { path, .. } => Some(format!(
                "another writer holds the run; remove {} if no writer is running",
                path.display()
            )),
            ReportError::CorruptReport { .. } => {
                Some("the dump was left untouched; restore or move it aside".to_string())
            }
            ReportError::MissingReport(_) => Some("append a section first".to_string()),
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Verification outcome failure; the summary is already on stderr.
    pub fn verify(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReportError> for CliError {
    fn from(err: ReportError) -> Self {
        Self::report(err)
    }
}
