//! Purpose: `dataio` CLI entry point.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Successful commands print exactly one JSON document on stdout.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Diagnostics go through `tracing` on stderr, filtered by `RUST_LOG`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use dataio::api::{Error, ErrorKind, to_exit_code};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod metadata_json;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((usage_error(&err), ColorMode::Auto));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;
    let settings = StoreSettings {
        page_size: cli.page_size,
        command_timeout: cli.command_timeout.map(Duration::from_secs),
        max_attempts: cli.max_attempts,
    };

    command_dispatch::dispatch_command(cli.command, settings)
        .map_err(add_corrupt_hint)
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    name = "dataio",
    version,
    about = "Inspect and synchronize tabular datasets",
    long_about = r#"Inspect and synchronize tabular datasets stored as paged flat files or
SQLite tables.

Stores are named `file:<dir>` (flat-file) or `sqlite:<path>` (relational).
Bare paths ending in .db, .sqlite or .sqlite3 are relational; others are flat-file."#,
    after_help = r#"EXAMPLES
  $ dataio folders ./archive
  $ dataio info sqlite:lab.db weather daily
  $ dataio get ./archive weather daily --start 100 --count 10
  $ dataio copy ./archive sqlite:lab.db --folder weather
  $ dataio import sqlite:lab.db ./mirror --append"#
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
    #[arg(
        long,
        global = true,
        help = "Rows per page file for flat-file stores (overrides dataset page size)"
    )]
    page_size: Option<usize>,
    #[arg(
        long,
        global = true,
        help = "Seconds a SQLite command may wait on a locked database"
    )]
    command_timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        help = "Attempts per SQLite transaction before a transient failure is returned"
    )]
    max_attempts: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Store tuning taken from global flags.
#[derive(Copy, Clone, Debug, Default)]
struct StoreSettings {
    page_size: Option<usize>,
    command_timeout: Option<Duration>,
    max_attempts: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "List folders in a store")]
    Folders { store: String },
    #[command(about = "List datasets in a folder")]
    Files { store: String, folder: String },
    #[command(about = "Show dataset metadata")]
    Info {
        store: String,
        folder: String,
        file: String,
    },
    #[command(about = "Read a range of rows")]
    Get {
        store: String,
        folder: String,
        file: String,
        #[arg(long, default_value_t = 0)]
        start: i64,
        #[arg(long, default_value_t = 100)]
        count: i64,
    },
    #[command(
        about = "Copy datasets from one store to another",
        long_about = r#"Copy datasets from SOURCE to DEST.

Only rows the destination has not seen are transferred unless --echo is given.
Without --append, existing destination rows are cleared first."#
    )]
    Copy {
        source: String,
        dest: String,
        #[arg(long, help = "Only copy this folder (case-insensitive)")]
        folder: Option<String>,
        #[arg(long, help = "Only copy this file (case-insensitive, `*` for all)")]
        file: Option<String>,
        #[arg(long, help = "Keep existing destination rows")]
        append: bool,
        #[arg(long, help = "Transfer from row 0 instead of the destination count")]
        echo: bool,
        #[arg(long, help = "Rows per read from the source")]
        batch_size: Option<i64>,
    },
    #[command(about = "Import every dataset of a store")]
    Import {
        source: String,
        dest: String,
        #[arg(long, help = "Keep existing destination rows")]
        append: bool,
    },
    #[command(about = "Generate shell completion scripts")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Clap's first message line, with its usage line folded into the hint.
fn usage_error(err: &clap::Error) -> Error {
    let rendered = err.to_string();
    let message = rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error:").trim().to_string())
        .unwrap_or_else(|| "invalid arguments".to_string());
    let hint = match rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage:"))
    {
        Some(usage) => format!("Usage: {}. Try `dataio --help`.", usage.trim()),
        None => "Try `dataio --help`.".to_string(),
    };
    Error::new(ErrorKind::InvalidArgument)
        .with_message(message)
        .with_hint(hint)
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Transient => {
            err.with_hint("The database stayed busy after every retry. Try again later.")
        }
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        ErrorKind::NotFound => {
            err.with_hint("Use `dataio folders` and `dataio files` to list what exists.")
        }
        _ => err,
    }
}

fn add_corrupt_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Corrupt || err.hint().is_some() {
        return err;
    }
    err.with_hint("Dataset files appear corrupt. Re-import the dataset from another store.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

/// Field labels for TTY error text; `error` is red, the rest yellow.
#[derive(Copy, Clone, Debug)]
struct Labels {
    color: bool,
}

impl Labels {
    fn paint(self, label: &str) -> String {
        if !self.color {
            return format!("{label}:");
        }
        let code = if label == "error" { "31" } else { "33" };
        format!("\u{1b}[{code}m{label}:\u{1b}[0m")
    }
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::InvalidArgument => "invalid argument".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::AlreadyExists => "already exists".to_string(),
        ErrorKind::OutOfRange => "index out of range".to_string(),
        ErrorKind::Transient => "transient failure".to_string(),
        ErrorKind::Aggregate => "multiple failures".to_string(),
        ErrorKind::Corrupt => "corrupt data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Database => "database error".to_string(),
    }
}

fn error_fields(err: &Error) -> Map<String, Value> {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(dataset) = err.dataset() {
        inner.insert("dataset".to_string(), json!(dataset));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(index) = err.index() {
        inner.insert("index".to_string(), json!(index));
    }
    let causes = std::iter::successors(err.source(), |&cause| cause.source())
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }
    if !err.failures().is_empty() {
        let failures = err
            .failures()
            .iter()
            .map(|failure| Value::Object(error_fields(failure)))
            .collect::<Vec<_>>();
        inner.insert("failures".to_string(), Value::Array(failures));
    }
    inner
}

fn error_json(err: &Error) -> Value {
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(error_fields(err)));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let labels = Labels { color: use_color };
    let mut lines = vec![format!("{} {}", labels.paint("error"), error_message(err))];
    let mut detail = |label: &str, text: String| {
        lines.push(format!("{} {text}", labels.paint(label)));
    };
    if let Some(hint) = err.hint() {
        detail("hint", hint.to_string());
    }
    if let Some(dataset) = err.dataset() {
        detail("dataset", dataset.to_string());
    }
    if let Some(path) = err.path() {
        detail("path", path.display().to_string());
    }
    for failure in err.failures() {
        detail("failed", failure.to_string());
    }
    if let Some(cause) = err.source() {
        detail("caused by", cause.to_string());
    }
    lines.join("\n")
}
