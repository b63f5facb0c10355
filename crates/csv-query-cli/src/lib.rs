//! Command-line front end for [`csv_query::query_csv`].
//!
//! Collects a path and parse options, runs the read/query/escape pipeline and prints the
//! resulting table to stdout. Diagnostics go to stderr through `tracing-subscriber`, which also
//! picks up the `log` records emitted by the library crates.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use csv_query::{ColumnRef, EncodingOption, IndexCol, ParseOptions};
use csv_query_table::{Table, Value};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated header and rows.
    #[default]
    Text,
    /// One JSON document with `columns` and `rows`.
    Json,
    /// A JSON array of column names, then one JSON array per row.
    Jsonl,
}

#[derive(Debug, Parser)]
#[command(
    name = "csv_query",
    about = "Load a CSV file, optionally run a SQL query against it (as table `df`) and print the result."
)]
pub struct Args {
    /// CSV file to read.
    pub input: PathBuf,

    /// SQL query to run; the loaded file is bound as `df`.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Prefix `'` to string cells starting with `=`.
    #[arg(long)]
    pub escape_formulas: bool,

    /// Text encoding (`utf-8`, `latin1`, ... or `auto`).
    #[arg(long)]
    pub encoding: Option<String>,

    /// Field separator.
    #[arg(long)]
    pub delimiter: Option<char>,

    /// The first record is data, not column names.
    #[arg(long)]
    pub no_header: bool,

    /// Column (name or zero-based position) to parse as date/time. Repeatable.
    #[arg(long = "parse-dates", value_name = "COLUMN")]
    pub parse_dates: Vec<String>,

    /// Row-index handling: `false`, `infer`, or a column name/position.
    #[arg(long, value_name = "COLUMN")]
    pub index_col: Option<IndexCol>,

    /// Parse options as a JSON object. Explicit flags take precedence.
    #[arg(long, value_name = "JSON")]
    pub options: Option<String>,

    /// Read parse options from a JSON file. Explicit flags take precedence.
    #[arg(long, value_name = "PATH", conflicts_with = "options")]
    pub options_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

pub fn run() -> Result<()> {
    init_logging();
    run_with_args(Args::parse())
}

pub fn run_with_args(args: Args) -> Result<()> {
    let options = parse_options(&args)?;

    let table = csv_query::query_csv(
        &args.input,
        &options,
        args.query.as_deref(),
        args.escape_formulas,
    )
    .with_context(|| format!("query {}", args.input.display()))?;

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    match write_table(&mut out, &table, args.format).and_then(|()| out.flush()) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("write output"),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// Build the effective parse options: JSON options (inline or from a file) first, explicit
/// flags layered on top.
pub fn parse_options(args: &Args) -> Result<ParseOptions> {
    let base = match (&args.options, &args.options_file) {
        (Some(json), _) => ParseOptions::from_json(json).context("parse --options")?,
        (None, Some(path)) => load_options_file(path)?,
        (None, None) => ParseOptions::default(),
    };

    let flags = ParseOptions {
        delimiter: args.delimiter,
        header: args.no_header.then_some(false),
        index_col: args.index_col.clone(),
        parse_dates: (!args.parse_dates.is_empty())
            .then(|| args.parse_dates.iter().map(|c| column_ref(c)).collect()),
        encoding: args.encoding.as_deref().map(EncodingOption::from),
        ..ParseOptions::default()
    };

    Ok(base.merge(flags))
}

fn load_options_file(path: &Path) -> Result<ParseOptions> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read options file {}", path.display()))?;
    ParseOptions::from_json(&json).with_context(|| format!("parse options file {}", path.display()))
}

fn column_ref(raw: &str) -> ColumnRef {
    match raw.trim().parse::<usize>() {
        Ok(position) => ColumnRef::Position(position),
        Err(_) => ColumnRef::Name(raw.to_string()),
    }
}

#[derive(Serialize)]
struct JsonTable<'a> {
    columns: Vec<&'a str>,
    rows: Vec<Vec<&'a Value>>,
}

pub fn write_table<W: Write>(out: &mut W, table: &Table, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "{}", table.column_names().join("\t"))?;
            for row in table.rows() {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}", cells.join("\t"))?;
            }
        }
        OutputFormat::Json => {
            let doc = JsonTable {
                columns: table.column_names(),
                rows: table.rows().collect(),
            };
            serde_json::to_writer(&mut *out, &doc)?;
            out.write_all(b"\n")?;
        }
        OutputFormat::Jsonl => {
            serde_json::to_writer(&mut *out, &table.column_names())?;
            out.write_all(b"\n")?;
            for row in table.rows() {
                serde_json::to_writer(&mut *out, &row)?;
                out.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}
