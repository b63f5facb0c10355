//! Delimited-text reader: bytes → decoded text → records → typed [`Table`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use csv_query_table::{ColumnType, Table};
use thiserror::Error;

use crate::encoding::{DecodeError, TextEncoding};
use crate::infer::{
    convert_column, CellSyntax, Conversion, RawColumn, DEFAULT_FALSE_VALUES, DEFAULT_NA_VALUES,
    DEFAULT_TRUE_VALUES,
};
use crate::options::{ColumnRef, EncodingOption, IndexCol, ParseOptions};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("error tokenizing data. {reason}")]
    Structure { line: u64, reason: String },
    #[error("no columns to parse from file")]
    EmptyInput,
    #[error("column {column:?}: cannot convert {value:?} to {column_type}")]
    InvalidValue {
        column: String,
        value: String,
        column_type: ColumnType,
    },
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
}

impl ReadError {
    /// True when the bytes were invalid for the requested encoding.
    pub fn is_decode(&self) -> bool {
        matches!(self, ReadError::Decode(_))
    }
}

/// Parses a file into a table.
pub trait TableReader {
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<Table, ReadError>;
}

/// [`TableReader`] for delimited text built on the `csv` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvReader;

impl CsvReader {
    pub fn new() -> Self {
        Self
    }

    /// Parse in-memory file content with the same rules as [`TableReader::parse`].
    pub fn parse_bytes(&self, bytes: &[u8], options: &ParseOptions) -> Result<Table, ReadError> {
        let settings = ReadSettings::resolve(options)?;
        read_table(bytes, &settings)
    }
}

impl TableReader for CsvReader {
    fn parse(&self, path: &Path, options: &ParseOptions) -> Result<Table, ReadError> {
        let settings = ReadSettings::resolve(options)?;
        let bytes = std::fs::read(path).map_err(|source| ReadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "read {} bytes from {} as {}",
            bytes.len(),
            path.display(),
            settings.encoding.name()
        );
        read_table(&bytes, &settings)
    }
}

/// [`ParseOptions`] with reader defaults filled in and validated.
#[derive(Clone, Debug)]
struct ReadSettings {
    delimiter: u8,
    quote: u8,
    comment: Option<u8>,
    header: bool,
    names: Option<Vec<String>>,
    skip_rows: usize,
    index_col: IndexCol,
    parse_dates: Vec<ColumnRef>,
    dtype: BTreeMap<String, ColumnType>,
    encoding: TextEncoding,
    syntax: CellSyntax,
}

impl ReadSettings {
    fn resolve(options: &ParseOptions) -> Result<Self, ReadError> {
        let encoding = match &options.encoding {
            None => TextEncoding::default(),
            Some(EncodingOption::Auto) => {
                return Err(ReadError::InvalidOption {
                    option: "encoding",
                    reason: "\"auto\" must be resolved to a concrete encoding before reading"
                        .to_string(),
                })
            }
            Some(EncodingOption::Named(label)) => TextEncoding::from_label(label)
                .ok_or_else(|| ReadError::UnknownEncoding(label.clone()))?,
        };

        let mut na_values: HashSet<String> = if options.keep_default_na.unwrap_or(true) {
            DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect()
        } else {
            HashSet::new()
        };
        na_values.extend(options.na_values.iter().flatten().cloned());

        let mut true_values: HashSet<String> =
            DEFAULT_TRUE_VALUES.iter().map(|s| s.to_string()).collect();
        true_values.extend(options.true_values.iter().flatten().cloned());
        let mut false_values: HashSet<String> =
            DEFAULT_FALSE_VALUES.iter().map(|s| s.to_string()).collect();
        false_values.extend(options.false_values.iter().flatten().cloned());

        let decimal = options.decimal.unwrap_or('.');
        if options.thousands == Some(decimal) {
            return Err(ReadError::InvalidOption {
                option: "thousands",
                reason: "must differ from the decimal separator".to_string(),
            });
        }

        Ok(Self {
            delimiter: ascii_byte("delimiter", options.delimiter.unwrap_or(','))?,
            quote: ascii_byte("quote", options.quote.unwrap_or('"'))?,
            comment: options
                .comment
                .map(|c| ascii_byte("comment", c))
                .transpose()?,
            header: options.header.unwrap_or(true),
            names: options.names.clone(),
            skip_rows: options.skip_rows.unwrap_or(0),
            index_col: options.index_col.clone().unwrap_or(IndexCol::Infer),
            parse_dates: options.parse_dates.clone().unwrap_or_default(),
            dtype: options.dtype.clone().unwrap_or_default(),
            encoding,
            syntax: CellSyntax {
                na_values,
                true_values,
                false_values,
                decimal,
                thousands: options.thousands,
                date_format: options.date_format.clone(),
                dayfirst: options.dayfirst.unwrap_or(false),
            },
        })
    }
}

fn ascii_byte(option: &'static str, c: char) -> Result<u8, ReadError> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ReadError::InvalidOption {
            option,
            reason: format!("{c:?} is not a single ASCII character"),
        })
}

struct Record {
    line: u64,
    fields: Vec<String>,
}

fn read_table(bytes: &[u8], settings: &ReadSettings) -> Result<Table, ReadError> {
    let text = settings.encoding.decode(bytes)?;
    let mut records = read_records(&text, settings)?
        .into_iter()
        .skip(settings.skip_rows);

    let header = if settings.header {
        Some(records.next().ok_or(ReadError::EmptyInput)?)
    } else {
        None
    };
    let data: Vec<Record> = records.collect();

    let names = match (&settings.names, header) {
        (Some(names), _) => names.clone(),
        (None, Some(header)) => header.fields,
        (None, None) => {
            let width = data.first().ok_or(ReadError::EmptyInput)?.fields.len();
            (0..width).map(|i| i.to_string()).collect()
        }
    };
    if names.is_empty() {
        return Err(ReadError::EmptyInput);
    }
    let names = clean_column_names(names);

    let layout = RowLayout::plan(&names, &data, &settings.index_col)?;
    let raw_columns = split_columns(&names, data, &layout)?;

    let date_positions = resolve_parse_dates(&names, &settings.parse_dates)?;
    let mut columns = Vec::with_capacity(raw_columns.len());
    for (slot, raw) in raw_columns.into_iter().enumerate() {
        let conversion = match settings.dtype.get(&raw.name) {
            Some(forced) => Conversion::Forced(*forced),
            None if slot >= layout.implicit_index
                && date_positions.contains(&(slot - layout.implicit_index)) =>
            {
                Conversion::PreferDates
            }
            None => Conversion::Infer,
        };
        columns.push(convert_column(raw, conversion, &settings.syntax)?);
    }

    let (index, data_columns) = match layout.named_index {
        Some(position) => {
            let index = columns.remove(position);
            (vec![index], columns)
        }
        None => {
            let data_columns = columns.split_off(layout.implicit_index);
            (columns, data_columns)
        }
    };

    let table = Table::with_index(index, data_columns).map_err(|e| ReadError::Structure {
        line: 0,
        reason: e.to_string(),
    })?;
    log::debug!(
        "parsed {} rows x {} columns ({} index columns)",
        table.num_rows(),
        table.num_columns(),
        table.index().len()
    );
    Ok(table)
}

fn read_records(text: &str, settings: &ReadSettings) -> Result<Vec<Record>, ReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(settings.delimiter)
        .quote(settings.quote)
        .comment(settings.comment)
        // Headers are handled by the caller so `skip_rows`/`names` can apply first.
        .has_headers(false)
        // Ragged rows are resolved by `RowLayout`, not rejected by the tokenizer.
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut record = csv::StringRecord::new();
    let mut out = Vec::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                // Blank lines carry no data.
                if record.len() == 1 && record[0].is_empty() {
                    continue;
                }
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                out.push(Record {
                    line,
                    fields: record.iter().map(str::to_string).collect(),
                });
            }
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                return Err(ReadError::Structure {
                    line,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Empty names become `Unnamed: <position>`; repeats get a `.1`, `.2`, … suffix.
fn clean_column_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut out = Vec::with_capacity(names.len());
    for (position, name) in names.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {position}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// How the fields of each record map onto index and data columns.
#[derive(Debug, PartialEq, Eq)]
struct RowLayout {
    /// Leading unnamed index fields (only with [`IndexCol::Infer`]).
    implicit_index: usize,
    /// Position of the named column used as the index.
    named_index: Option<usize>,
    /// Fields consumed per record.
    width: usize,
    /// Whether wider records are truncated rather than rejected.
    truncate: bool,
}

impl RowLayout {
    fn plan(names: &[String], data: &[Record], index_col: &IndexCol) -> Result<Self, ReadError> {
        let header_width = names.len();
        match index_col {
            IndexCol::Disabled => Ok(Self {
                implicit_index: 0,
                named_index: None,
                width: header_width,
                truncate: true,
            }),
            IndexCol::Infer => {
                let surplus = data
                    .first()
                    .map(|r| r.fields.len().saturating_sub(header_width))
                    .unwrap_or(0);
                Ok(Self {
                    implicit_index: surplus,
                    named_index: None,
                    width: header_width + surplus,
                    truncate: false,
                })
            }
            IndexCol::Column(column) => {
                let position = resolve_column(names, column).ok_or_else(|| {
                    ReadError::InvalidOption {
                        option: "index_col",
                        reason: format!("column {column} not found"),
                    }
                })?;
                Ok(Self {
                    implicit_index: 0,
                    named_index: Some(position),
                    width: header_width,
                    truncate: false,
                })
            }
        }
    }
}

fn split_columns(
    names: &[String],
    data: Vec<Record>,
    layout: &RowLayout,
) -> Result<Vec<RawColumn>, ReadError> {
    let mut columns: Vec<RawColumn> = std::iter::repeat_with(String::new)
        .take(layout.implicit_index)
        .chain(names.iter().cloned())
        .map(|name| RawColumn {
            name,
            fields: Vec::with_capacity(data.len()),
        })
        .collect();

    let mut truncated = 0usize;
    for record in data {
        let seen = record.fields.len();
        if seen > layout.width {
            if !layout.truncate {
                return Err(ReadError::Structure {
                    line: record.line,
                    reason: format!(
                        "expected {} fields in line {}, saw {seen}",
                        layout.width, record.line
                    ),
                });
            }
            truncated += 1;
        }

        let mut fields = record.fields.into_iter();
        for column in &mut columns {
            column.fields.push(fields.next());
        }
    }

    if truncated > 0 {
        log::warn!(
            "dropped trailing fields beyond the {} header columns in {truncated} row(s)",
            layout.width
        );
    }
    Ok(columns)
}

fn resolve_column(names: &[String], column: &ColumnRef) -> Option<usize> {
    match column {
        ColumnRef::Position(p) => (*p < names.len()).then_some(*p),
        ColumnRef::Name(name) => names.iter().position(|n| n == name),
    }
}

fn resolve_parse_dates(names: &[String], columns: &[ColumnRef]) -> Result<HashSet<usize>, ReadError> {
    columns
        .iter()
        .map(|column| {
            resolve_column(names, column).ok_or_else(|| ReadError::InvalidOption {
                option: "parse_dates",
                reason: format!("column {column} not found"),
            })
        })
        .collect()
}
