//! Load a CSV file into a [`Table`], optionally run a SQL query over it and optionally escape
//! spreadsheet formulas in the result.
//!
//! The entry point is [`query_csv`] (or [`CsvQueryService::query_csv`] for custom
//! collaborators). The pipeline is:
//! - read: [`CsvReader`] parses the file using [`ParseOptions`] merged over the service defaults,
//!   retrying once as Latin-1 when `encoding = "auto"` and the UTF-8 attempt fails to decode
//! - query: [`SqliteEngine`] binds the table as `df` in an in-memory SQLite database
//! - sanitize: [`escape_formulas`] prefixes `'` to string cells starting with `=`

mod encoding;
mod error;
mod infer;
mod options;
pub mod reader;
pub mod sanitize;
mod service;
pub mod sql;

pub use crate::encoding::{DecodeError, TextEncoding};
pub use crate::error::{Error, ErrorKind};
pub use crate::options::{ColumnRef, EncodingOption, IndexCol, ParseOptions};
pub use crate::reader::{CsvReader, ReadError, TableReader};
pub use crate::sanitize::{escape_formula, escape_formulas};
pub use crate::service::{query_csv, CsvQueryService, DATAFRAME_BINDING};
pub use crate::sql::{QueryEngine, QueryError, SqliteEngine};

pub use csv_query_table::{Column, ColumnType, Table, Value};
