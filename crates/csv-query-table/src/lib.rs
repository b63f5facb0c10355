//! Table model exchanged between the csv-query stages.
//!
//! A [`Table`] is an ordered list of named data columns plus optional index columns, all
//! aligned by row. Cells are dynamically typed ([`Value`]) while each column carries a
//! [`ColumnType`] tag describing its cells. Missing cells are a dedicated variant rather than a
//! floating-point sentinel, so integer and boolean columns can have gaps without changing type.

#![forbid(unsafe_code)]

mod table;
mod types;

pub use crate::table::{Column, Rows, Table, TableBuilder, TableError};
pub use crate::types::{infer_column_type, ColumnType, Value, DATETIME_FORMAT};
