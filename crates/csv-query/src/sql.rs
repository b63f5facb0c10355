//! SQL over in-memory tables, backed by an in-memory SQLite database.

use chrono::NaiveDateTime;
use csv_query_table::{
    Column, ColumnType, Table, TableBuilder, TableError, Value, DATETIME_FORMAT,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection};
use thiserror::Error;

const BOOLEAN_DECL: &str = "BOOLEAN";
const TIMESTAMP_DECL: &str = "TIMESTAMP";
const SINGLE_STATEMENT: &str = "only a single statement can be executed";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query syntax error: {0}")]
    Syntax(String),
    #[error("query references an unknown name: {0}")]
    Reference(String),
    #[error("query did not produce a result set")]
    NoResultSet,
    #[error("table {0:?} has no columns to query")]
    EmptyTable(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Executes a query against tables bound by name.
pub trait QueryEngine {
    fn execute(&self, query: &str, bindings: &[(&str, &Table)]) -> Result<Table, QueryError>;
}

/// [`QueryEngine`] that copies the bound tables into a fresh in-memory SQLite database for every
/// call. Named index columns are loaded ahead of the data columns; inferred (unnamed) ones are
/// not.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteEngine;

impl SqliteEngine {
    pub fn new() -> Self {
        Self
    }
}

impl QueryEngine for SqliteEngine {
    fn execute(&self, query: &str, bindings: &[(&str, &Table)]) -> Result<Table, QueryError> {
        let mut conn = Connection::open_in_memory()?;
        for (name, table) in bindings {
            load_table(&mut conn, name, table)?;
        }
        let result = run_query(&conn, query)?;
        log::debug!(
            "query returned {} rows x {} columns",
            result.num_rows(),
            result.num_columns()
        );
        Ok(result)
    }
}

/// Creates `name` holding the named index columns followed by the data columns. Unnamed
/// (inferred) index columns are not loaded.
fn load_table(conn: &mut Connection, name: &str, table: &Table) -> Result<(), QueryError> {
    let sql_columns: Vec<&Column> = table
        .index()
        .iter()
        .filter(|c| !c.name().is_empty())
        .chain(table.columns())
        .collect();
    if sql_columns.is_empty() {
        return Err(QueryError::EmptyTable(name.to_string()));
    }

    let column_defs = sql_columns
        .iter()
        .map(|c| match declared_type(c.column_type()) {
            Some(ty) => format!("{} {ty}", quote_identifier(c.name())),
            None => quote_identifier(c.name()),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=sql_columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE {} ({column_defs})",
        quote_identifier(name)
    ))?;
    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote_identifier(name)
        ))?;
        for row in 0..table.num_rows() {
            let cells = sql_columns
                .iter()
                .map(|c| c.get(row).map(to_sql_value).unwrap_or(SqlValue::Null));
            insert.execute(params_from_iter(cells))?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn run_query(conn: &Connection, query: &str) -> Result<Table, QueryError> {
    let mut batch = Batch::new(conn, query);
    let Some(mut stmt) = batch.next().map_err(classify_error)? else {
        return Err(QueryError::NoResultSet);
    };
    // Trailing `;`, whitespace and comments prepare to nothing and end the batch.
    if !matches!(batch.next(), Ok(None)) {
        return Err(QueryError::Syntax(SINGLE_STATEMENT.to_string()));
    }

    let columns: Vec<(String, Option<String>)> = stmt
        .columns()
        .iter()
        .map(|c| {
            (
                c.name().to_string(),
                c.decl_type().map(|t| t.to_ascii_uppercase()),
            )
        })
        .collect();
    if columns.is_empty() {
        return Err(QueryError::NoResultSet);
    }

    let mut builder = TableBuilder::new(columns.iter().map(|(name, _)| name.clone()).collect());
    let mut rows = stmt.query([]).map_err(classify_error)?;
    while let Some(row) = rows.next().map_err(classify_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, (_, decl)) in columns.iter().enumerate() {
            values.push(from_sql_value(row.get_ref(i)?, decl.as_deref()));
        }
        builder.append_row(values)?;
    }
    Ok(builder.finish())
}

fn declared_type(column_type: ColumnType) -> Option<&'static str> {
    match column_type {
        ColumnType::Integer => Some("INTEGER"),
        ColumnType::Float => Some("REAL"),
        ColumnType::Boolean => Some(BOOLEAN_DECL),
        ColumnType::String => Some("TEXT"),
        ColumnType::DateTime => Some(TIMESTAMP_DECL),
        ColumnType::Mixed => None,
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Missing => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) if f.is_nan() => SqlValue::Null,
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
    }
}

/// Map a result cell back to a [`Value`]. `decl` is the declared type of the source column
/// when the result column is a direct column reference.
fn from_sql_value(value: ValueRef<'_>, decl: Option<&str>) -> Value {
    match value {
        ValueRef::Null => Value::Missing,
        ValueRef::Integer(i) if decl == Some(BOOLEAN_DECL) && (i == 0 || i == 1) => {
            Value::Boolean(i == 1)
        }
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if decl == Some(TIMESTAMP_DECL) {
                if let Ok(dt) = NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT) {
                    return Value::DateTime(dt);
                }
            }
            Value::String(text.into_owned())
        }
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn classify_error(err: rusqlite::Error) -> QueryError {
    let message = match &err {
        rusqlite::Error::SqliteFailure(_, Some(message))
        | rusqlite::Error::SqlInputError { msg: message, .. } => message.clone(),
        rusqlite::Error::MultipleStatement => {
            return QueryError::Syntax(SINGLE_STATEMENT.to_string())
        }
        _ => return QueryError::Sqlite(err),
    };

    let lowered = message.to_ascii_lowercase();
    if lowered.contains("no such table")
        || lowered.contains("no such column")
        || lowered.contains("ambiguous column name")
        || lowered.contains("no such function")
    {
        QueryError::Reference(message)
    } else if lowered.contains("syntax error")
        || lowered.contains("incomplete input")
        || lowered.contains("unrecognized token")
    {
        QueryError::Syntax(message)
    } else {
        QueryError::Sqlite(err)
    }
}
