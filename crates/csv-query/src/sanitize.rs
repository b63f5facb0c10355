//! Spreadsheet formula escaping.
//!
//! Spreadsheet applications evaluate a cell whose text starts with `=` as a formula. Prefixing
//! an apostrophe makes them treat the cell as literal text instead.

use csv_query_table::{Table, Value};

/// Prefix `'` to a string cell that starts with `=`; every other cell is returned unchanged.
pub fn escape_formula(value: Value) -> Value {
    match value {
        Value::String(s) if s.starts_with('=') => Value::String(format!("'{s}")),
        other => other,
    }
}

/// Apply [`escape_formula`] to every data cell of `table`.
pub fn escape_formulas(table: Table) -> Table {
    table.map_values(escape_formula)
}
