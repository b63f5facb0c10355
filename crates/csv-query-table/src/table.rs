use crate::types::{infer_column_type, ColumnType, Value};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("column {name:?} has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} has {actual} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A named, typed sequence of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    values: Vec<Value>,
}

impl Column {
    /// Build a column with an explicit type tag. The caller is responsible for the cells
    /// matching the tag (or being [`Value::Missing`]).
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// Build a column whose type is inferred from its cells.
    ///
    /// When the inferred type is [`ColumnType::Float`], integer cells are widened to floats so
    /// the column is homogeneous.
    pub fn from_values(name: impl Into<String>, mut values: Vec<Value>) -> Self {
        let column_type = infer_column_type(&values);
        if column_type == ColumnType::Float {
            for v in &mut values {
                if let Value::Integer(i) = *v {
                    *v = Value::Float(i as f64);
                }
            }
        }
        Self::new(name, column_type, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }
}

/// Ordered data columns plus optional index columns, aligned by row.
///
/// Index columns hold row labels the reader split off from the data (see `index_col` in the
/// reader options). They are not part of [`Table::columns`] and are not visible to queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    index: Vec<Column>,
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        Self::with_index(Vec::new(), columns)
    }

    pub fn with_index(index: Vec<Column>, columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = columns
            .first()
            .or(index.first())
            .map(Column::len)
            .unwrap_or(0);
        for column in index.iter().chain(columns.iter()) {
            if column.len() != rows {
                return Err(TableError::ColumnLength {
                    name: column.name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self {
            index,
            columns,
            rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn index(&self) -> &[Column] {
        &self.index
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// First data column named `name`.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Data cells of row `row`, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<&Value>> {
        if row >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[row]).collect())
    }

    pub fn rows(&self) -> Rows<'_> {
        Rows {
            table: self,
            next: 0,
        }
    }

    /// Owned copy of the data cells, row-major.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        self.rows()
            .map(|row| row.into_iter().cloned().collect())
            .collect()
    }

    /// Replace every data cell with `f(cell)`, keeping column names and type tags.
    ///
    /// `f` must map cells of a column's type to cells of the same type (or to missing).
    pub fn map_values(self, mut f: impl FnMut(Value) -> Value) -> Table {
        let columns = self
            .columns
            .into_iter()
            .map(|column| Column {
                values: column.values.into_iter().map(&mut f).collect(),
                ..column
            })
            .collect();
        Table { columns, ..self }
    }
}

pub struct Rows<'a> {
    table: &'a Table,
    next: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = Vec<&'a Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.table.row(self.next)?;
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.rows.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rows<'_> {}

/// Row-at-a-time builder; column types are inferred from the cells on [`TableBuilder::finish`].
#[derive(Debug)]
pub struct TableBuilder {
    names: Vec<String>,
    values: Vec<Vec<Value>>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(names: Vec<String>) -> Self {
        let values = names.iter().map(|_| Vec::new()).collect();
        Self {
            names,
            values,
            rows: 0,
        }
    }

    pub fn append_row(&mut self, row: Vec<Value>) -> Result<(), TableError> {
        if row.len() != self.names.len() {
            return Err(TableError::RowWidth {
                row: self.rows,
                expected: self.names.len(),
                actual: row.len(),
            });
        }
        for (column, value) in self.values.iter_mut().zip(row) {
            column.push(value);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Table {
        let columns = self
            .names
            .into_iter()
            .zip(self.values)
            .map(|(name, values)| Column::from_values(name, values))
            .collect();
        Table {
            index: Vec::new(),
            columns,
            rows: self.rows,
        }
    }
}
