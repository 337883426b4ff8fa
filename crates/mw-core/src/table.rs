//! Tabular model: columns, rows, tables
//!
//! A table is an insertion-ordered set of columns plus a vector of
//! rows whose cells align positionally with the column list. Column
//! keys are stable and unique; display labels are renameable without
//! touching the key, so persisted filters keep working after a rename.

use indexmap::IndexMap;

use crate::value::Value;
use crate::CoreError;

/// Key of the 1-based sequence-ordinal column present on every parsed
/// table and renumbered whenever the active view changes.
pub const SEQ_COLUMN: &str = "ردیف";

/// A column: stable key, renameable display label, visibility flag,
/// and a marker distinguishing derived columns from base ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub visible: bool,
    pub computed: bool,
}

impl Column {
    /// A base (non-derived) column whose label defaults to its key.
    pub fn base(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            visible: true,
            computed: false,
        }
    }

    /// A derived column produced by the column computer.
    pub fn computed(key: impl Into<String>) -> Self {
        Self {
            computed: true,
            ..Self::base(key)
        }
    }
}

/// A row of cells aligned with the owning table's column list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            cells: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.cells.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if index < self.cells.len() {
            self.cells[index] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter()
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// An ordered sequence of rows sharing one column set.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: IndexMap<String, Column>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a column. Fails on a duplicate key; existing rows are
    /// padded with `Absent`.
    pub fn add_column(&mut self, column: Column) -> Result<usize, CoreError> {
        if self.columns.contains_key(&column.key) {
            return Err(CoreError::DuplicateColumn(column.key));
        }
        let index = self.columns.len();
        self.columns.insert(column.key.clone(), column);
        for row in &mut self.rows {
            row.cells.resize(index + 1, Value::Absent);
        }
        Ok(index)
    }

    /// Index of an existing column, or append it. Used by the derived
    /// column computer so recomputation overwrites in place.
    pub fn ensure_column(&mut self, column: Column) -> usize {
        match self.columns.get_index_of(&column.key) {
            Some(index) => index,
            None => {
                let index = self.columns.len();
                self.columns.insert(column.key.clone(), column);
                for row in &mut self.rows {
                    row.cells.resize(index + 1, Value::Absent);
                }
                index
            }
        }
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.get_index_of(key)
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.get(key)
    }

    pub fn column_mut(&mut self, key: &str) -> Option<&mut Column> {
        self.columns.get_mut(key)
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Rename the display label of a column. The stable key is
    /// untouched, so persisted filter specs stay valid.
    pub fn rename_column(&mut self, key: &str, label: impl Into<String>) -> Result<(), CoreError> {
        let column = self
            .columns
            .get_mut(key)
            .ok_or_else(|| CoreError::UnknownColumn(key.to_string()))?;
        column.label = label.into();
        Ok(())
    }

    /// Append a row. The row must already be as wide as the column set.
    pub fn push_row(&mut self, row: Row) -> Result<(), CoreError> {
        if row.len() != self.columns.len() {
            return Err(CoreError::RowWidth {
                got: row.len(),
                expected: self.columns.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn value(&self, row: usize, key: &str) -> Option<&Value> {
        let index = self.column_index(key)?;
        self.rows.get(row)?.get(index)
    }

    /// Rewrite the sequence ordinal column to 1..N. Appends the column
    /// first if the table does not carry one yet.
    pub fn renumber(&mut self) {
        let index = self.ensure_column(Column::base(SEQ_COLUMN));
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.set(index, Value::Number((i + 1) as f64));
        }
    }

    /// A table with the same column set and only the rows whose index
    /// satisfies the mask, renumbered.
    pub fn with_rows_where(&self, keep: &[bool]) -> Table {
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(row, _)| row.clone())
            .collect();
        let mut table = Table {
            columns: self.columns.clone(),
            rows,
        };
        table.renumber();
        table
    }

    /// Reorder rows by the given permutation of row indices.
    pub(crate) fn reorder(&mut self, order: &[usize]) {
        let rows = order
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();
        self.rows = rows;
        self.renumber();
    }
}
