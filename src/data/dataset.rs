//! Tabular dataset value type.
//!
//! A dataset is an ordered list of columns plus rows of JSON cells. A cell
//! that is absent from its row or holds `null` is treated as missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row, keyed by column name.
pub type Row = Map<String, Value>;

/// Returns `true` when a cell is absent or `null`.
pub fn is_missing(cell: Option<&Value>) -> bool {
    matches!(cell, None | Some(Value::Null))
}

/// Numeric view of a cell. Integers and floats both qualify; strings do not.
pub fn as_number(cell: Option<&Value>) -> Option<f64> {
    cell.and_then(Value::as_f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Creates an empty dataset with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a dataset from rows. Columns are collected in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut dataset = Self::default();
        for row in rows {
            dataset.push_row(row);
        }
        dataset
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Appends a row, registering any columns not seen before.
    pub fn push_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Iterates over the cells of `column`, `None` where the row lacks it.
    pub fn column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| row.get(column))
    }

    /// Non-missing numeric values of `column`, in row order.
    pub fn numeric_column(&self, column: &str) -> Vec<f64> {
        self.column(column)
            .filter_map(as_number)
            .collect()
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Returns a copy without the rows where `column` is missing.
    pub fn drop_missing(&self, column: &str) -> Dataset {
        let mut result = self.clone();
        result.retain(|row| !is_missing(row.get(column)));
        result
    }

    /// Removes a column and its cells.
    pub fn drop_column(&mut self, column: &str) {
        self.columns.retain(|c| c != column);
        for row in &mut self.rows {
            row.remove(column);
        }
    }

    /// Sets `column` on every row to the value computed from that row.
    pub fn map_column<F>(&mut self, column: &str, mut compute: F)
    where
        F: FnMut(&Row) -> Value,
    {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        for row in &mut self.rows {
            let value = compute(row);
            row.insert(column.to_string(), value);
        }
    }

    /// Sets `column` to the same value on every row.
    pub fn fill_column(&mut self, column: &str, value: Value) {
        self.map_column(column, |_| value.clone());
    }

    /// Appends the rows of `other` below this dataset's rows.
    pub fn concat(mut self, other: Dataset) -> Dataset {
        for column in other.columns {
            if !self.has_column(&column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
        self
    }
}
