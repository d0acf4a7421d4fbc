//! Pull-based row access and the padded row stream

use crate::data::Value;
use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Serialize};

/// Read-only, pull-based access to a table of rows
pub trait DataCursor {
    /// Number of rows in the source
    fn row_count(&self) -> usize;

    /// Number of columns per row
    fn column_count(&self) -> usize;

    /// Resolve a column name to its index
    fn column_index(&self, name: &str) -> Option<usize>;

    /// Value of a cell; out-of-range access is a data access error
    fn value_at(&self, row: usize, column: usize) -> Result<Value>;
}

/// In-memory table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TableCursor {
    /// Create a table; short rows are padded with nulls
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<Value>>) -> Self {
        for row in &mut rows {
            row.resize(columns.len(), Value::Null);
        }
        Self { columns, rows }
    }

    /// Build a table from string column names and literal rows
    pub fn from_rows<const N: usize>(columns: [&str; N], rows: Vec<[Value; N]>) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter().map(|r| r.to_vec()).collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Normalize a deserialized table (serde bypasses `new`)
    pub fn normalized(self) -> Self {
        Self::new(self.columns, self.rows)
    }
}

impl DataCursor for TableCursor {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn value_at(&self, row: usize, column: usize) -> Result<Value> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .ok_or_else(|| {
                ProcessingError::DataAccess(format!(
                    "cell ({}, {}) outside {}x{} table",
                    row,
                    column,
                    self.rows.len(),
                    self.columns.len()
                ))
            })
    }
}

/// Mapping from the padded row stream to source data items
///
/// Row `i` of the stream designates data item `items[i]`. Synthesized rows
/// repeat an existing data item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowStream {
    items: Vec<usize>,
}

impl RowStream {
    /// One stream row per data item
    pub fn identity(row_count: usize) -> Self {
        Self {
            items: (0..row_count).collect(),
        }
    }

    /// Stream with synthesized rows, checked against the cursor
    pub fn padded(items: Vec<usize>, cursor: &dyn DataCursor) -> Result<Self> {
        if let Some(bad) = items.iter().find(|&&item| item >= cursor.row_count()) {
            return Err(ProcessingError::DataAccess(format!(
                "row stream references data item {} but source has {} rows",
                bad,
                cursor.row_count()
            )));
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Data item designated by a stream row
    pub fn data_item(&self, row: usize) -> Result<usize> {
        self.items.get(row).copied().ok_or_else(|| {
            ProcessingError::DataAccess(format!(
                "row {} outside stream of {} rows",
                row,
                self.items.len()
            ))
        })
    }

    /// Whether the stream row repeats the previous row's data item
    pub fn is_synthesized(&self, row: usize) -> bool {
        row > 0 && row < self.items.len() && self.items[row] == self.items[row - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableCursor {
        TableCursor::from_rows(
            ["region", "amount"],
            vec![
                [Value::from("east"), Value::from(10.0)],
                [Value::from("west"), Value::from(5.0)],
            ],
        )
    }

    #[test]
    fn test_value_at() {
        let t = table();
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_index("amount"), Some(1));
        assert_eq!(t.value_at(1, 0).unwrap(), Value::from("west"));
        assert!(matches!(t.value_at(2, 0), Err(ProcessingError::DataAccess(_))));
    }

    #[test]
    fn test_short_rows_padded() {
        let t = TableCursor::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::from(1.0)]],
        );
        assert_eq!(t.value_at(0, 1).unwrap(), Value::Null);
    }

    #[test]
    fn test_padded_stream() {
        let t = table();
        let stream = RowStream::padded(vec![0, 0, 1], &t).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.data_item(1).unwrap(), 0);
        assert!(stream.is_synthesized(1));
        assert!(!stream.is_synthesized(2));
        assert!(RowStream::padded(vec![0, 2], &t).is_err());
    }
}
