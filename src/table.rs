//! Column-oriented result tables and their builder.

use thiserror::Error;

use crate::{
    error::AidaError,
    types::{Layout, MAX_FIELDS},
    value::{Array, Scalar},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Table already has all {0} of its columns")]
    TooManyColumns(usize),
    #[error("Column {column} has {got} rows, table has {expected}")]
    RowCountMismatch {
        column: usize,
        expected: usize,
        got: usize,
    },
    #[error("Table declared with {expected} columns, only {got} were added")]
    Incomplete { expected: usize, got: usize },
    #[error("Tables can have at most {max} columns, not {0}", max = MAX_FIELDS)]
    TooWide(usize),
}

impl From<TableError> for AidaError {
    fn from(value: TableError) -> Self {
        AidaError::internal(value.to_string())
    }
}

/// A completed result table
///
/// Every column holds exactly `row_count` values. Tables are only produced by
/// [`TableBuilder::build`], so a `Table` is always complete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    row_count: usize,
    columns: Vec<Array>,
}

impl Table {
    /// A table with no rows and no columns, for failed requests
    pub fn empty() -> Table {
        Table::default()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Array> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Array] {
        &self.columns
    }

    /// Read a whole row
    pub fn row(&self, index: usize) -> Option<Vec<Scalar>> {
        if index >= self.row_count {
            return None;
        }
        self.columns.iter().map(|c| c.get(index)).collect()
    }

    /// Arrange the cells for serialization in the requested layout
    ///
    /// Column-major gives one entry per column, row-major one entry per row.
    pub fn cells(&self, layout: Layout) -> Vec<Vec<Scalar>> {
        match layout {
            Layout::RowMajor => (0..self.row_count).filter_map(|r| self.row(r)).collect(),
            Layout::ColumnMajor | Layout::Unspecified => {
                self.columns.iter().map(|c| c.iter().collect()).collect()
            }
        }
    }
}

/// Builds a [`Table`] column by column
///
/// The shape is fixed up front, and every column added must match it.
#[derive(Debug)]
pub struct TableBuilder {
    row_count: usize,
    column_count: usize,
    columns: Vec<Array>,
}

impl TableBuilder {
    pub fn new(row_count: usize, column_count: usize) -> Result<Self, TableError> {
        if column_count > MAX_FIELDS {
            return Err(TableError::TooWide(column_count));
        }
        Ok(Self {
            row_count,
            column_count,
            columns: Vec::with_capacity(column_count),
        })
    }

    /// Add the next column
    pub fn add_column(mut self, column: impl Into<Array>) -> Result<Self, TableError> {
        let column = column.into();
        if self.columns.len() >= self.column_count {
            return Err(TableError::TooManyColumns(self.column_count));
        }
        if column.get_count() != self.row_count {
            return Err(TableError::RowCountMismatch {
                column: self.columns.len(),
                expected: self.row_count,
                got: column.get_count(),
            });
        }
        self.columns.push(column);
        Ok(self)
    }

    /// Add a column to a single row table from one value
    pub fn add_single_row(self, value: impl Into<Scalar>) -> Result<Self, TableError> {
        let column = match value.into() {
            Scalar::Boolean(v) => Array::Boolean(vec![v]),
            Scalar::Byte(v) => Array::Byte(vec![v]),
            Scalar::Short(v) => Array::Short(vec![v]),
            Scalar::Integer(v) => Array::Integer(vec![v]),
            Scalar::Long(v) => Array::Long(vec![v]),
            Scalar::Float(v) => Array::Float(vec![v]),
            Scalar::Double(v) => Array::Double(vec![v]),
            Scalar::String(v) => Array::String(vec![v]),
        };
        self.add_column(column)
    }

    pub fn build(self) -> Result<Table, TableError> {
        if self.columns.len() != self.column_count {
            return Err(TableError::Incomplete {
                expected: self.column_count,
                got: self.columns.len(),
            });
        }
        Ok(Table {
            row_count: self.row_count,
            columns: self.columns,
        })
    }
}

/// A one column, one row table holding a single value
pub fn single_value_table(value: impl Into<Scalar>) -> Result<Table, AidaError> {
    Ok(TableBuilder::new(1, 1)?.add_single_row(value)?.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_table() {
        let table = TableBuilder::new(2, 2)
            .unwrap()
            .add_column(vec!["KLYS:LI31:31", "KLYS:LI31:41"])
            .unwrap()
            .add_column(vec![1i16, 2])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(
            table.row(1),
            Some(vec![Scalar::from("KLYS:LI31:41"), Scalar::Short(2)])
        );
        assert_eq!(table.row(2), None);
        assert_eq!(table.cells(Layout::ColumnMajor).len(), 2);
        assert_eq!(
            table.cells(Layout::RowMajor)[0],
            vec![Scalar::from("KLYS:LI31:31"), Scalar::Short(1)]
        );
    }

    #[test]
    fn shape_errors() {
        let builder = TableBuilder::new(2, 1).unwrap();
        assert_eq!(
            builder.add_column(vec![1.0f32]).unwrap_err(),
            TableError::RowCountMismatch {
                column: 0,
                expected: 2,
                got: 1
            }
        );
        let builder = TableBuilder::new(1, 1).unwrap().add_single_row(3i16).unwrap();
        assert_eq!(
            builder.add_single_row(4i16).unwrap_err(),
            TableError::TooManyColumns(1)
        );
        assert!(matches!(
            TableBuilder::new(1, 2).unwrap().add_single_row(true).unwrap().build(),
            Err(TableError::Incomplete {
                expected: 2,
                got: 1
            })
        ));
        assert!(TableBuilder::new(1, 11).is_err());
    }

    #[test]
    fn single_value() {
        let table = single_value_table(12.5f32).unwrap();
        assert_eq!(table.column(0), Some(&Array::Float(vec![12.5])));
    }
}
