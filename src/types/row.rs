use std::collections::HashSet;

use crate::error::{DbSqlError, Result};
use crate::traits::DataReader;
use crate::types::SqlValue;

/// Driver-agnostic, fully buffered result of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A [`DataReader`] over a buffered [`ResultSet`].
#[derive(Debug)]
pub struct BufferedReader {
    result: ResultSet,
    // Index of the current row plus one; zero means before the first row.
    position: usize,
}

impl BufferedReader {
    pub fn new(result: ResultSet) -> Self {
        Self {
            result,
            position: 0,
        }
    }

    fn current(&self) -> Result<&[SqlValue]> {
        match self.position {
            0 => Err(DbSqlError::InvalidArgument(
                "reader is not positioned on a row".to_string(),
            )),
            n => self
                .result
                .rows
                .get(n - 1)
                .map(|row| row.as_slice())
                .ok_or_else(|| {
                    DbSqlError::InvalidArgument("reader has no more rows".to_string())
                }),
        }
    }
}

impl DataReader for BufferedReader {
    fn has_rows(&self) -> bool {
        !self.result.rows.is_empty()
    }

    fn advance(&mut self) -> Result<bool> {
        if self.position < self.result.rows.len() {
            self.position += 1;
            return Ok(true);
        }
        // Park past the end so `on_row` reports false.
        self.position = self.result.rows.len() + 1;
        Ok(false)
    }

    fn on_row(&self) -> bool {
        self.position > 0 && self.position <= self.result.rows.len()
    }

    fn field_count(&self) -> usize {
        self.result.columns.len()
    }

    fn field_name(&self, index: usize) -> Result<&str> {
        self.result
            .columns
            .get(index)
            .map(|s| s.as_str())
            .ok_or_else(|| DbSqlError::ColumnNotFound(format!("#{}", index)))
    }

    fn get(&self, index: usize) -> Result<SqlValue> {
        self.current()?
            .get(index)
            .cloned()
            .ok_or_else(|| DbSqlError::ColumnNotFound(format!("#{}", index)))
    }
}

/// Column names reported by a cursor.
/// Read once per result set since they cannot change while it is open.
#[derive(Debug, Clone, Default)]
pub struct ResultColumns {
    names: HashSet<String>,
}

impl ResultColumns {
    pub fn from_reader(reader: &dyn DataReader) -> Result<Self> {
        let names = (0..reader.field_count())
            .map(|i| reader.field_name(i).map(|s| s.to_string()))
            .collect::<Result<HashSet<_>>>()?;
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![SqlValue::Int32(1), SqlValue::Text("John".to_string())],
                vec![SqlValue::Int32(2), SqlValue::Text("Jane".to_string())],
            ],
        )
    }

    #[test]
    fn test_reader_walks_rows_in_order() {
        let mut reader = BufferedReader::new(sample());
        assert!(reader.has_rows());
        assert!(!reader.on_row());

        assert!(reader.advance().unwrap());
        assert_eq!(reader.get(0).unwrap(), SqlValue::Int32(1));
        assert_eq!(
            reader.get_by_name("name").unwrap(),
            SqlValue::Text("John".to_string())
        );

        assert!(reader.advance().unwrap());
        assert_eq!(reader.get(0).unwrap(), SqlValue::Int32(2));

        assert!(!reader.advance().unwrap());
        assert!(!reader.on_row());
        assert!(reader.get(0).is_err());
    }

    #[test]
    fn test_reader_get_before_first_row_fails() {
        let reader = BufferedReader::new(sample());
        match reader.get(0).unwrap_err() {
            DbSqlError::InvalidArgument(_) => {}
            other => panic!("Expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn test_reader_missing_column() {
        let mut reader = BufferedReader::new(sample());
        reader.advance().unwrap();
        match reader.get_by_name("missing").unwrap_err() {
            DbSqlError::ColumnNotFound(name) => assert_eq!(name, "missing"),
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_result_columns() {
        let reader = BufferedReader::new(sample());
        let columns = ResultColumns::from_reader(&reader).unwrap();
        assert_eq!(columns.len(), 2);
        assert!(columns.contains("id"));
        assert!(!columns.contains("age"));
    }
}
