use crate::core::{DbError, Result, Row, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    /// Row views in store order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |row| Record { result: self, row })
    }

    pub fn first(&self) -> Option<Record<'_>> {
        self.records().next()
    }
}

/// A single row with access by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    result: &'a QueryResult,
    row: &'a Row,
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Result<&'a Value> {
        self.result
            .column_index(column)
            .and_then(|idx| self.row.get(idx))
            .ok_or_else(|| DbError::ExecutionError(format!("Column '{}' not in result", column)))
    }

    pub fn i64(&self, column: &str) -> Result<i64> {
        self.get(column)?.expect_i64(column)
    }

    pub fn opt_i64(&self, column: &str) -> Result<Option<i64>> {
        self.get(column)?.optional_i64(column)
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.get(column)?.expect_text(column)
    }

    pub fn bool(&self, column: &str) -> Result<bool> {
        self.get(column)?.expect_bool(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_access_by_name() {
        let result = QueryResult::new(
            vec!["id".into(), "name".into(), "channel_id".into()],
            vec![vec![Value::Integer(1), Value::Text("support".into()), Value::Null]],
        );

        let record = result.first().unwrap();
        assert_eq!(record.i64("id").unwrap(), 1);
        assert_eq!(record.text("name").unwrap(), "support");
        assert_eq!(record.opt_i64("channel_id").unwrap(), None);
        assert!(record.get("missing").is_err());
    }
}
