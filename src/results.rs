use std::collections::HashMap;
use std::sync::Arc;

use crate::types::RowValues;

/// Column names of one result set plus a name-to-index lookup, shared by all of its rows.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

impl ColumnSet {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        // First occurrence wins for duplicate names, like a linear search would.
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            names: Arc::new(names),
            index: Arc::new(index),
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, column_name: &str) -> Option<usize> {
        self.index.get(column_name).copied()
    }
}

/// A single row converted into [`RowValues`].
///
/// Rows are only materialized when the callback asks the cursor for one.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: ColumnSet,
    /// Index of the result set this row belongs to (procedures may return several).
    pub result_index: usize,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
}

impl DbRow {
    #[must_use]
    pub fn new(columns: ColumnSet, result_index: usize, values: Vec<RowValues>) -> Self {
        Self {
            columns,
            result_index,
            values,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let columns = ColumnSet::new(vec!["id".into(), "name".into(), "id".into()]);
        let row = DbRow::new(
            columns,
            0,
            vec![
                RowValues::Int(7),
                RowValues::Text("x".into()),
                RowValues::Int(8),
            ],
        );
        assert_eq!(row.get("id"), Some(&RowValues::Int(7)));
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("x"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_by_index(2), Some(&RowValues::Int(8)));
        assert_eq!(row.column_names().len(), 3);
    }
}
