pub mod postgres;

use crate::error::DbpushError;
use chrono::{DateTime, Utc};

/// Metadata for a single result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
}

/// A single cell value from a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
    Null,
}

/// One result row: `(column, value)` pairs in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(cells: Vec<(String, CellValue)>) -> Self {
        Self { cells }
    }

    /// Value of the first column named `column`.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Everything one query execution returned.
///
/// `columns` is empty when no rows came back: the driver only reports
/// column metadata alongside a row.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// A source of rows. Implementations own their connection for the duration
/// of one `fetch` and must release it before returning.
pub trait Backend {
    fn fetch(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = Result<QueryResult, DbpushError>> + Send;
}
