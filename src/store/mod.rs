//! The relational store consumed by the record layer.
//!
//! Query execution, connection management and schema conventions live behind
//! the [`RelationalStore`] trait. The record layer only ever hands it a
//! [`Selection`] (or a table name and an attribute map) and receives
//! [`RawRow`]s back.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: in-process tables, used by tests and demos
//! - [`PostgresStore`]: `may_postgres` execution of `sea-query` rendered SQL

pub mod memory;
pub mod postgres;
pub mod selection;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use selection::{Condition, Direction, JoinFilter, Predicate, Selection};

use crate::value::Value;
use may_postgres::Error as PostgresError;
use std::collections::BTreeMap;
use std::fmt;

/// Column name → value map of one row or one write.
pub type Attributes = BTreeMap<String, Value>;

/// Lazily consumed rows produced by [`RelationalStore::iterate`].
pub type RowIter = Box<dyn Iterator<Item = Result<RawRow, StoreError>> + Send>;

/// Store error type
#[derive(Debug)]
pub enum StoreError {
    /// `PostgreSQL` error from `may_postgres`
    Postgres(PostgresError),
    /// Query execution error
    Query(String),
    /// Row decoding error
    Parse(String),
    /// The store cannot express the requested operation
    Unsupported(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Postgres(e) => write!(f, "PostgreSQL error: {e}"),
            StoreError::Query(s) => write!(f, "Query error: {s}"),
            StoreError::Parse(s) => write!(f, "Parse error: {s}"),
            StoreError::Unsupported(s) => write!(f, "Unsupported by store: {s}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        StoreError::Postgres(err)
    }
}

/// One row as returned by a store, tagged with the table it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    table: String,
    columns: Attributes,
}

impl RawRow {
    pub fn new(table: impl Into<String>, columns: Attributes) -> Self {
        Self {
            table: table.into(),
            columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.columns
    }

    pub fn into_attributes(self) -> Attributes {
        self.columns
    }
}

/// Trait for the relational store backing the record layer
///
/// Every call is synchronous and atomic from the caller's point of view;
/// timeouts and retries are the implementation's concern.
pub trait RelationalStore: Send + Sync {
    /// Rows matching `selection`.
    fn iterate(&self, selection: &Selection) -> Result<RowIter, StoreError>;

    /// First row matching `selection`, if any.
    fn fetch_one(&self, selection: &Selection) -> Result<Option<RawRow>, StoreError> {
        let selection = selection.clone().with_limit(1);
        self.iterate(&selection)?.next().transpose()
    }

    /// Insert one row and return it as stored.
    ///
    /// `Ok(None)` means the row was written but its identity cannot be read
    /// back (for example a table without a primary key).
    fn insert(&self, table: &str, attributes: &Attributes) -> Result<Option<RawRow>, StoreError>;

    /// Apply `attributes` to every row matching `selection`; returns the count.
    fn update(&self, selection: &Selection, attributes: &Attributes) -> Result<u64, StoreError>;

    /// Delete every row matching `selection`; returns the count.
    fn delete(&self, selection: &Selection) -> Result<u64, StoreError>;

    /// Follow `row[foreign_key]` to the row of `target_table` whose
    /// `target_key` holds that value.
    fn dereference(
        &self,
        row: &RawRow,
        target_table: &str,
        target_key: &str,
        foreign_key: &str,
    ) -> Result<Option<RawRow>, StoreError> {
        let value = match row.get(foreign_key) {
            Some(value) if !value.is_null() => value.clone(),
            _ => return Ok(None),
        };
        self.fetch_one(&Selection::table(target_table).and_where(target_key, Predicate::eq(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert!(StoreError::Query("x".into()).to_string().contains("Query error"));
        assert!(StoreError::Parse("x".into()).to_string().contains("Parse error"));
        assert!(StoreError::Unsupported("x".into()).to_string().contains("Unsupported"));
    }

    #[test]
    fn test_raw_row_accessors() {
        let mut columns = Attributes::new();
        columns.insert("id".into(), Value::Int(1));
        let row = RawRow::new("books", columns);
        assert_eq!(row.table_name(), "books");
        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert!(!row.contains("title"));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id"]);
    }
}
