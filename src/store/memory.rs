//! In-process relational store.
//!
//! `MemoryStore` keeps every table as a vector of attribute maps behind a
//! mutex and evaluates [`Selection`]s the way a SQL database would: filter,
//! group (first row of each group), having, order, offset/limit, projection.
//! Tables with a primary key get auto-assigned integer ids on insert.

use super::selection::{Condition, Direction, Predicate, Selection};
use super::{Attributes, RawRow, RelationalStore, RowIter, StoreError};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct MemoryTable {
    primary_key: Option<String>,
    /// `None` once the key space is used up
    next_id: Option<i64>,
    rows: Vec<Attributes>,
}

impl MemoryTable {
    fn new(primary_key: Option<String>) -> Self {
        Self {
            primary_key,
            next_id: Some(1),
            rows: Vec::new(),
        }
    }
}

type Tables = BTreeMap<String, MemoryTable>;

/// Relational store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table whose rows are identified by `primary_key`.
    pub fn with_table(self, name: &str, primary_key: &str) -> Self {
        self.create_table(name, Some(primary_key));
        self
    }

    /// Declare a keyless table, such as a many-to-many junction.
    pub fn with_junction(self, name: &str) -> Self {
        self.create_table(name, None);
        self
    }

    /// Declare a table; an existing table of the same name is left untouched.
    pub fn create_table(&self, name: &str, primary_key: Option<&str>) {
        if let Ok(mut tables) = self.tables.lock() {
            tables
                .entry(name.to_string())
                .or_insert_with(|| MemoryTable::new(primary_key.map(str::to_string)));
        }
    }

    /// Snapshot of every row currently stored in `table`.
    pub fn rows(&self, table: &str) -> Vec<RawRow> {
        self.lock()
            .ok()
            .and_then(|tables| {
                tables.get(table).map(|t| {
                    t.rows
                        .iter()
                        .map(|row| RawRow::new(table, row.clone()))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Query("memory store lock poisoned".to_string()))
    }
}

fn missing_table(table: &str) -> StoreError {
    StoreError::Query(format!("relation \"{table}\" does not exist"))
}

fn condition_holds(tables: &Tables, row: &Attributes, condition: &Condition) -> Result<bool, StoreError> {
    Ok(match condition {
        Condition::Where(column, predicate) => predicate.matches(row.get(column)),
        Condition::Any(alternatives) => alternatives
            .iter()
            .any(|(column, predicate)| predicate.matches(row.get(column))),
        Condition::Exists(join) => {
            let other = tables.get(&join.table).ok_or_else(|| missing_table(&join.table))?;
            let local = row.get(&join.local_key).unwrap_or(&Value::Null);
            other.rows.iter().any(|candidate| {
                Predicate::Eq(local.clone()).matches(candidate.get(&join.foreign_key))
                    && join.predicate.matches(candidate.get(&join.column))
            })
        }
    })
}

fn matching_indices(tables: &Tables, selection: &Selection) -> Result<Vec<usize>, StoreError> {
    let table = tables
        .get(&selection.table)
        .ok_or_else(|| missing_table(&selection.table))?;
    let mut indices = Vec::new();
    'rows: for (index, row) in table.rows.iter().enumerate() {
        for condition in &selection.conditions {
            if !condition_holds(tables, row, condition)? {
                continue 'rows;
            }
        }
        indices.push(index);
    }
    Ok(indices)
}

fn compare_rows(a: &Attributes, b: &Attributes, order_by: &[(String, Direction)]) -> Ordering {
    for (column, direction) in order_by {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        // NULLs sort as larger than any value, as in Postgres.
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ordering = match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn evaluate(tables: &Tables, selection: &Selection) -> Result<Vec<RawRow>, StoreError> {
    let table = tables
        .get(&selection.table)
        .ok_or_else(|| missing_table(&selection.table))?;
    let mut rows: Vec<&Attributes> = matching_indices(tables, selection)?
        .into_iter()
        .map(|index| &table.rows[index])
        .collect();

    if !selection.group_by.is_empty() {
        let mut seen: Vec<Vec<String>> = Vec::new();
        rows.retain(|row| {
            let key: Vec<String> = selection
                .group_by
                .iter()
                .map(|column| format!("{:?}", row.get(column).unwrap_or(&Value::Null)))
                .collect();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }
    rows.retain(|row| {
        selection
            .having
            .iter()
            .all(|(column, predicate)| predicate.matches(row.get(column)))
    });
    if !selection.order_by.is_empty() {
        rows.sort_by(|a, b| compare_rows(a, b, &selection.order_by));
    }

    let offset = selection.offset.unwrap_or(0) as usize;
    let limit = selection.limit.map_or(usize::MAX, |limit| limit as usize);
    Ok(rows
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| {
            let columns = if selection.columns.is_empty() {
                row.clone()
            } else {
                selection
                    .columns
                    .iter()
                    .map(|column| (column.clone(), row.get(column).cloned().unwrap_or_default()))
                    .collect()
            };
            RawRow::new(selection.table.clone(), columns)
        })
        .collect())
}

impl RelationalStore for MemoryStore {
    fn iterate(&self, selection: &Selection) -> Result<RowIter, StoreError> {
        let rows = evaluate(&self.lock()?, selection)?;
        log::debug!("memory store: {} row(s) from {}", rows.len(), selection.table);
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn insert(&self, table: &str, attributes: &Attributes) -> Result<Option<RawRow>, StoreError> {
        let mut tables = self.lock()?;
        let target = tables
            .entry(table.to_string())
            .or_insert_with(|| MemoryTable::new(None));
        let mut row = attributes.clone();
        let Some(primary_key) = target.primary_key.clone() else {
            target.rows.push(row);
            return Ok(None);
        };
        let needs_id = match row.get(&primary_key) {
            Some(Value::Int(id)) => {
                target.next_id = target
                    .next_id
                    .zip(id.checked_add(1))
                    .map(|(next, after)| next.max(after));
                false
            }
            Some(value) => value.is_null(),
            None => true,
        };
        if needs_id {
            let id = target.next_id.ok_or_else(|| {
                StoreError::Query(format!("no primary key left to assign in {table}"))
            })?;
            row.insert(primary_key, Value::Int(id));
            target.next_id = id.checked_add(1);
        }
        target.rows.push(row.clone());
        Ok(Some(RawRow::new(table, row)))
    }

    fn update(&self, selection: &Selection, attributes: &Attributes) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let indices = matching_indices(&tables, selection)?;
        let table = tables
            .get_mut(&selection.table)
            .ok_or_else(|| missing_table(&selection.table))?;
        for &index in &indices {
            let row = &mut table.rows[index];
            for (column, value) in attributes {
                row.insert(column.clone(), value.clone());
            }
        }
        Ok(indices.len() as u64)
    }

    fn delete(&self, selection: &Selection) -> Result<u64, StoreError> {
        let mut tables = self.lock()?;
        let indices = matching_indices(&tables, selection)?;
        let table = tables
            .get_mut(&selection.table)
            .ok_or_else(|| missing_table(&selection.table))?;
        let mut index = 0;
        table.rows.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        Ok(indices.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JoinFilter;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn books() -> MemoryStore {
        let store = MemoryStore::new().with_table("books", "id");
        for (title, year) in [("Dune", 1965), ("Emma", 1815), ("Ubik", 1969)] {
            store
                .insert("books", &attrs(&[("title", title.into()), ("year", year.into())]))
                .unwrap();
        }
        store
    }

    fn titles(store: &MemoryStore, selection: &Selection) -> Vec<String> {
        store
            .iterate(selection)
            .unwrap()
            .map(|row| row.unwrap().get("title").unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = books();
        let row = store.insert("books", &attrs(&[("title", "Solaris".into())])).unwrap().unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(4)));
        assert_eq!(row.table_name(), "books");
    }

    #[test]
    fn test_insert_with_largest_key() {
        let store = books();
        let row = store
            .insert("books", &attrs(&[("id", i64::MAX.into()), ("title", "Last".into())]))
            .unwrap()
            .unwrap();
        assert_eq!(row.get("id"), Some(&Value::Int(i64::MAX)));

        let err = store.insert("books", &attrs(&[("title", "Overflow".into())])).unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(store.rows("books").len(), 4);
    }

    #[test]
    fn test_insert_into_keyless_table_returns_none() {
        let store = MemoryStore::new().with_junction("author_book");
        let row = store.insert("author_book", &attrs(&[("book_id", 1.into())])).unwrap();
        assert!(row.is_none());
        assert_eq!(store.rows("author_book").len(), 1);
    }

    #[test]
    fn test_filter_order_and_paging() {
        let store = books();
        let mut selection = Selection::table("books").and_where("year", Predicate::Gt(1900.into()));
        selection.order_by.push(("year".into(), Direction::Desc));
        assert_eq!(titles(&store, &selection), vec!["Ubik", "Dune"]);

        selection.limit = Some(1);
        selection.offset = Some(1);
        assert_eq!(titles(&store, &selection), vec!["Dune"]);
    }

    #[test]
    fn test_any_condition() {
        let store = books();
        let mut selection = Selection::table("books");
        selection.conditions.push(Condition::Any(vec![
            ("title".into(), Predicate::eq("Emma")),
            ("year".into(), Predicate::eq(1969)),
        ]));
        assert_eq!(titles(&store, &selection), vec!["Emma", "Ubik"]);
    }

    #[test]
    fn test_exists_condition() {
        let store = books().with_table("reviews", "id");
        store
            .insert("reviews", &attrs(&[("book_id", 3.into()), ("stars", 5.into())]))
            .unwrap();
        let mut selection = Selection::table("books");
        selection.conditions.push(Condition::Exists(JoinFilter::new(
            "reviews",
            "id",
            "book_id",
            "stars",
            Predicate::Gte(4.into()),
        )));
        assert_eq!(titles(&store, &selection), vec!["Ubik"]);
    }

    #[test]
    fn test_group_keeps_first_row() {
        let store = books();
        store
            .insert("books", &attrs(&[("title", "Chapterhouse".into()), ("year", 1965.into())]))
            .unwrap();
        let mut selection = Selection::table("books");
        selection.group_by.push("year".into());
        selection.having.push(("year".into(), Predicate::Lt(1968.into())));
        assert_eq!(titles(&store, &selection), vec!["Dune", "Emma"]);
    }

    #[test]
    fn test_projection() {
        let store = books();
        let mut selection = Selection::table("books").with_limit(1);
        selection.columns = vec!["title".into()];
        let row = store.fetch_one(&selection).unwrap().unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn test_update_and_delete() {
        let store = books();
        let selection = Selection::table("books").and_where("title", Predicate::eq("Emma"));
        assert_eq!(store.update(&selection, &attrs(&[("year", 1816.into())])).unwrap(), 1);
        let row = store.fetch_one(&selection).unwrap().unwrap();
        assert_eq!(row.get("year"), Some(&Value::Int(1816)));

        assert_eq!(store.delete(&selection).unwrap(), 1);
        assert!(store.fetch_one(&selection).unwrap().is_none());
        assert_eq!(store.rows("books").len(), 2);
    }

    #[test]
    fn test_unknown_table_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.iterate(&Selection::table("nope")),
            Err(StoreError::Query(_))
        ));
    }

    #[test]
    fn test_dereference() {
        let store = books().with_junction("author_book");
        let link = RawRow::new("author_book", attrs(&[("book_id", 2.into())]));
        let row = store.dereference(&link, "books", "id", "book_id").unwrap().unwrap();
        assert_eq!(row.get("title"), Some(&Value::from("Emma")));

        let dangling = RawRow::new("author_book", attrs(&[("book_id", 99.into())]));
        assert!(store.dereference(&dangling, "books", "id", "book_id").unwrap().is_none());
    }
}
