//! PostgreSQL store.
//!
//! Selections are rendered to SQL with `sea-query` and executed through a
//! [`SqlExecutor`]. Values are rendered inline by the query builder, so a
//! dynamically typed attribute never has to match the exact Rust type a
//! column's `ToSql` binding would demand. Fetched rows are decoded column by
//! column according to their Postgres type.

use super::selection::{Condition as Filter, Direction, JoinFilter, Predicate, Selection};
use super::{Attributes, RawRow, RelationalStore, RowIter, StoreError};
use crate::executor::{MayPostgresExecutor, SqlExecutor};
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use may_postgres::types::Type;
use may_postgres::Row;
use sea_query::{
    Asterisk, Condition, Expr, ExprTrait, Iden, Order, PostgresQueryBuilder, Query, SelectStatement,
};

/// Runtime identifier for tables and columns.
#[derive(Debug, Clone)]
struct Ident(String);

impl Iden for Ident {
    fn unquoted(&self) -> &str {
        &self.0
    }
}

fn ident(name: &str) -> Ident {
    Ident(name.to_string())
}

fn sea_value(value: &Value) -> sea_query::Value {
    match value {
        Value::Null => None::<String>.into(),
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Float(f) => (*f).into(),
        Value::String(s) => s.clone().into(),
        Value::DateTime(dt) => (*dt).into(),
    }
}

fn predicate_expr(column: Expr, predicate: &Predicate) -> Expr {
    match predicate {
        Predicate::Eq(value) => column.eq(sea_value(value)),
        Predicate::Ne(value) => column.ne(sea_value(value)),
        Predicate::Gt(value) => column.gt(sea_value(value)),
        Predicate::Gte(value) => column.gte(sea_value(value)),
        Predicate::Lt(value) => column.lt(sea_value(value)),
        Predicate::Lte(value) => column.lte(sea_value(value)),
        Predicate::In(values) => column.is_in(values.iter().map(sea_value)),
        Predicate::IsNull => column.is_null(),
        Predicate::IsNotNull => column.is_not_null(),
        Predicate::Like(pattern) => column.like(pattern.clone()),
    }
}

fn exists_subquery(base_table: &str, join: &JoinFilter) -> SelectStatement {
    Query::select()
        .expr(Expr::val(1))
        .from(ident(&join.table))
        .and_where(
            Expr::col((ident(&join.table), ident(&join.foreign_key)))
                .equals((ident(base_table), ident(&join.local_key))),
        )
        .and_where(predicate_expr(
            Expr::col((ident(&join.table), ident(&join.column))),
            &join.predicate,
        ))
        .to_owned()
}

fn where_condition(selection: &Selection) -> Condition {
    selection
        .conditions
        .iter()
        .fold(Condition::all(), |all, condition| match condition {
            Filter::Where(column, predicate) => {
                all.add(predicate_expr(Expr::col(ident(column)), predicate))
            }
            Filter::Any(alternatives) => all.add(alternatives.iter().fold(
                Condition::any(),
                |any, (column, predicate)| any.add(predicate_expr(Expr::col(ident(column)), predicate)),
            )),
            Filter::Exists(join) => all.add(Expr::exists(exists_subquery(&selection.table, join))),
        })
}

pub(crate) fn render_select(selection: &Selection) -> String {
    let mut query = Query::select();
    if selection.columns.is_empty() {
        query.column(Asterisk);
    } else {
        query.columns(selection.columns.iter().map(|column| ident(column)));
    }
    query
        .from(ident(&selection.table))
        .cond_where(where_condition(selection));
    for column in &selection.group_by {
        query.group_by_col(ident(column));
    }
    for (column, predicate) in &selection.having {
        query.and_having(predicate_expr(Expr::col(ident(column)), predicate));
    }
    for (column, direction) in &selection.order_by {
        let order = match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        query.order_by(ident(column), order);
    }
    if let Some(limit) = selection.limit {
        query.limit(limit);
    }
    if let Some(offset) = selection.offset {
        query.offset(offset);
    }
    query.to_string(PostgresQueryBuilder)
}

pub(crate) fn render_insert(table: &str, attributes: &Attributes) -> Result<String, StoreError> {
    let mut query = Query::insert();
    query.into_table(ident(table));
    if attributes.is_empty() {
        query.or_default_values();
    } else {
        query.columns(attributes.keys().map(|column| ident(column)));
        query
            .values(attributes.values().map(|value| Expr::val(sea_value(value))))
            .map_err(|e| StoreError::Query(e.to_string()))?;
    }
    query.returning_col(Asterisk);
    Ok(query.to_string(PostgresQueryBuilder))
}

fn reject_paging(selection: &Selection, statement: &str) -> Result<(), StoreError> {
    if selection.limit.is_some()
        || selection.offset.is_some()
        || !selection.group_by.is_empty()
        || !selection.having.is_empty()
    {
        return Err(StoreError::Unsupported(format!(
            "{statement} on a grouped or paged selection of {}",
            selection.table
        )));
    }
    Ok(())
}

pub(crate) fn render_update(selection: &Selection, attributes: &Attributes) -> Result<String, StoreError> {
    reject_paging(selection, "UPDATE")?;
    let mut query = Query::update();
    query
        .table(ident(&selection.table))
        .cond_where(where_condition(selection));
    for (column, value) in attributes {
        query.value(ident(column), sea_value(value));
    }
    Ok(query.to_string(PostgresQueryBuilder))
}

pub(crate) fn render_delete(selection: &Selection) -> Result<String, StoreError> {
    reject_paging(selection, "DELETE")?;
    Ok(Query::delete()
        .from_table(ident(&selection.table))
        .cond_where(where_condition(selection))
        .to_string(PostgresQueryBuilder))
}

fn decode_column(row: &Row, index: usize, ty: &Type) -> Result<Value, may_postgres::Error> {
    let value = if *ty == Type::BOOL {
        let v: Option<bool> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::INT2 {
        let v: Option<i16> = row.try_get(index)?;
        v.map(i64::from).into()
    } else if *ty == Type::INT4 {
        let v: Option<i32> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::INT8 {
        let v: Option<i64> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::FLOAT4 {
        let v: Option<f32> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::FLOAT8 {
        let v: Option<f64> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::TIMESTAMP {
        let v: Option<NaiveDateTime> = row.try_get(index)?;
        v.into()
    } else if *ty == Type::TIMESTAMPTZ {
        let v: Option<DateTime<Utc>> = row.try_get(index)?;
        v.map(|dt| dt.naive_utc()).into()
    } else if *ty == Type::DATE {
        let v: Option<NaiveDate> = row.try_get(index)?;
        v.and_then(|d| d.and_hms_opt(0, 0, 0)).into()
    } else {
        let v: Option<String> = row.try_get(index)?;
        v.into()
    };
    Ok(value)
}

fn decode_row(table: &str, row: &Row) -> Result<RawRow, StoreError> {
    let mut columns = Attributes::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index, column.type_()).map_err(|e| {
            StoreError::Parse(format!(
                "column `{}` of type {}: {e}",
                column.name(),
                column.type_()
            ))
        })?;
        columns.insert(column.name().to_string(), value);
    }
    Ok(RawRow::new(table, columns))
}

/// `RelationalStore` backed by PostgreSQL.
pub struct PostgresStore<E: SqlExecutor = MayPostgresExecutor> {
    executor: E,
}

impl<E: SqlExecutor> PostgresStore<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: SqlExecutor> RelationalStore for PostgresStore<E> {
    fn iterate(&self, selection: &Selection) -> Result<RowIter, StoreError> {
        let sql = render_select(selection);
        let rows = self.executor.query_all(&sql, &[])?;
        let decoded: Vec<Result<RawRow, StoreError>> = rows
            .iter()
            .map(|row| decode_row(&selection.table, row))
            .collect();
        Ok(Box::new(decoded.into_iter()))
    }

    fn insert(&self, table: &str, attributes: &Attributes) -> Result<Option<RawRow>, StoreError> {
        let sql = render_insert(table, attributes)?;
        let rows = self.executor.query_all(&sql, &[])?;
        rows.first().map(|row| decode_row(table, row)).transpose()
    }

    fn update(&self, selection: &Selection, attributes: &Attributes) -> Result<u64, StoreError> {
        if attributes.is_empty() {
            return Ok(0);
        }
        let sql = render_update(selection, attributes)?;
        self.executor.execute(&sql, &[])
    }

    fn delete(&self, selection: &Selection) -> Result<u64, StoreError> {
        let sql = render_delete(selection)?;
        self.executor.execute(&sql, &[])
    }
}
