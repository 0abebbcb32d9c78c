//! Fluent query builders.
//!
//! [`QueryBuilder`] narrows a view over one table and materializes it into
//! entities; [`PivotedQueryBuilder`] does the same for the related side of a
//! many-to-many relationship. Both share the [`Fluent`] surface, whose
//! operations form the closed [`FilterOp`] set. Name-based dispatch
//! ([`Fluent::call`]) accepts exactly these operations.

mod builder;
mod pivoted;

pub use builder::{Cursor, IntoCursor, QueryBuilder};
pub use pivoted::{IntoPivotCursor, Pivot, PivotCursor, PivotedQueryBuilder};

use crate::error::RecordError;
use crate::store::{Condition, Direction, JoinFilter, Predicate, RawRow, RelationalStore, RowIter, Selection};
use crate::value::Value;

/// One narrowing step applied to a [`Selection`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Project the given columns
    Select(Vec<String>),
    Where(String, Predicate),
    /// Alternatives combined with `OR`
    WhereOr(Vec<(String, Predicate)>),
    /// Keep rows with a matching row in another table
    JoinWhere(JoinFilter),
    Group(Vec<String>),
    Having(String, Predicate),
    Order(String, Direction),
    /// Limit and optional offset
    Limit(u64, Option<u64>),
    /// 1-based page number and page size
    Page(u64, u64),
}

impl FilterOp {
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::Select(_) => "select",
            FilterOp::Where(..) => "where",
            FilterOp::WhereOr(_) => "whereOr",
            FilterOp::JoinWhere(_) => "joinWhere",
            FilterOp::Group(_) => "group",
            FilterOp::Having(..) => "having",
            FilterOp::Order(..) => "order",
            FilterOp::Limit(..) => "limit",
            FilterOp::Page(..) => "page",
        }
    }

    pub fn apply(self, selection: &mut Selection) {
        match self {
            FilterOp::Select(columns) => selection.columns = columns,
            FilterOp::Where(column, predicate) => {
                selection.conditions.push(Condition::Where(column, predicate));
            }
            FilterOp::WhereOr(alternatives) => selection.conditions.push(Condition::Any(alternatives)),
            FilterOp::JoinWhere(join) => selection.conditions.push(Condition::Exists(join)),
            FilterOp::Group(columns) => selection.group_by.extend(columns),
            FilterOp::Having(column, predicate) => selection.having.push((column, predicate)),
            FilterOp::Order(column, direction) => selection.order_by.push((column, direction)),
            FilterOp::Limit(limit, offset) => {
                selection.limit = Some(limit);
                if offset.is_some() {
                    selection.offset = offset;
                }
            }
            FilterOp::Page(page, per_page) => {
                selection.limit = Some(per_page);
                selection.offset = Some(page.saturating_sub(1).saturating_mul(per_page));
            }
        }
    }

    /// Build an operation from its name and loosely typed arguments.
    ///
    /// Recognized names are `select`, `where`, `whereOr`, `joinWhere`,
    /// `group`, `having`, `order`, `limit` and `page` (snake_case spellings
    /// work too). A column argument may carry a comparison operator suffix,
    /// as in `where("year >=", 1900)`, and `where`/`having` also take the
    /// operator as a separate middle argument.
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` for any other name, `TypeMismatch` for
    /// arguments that do not fit the operation.
    pub fn parse(name: &str, args: &[Value]) -> Result<Self, RecordError> {
        match name {
            "select" => Ok(FilterOp::Select(strings(name, args)?)),
            "where" => {
                let (column, predicate) = comparison(name, args)?;
                Ok(FilterOp::Where(column, predicate))
            }
            "whereOr" | "where_or" => {
                if args.is_empty() || args.len() % 2 != 0 {
                    return Err(malformed(name, "expects column/value pairs"));
                }
                let alternatives = args
                    .chunks(2)
                    .map(|pair| comparison(name, pair))
                    .collect::<Result<_, _>>()?;
                Ok(FilterOp::WhereOr(alternatives))
            }
            "joinWhere" | "join_where" => {
                if args.len() < 5 {
                    return Err(malformed(
                        name,
                        "expects table, local key, foreign key, column and value",
                    ));
                }
                let table = string(name, &args[0])?;
                let local_key = string(name, &args[1])?;
                let foreign_key = string(name, &args[2])?;
                let (column, predicate) = comparison(name, &args[3..])?;
                Ok(FilterOp::JoinWhere(JoinFilter::new(
                    table,
                    local_key,
                    foreign_key,
                    column,
                    predicate,
                )))
            }
            "group" | "group_by" => Ok(FilterOp::Group(strings(name, args)?)),
            "having" => {
                let (column, predicate) = comparison(name, args)?;
                Ok(FilterOp::Having(column, predicate))
            }
            "order" | "order_by" => {
                let column = args
                    .first()
                    .ok_or_else(|| malformed(name, "expects a column"))
                    .and_then(|column| string(name, column))?;
                let direction = match args.get(1).map(Value::as_str) {
                    None => Direction::Asc,
                    Some(Some(dir)) if dir.eq_ignore_ascii_case("asc") => Direction::Asc,
                    Some(Some(dir)) if dir.eq_ignore_ascii_case("desc") => Direction::Desc,
                    Some(_) => return Err(malformed(name, "direction must be `asc` or `desc`")),
                };
                Ok(FilterOp::Order(column, direction))
            }
            "limit" => match args {
                [limit] => Ok(FilterOp::Limit(count(name, limit)?, None)),
                [limit, offset] => Ok(FilterOp::Limit(count(name, limit)?, Some(count(name, offset)?))),
                _ => Err(malformed(name, "expects a limit and an optional offset")),
            },
            "page" => match args {
                [page, per_page] => {
                    let (page, per_page) = (count(name, page)?, count(name, per_page)?);
                    if page.saturating_sub(1).checked_mul(per_page).is_none() {
                        return Err(malformed(name, "page offset is out of range"));
                    }
                    Ok(FilterOp::Page(page, per_page))
                }
                _ => Err(malformed(name, "expects a page number and a page size")),
            },
            other => Err(RecordError::UnsupportedOperation(other.to_string())),
        }
    }
}

fn malformed(name: &str, reason: &str) -> RecordError {
    RecordError::TypeMismatch(format!("`{name}` {reason}"))
}

fn string(name: &str, value: &Value) -> Result<String, RecordError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(name, "expects column names as strings"))
}

fn strings(name: &str, args: &[Value]) -> Result<Vec<String>, RecordError> {
    args.iter().map(|arg| string(name, arg)).collect()
}

fn count(name: &str, value: &Value) -> Result<u64, RecordError> {
    value
        .as_i64()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| malformed(name, "expects non-negative integers"))
}

fn predicate(operator: &str, value: Value, rest: &[Value]) -> Option<Predicate> {
    Some(match operator.to_ascii_lowercase().as_str() {
        "=" | "==" => Predicate::eq(value),
        "!=" | "<>" => Predicate::ne(value),
        ">" => Predicate::Gt(value),
        ">=" => Predicate::Gte(value),
        "<" => Predicate::Lt(value),
        "<=" => Predicate::Lte(value),
        "like" => Predicate::Like(value.as_str()?.to_string()),
        "in" => Predicate::In(std::iter::once(value).chain(rest.iter().cloned()).collect()),
        _ => return None,
    })
}

/// `[column, value]`, `["column op", value]` or `[column, op, value, ..]`.
fn comparison(name: &str, args: &[Value]) -> Result<(String, Predicate), RecordError> {
    let bad_operator = |op: &str| malformed(name, &format!("has unknown operator `{op}`"));
    match args {
        [column, value] => {
            let column = string(name, column)?;
            match column.trim().split_once(char::is_whitespace) {
                Some((column, operator)) => {
                    let operator = operator.trim();
                    let predicate =
                        predicate(operator, value.clone(), &[]).ok_or_else(|| bad_operator(operator))?;
                    Ok((column.to_string(), predicate))
                }
                None => Ok((column, Predicate::eq(value.clone()))),
            }
        }
        [column, operator, value, rest @ ..] => {
            let column = string(name, column)?;
            let operator = string(name, operator)?;
            let predicate = predicate(&operator, value.clone(), rest).ok_or_else(|| bad_operator(&operator))?;
            if !rest.is_empty() && !matches!(predicate, Predicate::In(_)) {
                return Err(malformed(name, "has too many arguments"));
            }
            Ok((column, predicate))
        }
        _ => Err(malformed(name, "expects a column and a value")),
    }
}

/// Builder surface shared by [`QueryBuilder`] and [`PivotedQueryBuilder`].
pub trait Fluent: Sized {
    /// The view being narrowed.
    fn selection_mut(&mut self) -> &mut Selection;

    /// Apply one operation in place.
    fn apply(&mut self, op: FilterOp) -> &mut Self {
        op.apply(self.selection_mut());
        self
    }

    fn with(mut self, op: FilterOp) -> Self {
        self.apply(op);
        self
    }

    fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(FilterOp::Select(columns.into_iter().map(Into::into).collect()))
    }

    /// Equality filter; comparing with `NULL` means `IS NULL`.
    fn filter(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(FilterOp::Where(column.into(), Predicate::eq(value)))
    }

    fn filter_by(self, column: impl Into<String>, predicate: Predicate) -> Self {
        self.with(FilterOp::Where(column.into(), predicate))
    }

    fn filter_or<I, S>(self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = (S, Predicate)>,
        S: Into<String>,
    {
        self.with(FilterOp::WhereOr(
            alternatives
                .into_iter()
                .map(|(column, predicate)| (column.into(), predicate))
                .collect(),
        ))
    }

    fn join_filter(self, join: JoinFilter) -> Self {
        self.with(FilterOp::JoinWhere(join))
    }

    fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(FilterOp::Group(columns.into_iter().map(Into::into).collect()))
    }

    fn having(self, column: impl Into<String>, predicate: Predicate) -> Self {
        self.with(FilterOp::Having(column.into(), predicate))
    }

    fn order_by(self, column: impl Into<String>, direction: Direction) -> Self {
        self.with(FilterOp::Order(column.into(), direction))
    }

    fn limit(self, limit: u64, offset: Option<u64>) -> Self {
        self.with(FilterOp::Limit(limit, offset))
    }

    /// Page `page` (1-based) of `per_page` rows.
    fn page(self, page: u64, per_page: u64) -> Self {
        self.with(FilterOp::Page(page, per_page))
    }

    /// Apply an operation by name, see [`FilterOp::parse`].
    ///
    /// # Errors
    ///
    /// `UnsupportedOperation` for an unknown name, `TypeMismatch` for
    /// malformed arguments.
    fn call(self, name: &str, args: &[Value]) -> Result<Self, RecordError> {
        Ok(self.with(FilterOp::parse(name, args)?))
    }
}

/// Lazily started stream of rows for one materialization.
#[derive(Default)]
pub(crate) struct RowStream {
    rows: Option<RowIter>,
    done: bool,
}

impl RowStream {
    /// Next row; the store is queried on the first call.
    pub(crate) fn next_row(
        &mut self,
        store: &dyn RelationalStore,
        selection: &Selection,
    ) -> Option<Result<RawRow, RecordError>> {
        if self.done {
            return None;
        }
        if self.rows.is_none() {
            match store.iterate(selection) {
                Ok(rows) => self.rows = Some(rows),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
        match self.rows.as_mut()?.next() {
            Some(row) => Some(row.map_err(RecordError::from)),
            None => {
                self.done = true;
                self.rows = None;
                None
            }
        }
    }
}
