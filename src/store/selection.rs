//! Description of a filtered view over one table.
//!
//! A [`Selection`] is what query builders hand to a
//! [`RelationalStore`](super::RelationalStore): the table, the projected
//! columns and the filter/group/order/paging state. Stores interpret it; the
//! memory store evaluates it in process, the Postgres store renders it to SQL.

use crate::value::Value;

/// Sort direction of an `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Test applied to one column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    IsNull,
    IsNotNull,
    /// SQL `LIKE` pattern with `%` and `_` wildcards
    Like(String),
}

impl Predicate {
    /// Equality that follows SQL builder conventions: comparing with `NULL`
    /// becomes `IS NULL`.
    pub fn eq(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Predicate::IsNull,
            value => Predicate::Eq(value),
        }
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Null => Predicate::IsNotNull,
            value => Predicate::Ne(value),
        }
    }

    /// Evaluate against a column value; a missing column reads as `NULL`.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Predicate::IsNull => value.is_null(),
            Predicate::IsNotNull => !value.is_null(),
            Predicate::Eq(expected) => {
                if expected.is_null() {
                    value.is_null()
                } else {
                    value.loose_eq(expected)
                }
            }
            Predicate::Ne(expected) => !value.is_null() && !value.loose_eq(expected),
            Predicate::Gt(bound) => value.compare(bound).is_some_and(|o| o.is_gt()),
            Predicate::Gte(bound) => value.compare(bound).is_some_and(|o| o.is_ge()),
            Predicate::Lt(bound) => value.compare(bound).is_some_and(|o| o.is_lt()),
            Predicate::Lte(bound) => value.compare(bound).is_some_and(|o| o.is_le()),
            Predicate::In(candidates) => candidates.iter().any(|c| value.loose_eq(c)),
            Predicate::Like(pattern) => match value {
                Value::Null => false,
                other => like(&other.to_string(), pattern),
            },
        }
    }
}

/// Restriction to rows that have at least one matching row in another table:
/// `EXISTS (SELECT 1 FROM table WHERE table.foreign_key = base.local_key AND table.column <predicate>)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinFilter {
    pub table: String,
    pub local_key: String,
    pub foreign_key: String,
    pub column: String,
    pub predicate: Predicate,
}

impl JoinFilter {
    pub fn new(
        table: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
        column: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            table: table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
            column: column.into(),
            predicate,
        }
    }
}

/// One `WHERE` term; terms are combined with `AND`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Where(String, Predicate),
    /// Alternatives combined with `OR`
    Any(Vec<(String, Predicate)>),
    Exists(JoinFilter),
}

/// A filtered view over one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub table: String,
    /// Projected columns; empty means every column
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub group_by: Vec<String>,
    pub having: Vec<(String, Predicate)>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Selection {
    /// Unfiltered selection of every row of `table`.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn and_where(mut self, column: impl Into<String>, predicate: Predicate) -> Self {
        self.conditions.push(Condition::Where(column.into(), predicate));
        self
    }

    /// Cap the row count; an existing smaller limit wins.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(self.limit.map_or(limit, |current| current.min(limit)));
        self
    }

    /// True when the selection restricts, reorders or pages its table.
    pub fn is_filtered(&self) -> bool {
        !(self.columns.is_empty()
            && self.conditions.is_empty()
            && self.group_by.is_empty()
            && self.having.is_empty()
            && self.order_by.is_empty()
            && self.limit.is_none()
            && self.offset.is_none())
    }
}

/// SQL `LIKE` matching; `%` matches any run of characters, `_` exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it is currently matched up to
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    star = Some((star_p, star_t + 1));
                    p = star_p + 1;
                    t = star_t + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_null_becomes_is_null() {
        assert_eq!(Predicate::eq(Value::Null), Predicate::IsNull);
        assert_eq!(Predicate::ne(None::<i64>), Predicate::IsNotNull);
        assert_eq!(Predicate::eq(3), Predicate::Eq(Value::Int(3)));
    }

    #[test]
    fn test_predicate_matches() {
        assert!(Predicate::eq(1).matches(Some(&Value::Float(1.0))));
        assert!(!Predicate::eq(1).matches(None));
        assert!(Predicate::IsNull.matches(None));
        assert!(Predicate::Gt(Value::Int(3)).matches(Some(&Value::Int(4))));
        assert!(!Predicate::Gt(Value::Int(3)).matches(Some(&Value::from("4"))));
        assert!(Predicate::In(vec![Value::Int(1), Value::Int(2)]).matches(Some(&Value::Int(2))));
        assert!(!Predicate::ne(2).matches(Some(&Value::Null)));
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("Dune Messiah", "Dune%"));
        assert!(like("Dune", "D_ne"));
        assert!(like("Dune", "%"));
        assert!(!like("Dune", "D_n"));
        assert!(!like("Children of Dune", "Dune%"));
        assert!(like("Children of Dune", "%of%Dune"));
        assert!(like("", "%%"));
        assert!(!like("", "_"));
        assert!(like("abcbd", "%b_"));
    }

    #[test]
    fn test_like_many_wildcards_on_long_text() {
        let text = "a".repeat(5_000);
        assert!(!like(&text, "%a%a%a%a%b"));
        assert!(like(&format!("{text}b"), "%a%a%a%a%b"));
    }

    #[test]
    fn test_is_filtered() {
        assert!(!Selection::table("books").is_filtered());
        assert!(Selection::table("books").with_limit(1).is_filtered());
        assert!(Selection::table("books").and_where("id", Predicate::eq(1)).is_filtered());
    }
}
