//! Typed record types.
//!
//! A [`Model`] is a thin newtype over [`Entity`] bound to a static [`Schema`];
//! [`model!`](crate::model) generates one. Every model gets the [`Repo`]
//! entry points: `find`, `create` and the fluent operations, each of which
//! starts a fresh [`QueryBuilder`].

use crate::connection::Db;
use crate::entity::Entity;
use crate::error::RecordError;
use crate::query::{Fluent, QueryBuilder};
use crate::schema::Schema;
use crate::store::{Direction, JoinFilter, Predicate};
use crate::value::Value;

/// A record type: a schema plus conversions to and from [`Entity`].
pub trait Model: Sized + Send + 'static {
    fn schema() -> &'static Schema;

    fn from_entity(entity: Entity) -> Self;

    fn entity(&self) -> &Entity;

    fn entity_mut(&mut self) -> &mut Entity;

    fn into_entity(self) -> Entity;

    /// A new, unpersisted record bound to `db`.
    fn new(db: &Db) -> Self {
        Self::from_entity(Entity::new(Self::schema(), db.clone()))
    }
}

/// Static entry points of every [`Model`].
pub trait Repo: Model {
    /// Same as [`Model::new`].
    fn create(db: &Db) -> Self {
        Self::new(db)
    }

    /// The record whose primary key equals `id`; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store, or store failures.
    fn find(db: &Db, id: impl Into<Value>) -> Result<Option<Self>, RecordError> {
        Self::query(db)?.filter(Self::schema().primary_key(), id).fetch_one()
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn query(db: &Db) -> Result<QueryBuilder<Self>, RecordError> {
        QueryBuilder::new(db)
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn select<I, S>(db: &Db, columns: I) -> Result<QueryBuilder<Self>, RecordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::query(db)?.select(columns))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn filter(
        db: &Db,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.filter(column, value))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn filter_by(
        db: &Db,
        column: impl Into<String>,
        predicate: Predicate,
    ) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.filter_by(column, predicate))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn filter_or<I, S>(db: &Db, alternatives: I) -> Result<QueryBuilder<Self>, RecordError>
    where
        I: IntoIterator<Item = (S, Predicate)>,
        S: Into<String>,
    {
        Ok(Self::query(db)?.filter_or(alternatives))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn join_filter(db: &Db, join: JoinFilter) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.join_filter(join))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn group_by<I, S>(db: &Db, columns: I) -> Result<QueryBuilder<Self>, RecordError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::query(db)?.group_by(columns))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn having(
        db: &Db,
        column: impl Into<String>,
        predicate: Predicate,
    ) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.having(column, predicate))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn order_by(
        db: &Db,
        column: impl Into<String>,
        direction: Direction,
    ) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.order_by(column, direction))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn limit(db: &Db, limit: u64, offset: Option<u64>) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.limit(limit, offset))
    }

    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store.
    fn page(db: &Db, page: u64, per_page: u64) -> Result<QueryBuilder<Self>, RecordError> {
        Ok(Self::query(db)?.page(page, per_page))
    }

    /// Start a query with an operation given by name.
    ///
    /// # Errors
    ///
    /// `ConnectionUninitialized` without a store, `UnsupportedOperation` for
    /// an unknown name, `TypeMismatch` for malformed arguments.
    fn call(db: &Db, name: &str, args: &[Value]) -> Result<QueryBuilder<Self>, RecordError> {
        Self::query(db)?.call(name, args)
    }
}

impl<M: Model> Repo for M {}
