use super::Entity;
use crate::error::RecordError;
use crate::model::Model;
use crate::query::{Fluent, Pivot, PivotedQueryBuilder, QueryBuilder};
use std::fmt;

/// Lazily evaluated related entities.
pub type EntityCursor = Box<dyn Iterator<Item = Result<Entity, RecordError>> + Send>;

/// Type-erased value of a relationship.
pub enum Related {
    /// `has_one` / `belongs_to`
    One(Option<Entity>),
    /// `has_many` / `belongs_to_many`
    Many(EntityCursor),
}

impl Related {
    pub fn into_one(self) -> Option<Entity> {
        match self {
            Related::One(entity) => entity,
            Related::Many(_) => None,
        }
    }

    /// Collect every related entity; a single relationship yields zero or one.
    ///
    /// # Errors
    ///
    /// The first error produced while iterating.
    pub fn into_vec(self) -> Result<Vec<Entity>, RecordError> {
        match self {
            Related::One(entity) => Ok(entity.into_iter().collect()),
            Related::Many(cursor) => cursor.collect(),
        }
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::One(entity) => f.debug_tuple("One").field(entity).finish(),
            Related::Many(_) => f.write_str("Many(..)"),
        }
    }
}

impl<R: Model> From<Option<R>> for Related {
    fn from(related: Option<R>) -> Self {
        Related::One(related.map(R::into_entity))
    }
}

impl<R: Model> From<QueryBuilder<R>> for Related {
    fn from(builder: QueryBuilder<R>) -> Self {
        Related::Many(Box::new(
            builder.into_cursor().map(|related| related.map(R::into_entity)),
        ))
    }
}

impl<R: Model> From<PivotedQueryBuilder<R>> for Related {
    fn from(builder: PivotedQueryBuilder<R>) -> Self {
        Related::Many(Box::new(
            builder.into_cursor().map(|related| related.map(R::into_entity)),
        ))
    }
}

impl Entity {
    /// Rows of `R` whose `foreign_key` holds this entity's `local_key`.
    ///
    /// `foreign_key` defaults to `<this type>_id` and `local_key` to the
    /// primary key.
    ///
    /// # Errors
    ///
    /// `UnpersistedRelation` before the first save, `ConnectionUninitialized`
    /// without a store.
    pub fn has_many<R: Model>(
        &self,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<QueryBuilder<R>, RecordError> {
        self.ensure_persisted(R::schema().name())?;
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", self.schema.lower_name()));
        let local_key = local_key.unwrap_or(self.schema.primary_key());
        Ok(QueryBuilder::new(&self.db)?.filter(foreign_key, self.persisted_value(local_key)))
    }

    /// First row of [`Entity::has_many`].
    ///
    /// # Errors
    ///
    /// As [`Entity::has_many`], plus store failures.
    pub fn has_one<R: Model>(
        &self,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Option<R>, RecordError> {
        self.has_many::<R>(foreign_key, local_key)?.fetch_one()
    }

    /// The `R` whose `foreign_key` holds this entity's `local_key`.
    ///
    /// `foreign_key` defaults to `R`'s primary key and `local_key` to
    /// `<R type>_id`.
    ///
    /// # Errors
    ///
    /// As [`Entity::has_one`].
    pub fn belongs_to<R: Model>(
        &self,
        foreign_key: Option<&str>,
        local_key: Option<&str>,
    ) -> Result<Option<R>, RecordError> {
        let related = R::schema();
        self.ensure_persisted(related.name())?;
        let foreign_key = foreign_key.unwrap_or(related.primary_key());
        let local_key = local_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_id", related.lower_name()));
        QueryBuilder::<R>::new(&self.db)?
            .filter(foreign_key, self.persisted_value(&local_key))
            .fetch_one()
    }

    /// Many-to-many relationship through a junction table.
    ///
    /// Without an explicit [`Pivot`] the junction is `<R type>_<this type>`
    /// keyed by `<this type>_id` and `<R type>_id`.
    ///
    /// # Errors
    ///
    /// As [`Entity::has_many`].
    pub fn belongs_to_many<R: Model>(&self, pivot: Option<Pivot>) -> Result<PivotedQueryBuilder<R>, RecordError> {
        self.ensure_persisted(R::schema().name())?;
        let pivot = pivot.unwrap_or_else(|| Pivot::derive(self.schema, R::schema()));
        PivotedQueryBuilder::new(&self.db, pivot, self.primary_key_value())
    }
}
