//! The per-row record object.
//!
//! An [`Entity`] holds three pieces of state: the row snapshot it was last
//! persisted as (if any), the attribute changes recorded since, and a deleted
//! flag. Reads go through a fixed precedence:
//!
//! 1. unpersisted entities only answer for attributes they have a change for
//! 2. registered relationships (persisted entities only)
//! 3. pending change, then persisted row, then declared default, then `NULL`
//! 4. date formatting
//! 5. accessor
//! 6. cast
//!
//! Writes cast, then run the mutator, then record the change.

mod persistence;
mod relations;
mod serialize;

pub use relations::{EntityCursor, Related};

use crate::connection::Db;
use crate::error::RecordError;
use crate::schema::{AttributeDef, Schema};
use crate::store::{Attributes, RawRow};
use crate::value::{date, CastKind, Value};
use std::fmt;

/// Result of reading an attribute: a plain value or a resolved relationship.
#[derive(Debug)]
pub enum Attribute {
    Value(Value),
    Related(Related),
}

impl Attribute {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Attribute::Value(value) => Some(value),
            Attribute::Related(_) => None,
        }
    }

    pub fn into_related(self) -> Option<Related> {
        match self {
            Attribute::Value(_) => None,
            Attribute::Related(related) => Some(related),
        }
    }
}

/// One row of a table, with change tracking.
pub struct Entity {
    schema: &'static Schema,
    db: Db,
    row: Option<RawRow>,
    changes: Attributes,
    pivot: Option<RawRow>,
    deleted: bool,
}

impl Entity {
    /// A new, unpersisted entity.
    pub fn new(schema: &'static Schema, db: Db) -> Self {
        Self {
            schema,
            db,
            row: None,
            changes: Attributes::new(),
            pivot: None,
            deleted: false,
        }
    }

    /// Hydrate a persisted entity from a fetched row.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the row comes from a table other than the schema's.
    pub fn from_row(schema: &'static Schema, db: Db, row: RawRow) -> Result<Self, RecordError> {
        if row.table_name() != schema.table() {
            return Err(RecordError::TypeMismatch(format!(
                "cannot build {} from a row of `{}`",
                schema.name(),
                row.table_name()
            )));
        }
        #[cfg(feature = "metrics")]
        crate::metrics::METRICS.record_hydration();
        Ok(Self {
            row: Some(row),
            ..Self::new(schema, db)
        })
    }

    /// Attach the junction row this entity was reached through.
    pub fn with_pivot(mut self, pivot: RawRow) -> Self {
        self.pivot = Some(pivot);
        self
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn is_persisted(&self) -> bool {
        self.row.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Row snapshot from the last fetch or save.
    pub fn persisted(&self) -> Option<&RawRow> {
        self.row.as_ref()
    }

    /// Changes recorded since the last save.
    pub fn pending(&self) -> &Attributes {
        &self.changes
    }

    /// Junction row, for entities produced by a pivoted query.
    pub fn pivot(&self) -> Option<&RawRow> {
        self.pivot.as_ref()
    }

    pub fn pivot_value(&self, column: &str) -> Option<&Value> {
        self.pivot.as_ref().and_then(|row| row.get(column))
    }

    /// Persisted primary key value; `NULL` before the first save.
    pub fn primary_key_value(&self) -> Value {
        self.persisted_value(self.schema.primary_key())
    }

    pub(crate) fn persisted_value(&self, column: &str) -> Value {
        self.row
            .as_ref()
            .and_then(|row| row.get(column))
            .cloned()
            .unwrap_or_default()
    }

    fn definition(&self, name: &str) -> Option<&'static AttributeDef> {
        self.schema.attribute(name)
    }

    fn date_format(&self) -> &str {
        self.schema
            .date_format()
            .unwrap_or_else(|| self.db.date_format())
    }

    /// Read an attribute or relationship.
    ///
    /// # Errors
    ///
    /// - `UnpersistedAccess` for an unpersisted entity without a change for `name`
    /// - `TypeMismatch` when a date or cast cannot be applied
    /// - whatever an accessor or relationship resolver reports
    pub fn get(&self, name: &str) -> Result<Attribute, RecordError> {
        if self.row.is_none() && !self.changes.contains_key(name) {
            return Err(RecordError::UnpersistedAccess(name.to_string()));
        }
        if self.row.is_some() {
            if let Some(resolver) = self.schema.resolver(name) {
                return resolver(self).map(Attribute::Related);
            }
        }
        self.read_value(name).map(Attribute::Value)
    }

    /// Read a plain attribute.
    ///
    /// # Errors
    ///
    /// As [`Entity::get`], plus `TypeMismatch` if `name` is a relationship.
    pub fn value(&self, name: &str) -> Result<Value, RecordError> {
        match self.get(name)? {
            Attribute::Value(value) => Ok(value),
            Attribute::Related(_) => Err(RecordError::TypeMismatch(format!(
                "`{name}` is a relationship of {}",
                self.schema.name()
            ))),
        }
    }

    /// Resolve a registered relationship.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if no relationship `name` is registered,
    /// `UnpersistedRelation` before the first save.
    pub fn related(&self, name: &str) -> Result<Related, RecordError> {
        let resolver = self.schema.resolver(name).ok_or_else(|| {
            RecordError::TypeMismatch(format!("{} has no relationship `{name}`", self.schema.name()))
        })?;
        self.ensure_persisted(name)?;
        resolver(self)
    }

    fn raw_value(&self, name: &str) -> Value {
        if let Some(value) = self.changes.get(name) {
            return value.clone();
        }
        if let Some(value) = self.row.as_ref().and_then(|row| row.get(name)) {
            return value.clone();
        }
        self.definition(name)
            .and_then(|def| def.default.clone())
            .unwrap_or_default()
    }

    pub(crate) fn read_value(&self, name: &str) -> Result<Value, RecordError> {
        let def = self.definition(name);
        let mut value = self.raw_value(name);
        if def.is_some_and(|def| def.date) && !value.is_null() {
            let parsed = date::parse_datetime(&value).ok_or_else(|| {
                RecordError::TypeMismatch(format!("`{name}` holds `{value}`, which is not a date"))
            })?;
            value = Value::String(date::format_datetime(&parsed, self.date_format())?);
        }
        if let Some(accessor) = def.and_then(|def| def.accessor) {
            value = accessor(self, value)?;
        }
        // A formatted date is already known to be a date; casting the text back would fail
        let cast = def.and_then(|def| def.cast.filter(|kind| !(def.date && *kind == CastKind::Date)));
        if let Some(kind) = cast {
            value = kind.cast(value)?;
        }
        Ok(value)
    }

    /// Record a change to `name`.
    ///
    /// # Errors
    ///
    /// `DeletedMutation` after deletion, `TypeMismatch` for a value the
    /// attribute's cast rejects, or whatever the mutator reports.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        if self.deleted {
            return Err(RecordError::DeletedMutation);
        }
        let def = self.definition(name);
        let mut value = value.into();
        if let Some(kind) = def.and_then(|def| def.cast) {
            value = kind.cast(value)?;
        }
        if let Some(mutator) = def.and_then(|def| def.mutator) {
            value = mutator(self, value)?;
        }
        self.changes.insert(name.to_string(), value);
        Ok(())
    }

    /// Record `NULL` for `name`.
    ///
    /// # Errors
    ///
    /// As [`Entity::set`].
    pub fn unset(&mut self, name: &str) -> Result<(), RecordError> {
        self.set(name, Value::Null)
    }

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether a change is recorded for `name`, even one to the stored value.
    pub fn is_attribute_dirty(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    pub fn dirty_attributes(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub(crate) fn ensure_persisted(&self, relation: &str) -> Result<(), RecordError> {
        if self.row.is_none() {
            return Err(RecordError::UnpersistedRelation(relation.to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type", &self.schema.name())
            .field("row", &self.row.as_ref().map(RawRow::attributes))
            .field("changes", &self.changes)
            .field("pivot", &self.pivot.as_ref().map(RawRow::attributes))
            .field("deleted", &self.deleted)
            .finish()
    }
}
