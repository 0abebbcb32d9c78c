//! Declarative per-type metadata.
//!
//! A [`Schema`] names the table and primary key of a record type, switches
//! timestamp bookkeeping on, and declares how individual attributes behave:
//! cast kind, date formatting, accessor, mutator, default value and whether
//! the attribute is hidden from serialization. Relationships are registered by
//! name with a resolver function.
//!
//! Schemas are built once per type and stored in a static, see
//! [`model!`](crate::model).

use crate::entity::{Entity, Related};
use crate::error::RecordError;
use crate::value::{CastKind, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Computed read of one attribute; receives the raw (or date-formatted) value.
pub type Accessor = fn(&Entity, Value) -> Result<Value, RecordError>;

/// Transformation applied to a value before it is recorded as a change.
pub type Mutator = fn(&Entity, Value) -> Result<Value, RecordError>;

/// Named relationship resolver.
pub type RelationResolver = fn(&Entity) -> Result<Related, RecordError>;

/// Behaviour of one attribute.
#[derive(Clone, Default)]
pub struct AttributeDef {
    pub cast: Option<CastKind>,
    pub date: bool,
    pub hidden: bool,
    pub default: Option<Value>,
    pub accessor: Option<Accessor>,
    pub mutator: Option<Mutator>,
}

impl AttributeDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cast(mut self, kind: CastKind) -> Self {
        self.cast = Some(kind);
        self
    }

    pub fn date(mut self) -> Self {
        self.date = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn mutator(mut self, mutator: Mutator) -> Self {
        self.mutator = Some(mutator);
        self
    }
}

impl fmt::Debug for AttributeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDef")
            .field("cast", &self.cast)
            .field("date", &self.date)
            .field("hidden", &self.hidden)
            .field("default", &self.default)
            .field("accessor", &self.accessor.is_some())
            .field("mutator", &self.mutator.is_some())
            .finish()
    }
}

/// Columns maintained on save when timestamps are enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: String,
    pub updated_at: String,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: "creation_date".to_string(),
            updated_at: "last_update".to_string(),
        }
    }
}

/// Metadata shared by every entity of one record type.
pub struct Schema {
    name: String,
    table: String,
    primary_key: String,
    timestamps: Option<Timestamps>,
    date_format: Option<String>,
    attributes: BTreeMap<String, AttributeDef>,
    relations: BTreeMap<String, RelationResolver>,
}

impl Schema {
    /// Schema of type `name` stored in `table`, keyed by `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            timestamps: None,
            date_format: None,
            attributes: BTreeMap::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Maintain `creation_date` and `last_update` on save.
    pub fn timestamps(self) -> Self {
        self.timestamp_columns(Timestamps::default())
    }

    pub fn timestamp_columns(mut self, columns: Timestamps) -> Self {
        self.timestamps = Some(columns);
        self
    }

    pub fn format_dates(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    /// Declare an attribute, replacing any earlier declaration.
    pub fn define(mut self, name: impl Into<String>, def: AttributeDef) -> Self {
        self.attributes.insert(name.into(), def);
        self
    }

    fn update(mut self, name: &str, apply: impl FnOnce(&mut AttributeDef)) -> Self {
        apply(self.attributes.entry(name.to_string()).or_default());
        self
    }

    pub fn cast(self, name: &str, kind: CastKind) -> Self {
        self.update(name, |def| def.cast = Some(kind))
    }

    /// Format `name` as a date on read. A `CastKind::Date` on the same
    /// attribute still validates writes but is skipped on read.
    pub fn date(self, name: &str) -> Self {
        self.update(name, |def| def.date = true)
    }

    pub fn hidden(self, name: &str) -> Self {
        self.update(name, |def| def.hidden = true)
    }

    pub fn default_value(self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.update(name, |def| def.default = Some(value))
    }

    pub fn accessor(self, name: &str, accessor: Accessor) -> Self {
        self.update(name, |def| def.accessor = Some(accessor))
    }

    pub fn mutator(self, name: &str, mutator: Mutator) -> Self {
        self.update(name, |def| def.mutator = Some(mutator))
    }

    /// Register a relationship readable through [`Entity::get`].
    pub fn relation(mut self, name: impl Into<String>, resolver: RelationResolver) -> Self {
        self.relations.insert(name.into(), resolver);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased type name, the stem of derived key and junction names.
    pub fn lower_name(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn timestamp_settings(&self) -> Option<&Timestamps> {
        self.timestamps.as_ref()
    }

    pub fn date_format(&self) -> Option<&str> {
        self.date_format.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeDef)> {
        self.attributes.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn resolver(&self, name: &str) -> Option<RelationResolver> {
        self.relations.get(name).copied()
    }

    pub fn is_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|def| def.hidden)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("timestamps", &self.timestamps)
            .field("date_format", &self.date_format)
            .field("attributes", &self.attributes)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shout(_: &Entity, value: Value) -> Result<Value, RecordError> {
        Ok(Value::String(value.to_string().to_uppercase()))
    }

    #[test]
    fn test_defaults() {
        let schema = Schema::new("BookAuthor", "book_authors");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.lower_name(), "bookauthor");
        assert!(schema.timestamp_settings().is_none());
        assert!(schema.date_format().is_none());
    }

    #[test]
    fn test_attribute_declarations_merge() {
        let schema = Schema::new("Book", "books")
            .key("isbn")
            .timestamps()
            .cast("year", CastKind::Integer)
            .default_value("year", 2000)
            .hidden("secret")
            .mutator("title", shout);
        let year = schema.attribute("year").unwrap();
        assert_eq!(year.cast, Some(CastKind::Integer));
        assert_eq!(year.default, Some(Value::Int(2000)));
        assert!(schema.is_hidden("secret"));
        assert!(!schema.is_hidden("year"));
        assert!(schema.attribute("title").unwrap().mutator.is_some());
        assert_eq!(schema.primary_key(), "isbn");
        assert_eq!(
            schema.timestamp_settings().map(|t| t.created_at.as_str()),
            Some("creation_date")
        );
    }

    #[test]
    fn test_define_replaces() {
        let schema = Schema::new("Book", "books")
            .cast("year", CastKind::Integer)
            .define("year", AttributeDef::new().date());
        let year = schema.attribute("year").unwrap();
        assert!(year.date);
        assert_eq!(year.cast, None);
    }
}
