use super::{Fluent, RowStream};
use crate::connection::Db;
use crate::entity::Entity;
use crate::error::RecordError;
use crate::model::Model;
use crate::schema::Schema;
use crate::store::{Attributes, Predicate, RawRow, RelationalStore, Selection};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Junction table of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pivot {
    pub table: String,
    /// Column holding the origin's primary key
    pub foreign_pivot_key: String,
    /// Column holding the related entity's primary key
    pub related_pivot_key: String,
}

impl Pivot {
    pub fn new(
        table: impl Into<String>,
        foreign_pivot_key: impl Into<String>,
        related_pivot_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            foreign_pivot_key: foreign_pivot_key.into(),
            related_pivot_key: related_pivot_key.into(),
        }
    }

    /// Conventional junction between `origin` and `related`:
    /// `<related>_<origin>` keyed by `<origin>_id` and `<related>_id`.
    pub fn derive(origin: &Schema, related: &Schema) -> Self {
        let origin = origin.lower_name();
        let related = related.lower_name();
        Self::new(
            format!("{related}_{origin}"),
            format!("{origin}_id"),
            format!("{related}_id"),
        )
    }
}

/// Related side of a many-to-many relationship, seen from one origin entity.
///
/// Filters apply to the junction rows; each surviving junction row is
/// followed to the row of `R` it references.
pub struct PivotedQueryBuilder<R: Model> {
    db: Db,
    store: Arc<dyn RelationalStore>,
    pivot: Pivot,
    origin_key: Value,
    selection: Selection,
    _model: PhantomData<fn() -> R>,
}

impl<R: Model> PivotedQueryBuilder<R> {
    /// Junction rows whose foreign pivot key equals `origin_key`.
    ///
    /// # Errors
    ///
    /// `ConnectionUninitialized` if `db` has no store.
    pub fn new(db: &Db, pivot: Pivot, origin_key: impl Into<Value>) -> Result<Self, RecordError> {
        let origin_key = origin_key.into();
        Ok(Self {
            db: db.clone(),
            store: db.store()?.clone(),
            selection: Self::base(&pivot, &origin_key),
            pivot,
            origin_key,
            _model: PhantomData,
        })
    }

    fn base(pivot: &Pivot, origin_key: &Value) -> Selection {
        Selection::table(pivot.table.clone())
            .and_where(pivot.foreign_pivot_key.clone(), Predicate::eq(origin_key.clone()))
    }

    pub fn pivot(&self) -> &Pivot {
        &self.pivot
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Back to the junction rows of the origin, unfiltered.
    pub fn reset(&mut self) {
        self.selection = Self::base(&self.pivot, &self.origin_key);
    }

    /// Lazily iterate the related entities; resets the builder when exhausted.
    pub fn cursor(&mut self) -> PivotCursor<'_, R> {
        PivotCursor {
            builder: self,
            stream: RowStream::default(),
        }
    }

    pub fn into_cursor(self) -> IntoPivotCursor<R> {
        IntoPivotCursor {
            builder: self,
            stream: RowStream::default(),
        }
    }

    /// Collect the related entities, resetting the builder.
    ///
    /// # Errors
    ///
    /// The first store or hydration failure.
    pub fn get(&mut self) -> Result<Vec<R>, RecordError> {
        self.cursor().collect()
    }

    /// First related entity, without resetting the builder.
    ///
    /// # Errors
    ///
    /// Store or hydration failures.
    pub fn fetch_one(&self) -> Result<Option<R>, RecordError> {
        let mut stream = RowStream::default();
        while let Some(junction) = stream.next_row(self.store.as_ref(), &self.selection) {
            if let Some(related) = self.resolve(junction?)? {
                return Ok(Some(related));
            }
        }
        Ok(None)
    }

    /// Link the origin to the `R` keyed `related_key`.
    ///
    /// `extra` holds additional junction columns. Existing links are not
    /// checked, so attaching twice stores two junction rows.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn attach(&self, related_key: impl Into<Value>, extra: Attributes) -> Result<(), RecordError> {
        let mut link = extra;
        link.insert(self.pivot.related_pivot_key.clone(), related_key.into());
        link.insert(self.pivot.foreign_pivot_key.clone(), self.origin_key.clone());
        self.store.insert(&self.pivot.table, &link)?;
        Ok(())
    }

    /// Remove the origin's links to the `R` keyed `related_key`; returns how
    /// many junction rows were deleted.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn detach(&self, related_key: impl Into<Value>) -> Result<u64, RecordError> {
        let links = Self::base(&self.pivot, &self.origin_key)
            .and_where(self.pivot.related_pivot_key.clone(), Predicate::eq(related_key));
        Ok(self.store.delete(&links)?)
    }

    fn resolve(&self, junction: RawRow) -> Result<Option<R>, RecordError> {
        let schema = R::schema();
        let Some(row) = self.store.dereference(
            &junction,
            schema.table(),
            schema.primary_key(),
            &self.pivot.related_pivot_key,
        )?
        else {
            log::warn!(
                "{} row references a missing {}: {:?}",
                self.pivot.table,
                schema.name(),
                junction.get(&self.pivot.related_pivot_key)
            );
            return Ok(None);
        };
        let entity = Entity::from_row(schema, self.db.clone(), row)?.with_pivot(junction);
        Ok(Some(R::from_entity(entity)))
    }

    fn advance(&mut self, stream: &mut RowStream) -> Option<Result<R, RecordError>> {
        loop {
            let junction = match stream.next_row(self.store.as_ref(), &self.selection) {
                Some(Ok(junction)) => junction,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.reset();
                    return None;
                }
            };
            match self.resolve(junction) {
                Ok(Some(related)) => return Some(Ok(related)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<R: Model> Fluent for PivotedQueryBuilder<R> {
    fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }
}

impl<R: Model> fmt::Debug for PivotedQueryBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PivotedQueryBuilder")
            .field("model", &R::schema().name())
            .field("pivot", &self.pivot)
            .field("origin_key", &self.origin_key)
            .field("selection", &self.selection)
            .finish()
    }
}

/// Cursor borrowing its [`PivotedQueryBuilder`].
pub struct PivotCursor<'a, R: Model> {
    builder: &'a mut PivotedQueryBuilder<R>,
    stream: RowStream,
}

impl<R: Model> Iterator for PivotCursor<'_, R> {
    type Item = Result<R, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.builder.advance(&mut self.stream)
    }
}

/// Cursor owning its [`PivotedQueryBuilder`].
pub struct IntoPivotCursor<R: Model> {
    builder: PivotedQueryBuilder<R>,
    stream: RowStream,
}

impl<R: Model> Iterator for IntoPivotCursor<R> {
    type Item = Result<R, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.builder.advance(&mut self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_pivot_names() {
        let book = Schema::new("Book", "books");
        let author = Schema::new("Author", "authors");
        let pivot = Pivot::derive(&book, &author);
        assert_eq!(pivot, Pivot::new("author_book", "book_id", "author_id"));
    }
}
