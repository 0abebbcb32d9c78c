use super::{Fluent, RowStream};
use crate::connection::Db;
use crate::entity::Entity;
use crate::error::RecordError;
use crate::model::Model;
use crate::store::{RawRow, RelationalStore, Selection};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// In-progress view over the table of `M`.
///
/// Narrow it with the [`Fluent`] operations, then materialize it with
/// [`cursor`](QueryBuilder::cursor), [`get`](QueryBuilder::get) or
/// [`fetch_one`](QueryBuilder::fetch_one). A cursor that runs to the end
/// resets the builder to the unfiltered table.
pub struct QueryBuilder<M: Model> {
    db: Db,
    store: Arc<dyn RelationalStore>,
    selection: Selection,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> QueryBuilder<M> {
    /// Unfiltered view over `M`'s table.
    ///
    /// # Errors
    ///
    /// `ConnectionUninitialized` if `db` has no store.
    pub fn new(db: &Db) -> Result<Self, RecordError> {
        Ok(Self {
            db: db.clone(),
            store: db.store()?.clone(),
            selection: Self::base(),
            _model: PhantomData,
        })
    }

    fn base() -> Selection {
        Selection::table(M::schema().table())
    }

    /// The current view.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Drop every narrowing step.
    pub fn reset(&mut self) {
        self.selection = Self::base();
    }

    /// Lazily iterate the matching entities.
    ///
    /// The store is queried on the first `next`. When the cursor is
    /// exhausted the builder resets to the unfiltered table; dropping it
    /// earlier keeps the current filters.
    pub fn cursor(&mut self) -> Cursor<'_, M> {
        Cursor {
            builder: self,
            stream: RowStream::default(),
        }
    }

    /// Owning cursor over the matching entities.
    pub fn into_cursor(self) -> IntoCursor<M> {
        IntoCursor {
            builder: self,
            stream: RowStream::default(),
        }
    }

    /// Collect the matching entities, resetting the builder.
    ///
    /// # Errors
    ///
    /// The first store or hydration failure.
    pub fn get(&mut self) -> Result<Vec<M>, RecordError> {
        self.cursor().collect()
    }

    /// First matching entity, without resetting the builder.
    ///
    /// # Errors
    ///
    /// Store or hydration failures.
    pub fn fetch_one(&self) -> Result<Option<M>, RecordError> {
        self.store
            .fetch_one(&self.selection)?
            .map(|row| self.hydrate(row))
            .transpose()
    }

    fn hydrate(&self, row: RawRow) -> Result<M, RecordError> {
        Entity::from_row(M::schema(), self.db.clone(), row).map(M::from_entity)
    }

    fn advance(&mut self, stream: &mut RowStream) -> Option<Result<M, RecordError>> {
        match stream.next_row(self.store.as_ref(), &self.selection) {
            Some(Ok(row)) => Some(self.hydrate(row)),
            Some(Err(e)) => Some(Err(e)),
            None => {
                self.reset();
                None
            }
        }
    }
}

impl<M: Model> Fluent for QueryBuilder<M> {
    fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }
}

impl<M: Model> fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("model", &M::schema().name())
            .field("selection", &self.selection)
            .finish()
    }
}

/// Cursor borrowing its [`QueryBuilder`]; see [`QueryBuilder::cursor`].
pub struct Cursor<'a, M: Model> {
    builder: &'a mut QueryBuilder<M>,
    stream: RowStream,
}

impl<M: Model> Iterator for Cursor<'_, M> {
    type Item = Result<M, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.builder.advance(&mut self.stream)
    }
}

/// Cursor owning its [`QueryBuilder`]; see [`QueryBuilder::into_cursor`].
pub struct IntoCursor<M: Model> {
    builder: QueryBuilder<M>,
    stream: RowStream,
}

impl<M: Model> Iterator for IntoCursor<M> {
    type Item = Result<M, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.builder.advance(&mut self.stream)
    }
}
