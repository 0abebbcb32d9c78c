//! # Lifeline
//!
//! Active-record layer for the `may` coroutine runtime.
//!
//! Rows are exposed as mutable, lazily loaded [`Entity`] values with
//! attribute-level change tracking, computed attributes (accessors, mutators,
//! casts, date formatting) and relationship traversal (has-one, has-many,
//! belongs-to, belongs-to-many). A fluent [`QueryBuilder`] (and its
//! many-to-many sibling [`PivotedQueryBuilder`]) produces cursors of typed
//! records.
//!
//! ```
//! use lifeline::prelude::*;
//!
//! model! {
//!     pub struct Book => Schema::new("Book", "books").cast("year", CastKind::Integer);
//! }
//!
//! # fn main() -> Result<(), RecordError> {
//! let db = Db::new(MemoryStore::new().with_table("books", "id"));
//! let mut book = Book::create(&db);
//! book.set("title", "Dune")?;
//! book.set("year", "1965")?;
//! book.save()?;
//!
//! let found = Book::find(&db, 1)?.expect("saved above");
//! assert_eq!(found.value("year")?, Value::Int(1965));
//! # Ok(())
//! # }
//! ```
//!
//! See [README on GitHub](https://github.com/microscaler/lifeline) for the full picture.

pub mod config;
pub mod connection;
pub mod entity;
pub mod error;
pub mod executor;
mod macros;
pub mod metrics;
pub mod model;
pub mod query;
pub mod schema;
pub mod store;
pub mod value;

pub use config::DatabaseConfig;
pub use connection::{connect, ConnectionError, Db};
pub use entity::{Attribute, Entity, EntityCursor, Related};
pub use error::RecordError;
pub use executor::{MayPostgresExecutor, SqlExecutor};
pub use model::{Model, Repo};
pub use query::{FilterOp, Fluent, Pivot, PivotedQueryBuilder, QueryBuilder};
pub use schema::{AttributeDef, Schema, Timestamps};
pub use store::{
    Direction, JoinFilter, MemoryStore, PostgresStore, Predicate, RawRow, RelationalStore, Selection,
    StoreError,
};
pub use value::{CastKind, Value};

/// Everything needed to declare and use models.
pub mod prelude {
    pub use crate::{
        attributes, model, CastKind, Db, Direction, Entity, Fluent, JoinFilter, MemoryStore, Model,
        Pivot, Predicate, RecordError, Related, Repo, Schema, Value,
    };
}

#[doc(hidden)]
pub mod __private {
    pub use may;
    pub use once_cell::sync::Lazy;
    pub use serde;
}
