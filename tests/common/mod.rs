//! Shared models and seeded stores for the integration tests.
#![allow(dead_code)]

use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use fake::Fake;
use lifeline::prelude::*;
use lifeline::store::Attributes;
use lifeline::RelationalStore;
use std::sync::Arc;

fn trim_title(_: &Entity, value: Value) -> Result<Value, RecordError> {
    Ok(match value {
        Value::String(title) => Value::String(title.trim().to_string()),
        other => other,
    })
}

fn label(book: &Entity, _: Value) -> Result<Value, RecordError> {
    let title = book.value("title")?;
    let year = book.value("year")?;
    Ok(Value::String(format!("{title} ({year})")))
}

model! {
    /// Book with casts, a date, a hidden column, a default and relations.
    pub struct Book => Schema::new("Book", "books")
        .cast("year", CastKind::Integer)
        .cast("price", CastKind::Float)
        .date("published_at")
        .hidden("internal_notes")
        .default_value("status", "draft")
        .mutator("title", trim_title)
        .accessor("label", label)
        .relation("authors", |book| Ok(book.belongs_to_many::<Author>(None)?.into()))
        .relation("reviews", |book| Ok(book.has_many::<Review>(None, None)?.into()))
        .relation("publisher", |book| Ok(book.belongs_to::<Publisher>(None, None)?.into()));
}

model! {
    pub struct Author => Schema::new("Author", "authors")
        .timestamps()
        .relation("books", |author| {
            Ok(author
                .belongs_to_many::<Book>(Some(Pivot::new("author_book", "author_id", "book_id")))?
                .into())
        });
}

model! {
    pub struct Review => Schema::new("Review", "reviews").cast("stars", CastKind::Integer);
}

model! {
    pub struct Publisher => Schema::new("Publisher", "publishers")
        .relation("flagship", |publisher| Ok(publisher.has_one::<Book>(None, None)?.into()));
}

/// Empty store with every fixture table declared.
pub fn store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_table("books", "id")
            .with_table("authors", "id")
            .with_table("reviews", "id")
            .with_table("publishers", "id")
            .with_junction("author_book"),
    )
}

pub fn db(store: &Arc<MemoryStore>) -> Db {
    Db::from_arc(store.clone())
}

/// Insert a raw row straight into the store, bypassing entities.
pub fn seed(store: &MemoryStore, table: &str, attributes: Attributes) -> Value {
    store
        .insert(table, &attributes)
        .expect("seed insert")
        .and_then(|row| row.get("id").cloned())
        .unwrap_or_default()
}

pub fn fake_title() -> String {
    Sentence(2..5).fake()
}

pub fn fake_name() -> String {
    Name().fake()
}

/// A saved book with a generated title.
pub fn saved_book(db: &Db, year: i64) -> Book {
    let mut book = Book::create(db);
    book.set("title", fake_title()).expect("title");
    book.set("year", year).expect("year");
    book.save().expect("save book");
    book
}

/// A saved author with a generated name.
pub fn saved_author(db: &Db) -> Author {
    let mut author = Author::create(db);
    author.set("name", fake_name()).expect("name");
    author.save().expect("save author");
    author
}
