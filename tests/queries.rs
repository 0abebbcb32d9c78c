//! Fluent queries and cursor behavior.

mod common;

use common::{db, seed, store, Book, Review};
use lifeline::prelude::*;
use lifeline::{FilterOp, MemoryStore, QueryBuilder};
use std::sync::Arc;

fn shelf() -> Arc<MemoryStore> {
    let store = store();
    for (title, year, genre) in [
        ("Dune", 1965, "sf"),
        ("Emma", 1815, "romance"),
        ("Neuromancer", 1984, "sf"),
        ("Persuasion", 1817, "romance"),
        ("Hyperion", 1989, "sf"),
    ] {
        seed(&store, "books", attributes! { "title" => title, "year" => year, "genre" => genre });
    }
    store
}

fn titles(books: Vec<Book>) -> Vec<String> {
    books
        .iter()
        .map(|book| book.value("title").unwrap().to_string())
        .collect()
}

#[test]
fn test_filter_and_order() {
    let store = shelf();
    let db = db(&store);

    let mut query = Book::filter(&db, "genre", "sf")
        .unwrap()
        .order_by("year", Direction::Desc);
    assert_eq!(titles(query.get().unwrap()), ["Hyperion", "Neuromancer", "Dune"]);
}

#[test]
fn test_comparison_and_or_filters() {
    let store = shelf();
    let db = db(&store);

    let mut modern = Book::filter_by(&db, "year", Predicate::Gte(1965.into()))
        .unwrap()
        .filter_by("title", Predicate::Like("%n%".into()))
        .order_by("title", Direction::Asc);
    assert_eq!(titles(modern.get().unwrap()), ["Dune", "Hyperion", "Neuromancer"]);

    let mut either = Book::filter_or(
        &db,
        [("title", Predicate::eq("Emma")), ("year", Predicate::Lt(1900.into()))],
    )
    .unwrap()
    .order_by("year", Direction::Asc);
    assert_eq!(titles(either.get().unwrap()), ["Emma", "Persuasion"]);
}

#[test]
fn test_limit_and_page() {
    let store = shelf();
    let db = db(&store);

    let mut first_two = Book::order_by(&db, "year", Direction::Asc).unwrap().limit(2, None);
    assert_eq!(titles(first_two.get().unwrap()), ["Emma", "Persuasion"]);

    let mut skipped = Book::order_by(&db, "year", Direction::Asc).unwrap().limit(2, Some(3));
    assert_eq!(titles(skipped.get().unwrap()), ["Neuromancer", "Hyperion"]);

    let mut second_page = Book::order_by(&db, "year", Direction::Asc).unwrap().page(2, 2);
    assert_eq!(titles(second_page.get().unwrap()), ["Dune", "Neuromancer"]);
}

#[test]
fn test_group_and_having() {
    let store = shelf();
    let db = db(&store);

    let mut genres = Book::group_by(&db, ["genre"]).unwrap().order_by("genre", Direction::Asc);
    let genres: Vec<Value> = genres
        .get()
        .unwrap()
        .iter()
        .map(|book| book.value("genre").unwrap())
        .collect();
    assert_eq!(genres, [Value::from("romance"), Value::from("sf")]);

    let mut sf_only = Book::group_by(&db, ["genre"])
        .unwrap()
        .having("genre", Predicate::eq("sf"));
    assert_eq!(sf_only.get().unwrap().len(), 1);
}

#[test]
fn test_select_projects_columns() {
    let store = shelf();
    let db = db(&store);

    let book = Book::select(&db, ["title"])
        .unwrap()
        .filter("year", 1965)
        .fetch_one()
        .unwrap()
        .unwrap();
    assert_eq!(book.value("title").unwrap(), Value::from("Dune"));
    assert!(!book.persisted().unwrap().contains("year"));
}

#[test]
fn test_join_filter_matches_related_rows() {
    let store = shelf();
    seed(&store, "reviews", attributes! { "book_id" => 3, "stars" => 5 });
    seed(&store, "reviews", attributes! { "book_id" => 1, "stars" => 2 });
    let db = db(&store);

    let mut loved = Book::join_filter(
        &db,
        JoinFilter::new("reviews", "id", "book_id", "stars", Predicate::Gte(4.into())),
    )
    .unwrap();
    assert_eq!(titles(loved.get().unwrap()), ["Neuromancer"]);
}

#[test]
fn test_exhausted_cursor_resets_to_base() {
    let store = shelf();
    let db = db(&store);
    let mut query = QueryBuilder::<Book>::new(&db).unwrap().filter("genre", "romance");

    let first: Vec<Book> = query.cursor().collect::<Result<_, _>>().unwrap();
    assert_eq!(first.len(), 2);
    assert!(!query.selection().is_filtered());

    let second = query.get().unwrap();
    let third = query.get().unwrap();
    assert_eq!(second.len(), 5);
    assert_eq!(titles(second), titles(third));
}

#[test]
fn test_dropped_cursor_keeps_filters() {
    let store = shelf();
    let db = db(&store);
    let mut query = Book::filter(&db, "genre", "sf").unwrap();

    let first = query.cursor().next().unwrap().unwrap();
    assert_eq!(first.value("genre").unwrap(), Value::from("sf"));
    assert!(query.selection().is_filtered());
    assert_eq!(query.get().unwrap().len(), 3);
}

#[test]
fn test_fetch_one_does_not_reset() {
    let store = shelf();
    let db = db(&store);
    let query = Book::filter(&db, "genre", "romance")
        .unwrap()
        .order_by("year", Direction::Desc);

    let first = query.fetch_one().unwrap().unwrap();
    assert_eq!(first.value("title").unwrap(), Value::from("Persuasion"));
    assert!(query.selection().is_filtered());
    assert!(Book::filter(&db, "genre", "horror").unwrap().fetch_one().unwrap().is_none());
}

#[test]
fn test_cursor_is_lazy() {
    let store = store();
    let db = db(&store);
    let mut query = Book::query(&db).unwrap();
    let mut cursor = query.cursor();

    // Rows inserted before the first pull are seen
    seed(&store, "books", attributes! { "title" => "Late Arrival" });
    let book = cursor.next().unwrap().unwrap();
    assert_eq!(book.value("title").unwrap(), Value::from("Late Arrival"));
    assert!(cursor.next().is_none());
}

#[test]
fn test_call_dispatches_by_name() {
    let store = shelf();
    let db = db(&store);

    let mut query = Book::call(&db, "where", &["genre".into(), "sf".into()])
        .unwrap()
        .call("order", &["year".into(), "desc".into()])
        .unwrap()
        .call("limit", &[1.into()])
        .unwrap();
    assert_eq!(titles(query.get().unwrap()), ["Hyperion"]);

    let err = Book::call(&db, "truncate", &[]).unwrap_err();
    assert!(matches!(err, RecordError::UnsupportedOperation(ref name) if name == "truncate"));

    let err = Book::query(&db).unwrap().call("limit", &["ten".into()]).unwrap_err();
    assert!(matches!(err, RecordError::TypeMismatch(_)));
}

#[test]
fn test_apply_filter_ops_in_place() {
    let store = shelf();
    let db = db(&store);
    let mut query = Book::query(&db).unwrap();

    query
        .apply(FilterOp::Where("genre".into(), Predicate::eq("romance")))
        .apply(FilterOp::Order("title".into(), Direction::Desc));
    assert_eq!(titles(query.get().unwrap()), ["Persuasion", "Emma"]);
}

#[test]
fn test_wrong_table_rows_are_rejected() {
    let store = shelf();
    seed(&store, "reviews", attributes! { "book_id" => 1, "stars" => 4 });
    let db = db(&store);
    let review_row = Review::query(&db).unwrap().fetch_one().unwrap().unwrap();

    let row = review_row.persisted().unwrap().clone();
    let err = Entity::from_row(<Book as Model>::schema(), db, row).unwrap_err();
    assert!(matches!(err, RecordError::TypeMismatch(_)));
}

#[test]
fn test_missing_table_surfaces_store_error() {
    let db = Db::new(MemoryStore::new());
    let err = Book::query(&db).unwrap().get().unwrap_err();
    assert!(matches!(err, RecordError::Store(_)));
}
