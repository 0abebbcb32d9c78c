//! Attribute reads and writes on entities.

mod common;

use chrono::NaiveDate;
use common::{db, saved_book, store, Book};
use lifeline::prelude::*;
use lifeline::Attribute;

model! {
    struct Event => Schema::new("Event", "events")
        .date("starts_at")
        .cast("starts_at", CastKind::Date);
}

#[test]
fn test_unpersisted_entity_rejects_unknown_reads() {
    let store = store();
    let book = Book::create(&db(&store));

    let err = book.value("title").unwrap_err();
    assert!(matches!(err, RecordError::UnpersistedAccess(ref name) if name == "title"));
    // Declared defaults don't help before the first save either
    assert!(matches!(book.value("status"), Err(RecordError::UnpersistedAccess(_))));
}

#[test]
fn test_write_then_read_returns_written_value() {
    let store = store();
    let mut book = Book::create(&db(&store));

    book.set("subtitle", "The Spice Must Flow").unwrap();
    book.set("pages", 412).unwrap();
    book.set("in_print", true).unwrap();

    assert_eq!(book.value("subtitle").unwrap(), Value::from("The Spice Must Flow"));
    assert_eq!(book.value("pages").unwrap(), Value::Int(412));
    assert_eq!(book.value("in_print").unwrap(), Value::Bool(true));
}

#[test]
fn test_casts_apply_on_write() {
    let store = store();
    let mut book = Book::create(&db(&store));

    book.set("year", "1965").unwrap();
    book.set("price", "9.5").unwrap();
    assert_eq!(book.pending().get("year"), Some(&Value::Int(1965)));
    assert_eq!(book.value("price").unwrap(), Value::Float(9.5));

    let err = book.set("year", "nineteen sixty-five").unwrap_err();
    assert!(matches!(err, RecordError::TypeMismatch(_)));
    // The rejected write left the earlier change alone
    assert_eq!(book.value("year").unwrap(), Value::Int(1965));
}

#[test]
fn test_null_passes_through_casts() {
    let store = store();
    let mut book = Book::create(&db(&store));

    book.unset("year").unwrap();
    assert!(book.is_attribute_dirty("year"));
    assert_eq!(book.value("year").unwrap(), Value::Null);
}

#[test]
fn test_mutator_and_accessor() {
    let store = store();
    let mut book = Book::create(&db(&store));

    book.set("title", "  Dune  ").unwrap();
    book.set("year", 1965).unwrap();
    book.set("label", Value::Null).unwrap();

    assert_eq!(book.value("title").unwrap(), Value::from("Dune"));
    assert_eq!(book.value("label").unwrap(), Value::from("Dune (1965)"));
}

#[test]
fn test_dates_use_the_connection_format() {
    let store = store();
    let db = db(&store).with_date_format("%Y/%m/%d");
    let mut book = Book::create(&db);
    let published = NaiveDate::from_ymd_opt(1965, 8, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    book.set("published_at", published).unwrap();
    assert_eq!(book.value("published_at").unwrap(), Value::from("1965/08/01"));

    book.set("published_at", "not a date").unwrap();
    assert!(matches!(book.value("published_at"), Err(RecordError::TypeMismatch(_))));

    book.unset("published_at").unwrap();
    assert_eq!(book.value("published_at").unwrap(), Value::Null);
}

#[test]
fn test_default_date_format() {
    let store = store();
    let mut book = Book::create(&db(&store));
    book.set("published_at", "1965-08-01 12:30:00").unwrap();

    assert_eq!(
        book.value("published_at").unwrap(),
        Value::from("Sunday, 01-Aug-65 12:30:00 UTC")
    );
}

#[test]
fn test_date_cast_and_date_format_combine() {
    let store = store();
    let mut event = Event::create(&db(&store));
    event.set("starts_at", "2024-01-15 09:00:00").unwrap();

    assert_eq!(
        event.value("starts_at").unwrap(),
        Value::from("Monday, 15-Jan-24 09:00:00 UTC")
    );
    assert!(matches!(
        event.set("starts_at", "soon"),
        Err(RecordError::TypeMismatch(_))
    ));
}

#[test]
fn test_persisted_entity_reads_row_then_default_then_null() {
    let store = store();
    let book = saved_book(&db(&store), 1965);

    assert_eq!(book.value("year").unwrap(), Value::Int(1965));
    assert_eq!(book.value("status").unwrap(), Value::from("draft"));
    assert_eq!(book.value("never_declared").unwrap(), Value::Null);
}

#[test]
fn test_pending_change_shadows_row() {
    let store = store();
    let mut book = saved_book(&db(&store), 1965);

    book.set("year", 1984).unwrap();
    assert_eq!(book.value("year").unwrap(), Value::Int(1984));
    assert_eq!(book.persisted().unwrap().get("year"), Some(&Value::Int(1965)));
}

#[test]
fn test_dirty_tracking_is_by_key() {
    let store = store();
    let mut book = saved_book(&db(&store), 1965);
    assert!(!book.is_dirty());

    // Same value as stored still counts as a change
    book.set("year", 1965).unwrap();
    assert!(book.is_dirty());
    assert!(book.is_attribute_dirty("year"));
    assert!(!book.is_attribute_dirty("title"));
    assert_eq!(book.dirty_attributes().collect::<Vec<_>>(), vec!["year"]);
}

#[test]
fn test_relationship_names_are_not_plain_values() {
    let store = store();
    let book = saved_book(&db(&store), 1965);

    assert!(matches!(book.get("reviews").unwrap(), Attribute::Related(_)));
    assert!(matches!(book.value("reviews"), Err(RecordError::TypeMismatch(_))));
    assert!(matches!(book.related("sequels"), Err(RecordError::TypeMismatch(_))));
}
