//! Error types for record operations.
//!
//! `RecordError` is the single error surfaced by entities, query builders and
//! repositories. Failures of the underlying store are carried unchanged in
//! [`RecordError::Store`].

use crate::store::StoreError;

/// Error type for record operations
#[derive(Debug)]
pub enum RecordError {
    /// A fluent operation name outside the recognized filter/order/paging set
    UnsupportedOperation(String),
    /// A raw row from another table, or a value that cannot be coerced
    TypeMismatch(String),
    /// Attribute read on an unpersisted entity without a pending change for it
    UnpersistedAccess(String),
    /// Relationship resolution on an unpersisted entity
    UnpersistedRelation(String),
    /// Delete on an entity that was never persisted
    UnpersistedDeletion,
    /// Mutation or persistence after the entity was deleted
    DeletedMutation,
    /// The store could not confirm the identity of a written row
    PersistenceError(String),
    /// The store handle was never configured
    ConnectionUninitialized,
    /// Failure reported by the relational store
    Store(StoreError),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::UnsupportedOperation(name) => {
                write!(f, "Unsupported query operation: {name}")
            }
            RecordError::TypeMismatch(msg) => write!(f, "Type mismatch: {msg}"),
            RecordError::UnpersistedAccess(attribute) => {
                write!(f, "Can't get attribute `{attribute}` of unpersisted entity")
            }
            RecordError::UnpersistedRelation(relation) => {
                write!(f, "Can't resolve relation to `{relation}` of unpersisted entity")
            }
            RecordError::UnpersistedDeletion => {
                write!(f, "Nothing to delete: entity is unpersisted")
            }
            RecordError::DeletedMutation => write!(f, "Can't modify a deleted entity"),
            RecordError::PersistenceError(msg) => write!(f, "Persistence error: {msg}"),
            RecordError::ConnectionUninitialized => {
                write!(f, "Database connection is uninitialized")
            }
            RecordError::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        RecordError::Store(err)
    }
}
