use super::Entity;
use crate::error::RecordError;
use crate::store::{Attributes, Predicate, Selection};
use crate::value::{date, Value};
use std::collections::BTreeMap;

impl Entity {
    fn identity(&self, key: Value) -> Result<Selection, RecordError> {
        if key.is_null() {
            return Err(RecordError::PersistenceError(format!(
                "{} row has no `{}` value",
                self.schema.name(),
                self.schema.primary_key()
            )));
        }
        Ok(Selection::table(self.schema.table()).and_where(self.schema.primary_key(), Predicate::eq(key)))
    }

    /// Insert or update the entity.
    ///
    /// Timestamp columns are added to the written payload only, so a failed
    /// save leaves the recorded changes exactly as they were.
    ///
    /// # Errors
    ///
    /// - `DeletedMutation` after deletion
    /// - `ConnectionUninitialized` without a store
    /// - `PersistenceError` when the written row cannot be read back
    /// - `Store` for failures reported by the store
    pub fn save(&mut self) -> Result<(), RecordError> {
        if self.deleted {
            return Err(RecordError::DeletedMutation);
        }
        let store = self.db.store()?.clone();
        let table = self.schema.table();
        let mut payload = self.changes.clone();

        let row = if self.row.is_none() {
            if let Some(timestamps) = self.schema.timestamp_settings() {
                payload.insert(timestamps.created_at.clone(), Value::DateTime(date::now()));
            }
            log::debug!("inserting into {table}: {:?}", payload.keys().collect::<Vec<_>>());
            store.insert(table, &payload)?.ok_or_else(|| {
                RecordError::PersistenceError(format!("store returned no row for the insert into `{table}`"))
            })?
        } else {
            if let Some(timestamps) = self.schema.timestamp_settings() {
                payload.insert(timestamps.updated_at.clone(), Value::DateTime(date::now()));
            }
            let current = self.identity(self.primary_key_value())?;
            if !payload.is_empty() {
                log::debug!("updating {table}: {:?}", payload.keys().collect::<Vec<_>>());
                store.update(&current, &payload)?;
            }
            let key = payload
                .get(self.schema.primary_key())
                .cloned()
                .unwrap_or_else(|| self.primary_key_value());
            store.fetch_one(&self.identity(key)?)?.ok_or_else(|| {
                RecordError::PersistenceError(format!("updated row of `{table}` could not be fetched back"))
            })?
        };

        self.row = Some(row);
        self.changes.clear();
        Ok(())
    }

    /// Delete the persisted row. The entity keeps its last snapshot but
    /// refuses further changes.
    ///
    /// # Errors
    ///
    /// `DeletedMutation` if already deleted, `UnpersistedDeletion` before
    /// the first save, or a store failure.
    pub fn delete(&mut self) -> Result<(), RecordError> {
        if self.deleted {
            return Err(RecordError::DeletedMutation);
        }
        if self.row.is_none() {
            return Err(RecordError::UnpersistedDeletion);
        }
        let store = self.db.store()?;
        let removed = store.delete(&self.identity(self.primary_key_value())?)?;
        log::debug!("deleted {removed} row(s) from {}", self.schema.table());
        self.deleted = true;
        Ok(())
    }

    /// Re-read the persisted row, keeping recorded changes.
    ///
    /// # Errors
    ///
    /// `UnpersistedAccess` before the first save, `PersistenceError` if the
    /// row no longer exists, or a store failure.
    pub fn refresh(&mut self) -> Result<(), RecordError> {
        if self.row.is_none() {
            return Err(RecordError::UnpersistedAccess(self.schema.primary_key().to_string()));
        }
        let store = self.db.store()?;
        let row = store
            .fetch_one(&self.identity(self.primary_key_value())?)?
            .ok_or_else(|| {
                RecordError::PersistenceError(format!("row of `{}` no longer exists", self.schema.table()))
            })?;
        self.row = Some(row);
        Ok(())
    }

    /// Every visible attribute mapped to its read value.
    ///
    /// Covers row columns, recorded changes and declared defaults; hidden
    /// attributes and relationships are left out.
    ///
    /// # Errors
    ///
    /// Any error the read path reports for one of the attributes.
    pub fn to_array(&self) -> Result<Attributes, RecordError> {
        let mut names: Vec<&str> = self.changes.keys().map(String::as_str).collect();
        if let Some(row) = &self.row {
            names.extend(row.columns());
        }
        names.extend(
            self.schema
                .attributes()
                .filter(|(_, def)| def.default.is_some())
                .map(|(name, _)| name),
        );

        let mut array = BTreeMap::new();
        for name in names {
            if array.contains_key(name) || self.schema.is_hidden(name) || self.schema.is_relation(name) {
                continue;
            }
            array.insert(name.to_string(), self.read_value(name)?);
        }
        Ok(array)
    }

    /// [`Entity::to_array`] as JSON.
    ///
    /// # Errors
    ///
    /// As [`Entity::to_array`].
    pub fn to_json(&self) -> Result<serde_json::Value, RecordError> {
        serde_json::to_value(self.to_array()?).map_err(|e| RecordError::TypeMismatch(e.to_string()))
    }
}
