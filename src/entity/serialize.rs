use super::Entity;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::Db;
    use crate::entity::Entity;
    use crate::schema::Schema;
    use crate::store::{MemoryStore, RawRow};
    use crate::value::Value;
    use once_cell::sync::Lazy;

    static SCHEMA: Lazy<Schema> = Lazy::new(|| Schema::new("User", "users").hidden("password"));

    #[test]
    fn test_serialize_hides_attributes() {
        let columns = [
            ("id".to_string(), Value::Int(7)),
            ("name".to_string(), Value::from("Ada")),
            ("password".to_string(), Value::from("hunter2")),
        ]
        .into_iter()
        .collect();
        let user = Entity::from_row(&SCHEMA, Db::new(MemoryStore::new()), RawRow::new("users", columns)).unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"Ada"}"#);
    }
}
