//! Declaration helpers.

/// Declare a record type backed by a schema.
///
/// ```
/// use lifeline::{model, CastKind, Schema};
///
/// model! {
///     /// A book on the shelf.
///     pub struct Book => Schema::new("Book", "books")
///         .timestamps()
///         .cast("year", CastKind::Integer);
/// }
/// ```
///
/// The generated tuple struct wraps an [`Entity`](crate::Entity), derefs to
/// it and implements [`Model`](crate::Model), `Debug` and `Serialize`. The
/// schema expression is evaluated once, on first use.
#[macro_export]
macro_rules! model {
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $schema:expr;) => {
        $(#[$meta])*
        $vis struct $name($crate::Entity);

        impl $crate::Model for $name {
            fn schema() -> &'static $crate::Schema {
                static SCHEMA: $crate::__private::Lazy<$crate::Schema> =
                    $crate::__private::Lazy::new(|| $schema);
                &SCHEMA
            }

            fn from_entity(entity: $crate::Entity) -> Self {
                $name(entity)
            }

            fn entity(&self) -> &$crate::Entity {
                &self.0
            }

            fn entity_mut(&mut self) -> &mut $crate::Entity {
                &mut self.0
            }

            fn into_entity(self) -> $crate::Entity {
                self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::Entity;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                $crate::__private::serde::Serialize::serialize(&self.0, serializer)
            }
        }
    };
}

/// Build an attribute map: `attributes! { "role" => "editor", "weight" => 2 }`.
#[macro_export]
macro_rules! attributes {
    ($($column:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::store::Attributes::new();
        $(map.insert(::std::string::String::from($column), $crate::Value::from($value));)*
        map
    }};
}

/// Run `$block` in a `may` coroutine with its own handle to `$db`, binding
/// the join result to `$ret`.
///
/// ```
/// use lifeline::{lifeline_go, Db, MemoryStore};
///
/// let db = Db::new(MemoryStore::new());
/// lifeline_go!(db, configured, |conn| conn.is_configured());
/// assert!(configured.unwrap());
/// ```
#[macro_export]
macro_rules! lifeline_go {
    ($db:expr, $ret:ident, |$conn:ident| $block:expr) => {
        let $ret = {
            let $conn = $crate::Db::clone(&$db);
            $crate::__private::may::go!(move || $block).join()
        };
    };
}

#[cfg(test)]
mod tests {
    use crate::store::MemoryStore;
    use crate::value::Value;
    use crate::Db;

    #[test]
    fn test_attributes_macro() {
        let map = attributes! { "role" => "editor", "weight" => 2 };
        assert_eq!(map.get("role"), Some(&Value::from("editor")));
        assert_eq!(map.get("weight"), Some(&Value::Int(2)));
        assert!(attributes! {}.is_empty());
    }

    #[test]
    fn test_lifeline_go_runs_in_coroutine() {
        let db = Db::new(MemoryStore::new());
        lifeline_go!(db, configured, |conn| conn.is_configured());
        assert!(configured.unwrap());
    }
}
