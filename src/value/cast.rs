//! Cast table for declared attribute types.
//!
//! Each [`CastKind`] coerces a [`Value`] into its target variant or fails with
//! [`RecordError::TypeMismatch`]. There is no best-effort fallback: `"abc"`
//! is not an integer, and neither is `1.5`. `NULL` is never coerced.

use super::{date, Value};
use crate::error::RecordError;

/// Declared target type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Integer,
    Float,
    Boolean,
    String,
    Date,
}

impl CastKind {
    pub fn name(self) -> &'static str {
        match self {
            CastKind::Integer => "integer",
            CastKind::Float => "float",
            CastKind::Boolean => "boolean",
            CastKind::String => "string",
            CastKind::Date => "date",
        }
    }

    /// Coerce `value` to this kind.
    pub fn cast(self, value: Value) -> Result<Value, RecordError> {
        if value.is_null() {
            return Ok(value);
        }
        let cast = match self {
            CastKind::Integer => to_integer(&value),
            CastKind::Float => to_float(&value),
            CastKind::Boolean => to_boolean(&value),
            CastKind::String => Some(Value::String(value.to_string())),
            CastKind::Date => date::parse_datetime(&value).map(Value::DateTime),
        };
        cast.ok_or_else(|| {
            RecordError::TypeMismatch(format!(
                "cannot cast {} `{}` to {}",
                value.kind(),
                value,
                self.name()
            ))
        })
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Int(i) => Some(Value::Int(*i)),
        // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive
        Value::Float(f)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Some(Value::Int(*f as i64))
        }
        Value::Bool(b) => Some(Value::Int(i64::from(*b))),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::Int),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::Int(i) => Some(Value::Float(*i as f64)),
        Value::Float(f) => Some(Value::Float(*f)),
        Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s.trim().parse::<f64>().ok().map(Value::Float),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Int(0) => Some(Value::Bool(false)),
        Value::Int(1) => Some(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "f" | "0" | "no" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}
