//! Attribute types and values, and their storage representation.
//!
//! Every value is written to the store as a string. Numeric kinds (and
//! timestamps, stored as epoch microseconds) double as sort scores.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::{Handle, ObjectId};

/// Target of a reference or of a record container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The type being declared. Resolved to its name on registration.
    This,
    /// A registered type, by name.
    Named(String),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Name of the target, once resolved.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::This => None,
            Self::Named(n) => Some(n),
        }
    }
}

/// Semantic type of an attribute or container element.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    Str,
    Int,
    Float,
    Bool,
    /// UTC timestamp, stored as epoch microseconds.
    DateTime,
    /// Reference to a record of another (or the same) type.
    Ref(TypeRef),
}

impl AttrType {
    /// Human-readable name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::DateTime => "datetime",
            Self::Ref(_) => "ref",
        }
    }

    /// Whether the stored form of this type parses as a score.
    pub fn is_scoreable(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Bool | Self::DateTime)
    }

    /// Resolved target type name for references.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            Self::Ref(t) => t.name(),
            _ => None,
        }
    }

    /// Convert a caller-supplied value into this type.
    ///
    /// Integers are accepted for floats, and for references (as an id of the
    /// target type). Anything else must match exactly.
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match (self, value) {
            (Self::Str, v @ Value::Str(_)) => Ok(v),
            (Self::Int, v @ Value::Int(_)) => Ok(v),
            (Self::Float, v @ Value::Float(_)) => Ok(v),
            (Self::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (Self::Bool, v @ Value::Bool(_)) => Ok(v),
            (Self::DateTime, v @ Value::DateTime(_)) => Ok(v),
            (Self::Ref(target), Value::Ref(h)) => match target.name() {
                Some(t) if t == h.type_name() => Ok(Value::Ref(h)),
                _ => Err(format!(
                    "expected reference to {}, got {}",
                    target.name().unwrap_or("?"),
                    h.type_name()
                )),
            },
            (Self::Ref(target), Value::Int(i)) if i >= 0 => match target.name() {
                Some(t) => Ok(Value::Ref(Handle::new(t, ObjectId::new(i as u64)))),
                None => Err("unresolved reference type".to_string()),
            },
            (ty, v) => Err(format!("expected {}, got {}", ty.name(), v.kind_name())),
        }
    }

    /// Typecast a stored string back into a value. `None` if it does not parse.
    pub fn read(&self, raw: &str) -> Option<Value> {
        match self {
            Self::Str => Some(Value::Str(raw.to_string())),
            Self::Int => raw.parse().ok().map(Value::Int),
            Self::Float => raw.parse().ok().map(Value::Float),
            Self::Bool => match raw {
                "1" | "true" => Some(Value::Bool(true)),
                "0" | "false" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::DateTime => raw
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_micros)
                .map(Value::DateTime),
            Self::Ref(target) => {
                let id = ObjectId::parse(raw)?;
                target.name().map(|t| Value::Ref(Handle::new(t, id)))
            }
        }
    }
}

/// Score of a stored value, for score-ordered structures.
pub fn score_of(stored: &str) -> Option<f64> {
    stored.parse::<f64>().ok().filter(|s| !s.is_nan())
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Ref(Handle),
}

impl Value {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::DateTime(_) => "datetime",
            Self::Ref(_) => "ref",
        }
    }

    /// Storage representation of this value.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Self::DateTime(dt) => dt.timestamp_micros().to_string(),
            Self::Ref(h) => h.id().to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Ref(h) => Some(h),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Str(s) => serializer.serialize_str(s),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            Self::Ref(h) => serializer.serialize_str(&h.key()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Self::Ref(h)
    }
}
