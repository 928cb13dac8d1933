//! Dynamic field values carried by entities.

use std::collections::BTreeMap;

use crate::entity::EntityRef;

/// A field value read from or written to an entity.
///
/// Nested entities are held by shared handle, so a value graph may contain
/// cycles. Equality on [`Value::Entity`] is reference identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent or null value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Nested entity.
    Entity(EntityRef),
    /// Sequential container.
    List(Vec<Value>),
    /// Associative container.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the dictionary key form of a scalar value.
    ///
    /// Numeric `100` and textual `"100"` produce the same key. Null, entities
    /// and containers have no code.
    pub fn as_code(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Null | Value::Entity(_) | Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Borrows the text of a [`Value::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the handle of a [`Value::Entity`].
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Value::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<EntityRef> for Value {
    fn from(value: EntityRef) -> Self {
        Value::Entity(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::collections::BTreeMap;

    use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};

    use super::Value;

    /// Values serialize in their plain form. Entity handles are live graph
    /// references and are rejected.
    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Value::Null => serializer.serialize_unit(),
                Value::Bool(b) => serializer.serialize_bool(*b),
                Value::Int(i) => serializer.serialize_i64(*i),
                Value::Float(f) => serializer.serialize_f64(*f),
                Value::Text(s) => serializer.serialize_str(s),
                Value::Entity(entity) => Err(ser::Error::custom(format!(
                    "cannot serialize entity handle of type '{}'",
                    entity.type_name()
                ))),
                Value::List(items) => items.serialize(serializer),
                Value::Map(entries) => entries.serialize(serializer),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PlainValue {
        Null,
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
        List(Vec<PlainValue>),
        Map(BTreeMap<String, PlainValue>),
    }

    impl From<PlainValue> for Value {
        fn from(value: PlainValue) -> Self {
            match value {
                PlainValue::Null => Value::Null,
                PlainValue::Bool(b) => Value::Bool(b),
                PlainValue::Int(i) => Value::Int(i),
                PlainValue::Float(f) => Value::Float(f),
                PlainValue::Text(s) => Value::Text(s),
                PlainValue::List(items) => {
                    Value::List(items.into_iter().map(Value::from).collect())
                }
                PlainValue::Map(entries) => Value::Map(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key, Value::from(value)))
                        .collect(),
                ),
            }
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            PlainValue::deserialize(deserializer).map(Value::from)
        }
    }
}
