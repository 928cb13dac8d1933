//! Uniform iteration over container values.

use crate::value::Value;

/// Shape of a container value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollectionKind {
    /// [`Value::List`].
    Sequence,
    /// [`Value::Map`]; only values are visited.
    Associative,
}

/// Classifies and iterates sequential and associative containers.
///
/// Text is a scalar here, never a sequence of characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionIterationProcessor;

impl CollectionIterationProcessor {
    /// Creates a processor.
    pub fn new() -> Self {
        Self
    }

    /// Returns true for lists and maps.
    pub fn is_collection(&self, value: &Value) -> bool {
        self.collection_kind(value).is_some()
    }

    /// Returns the container shape, or `None` for scalars and entities.
    pub fn collection_kind(&self, value: &Value) -> Option<CollectionKind> {
        match value {
            Value::List(_) => Some(CollectionKind::Sequence),
            Value::Map(_) => Some(CollectionKind::Associative),
            _ => None,
        }
    }

    /// Number of elements, counting nulls. Zero for non-containers.
    pub fn collection_size(&self, value: &Value) -> usize {
        match value {
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Calls `visitor` on every non-null element and returns how many were
    /// visited. Map keys are not visited.
    pub fn process_collection<F>(&self, value: &Value, mut visitor: F) -> usize
    where
        F: FnMut(&Value),
    {
        let elements: Box<dyn Iterator<Item = &Value>> = match value {
            Value::List(items) => Box::new(items.iter()),
            Value::Map(entries) => Box::new(entries.values()),
            _ => return 0,
        };

        let mut visited = 0;
        for element in elements.filter(|v| !v.is_null()) {
            visitor(element);
            visited += 1;
        }
        visited
    }
}
