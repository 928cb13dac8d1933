//! Entity capability and shared entity handles.
//!
//! The engine never inspects concrete types. Anything that can read and write
//! named properties implements [`Entity`]; graph nodes are passed around as
//! [`EntityRef`] handles whose pointer doubles as the node identity.
//!
//! # Example: implementing Entity for a plain struct
//!
//! ```rust
//! use dict_trans::{Entity, EntityRef, TranslationError, TranslationResult, Value};
//!
//! struct User {
//!     status: String,
//!     status_text: Option<String>,
//! }
//!
//! impl Entity for User {
//!     fn type_name(&self) -> &str {
//!         "User"
//!     }
//!
//!     fn get_property(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "status" => Some(Value::from(self.status.as_str())),
//!             "statusText" => Some(Value::from(self.status_text.clone())),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_property(&mut self, name: &str, value: Value) -> TranslationResult<()> {
//!         match name {
//!             "statusText" => {
//!                 self.status_text = value.as_str().map(str::to_string);
//!                 Ok(())
//!             }
//!             _ => Err(TranslationError::UnknownProperty {
//!                 type_name: "User".to_string(),
//!                 property: name.to_string(),
//!             }),
//!         }
//!     }
//!
//!     fn property_names(&self) -> Vec<String> {
//!         vec!["status".to_string(), "statusText".to_string()]
//!     }
//! }
//!
//! let user = EntityRef::new(User { status: "1".to_string(), status_text: None });
//! user.set_property("statusText", Value::from("Active")).unwrap();
//! assert_eq!(user.get_property("statusText"), Some(Value::from("Active")));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use dict_trans_expr::PropertyPath;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::TranslationResult;
use crate::value::Value;

/// Property access capability required by the engine.
pub trait Entity: Send + Sync {
    /// Name of the entity type, used in diagnostics and validation.
    fn type_name(&self) -> &str;

    /// Reads a property.
    ///
    /// Returns `None` if the type has no such property and `Some(Value::Null)`
    /// if it exists but is unset.
    fn get_property(&self, name: &str) -> Option<Value>;

    /// Writes a property.
    fn set_property(&mut self, name: &str, value: Value) -> TranslationResult<()>;

    /// Names of all readable properties.
    fn property_names(&self) -> Vec<String>;
}

/// Reference identity of an entity handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Shared, lockable handle to an entity.
///
/// Cloning the handle does not clone the entity. Two handles are equal only
/// when they point at the same entity, regardless of field contents.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<dyn Entity>>);

impl EntityRef {
    /// Wraps an entity in a new shared handle.
    pub fn new<E: Entity + 'static>(entity: E) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Returns the reference identity of this handle.
    pub fn id(&self) -> EntityId {
        EntityId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Returns true if both handles point at the same entity.
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        self.id() == other.id()
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, dyn Entity> {
        self.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, dyn Entity> {
        self.0.write()
    }

    /// Returns the entity type name.
    pub fn type_name(&self) -> String {
        self.read().type_name().to_string()
    }

    /// Reads a property, releasing the lock before returning.
    pub fn get_property(&self, name: &str) -> Option<Value> {
        self.read().get_property(name)
    }

    /// Writes a property.
    pub fn set_property(&self, name: &str, value: Value) -> TranslationResult<()> {
        self.write().set_property(name, value)
    }

    /// Follows a dotted property path through nested entities.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is
    /// not an entity.
    pub fn get_path(&self, path: &PropertyPath) -> Option<Value> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = self.get_property(first)?;

        for segment in segments {
            let next = current.as_entity()?.get_property(segment)?;
            current = next;
        }

        Some(current)
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never recurse into fields: the graph may be cyclic.
        match self.0.try_read() {
            Some(entity) => write!(f, "EntityRef({}@{})", entity.type_name(), self.id()),
            None => write!(f, "EntityRef(<locked>@{})", self.id()),
        }
    }
}

/// Property-bag entity for hosts without generated accessors.
///
/// Every property can be written; unknown properties read as `None`.
#[derive(Debug, Clone, Default)]
pub struct DynamicEntity {
    type_name: String,
    properties: BTreeMap<String, Value>,
}

impl DynamicEntity {
    /// Creates an empty entity of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Wraps this entity in a shared handle.
    pub fn into_ref(self) -> EntityRef {
        EntityRef::new(self)
    }
}

impl Entity for DynamicEntity {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        self.properties.get(name).cloned()
    }

    fn set_property(&mut self, name: &str, value: Value) -> TranslationResult<()> {
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }
}

/// Static description of an entity type, used for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityType {
    name: String,
    properties: BTreeSet<String>,
}

impl EntityType {
    /// Creates a type descriptor from its declared properties.
    pub fn new<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Derives a descriptor from a live entity.
    pub fn of(entity: &dyn Entity) -> Self {
        Self::new(entity.type_name(), entity.property_names())
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the property is declared.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// Declared properties in sorted order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }
}
