// ============================================================================
// Object Contract
// ============================================================================
//
// What the manipulators need from application models: a category
// descriptor, a mutable identifier, a document representation and the
// optional list of attributes whose declared defaults must survive a trip
// through the store.
//
// ============================================================================

use super::{Document, ManipError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use std::fmt;

/// Kind descriptor of an object. `category` selects the backing collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    pub name: &'static str,
    pub category: &'static str,
}

impl Identity {
    pub const fn new(name: &'static str, category: &'static str) -> Self {
        Self { name, category }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category)
    }
}

/// An attribute whose default is not the storage layer's zero value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub default_value: Json,
}

impl AttributeSpec {
    pub fn new(name: &'static str, default_value: impl Into<Json>) -> Self {
        Self {
            name,
            default_value: default_value.into(),
        }
    }
}

/// Object contract consumed by every manipulator.
pub trait Identifiable: Send + Sync {
    fn identity(&self) -> Identity;

    fn identifier(&self) -> &str;

    fn set_identifier(&mut self, id: String);

    /// Document representation, without the identifier field.
    fn to_document(&self) -> Result<Document>;

    /// Replaces the object's fields with the given document.
    fn load_document(&mut self, doc: Document) -> Result<()>;

    /// Attributes with declared non-zero defaults. Empty for most models.
    fn attribute_specifications(&self) -> Vec<AttributeSpec> {
        Vec::new()
    }

    /// Writes one attribute listed in `attribute_specifications`, leaving
    /// every other field untouched.
    fn set_attribute(&mut self, name: &str, _value: Json) -> Result<()> {
        Err(ManipError::NotImplemented(format!(
            "{} cannot set attribute '{}'",
            self.identity().name,
            name
        )))
    }
}

/// Convenience contract for serde models.
///
/// Any `Model` is `Identifiable`: its document is its serde representation.
/// Models usually mark their identifier field `#[serde(skip)]`, the
/// manipulator stores it under `_id`.
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const IDENTITY: Identity;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn defaults() -> Vec<AttributeSpec> {
        Vec::new()
    }

    /// Stores the declared default of attribute `name`. Models declaring
    /// `defaults()` implement it for each of those attributes.
    fn apply_default(&mut self, name: &str, _value: Json) -> Result<()> {
        Err(ManipError::NotImplemented(format!(
            "{} declares no setter for attribute '{}'",
            Self::IDENTITY.name,
            name
        )))
    }
}

impl<T: Model> Identifiable for T {
    fn identity(&self) -> Identity {
        T::IDENTITY
    }

    fn identifier(&self) -> &str {
        self.id()
    }

    fn set_identifier(&mut self, id: String) {
        self.set_id(id);
    }

    fn to_document(&self) -> Result<Document> {
        encode(self)
    }

    fn load_document(&mut self, doc: Document) -> Result<()> {
        let id = self.id().to_string();
        *self = decode(doc)?;
        if self.id().is_empty() {
            self.set_id(id);
        }
        Ok(())
    }

    fn attribute_specifications(&self) -> Vec<AttributeSpec> {
        T::defaults()
    }

    fn set_attribute(&mut self, name: &str, value: Json) -> Result<()> {
        self.apply_default(name, value)
    }
}

/// A destination list for multi-object retrieval.
pub trait ContentIdentifiable: Send {
    fn content_identity(&self) -> Identity;

    /// Appends one object built from a stored document.
    fn push_document(&mut self, id: String, doc: Document) -> Result<()>;

    fn clear(&mut self);

    fn count(&self) -> usize;
}

impl<T: Identifiable + Default> ContentIdentifiable for Vec<T> {
    fn content_identity(&self) -> Identity {
        T::default().identity()
    }

    fn push_document(&mut self, id: String, doc: Document) -> Result<()> {
        let mut object = T::default();
        object.load_document(doc)?;
        object.set_identifier(id);
        super::reset_default_for_zero_values(&mut object)?;
        self.push(object);
        Ok(())
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn count(&self) -> usize {
        self.len()
    }
}

/// Serializes any serde value into a document.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Json::Object(fields) => Ok(fields),
        other => Err(ManipError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn decode<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Json::Object(doc))?)
}
