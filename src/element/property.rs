use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ElementId;
use crate::types::DecodingError;

use super::{element_identity, ElementCore, ElementKind, GraphElement};

/// How many values a vertex may hold for one property key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one value; a new value replaces the old one.
    #[default]
    Single,
    /// Any number of values, duplicates allowed.
    List,
    /// Any number of distinct values.
    Set,
}

/// Property value with owned data.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// Owned string.
    Str(String),
    /// Owned byte vector.
    Bytes(Vec<u8>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Str(v) => write!(f, "{v}"),
            PropertyValue::Bytes(v) => write!(f, "bytes(len={})", v.len()),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_owned())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

/// Key/value pair owned by a vertex. Properties are elements in their own
/// right and carry their own id.
#[derive(Clone, Debug)]
pub struct VertexProperty {
    core: ElementCore,
    vertex: ElementId,
    key: String,
    value: PropertyValue,
    cardinality: Cardinality,
}

impl VertexProperty {
    /// Property created in the current transaction under a temporary id.
    pub fn new(
        id: ElementId,
        vertex: ElementId,
        key: impl Into<String>,
        value: PropertyValue,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            core: ElementCore::new_element(id),
            vertex,
            key: key.into(),
            value,
            cardinality,
        }
    }

    /// Property read from storage; `id` must be persisted.
    pub fn loaded(
        id: ElementId,
        vertex: ElementId,
        key: impl Into<String>,
        value: PropertyValue,
        cardinality: Cardinality,
    ) -> Result<Self, DecodingError> {
        Ok(Self {
            core: ElementCore::loaded(id)?,
            vertex,
            key: key.into(),
            value,
            cardinality,
        })
    }

    /// Owning vertex.
    pub fn vertex(&self) -> ElementId {
        self.vertex
    }

    /// Property key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Property value.
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Cardinality of the key this value was written under.
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Identity plus key and value.
    pub fn structurally_eq(&self, other: &VertexProperty) -> bool {
        self == other && self.key == other.key && self.value == other.value
    }

    pub(crate) fn rewrite_vertex(&mut self, assigned: &HashMap<ElementId, ElementId>) {
        if let Some(id) = assigned.get(&self.vertex) {
            self.vertex = *id;
        }
    }
}

impl GraphElement for VertexProperty {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn kind(&self) -> ElementKind {
        ElementKind::VertexProperty
    }
}

element_identity!(VertexProperty);
