//! Typed values returned by graph store queries.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity the store assigns to a node or relationship.
///
/// Only meaningful within a single rebuild: after a wipe, new rows get new
/// ids. Use natural keys for anything that must survive a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(i64);

impl StoreId {
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&PropertyValue> for serde_json::Value {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => Self::Bool(*b),
            PropertyValue::Integer(n) => Self::from(*n),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f).map_or(Self::Null, Self::Number),
            PropertyValue::Text(text) => Self::String(text.clone()),
        }
    }
}

/// Property map of a node or relationship, ordered by key.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// Encode properties as the JSON object stored in the `properties` column.
pub(crate) fn encode_properties(properties: &PropertyMap) -> String {
    let object: serde_json::Map<String, serde_json::Value> = properties
        .iter()
        .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
        .collect();
    serde_json::Value::Object(object).to_string()
}

pub(crate) fn decode_properties(raw: &str) -> Result<PropertyMap, serde_json::Error> {
    serde_json::from_str(raw)
}

/// A graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub store_id: StoreId,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl Node {
    /// First label, used to classify the node.
    #[must_use]
    pub fn primary_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Text property, `None` when absent or not text.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(PropertyValue::as_str)
    }
}

/// A directed, typed graph relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub store_id: StoreId,
    pub rel_type: String,
    pub properties: PropertyMap,
    pub source_id: StoreId,
    pub target_id: StoreId,
}

/// A value bound to a named field of a result record.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Node(Node),
    Relationship(Relationship),
}

/// One row of a query result: named fields in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, GraphValue)>,
}

impl Record {
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: GraphValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GraphValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        match self.get(name)? {
            GraphValue::Node(node) => Some(node),
            GraphValue::Relationship(_) => None,
        }
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        match self.get(name)? {
            GraphValue::Relationship(rel) => Some(rel),
            GraphValue::Node(_) => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }
}
