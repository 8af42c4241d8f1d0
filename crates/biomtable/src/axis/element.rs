//! A single identified entity on an axis.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Metadata value treated as missing data; never stored.
pub const MISSING_VALUE: &str = "NA";

/// An observation or sample together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    id: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    metadata: IndexMap<String, String>,
}

impl Element {
    /// Create an element with no metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: IndexMap::new(),
        }
    }

    /// Identifier of the element.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Metadata value for `key`, if one is stored.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// All stored metadata in insertion order.
    pub fn all_metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    /// Check whether a value would be kept by [`Element::insert_metadata`].
    pub fn is_storable(value: &str) -> bool {
        !value.is_empty() && value != MISSING_VALUE
    }

    /// Store a metadata value. Returns false (and stores nothing) for empty
    /// or missing values.
    pub(crate) fn insert_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        if !Self::is_storable(&value) {
            return false;
        }
        self.metadata.insert(key.into(), value);
        true
    }

    pub(crate) fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    pub(crate) fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: self.metadata.clone(),
        }
    }
}
