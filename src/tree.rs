//! Generic data tree
//!
//! Tagged tree with ordered string properties and ordered children.
//! This is the portable form revisions, items and packs serialize to;
//! the live model never stores its state here.
//!
//! Author: Moroya Sakamoto

use serde::{Deserialize, Serialize};

/// Tagged tree node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTree {
    /// Node type tag (e.g. "revision", "revisionItem")
    tag: String,
    /// Properties in insertion order
    properties: Vec<(String, String)>,
    /// Child nodes in insertion order
    children: Vec<DataTree>,
}

impl DataTree {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: String::from(tag),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`DataTree::set_property`]
    pub fn with_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Builder form of [`DataTree::append_child`]
    pub fn with_child(mut self, child: DataTree) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn has_type(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Get property value by name
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property; an existing value keeps its position
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((String::from(name), value)),
        }
    }

    /// Remove a property. Returns `true` if it existed.
    pub fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|(k, _)| k != name);
        self.properties.len() != before
    }

    /// Iterate `(name, value)` pairs in insertion order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn append_child(&mut self, child: DataTree) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[DataTree] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// First direct child with the given tag
    pub fn child_with_type(&self, tag: &str) -> Option<&DataTree> {
        self.children.iter().find(|c| c.has_type(tag))
    }

    /// Total node count including self
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(DataTree::node_count).sum::<usize>()
    }

    #[cfg(feature = "json")]
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
