//! Shared type definitions: element roles, image mappings and event payloads.

use crate::dom::{BBox, NodeId};

/// Semantic category of a graphic element, derived by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Node,
    Edge,
    Label,
    Marker,
    Particle,
    Unclassified,
}

/// Ordered actor name → image locator table extracted from diagram source.
///
/// Names are unique: the first declaration of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMapping {
    entries: Vec<(String, String)>,
}

impl ImageMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mapping. Returns false when the name was already mapped.
    pub fn insert(&mut self, name: impl Into<String>, locator: impl Into<String>) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.entries.push((name, locator.into()));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, l)| (n.as_str(), l.as_str()))
    }
}

/// Payload delivered for node clicks and hovers.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub element: NodeId,
    pub label: Option<String>,
    pub bbox: Option<BBox>,
}

/// Payload delivered for edge clicks and hovers.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeEvent {
    pub element: NodeId,
    pub label: Option<String>,
}

/// Hover notification. `Left` is sent when the pointer leaves the element,
/// which is distinct from hovering an element whose label is absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Hover<T> {
    Over(T),
    Left,
}
