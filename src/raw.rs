//! Untyped document tree for upstream recipe payloads
//!
//! Nodes live in an arena and containers refer to their children by
//! [`NodeId`], so a container may hold a reference back to one of its
//! ancestors. Anything walking the tree recursively has to track the
//! containers it has already entered.

use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum RawNode {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<NodeId>),
    Map(Vec<(String, NodeId)>),
}

#[derive(Debug, Default)]
pub struct RawDocument {
    nodes: Vec<RawNode>,
}

impl RawDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from parsed JSON, returning it with its root node
    pub fn from_json(value: &Value) -> (Self, NodeId) {
        let mut doc = Self::new();
        let root = doc.insert_json(value);
        (doc, root)
    }

    pub fn insert_json(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Null => self.push(RawNode::Null),
            Value::Bool(b) => self.push(RawNode::Bool(*b)),
            Value::Number(n) => self.push(RawNode::Number(n.clone())),
            Value::String(s) => self.push(RawNode::Text(s.clone())),
            Value::Array(items) => {
                let children = items.iter().map(|item| self.insert_json(item)).collect();
                self.push(RawNode::List(children))
            }
            Value::Object(map) => {
                let entries = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.insert_json(item)))
                    .collect();
                self.push(RawNode::Map(entries))
            }
        }
    }

    pub fn push(&mut self, node: RawNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` under `key` in a map node. No-op for non-maps.
    pub fn insert_entry(&mut self, map: NodeId, key: impl Into<String>, child: NodeId) {
        if let RawNode::Map(entries) = &mut self.nodes[map.0] {
            let key = key.into();
            match entries.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = child,
                None => entries.push((key, child)),
            }
        }
    }

    /// Append `child` to a list node. No-op for non-lists.
    pub fn push_item(&mut self, list: NodeId, child: NodeId) {
        if let RawNode::List(items) = &mut self.nodes[list.0] {
            items.push(child);
        }
    }

    pub fn node(&self, id: NodeId) -> &RawNode {
        &self.nodes[id.0]
    }

    pub fn as_map(&self, id: NodeId) -> Option<&[(String, NodeId)]> {
        match self.node(id) {
            RawNode::Map(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    pub fn as_list(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.node(id) {
            RawNode::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_text(&self, id: NodeId) -> Option<&str> {
        match self.node(id) {
            RawNode::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_map(&self, id: NodeId) -> bool {
        matches!(self.node(id), RawNode::Map(_))
    }

    /// Look up `key` in a map node. Returns `None` for missing keys and non-maps.
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        self.as_map(map)?
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, child)| *child)
    }

    /// JSON-style truthiness: null, false, zero and empty text/containers are falsy.
    pub fn is_truthy(&self, id: NodeId) -> bool {
        match self.node(id) {
            RawNode::Null => false,
            RawNode::Bool(b) => *b,
            RawNode::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            RawNode::Text(s) => !s.is_empty(),
            RawNode::List(items) => !items.is_empty(),
            RawNode::Map(entries) => !entries.is_empty(),
        }
    }

    /// First truthy value among `keys`, in order.
    pub fn first_truthy(&self, map: NodeId, keys: &[&str]) -> Option<NodeId> {
        keys.iter()
            .filter_map(|key| self.get(map, key))
            .find(|child| self.is_truthy(*child))
    }
}
