//! The design graph: typed nodes arranged in a parent/child forest, plus
//! dependency edges between them.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hierarchy::NodeType;

/// A file attached to a node, stored in the attachment store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_name: String,
    pub file_id: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub depth: u32,
    pub label: String,
    /// Local value name to the raw HCL expression, emitted verbatim.
    #[serde(default)]
    pub locals: BTreeMap<String, String>,
    /// Input name to the raw HCL expression, emitted verbatim.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            parent_id: None,
            depth: 0,
            label: label.into(),
            locals: BTreeMap::new(),
            inputs: BTreeMap::new(),
            files: Vec::new(),
            position: Position::default(),
            size: Size::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_name: Option<String>,
    /// Disabled edges are kept in the graph but never rendered.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges leaving `source_id`, in insertion order.
    pub fn outgoing<'a>(&'a self, source_id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == source_id)
    }
}
