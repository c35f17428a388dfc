use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Layout-relevant classification of a node's `type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Start,
    End,
    Decision,
    Frame,
    Standard,
}

impl NodeKind {
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "start" | "entry" => Self::Start,
            "end" | "exit" => Self::End,
            "decision" | "condition" => Self::Decision,
            "frame" | "group" => Self::Frame,
            _ => Self::Standard,
        }
    }

    pub fn is_frame(self) -> bool {
        matches!(self, Self::Frame)
    }

    pub fn is_entry(self) -> bool {
        matches!(self, Self::Start)
    }
}

fn default_node_type() -> String {
    "screen".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub id: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl NodeInput {
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_token(&self.node_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeInput {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The node/edge snapshot handed over by the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeInput>,
    #[serde(default)]
    pub edges: Vec<EdgeInput>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    pub fn add_node(&mut self, id: &str, node_type: &str, x: f32, y: f32) -> &mut NodeInput {
        self.nodes.push(NodeInput {
            id: id.to_string(),
            node_type: node_type.to_string(),
            position: Point::new(x, y),
            width: None,
            height: None,
            parent_id: None,
        });
        let last = self.nodes.len() - 1;
        &mut self.nodes[last]
    }

    pub fn add_edge(&mut self, id: &str, source: &str, target: &str) -> &mut EdgeInput {
        self.edges.push(EdgeInput {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        });
        let last = self.edges.len() - 1;
        &mut self.edges[last]
    }
}
