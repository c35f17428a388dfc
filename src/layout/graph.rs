use std::collections::HashMap;

use crate::config::LayoutConfig;
use crate::ir::{EdgeInput, GraphSnapshot, NodeInput, NodeKind};

use super::{LayoutError, NodeIdx, Problem, Rect};

#[derive(Debug, Clone)]
pub(super) struct NodeRecord<'a> {
    pub(super) input: &'a NodeInput,
    pub(super) kind: NodeKind,
    /// Rectangle as supplied by the editor, used for containment detection.
    pub(super) initial: Rect,
}

impl NodeRecord<'_> {
    pub(super) fn id(&self) -> &str {
        &self.input.id
    }

    pub(super) fn size(&self) -> (f32, f32) {
        (self.initial.width, self.initial.height)
    }
}

#[derive(Debug, Clone)]
pub(super) struct EdgeRecord<'a> {
    pub(super) input: &'a EdgeInput,
    /// `None` when either endpoint is missing from the snapshot.
    pub(super) endpoints: Option<(NodeIdx, NodeIdx)>,
}

impl EdgeRecord<'_> {
    pub(super) fn id(&self) -> &str {
        &self.input.id
    }
}

/// Arena view of one snapshot: nodes and edges sorted by id, edges resolved
/// to node handles.
#[derive(Debug)]
pub(super) struct Graph<'a> {
    pub(super) nodes: Vec<NodeRecord<'a>>,
    pub(super) edges: Vec<EdgeRecord<'a>>,
    index: HashMap<&'a str, NodeIdx>,
}

impl<'a> Graph<'a> {
    pub(super) fn from_snapshot(
        snapshot: &'a GraphSnapshot,
        config: &LayoutConfig,
        problems: &mut Vec<Problem>,
    ) -> Result<Self, LayoutError> {
        let mut node_inputs: Vec<&NodeInput> = snapshot.nodes.iter().collect();
        node_inputs.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = node_inputs.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(LayoutError::DuplicateNode(pair[0].id.clone()));
        }

        let mut edge_inputs: Vec<&EdgeInput> = snapshot.edges.iter().collect();
        edge_inputs.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = edge_inputs.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(LayoutError::DuplicateEdge(pair[0].id.clone()));
        }
        if let Some(edge) = edge_inputs.iter().find(|edge| edge.source == edge.target) {
            return Err(LayoutError::SelfLoop {
                edge: edge.id.clone(),
                node: edge.source.clone(),
            });
        }

        let nodes: Vec<NodeRecord<'a>> = node_inputs
            .into_iter()
            .map(|input| {
                let kind = input.kind();
                let (default_w, default_h) = config.sizes.size_for(kind);
                let width = positive_or(input.width, default_w);
                let height = positive_or(input.height, default_h);
                NodeRecord {
                    input,
                    kind,
                    initial: Rect::new(input.position.x, input.position.y, width, height),
                }
            })
            .collect();

        let index: HashMap<&'a str, NodeIdx> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.input.id.as_str(), NodeIdx(idx)))
            .collect();

        let mut edges = Vec::with_capacity(edge_inputs.len());
        for input in edge_inputs {
            let source = index.get(input.source.as_str()).copied();
            let target = index.get(input.target.as_str()).copied();
            for (endpoint, name) in [(source, &input.source), (target, &input.target)] {
                if endpoint.is_none() {
                    problems.push(Problem::MissingEndpoint {
                        edge: input.id.clone(),
                        node: name.clone(),
                    });
                }
            }
            edges.push(EdgeRecord {
                input,
                endpoints: source.zip(target),
            });
        }

        Ok(Self {
            nodes,
            edges,
            index,
        })
    }

    pub(super) fn lookup(&self, id: &str) -> Option<NodeIdx> {
        self.index.get(id).copied()
    }

    pub(super) fn node(&self, idx: NodeIdx) -> &NodeRecord<'a> {
        &self.nodes[idx.0]
    }

    pub(super) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(super) fn node_indices(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        (0..self.nodes.len()).map(NodeIdx)
    }

    /// Resolved edges as `(edge position, source, target)`, in edge id order.
    pub(super) fn valid_edges(&self) -> impl Iterator<Item = (usize, NodeIdx, NodeIdx)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(idx, edge)| edge.endpoints.map(|(s, t)| (idx, s, t)))
    }
}

fn positive_or(value: Option<f32>, fallback: f32) -> f32 {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(fallback)
}
