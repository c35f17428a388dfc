use serde::{Serialize, Serializer};
use thiserror::Error;

use super::Side;

/// Contract violations: the pass refuses to run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("edge `{edge}` connects node `{node}` to itself")]
    SelfLoop { edge: String, node: String },
    #[error("invalid configuration: `{field}` must be positive and finite (got {value})")]
    InvalidConfig { field: &'static str, value: f32 },
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    #[error("duplicate edge id `{0}`")]
    DuplicateEdge(String),
}

/// Soft diagnostics. A layout is always returned alongside them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum Problem {
    #[error("edge `{edge}` references missing node `{node}`; left unrouted")]
    MissingEndpoint { edge: String, node: String },
    #[error("node `{node}` is isolated: no path from an entry point")]
    IsolatedNode { node: String },
    #[error("node `{node}` names `{parent}` as its frame, which is not a usable frame")]
    InvalidParent { node: String, parent: String },
    #[error("handle overload on `{node}` {side} side: edge `{edge}` mixes inbound and outbound traffic")]
    HandleOverload {
        node: String,
        side: Side,
        edge: String,
    },
    #[error("handle overload on `{node}` {side} side: {slots} slots do not fit along the side")]
    CrowdedSide {
        node: String,
        side: Side,
        slots: usize,
    },
    #[error("unresolved collision between `{a}` and `{b}`")]
    UnresolvedCollision { a: String, b: String },
    #[error("edge `{edge}` still crosses node `{node}` after detouring")]
    EdgeObstructed { edge: String, node: String },
    #[error("layout is {width}x{height} after scaling, larger than the {max_width}x{max_height} canvas")]
    CanvasOverflow {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
}

impl Serialize for Problem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problems_serialize_as_strings() {
        let problems = vec![
            Problem::IsolatedNode {
                node: "n1".to_string(),
            },
            Problem::HandleOverload {
                node: "hub".to_string(),
                side: Side::Left,
                edge: "e4".to_string(),
            },
        ];
        let json = serde_json::to_value(&problems).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                "node `n1` is isolated: no path from an entry point",
                "handle overload on `hub` left side: edge `e4` mixes inbound and outbound traffic"
            ])
        );
    }

    #[test]
    fn self_loop_message_names_edge() {
        let err = LayoutError::SelfLoop {
            edge: "e1".to_string(),
            node: "a".to_string(),
        };
        assert_eq!(err.to_string(), "edge `e1` connects node `a` to itself");
    }
}
