use std::collections::{BTreeMap, BTreeSet};

use super::graph::Graph;
use super::{HandleDirection, Layout, NodeIdx, Problem, Rect, Side};

/// Slots keep this far away from a side's corners.
const CORNER_MARGIN: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Handle {
    pub(super) node: NodeIdx,
    pub(super) side: Side,
    pub(super) index: usize,
    pub(super) direction: HandleDirection,
    /// Distance from the side midpoint along the side.
    pub(super) offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct EdgeHandles {
    pub(super) source: Handle,
    pub(super) target: Handle,
}

/// Occupied slots per node side, in allocation order.
#[derive(Debug, Default)]
struct Ledger {
    sides: BTreeMap<(NodeIdx, Side), Vec<HandleDirection>>,
}

impl Ledger {
    fn count(&self, node: NodeIdx, side: Side, direction: HandleDirection) -> usize {
        self.sides
            .get(&(node, side))
            .map_or(0, |slots| slots.iter().filter(|d| **d == direction).count())
    }

    fn usable(&self, node: NodeIdx, side: Side, direction: HandleDirection) -> bool {
        self.count(node, side, direction.opposite()) == 0
    }

    fn occupy(&mut self, node: NodeIdx, side: Side, direction: HandleDirection) -> usize {
        let index = self.count(node, side, direction);
        self.sides.entry((node, side)).or_default().push(direction);
        index
    }
}

/// Side of `from` that faces `to`. Ties on the dominant axis go vertical.
pub(super) fn facing_side(from: &Rect, to: &Rect) -> Side {
    let (fx, fy) = from.center();
    let (tx, ty) = to.center();
    let (dx, dy) = (tx - fx, ty - fy);
    if dx.abs() > dy.abs() {
        if dx > 0.0 { Side::Right } else { Side::Left }
    } else if dy >= 0.0 {
        Side::Bottom
    } else {
        Side::Top
    }
}

/// Try order: the candidate, the orthogonal side nearer the other endpoint,
/// the other orthogonal side, then the opposite side.
fn try_order(candidate: Side, toward: (f32, f32)) -> [Side; 4] {
    let near = if candidate.is_horizontal() {
        if toward.1 >= 0.0 { Side::Bottom } else { Side::Top }
    } else if toward.0 >= 0.0 {
        Side::Right
    } else {
        Side::Left
    };
    [candidate, near, near.opposite(), candidate.opposite()]
}

struct Endpoint<'r> {
    node: NodeIdx,
    rect: &'r Rect,
    other: &'r Rect,
    candidate: Side,
    direction: HandleDirection,
}

fn choose_side(
    graph: &Graph<'_>,
    ledger: &Ledger,
    endpoint: &Endpoint<'_>,
    edge_id: &str,
    problems: &mut Vec<Problem>,
) -> Side {
    let (cx, cy) = endpoint.rect.center();
    let (ox, oy) = endpoint.other.center();
    let order = try_order(endpoint.candidate, (ox - cx, oy - cy));
    if let Some(side) = order
        .iter()
        .copied()
        .find(|side| ledger.usable(endpoint.node, *side, endpoint.direction))
    {
        return side;
    }

    let direction = endpoint.direction;
    let (_, side) = order
        .iter()
        .enumerate()
        .map(|(pos, side)| {
            let key = (
                ledger.count(endpoint.node, *side, direction.opposite()),
                ledger.count(endpoint.node, *side, direction),
                pos,
            );
            (key, *side)
        })
        .min_by_key(|(key, _)| *key)
        .unwrap_or(((0, 0, 0), endpoint.candidate));
    problems.push(Problem::HandleOverload {
        node: graph.node(endpoint.node).id().to_string(),
        side,
        edge: edge_id.to_string(),
    });
    side
}

/// Assign a side and slot to both endpoints of every resolved edge.
/// Returned vector is indexed by edge position; unresolved edges stay `None`.
pub(super) fn allocate(graph: &Graph<'_>, rects: &[Rect], handle_spacing: f32, problems: &mut Vec<Problem>) -> Vec<Option<EdgeHandles>> {
    let mut order: Vec<(usize, NodeIdx, NodeIdx)> = graph.valid_edges().collect();
    order.sort_by_key(|&(pos, s, t)| (s, t, pos));

    let mut ledger = Ledger::default();
    let mut assigned: Vec<Option<EdgeHandles>> = vec![None; graph.edges.len()];
    for (pos, s, t) in order {
        let edge_id = graph.edges[pos].id();
        let source_rect = &rects[s.0];
        let target_rect = &rects[t.0];
        let candidate = facing_side(source_rect, target_rect);

        let source = Endpoint {
            node: s,
            rect: source_rect,
            other: target_rect,
            candidate,
            direction: HandleDirection::Out,
        };
        let source_side = choose_side(graph, &ledger, &source, edge_id, problems);
        let source_index = ledger.occupy(s, source_side, HandleDirection::Out);

        let target = Endpoint {
            node: t,
            rect: target_rect,
            other: source_rect,
            candidate: candidate.opposite(),
            direction: HandleDirection::In,
        };
        let target_side = choose_side(graph, &ledger, &target, edge_id, problems);
        let target_index = ledger.occupy(t, target_side, HandleDirection::In);

        assigned[pos] = Some(EdgeHandles {
            source: Handle {
                node: s,
                side: source_side,
                index: source_index,
                direction: HandleDirection::Out,
                offset: 0.0,
            },
            target: Handle {
                node: t,
                side: target_side,
                index: target_index,
                direction: HandleDirection::In,
                offset: 0.0,
            },
        });
    }

    let mut crowded: BTreeSet<(NodeIdx, Side)> = BTreeSet::new();
    for handles in assigned.iter_mut().flatten() {
        for handle in [&mut handles.source, &mut handles.target] {
            let rect = &rects[handle.node.0];
            let (offset, clamped) = slot_offset(&ledger, handle, rect, handle_spacing);
            handle.offset = offset;
            if clamped && crowded.insert((handle.node, handle.side)) {
                problems.push(Problem::CrowdedSide {
                    node: graph.node(handle.node).id().to_string(),
                    side: handle.side,
                    slots: ledger.sides.get(&(handle.node, handle.side)).map_or(0, Vec::len),
                });
            }
        }
    }
    assigned
}

// Outbound slots come first along a mixed side, inbound after them.
fn slot_offset(ledger: &Ledger, handle: &Handle, rect: &Rect, spacing: f32) -> (f32, bool) {
    let outbound = ledger.count(handle.node, handle.side, HandleDirection::Out);
    let inbound = ledger.count(handle.node, handle.side, HandleDirection::In);
    let total = outbound + inbound;
    let position = match handle.direction {
        HandleDirection::Out => handle.index,
        HandleDirection::In => outbound + handle.index,
    };
    let offset = (position as f32 - (total as f32 - 1.0) / 2.0) * spacing;

    let half = if handle.side.is_horizontal() {
        rect.height / 2.0
    } else {
        rect.width / 2.0
    };
    let limit = (half - CORNER_MARGIN).max(0.0);
    if offset.abs() > limit {
        (offset.clamp(-limit, limit), true)
    } else {
        (offset, false)
    }
}

/// Point on `side` of `rect`, shifted `offset` along the side from its midpoint.
pub(super) fn anchor_point(rect: &Rect, side: Side, offset: f32) -> (f32, f32) {
    let (cx, cy) = rect.center();
    match side {
        Side::Top => (cx + offset, rect.y),
        Side::Bottom => (cx + offset, rect.bottom()),
        Side::Left => (rect.x, cy + offset),
        Side::Right => (rect.right(), cy + offset),
    }
}

/// Node sides that carry both inbound and outbound handles in a finished
/// layout. Empty unless a handle overload was reported.
pub fn verify_handle_separation(layout: &Layout) -> Vec<(String, Side)> {
    let mut seen: BTreeMap<(&str, Side), BTreeSet<HandleDirection>> = BTreeMap::new();
    for edge in &layout.edges {
        for slot in [&edge.source_handle, &edge.target_handle].into_iter().flatten() {
            seen.entry((slot.node_id.as_str(), slot.side))
                .or_default()
                .insert(slot.direction);
        }
    }
    seen.into_iter()
        .filter(|(_, directions)| directions.len() > 1)
        .map(|((node, side), _)| (node.to_string(), side))
        .collect()
}
