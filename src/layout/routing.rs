use std::collections::{BTreeMap, BTreeSet};

use crate::config::LayoutConfig;

use super::analysis::Analysis;
use super::graph::Graph;
use super::handles::{EdgeHandles, anchor_point};
use super::{NodeIdx, Problem, Rect, Side};

const ALIGN_EPS: f32 = 0.5;
const POINT_EPS: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Route {
    pub(super) points: Vec<(f32, f32)>,
    pub(super) lane: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Lane {
    index: usize,
    count: usize,
}

impl Lane {
    const SINGLE: Lane = Lane { index: 0, count: 1 };

    /// Centered shift of this lane's middle channel.
    fn channel_shift(self, width: f32) -> f32 {
        (self.index as f32 - (self.count as f32 - 1.0) / 2.0) * width
    }
}

#[derive(Debug, Clone, Copy)]
struct Obstacle {
    idx: NodeIdx,
    rect: Rect,
}

fn edge_pair_key(s: NodeIdx, t: NodeIdx) -> (NodeIdx, NodeIdx) {
    if s <= t { (s, t) } else { (t, s) }
}

/// Lane per edge position. Only groups of two or more edges between the same
/// unordered pair get lanes, numbered in edge id order.
fn assign_lanes(graph: &Graph<'_>) -> BTreeMap<usize, Lane> {
    let mut groups: BTreeMap<(NodeIdx, NodeIdx), Vec<usize>> = BTreeMap::new();
    for (pos, s, t) in graph.valid_edges() {
        groups.entry(edge_pair_key(s, t)).or_default().push(pos);
    }
    let mut lanes = BTreeMap::new();
    for members in groups.values().filter(|members| members.len() > 1) {
        for (index, pos) in members.iter().enumerate() {
            lanes.insert(
                *pos,
                Lane {
                    index,
                    count: members.len(),
                },
            );
        }
    }
    lanes
}

pub(super) fn route_edges(
    graph: &Graph<'_>,
    analysis: &Analysis,
    rects: &[Rect],
    handles: &[Option<EdgeHandles>],
    config: &LayoutConfig,
    problems: &mut Vec<Problem>,
) -> Vec<Option<Route>> {
    let lanes = assign_lanes(graph);
    let mut routes = vec![None; graph.edges.len()];
    for (pos, edge_handles) in handles.iter().enumerate() {
        let Some(edge_handles) = edge_handles else {
            continue;
        };
        let lane = lanes.get(&pos).copied();
        let mut points = base_route(rects, edge_handles, lane.unwrap_or(Lane::SINGLE), config);

        let obstacles = build_obstacles(analysis, rects, edge_handles, config.routing.obstacle_padding);
        for _ in 0..config.routing.max_detour_passes {
            if !detour_once(&mut points, &obstacles) {
                break;
            }
        }
        let points = compress_path(&points);

        let mut reported = BTreeSet::new();
        for obstacle in &obstacles {
            let blocked = points
                .windows(2)
                .any(|pair| segment_crosses(pair[0], pair[1], &obstacle.rect));
            if blocked && reported.insert(obstacle.idx) {
                problems.push(Problem::EdgeObstructed {
                    edge: graph.edges[pos].id().to_string(),
                    node: graph.node(obstacle.idx).id().to_string(),
                });
            }
        }

        routes[pos] = Some(Route {
            points,
            lane: lane.map(|lane| lane.index),
        });
    }
    routes
}

fn facing(source: Side, target: Side, s: (f32, f32), t: (f32, f32)) -> bool {
    match (source, target) {
        (Side::Bottom, Side::Top) => t.1 > s.1,
        (Side::Top, Side::Bottom) => t.1 < s.1,
        (Side::Right, Side::Left) => t.0 > s.0,
        (Side::Left, Side::Right) => t.0 < s.0,
        _ => false,
    }
}

fn base_route(rects: &[Rect], handles: &EdgeHandles, lane: Lane, config: &LayoutConfig) -> Vec<(f32, f32)> {
    let source = &handles.source;
    let target = &handles.target;
    let s = anchor_point(&rects[source.node.0], source.side, source.offset);
    let t = anchor_point(&rects[target.node.0], target.side, target.offset);
    let lane_width = config.routing.lane_width;

    if facing(source.side, target.side, s, t) {
        let horizontal = source.side.is_horizontal();
        let aligned = if horizontal {
            (s.1 - t.1).abs() < ALIGN_EPS
        } else {
            (s.0 - t.0).abs() < ALIGN_EPS
        };
        if aligned && lane.count <= 1 {
            return vec![s, t];
        }
        return if horizontal {
            let lo = s.0.min(t.0);
            let hi = s.0.max(t.0);
            let mid = ((s.0 + t.0) / 2.0 + lane.channel_shift(lane_width)).clamp(lo, hi);
            vec![s, (mid, s.1), (mid, t.1), t]
        } else {
            let lo = s.1.min(t.1);
            let hi = s.1.max(t.1);
            let mid = ((s.1 + t.1) / 2.0 + lane.channel_shift(lane_width)).clamp(lo, hi);
            vec![s, (s.0, mid), (t.0, mid), t]
        };
    }

    let stub = config.routing.edge_clearance + lane.index as f32 * lane_width;
    let s1 = port_stub_point(s, source.side, stub);
    let t1 = port_stub_point(t, target.side, stub);
    let elbow = if source.side.is_horizontal() {
        (t1.0, s1.1)
    } else {
        (s1.0, t1.1)
    };
    vec![s, s1, elbow, t1, t]
}

fn port_stub_point(point: (f32, f32), side: Side, length: f32) -> (f32, f32) {
    let (ox, oy) = side.outward();
    (point.0 + ox * length, point.1 + oy * length)
}

/// Padded rectangles of every node except the endpoints and the frames that
/// hold either of them.
fn build_obstacles(analysis: &Analysis, rects: &[Rect], handles: &EdgeHandles, pad: f32) -> Vec<Obstacle> {
    let s = handles.source.node;
    let t = handles.target.node;
    (0..rects.len())
        .map(NodeIdx)
        .filter(|&idx| idx != s && idx != t)
        .filter(|&idx| !analysis.is_ancestor(idx, s) && !analysis.is_ancestor(idx, t))
        .map(|idx| Obstacle {
            idx,
            rect: rects[idx.0].inflate(pad),
        })
        .collect()
}

/// Strict crossing of an axis-aligned segment through the rectangle interior.
/// Running along the boundary does not count.
fn segment_crosses(a: (f32, f32), b: (f32, f32), rect: &Rect) -> bool {
    if (a.1 - b.1).abs() <= POINT_EPS {
        let y = a.1;
        y > rect.y && y < rect.bottom() && a.0.max(b.0) > rect.x && a.0.min(b.0) < rect.right()
    } else if (a.0 - b.0).abs() <= POINT_EPS {
        let x = a.0;
        x > rect.x && x < rect.right() && a.1.max(b.1) > rect.y && a.1.min(b.1) < rect.bottom()
    } else {
        // Diagonal segments do not come out of the router; test both legs of
        // the axis-aligned box they span.
        segment_crosses(a, (b.0, a.1), rect) || segment_crosses((b.0, a.1), b, rect)
    }
}

/// Replace the first blocked segment with a walk around the nearer side of the
/// blocking obstacle. Returns `false` when nothing is left to fix.
fn detour_once(points: &mut Vec<(f32, f32)>, obstacles: &[Obstacle]) -> bool {
    for k in 0..points.len().saturating_sub(1) {
        let (a, b) = (points[k], points[k + 1]);
        for obstacle in obstacles {
            let r = &obstacle.rect;
            if r.contains_point(a) || r.contains_point(b) || !segment_crosses(a, b, r) {
                continue;
            }
            let detour = if (a.1 - b.1).abs() <= POINT_EPS {
                let y = if (a.1 - r.y).abs() <= (r.bottom() - a.1).abs() {
                    r.y
                } else {
                    r.bottom()
                };
                let (x_in, x_out) = if a.0 <= b.0 { (r.x, r.right()) } else { (r.right(), r.x) };
                [(x_in, a.1), (x_in, y), (x_out, y), (x_out, a.1)]
            } else if (a.0 - b.0).abs() <= POINT_EPS {
                let x = if (a.0 - r.x).abs() <= (r.right() - a.0).abs() {
                    r.x
                } else {
                    r.right()
                };
                let (y_in, y_out) = if a.1 <= b.1 { (r.y, r.bottom()) } else { (r.bottom(), r.y) };
                [(a.0, y_in), (x, y_in), (x, y_out), (a.0, y_out)]
            } else {
                continue;
            };
            points.splice(k + 1..k + 1, detour);
            return true;
        }
    }
    false
}

/// Drop repeated points and interior points that continue a straight run.
pub(super) fn compress_path(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut deduped: Vec<(f32, f32)> = Vec::with_capacity(points.len());
    for &point in points {
        if let Some(prev) = deduped.last()
            && (point.0 - prev.0).abs() <= POINT_EPS
            && (point.1 - prev.1).abs() <= POINT_EPS
        {
            continue;
        }
        deduped.push(point);
    }
    if deduped.len() <= 2 {
        return deduped;
    }

    let mut out: Vec<(f32, f32)> = Vec::with_capacity(deduped.len());
    out.push(deduped[0]);
    for idx in 1..deduped.len() - 1 {
        let prev = out[out.len() - 1];
        let curr = deduped[idx];
        let next = deduped[idx + 1];
        let dx1 = curr.0 - prev.0;
        let dy1 = curr.1 - prev.1;
        let dx2 = next.0 - curr.0;
        let dy2 = next.1 - curr.1;
        if (dx1.abs() <= POINT_EPS && dx2.abs() <= POINT_EPS) || (dy1.abs() <= POINT_EPS && dy2.abs() <= POINT_EPS) {
            continue;
        }
        out.push(curr);
    }
    out.push(deduped[deduped.len() - 1]);
    out
}
