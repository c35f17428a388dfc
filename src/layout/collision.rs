use crate::config::CollisionConfig;

use super::analysis::Analysis;
use super::graph::Graph;
use super::{NodeIdx, Problem, Rect};

const OVERLAP_EPS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Body {
    pub(super) idx: NodeIdx,
    pub(super) rect: Rect,
}

/// Pairwise push-apart over one scope of sibling bodies.
///
/// Each sweep visits every pair in slice order; an overlapping pair (grown by
/// the configured margin) is split along the axis of lesser overlap, half the
/// distance each. Sweeps stop once nothing moves or the iteration budget is
/// spent. Returns the pairs that still overlap without the margin.
pub(super) fn separate(bodies: &mut [Body], config: &CollisionConfig) -> Vec<(NodeIdx, NodeIdx)> {
    if bodies.len() < 2 {
        return Vec::new();
    }

    for _ in 0..config.max_iterations {
        let mut moved = false;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let a = bodies[i].rect;
                let b = bodies[j].rect;
                let (ox, oy) = a.overlap(&b, config.margin);
                if ox <= OVERLAP_EPS || oy <= OVERLAP_EPS {
                    continue;
                }
                let (ca, cb) = (a.center(), b.center());
                if ox <= oy {
                    let sign = push_sign(cb.0 - ca.0);
                    bodies[i].rect.translate(-sign * ox / 2.0, 0.0);
                    bodies[j].rect.translate(sign * ox / 2.0, 0.0);
                } else {
                    let sign = push_sign(cb.1 - ca.1);
                    bodies[i].rect.translate(0.0, -sign * oy / 2.0);
                    bodies[j].rect.translate(0.0, sign * oy / 2.0);
                }
                moved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let mut unresolved = Vec::new();
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let (ox, oy) = bodies[i].rect.overlap(&bodies[j].rect, 0.0);
            if ox > OVERLAP_EPS && oy > OVERLAP_EPS {
                unresolved.push((bodies[i].idx, bodies[j].idx));
            }
        }
    }
    unresolved
}

/// Separate the direct members of one scope (`None` is the top level) in
/// place. Frames carry all their descendants along.
pub(super) fn resolve_scope(
    graph: &Graph<'_>,
    analysis: &Analysis,
    scope_parent: Option<NodeIdx>,
    rects: &mut [Rect],
    config: &CollisionConfig,
    problems: &mut Vec<Problem>,
) {
    let members = match scope_parent {
        Some(frame) => analysis.children_of(frame).to_vec(),
        None => analysis.top_level(),
    };
    let mut bodies: Vec<Body> = members
        .into_iter()
        .map(|idx| Body {
            idx,
            rect: rects[idx.0],
        })
        .collect();
    let unresolved = separate(&mut bodies, config);

    for body in &bodies {
        let before = rects[body.idx.0];
        let dx = body.rect.x - before.x;
        let dy = body.rect.y - before.y;
        if dx == 0.0 && dy == 0.0 {
            continue;
        }
        rects[body.idx.0] = body.rect;
        for descendant in analysis.descendants(body.idx) {
            rects[descendant.0].translate(dx, dy);
        }
    }
    report_unresolved(graph, unresolved, problems);
}

pub(super) fn report_unresolved(graph: &Graph<'_>, pairs: Vec<(NodeIdx, NodeIdx)>, problems: &mut Vec<Problem>) {
    for (a, b) in pairs {
        problems.push(Problem::UnresolvedCollision {
            a: graph.node(a).id().to_string(),
            b: graph.node(b).id().to_string(),
        });
    }
}

// Coincident centers: the later body moves right/down.
fn push_sign(delta: f32) -> f32 {
    if delta < 0.0 { -1.0 } else { 1.0 }
}
