use std::collections::BTreeMap;

use crate::config::{LayoutConfig, LayoutMode};

use super::analysis::{Analysis, compute_levels, compute_ranks};
use super::collision::{Body, report_unresolved, separate};
use super::graph::Graph;
use super::position::{Scope, place_scope, scope_edges};
use super::{NodeIdx, Problem, Rect, bounds_of};

/// Children offsets relative to the frame's top-left corner, padding included.
#[derive(Debug, Clone, Default)]
pub(super) struct FramePlan {
    pub(super) offsets: BTreeMap<NodeIdx, (f32, f32)>,
}

/// Lay out the inside of every frame, innermost first, and write the resulting
/// frame sizes into `sizes`.
pub(super) fn plan_frames(
    graph: &Graph<'_>,
    analysis: &Analysis,
    mode: LayoutMode,
    config: &LayoutConfig,
    sizes: &mut [(f32, f32)],
    problems: &mut Vec<Problem>,
) -> BTreeMap<NodeIdx, FramePlan> {
    let min_w = config.sizes.min_frame_width;
    let min_h = config.sizes.min_frame_height;
    let padding = config.frame_padding;

    let mut plans = BTreeMap::new();
    for frame in analysis.frames_deepest_first(graph) {
        let children = analysis.children_of(frame).to_vec();
        if children.is_empty() {
            let (w, h) = sizes[frame.0];
            sizes[frame.0] = (w.max(min_w), h.max(min_h));
            plans.insert(frame, FramePlan::default());
            continue;
        }

        let edges = scope_edges(graph, analysis, Some(frame));
        let layering = compute_levels(&children, &edges, |idx| graph.node(idx).kind.is_entry());
        let order = compute_ranks(&children, &layering.levels, &analysis.parent, &analysis.degree);
        let scope = Scope {
            members: children,
            levels: layering.levels,
            order,
            edges,
            sizes: &*sizes,
        };
        let local = place_scope(&scope, mode, config);

        let mut bodies: Vec<Body> = local
            .iter()
            .map(|(&idx, &(x, y))| {
                let (w, h) = sizes[idx.0];
                Body {
                    idx,
                    rect: Rect::new(x, y, w, h),
                }
            })
            .collect();
        report_unresolved(graph, separate(&mut bodies, &config.collision), problems);

        let rects: Vec<Rect> = bodies.iter().map(|body| body.rect).collect();
        let Some(bounds) = bounds_of(rects.iter()) else {
            continue;
        };
        let offsets = bodies
            .iter()
            .map(|body| {
                (
                    body.idx,
                    (
                        body.rect.x - bounds.x + padding,
                        body.rect.y - bounds.y + padding,
                    ),
                )
            })
            .collect();
        sizes[frame.0] = (
            (bounds.width + 2.0 * padding).max(min_w),
            (bounds.height + 2.0 * padding).max(min_h),
        );
        plans.insert(frame, FramePlan { offsets });
    }
    plans
}

/// Place frame children at frame position + planned offset, outermost frames
/// first so nested frames are anchored before their own children.
pub(super) fn anchor_children(analysis: &Analysis, plans: &BTreeMap<NodeIdx, FramePlan>, rects: &mut [Rect]) {
    let mut frames: Vec<NodeIdx> = plans.keys().copied().collect();
    frames.sort_by_key(|idx| (analysis.depth[idx.0], *idx));
    for frame in frames {
        let origin = rects[frame.0];
        for (child, (dx, dy)) in &plans[&frame].offsets {
            rects[child.0].x = origin.x + dx;
            rects[child.0].y = origin.y + dy;
        }
    }
}

/// Shrink-wrap one frame around its current children. Frames without
/// children are left alone.
pub(super) fn refit_frame(analysis: &Analysis, frame: NodeIdx, config: &LayoutConfig, rects: &mut [Rect]) {
    let padding = config.frame_padding;
    let children = analysis.children_of(frame);
    let Some(bounds) = bounds_of(children.iter().map(|child| &rects[child.0])) else {
        return;
    };
    rects[frame.0] = Rect::new(
        bounds.x - padding,
        bounds.y - padding,
        (bounds.width + 2.0 * padding).max(config.sizes.min_frame_width),
        (bounds.height + 2.0 * padding).max(config.sizes.min_frame_height),
    );
}
