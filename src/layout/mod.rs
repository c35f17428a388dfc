mod analysis;
mod collision;
mod error;
mod finalize;
mod frames;
mod graph;
mod handles;
mod position;
mod routing;
pub(crate) mod types;
pub use error::{LayoutError, Problem};
pub use handles::verify_handle_separation;
pub use types::*;

use std::collections::HashSet;

use crate::config::LayoutConfig;
use crate::ir::{GraphSnapshot, Point};
use graph::Graph;
use handles::Handle;
use position::Scope;

pub fn compute_layout(snapshot: &GraphSnapshot, config: &LayoutConfig) -> Result<Layout, LayoutError> {
    config.validate()?;
    let span = tracing::debug_span!(
        "compute_layout",
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len()
    );
    let _enter = span.enter();

    let mut problems = Vec::new();
    let graph = Graph::from_snapshot(snapshot, config, &mut problems)?;
    let analysis = analysis::analyze(&graph, &mut problems);
    let mode = position::resolve_mode(&graph, &analysis, config);
    tracing::debug!(?mode, "resolved layout mode");

    let mut sizes: Vec<(f32, f32)> = graph.nodes.iter().map(|node| node.size()).collect();
    let plans = frames::plan_frames(&graph, &analysis, mode, config, &mut sizes, &mut problems);

    let top = analysis.top_level();
    let scope = Scope {
        levels: analysis.level_map(&top),
        order: top.iter().map(|idx| (*idx, analysis.ranks[idx.0])).collect(),
        edges: position::scope_edges(&graph, &analysis, None),
        members: top,
        sizes: &sizes,
    };
    let placed = position::place_scope(&scope, mode, config);

    let mut rects: Vec<Rect> = sizes.iter().map(|&(w, h)| Rect::new(0.0, 0.0, w, h)).collect();
    for (idx, (x, y)) in placed {
        rects[idx.0].x = x;
        rects[idx.0].y = y;
    }
    frames::anchor_children(&analysis, &plans, &mut rects);
    collision::resolve_scope(&graph, &analysis, None, &mut rects, &config.collision, &mut problems);
    let base = rects.clone();
    finalize::fit_to_canvas(&graph, &analysis, config, &mut rects, &mut problems);
    tracing::debug!("positions settled");

    let handles = handles::allocate(&graph, &rects, config.handle_spacing, &mut problems);
    let routes = routing::route_edges(&graph, &analysis, &rects, &handles, config, &mut problems);
    let lanes: Vec<Option<usize>> = routes
        .iter()
        .map(|route| route.as_ref().and_then(|route| route.lane))
        .collect();
    let mut points: Vec<Vec<(f32, f32)>> = routes
        .into_iter()
        .map(|route| route.map(|route| route.points).unwrap_or_default())
        .collect();
    finalize::clear_negative(&mut rects, &mut points);
    let (width, height) = finalize::canvas_extent(&rects, &points, config.canvas.padding);
    tracing::debug!(width, height, "edges routed");

    let nodes = graph
        .node_indices()
        .map(|idx| {
            let record = graph.node(idx);
            let rect = rects[idx.0];
            NodeLayout {
                id: record.id().to_string(),
                node_type: record.input.node_type.clone(),
                position: Point::new(rect.x, rect.y),
                width: rect.width,
                height: rect.height,
                base: base[idx.0],
                level: analysis.levels[idx.0],
                rank: analysis.ranks[idx.0],
                isolated: analysis.isolated[idx.0],
                parent_id: analysis
                    .parent_of(idx)
                    .map(|parent| graph.node(parent).id().to_string()),
                child_ids: analysis
                    .children_of(idx)
                    .iter()
                    .map(|child| graph.node(*child).id().to_string())
                    .collect(),
            }
        })
        .collect();

    let slot = |handle: &Handle| HandleSlot {
        node_id: graph.node(handle.node).id().to_string(),
        side: handle.side,
        index: handle.index,
        direction: handle.direction,
    };
    let edges = graph
        .edges
        .iter()
        .enumerate()
        .map(|(pos, record)| {
            let assigned = handles[pos].as_ref();
            EdgeLayout {
                id: record.id().to_string(),
                source: record.input.source.clone(),
                target: record.input.target.clone(),
                label: record.input.label.clone(),
                source_handle: assigned.map(|h| slot(&h.source)),
                target_handle: assigned.map(|h| slot(&h.target)),
                routing_points: points[pos].iter().map(|&(x, y)| Point::new(x, y)).collect(),
                lane: lanes[pos],
            }
        })
        .collect();

    let mut seen = HashSet::new();
    problems.retain(|problem| seen.insert(problem.clone()));
    for problem in &problems {
        tracing::warn!(%problem, "layout problem");
    }

    Ok(Layout {
        mode,
        width,
        height,
        nodes,
        edges,
        problems,
    })
}
