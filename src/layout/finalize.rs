use crate::config::LayoutConfig;

use super::analysis::Analysis;
use super::collision::resolve_scope;
use super::frames::refit_frame;
use super::graph::Graph;
use super::{Problem, Rect, bounds_of};

/// Bring the placed nodes onto the canvas: shift to the padding corner, scale
/// down oversized layouts, and center small graphs in the reference viewport.
pub(super) fn fit_to_canvas(
    graph: &Graph<'_>,
    analysis: &Analysis,
    config: &LayoutConfig,
    rects: &mut [Rect],
    problems: &mut Vec<Problem>,
) {
    let canvas = &config.canvas;
    shift_to_padding(rects, canvas.padding);

    let Some(bounds) = bounds_of(rects.iter()) else {
        return;
    };
    if bounds.width > canvas.max_width || bounds.height > canvas.max_height {
        let scale = (canvas.max_width / bounds.width)
            .min(canvas.max_height / bounds.height)
            .max(canvas.min_scale);
        tracing::debug!(scale, width = bounds.width, height = bounds.height, "scaling layout to canvas");
        if scale < canvas.severe_scale {
            scale_everything(graph, analysis, config, rects, bounds, scale, problems);
        } else {
            scale_top_level(analysis, rects, bounds, scale);
        }
        resolve_scope(graph, analysis, None, rects, &config.collision, problems);
        shift_to_padding(rects, canvas.padding);
        report_overflow(config, rects, problems);
    }

    if canvas.center_small_layouts && graph.len() < canvas.small_graph_threshold {
        center_in_viewport(config, rects);
    }
}

// `min_scale` can stop the shrink short of the canvas.
fn report_overflow(config: &LayoutConfig, rects: &[Rect], problems: &mut Vec<Problem>) {
    let canvas = &config.canvas;
    let Some(bounds) = bounds_of(rects.iter()) else {
        return;
    };
    if bounds.width <= canvas.max_width && bounds.height <= canvas.max_height {
        return;
    }
    tracing::debug!(width = bounds.width, height = bounds.height, "layout still exceeds canvas");
    problems.push(Problem::CanvasOverflow {
        width: bounds.width.ceil() as u32,
        height: bounds.height.ceil() as u32,
        max_width: canvas.max_width as u32,
        max_height: canvas.max_height as u32,
    });
}

fn shift_to_padding(rects: &mut [Rect], padding: f32) {
    let Some(bounds) = bounds_of(rects.iter()) else {
        return;
    };
    let dx = padding - bounds.x;
    let dy = padding - bounds.y;
    for rect in rects.iter_mut() {
        rect.translate(dx, dy);
    }
}

fn scaled_center(rect: &Rect, origin: (f32, f32), scale: f32) -> (f32, f32) {
    let (cx, cy) = rect.center();
    (origin.0 + (cx - origin.0) * scale, origin.1 + (cy - origin.1) * scale)
}

// Top-level nodes move toward the center; frames keep their contents intact.
fn scale_top_level(analysis: &Analysis, rects: &mut [Rect], bounds: Rect, scale: f32) {
    let origin = bounds.center();
    for idx in analysis.top_level() {
        let rect = rects[idx.0];
        let (cx, cy) = rect.center();
        let (nx, ny) = scaled_center(&rect, origin, scale);
        let (dx, dy) = (nx - cx, ny - cy);
        rects[idx.0].translate(dx, dy);
        for descendant in analysis.descendants(idx) {
            rects[descendant.0].translate(dx, dy);
        }
    }
}

// Severe shrink: node boxes shrink along with positions, then every frame is
// re-wrapped around its children from the inside out.
fn scale_everything(
    graph: &Graph<'_>,
    analysis: &Analysis,
    config: &LayoutConfig,
    rects: &mut [Rect],
    bounds: Rect,
    scale: f32,
    problems: &mut Vec<Problem>,
) {
    let origin = bounds.center();
    for idx in graph.node_indices() {
        let rect = rects[idx.0];
        let (nx, ny) = scaled_center(&rect, origin, scale);
        let (w, h) = if graph.node(idx).kind.is_frame() {
            (rect.width, rect.height)
        } else {
            (rect.width * scale, rect.height * scale)
        };
        rects[idx.0] = Rect::new(nx - w / 2.0, ny - h / 2.0, w, h);
    }
    for frame in analysis.frames_deepest_first(graph) {
        resolve_scope(graph, analysis, Some(frame), rects, &config.collision, problems);
        refit_frame(analysis, frame, config, rects);
    }
}

fn center_in_viewport(config: &LayoutConfig, rects: &mut [Rect]) {
    let canvas = &config.canvas;
    let Some(bounds) = bounds_of(rects.iter()) else {
        return;
    };
    let fits = bounds.width + 2.0 * canvas.padding <= canvas.viewport_width
        && bounds.height + 2.0 * canvas.padding <= canvas.viewport_height;
    if !fits {
        return;
    }
    let (cx, cy) = bounds.center();
    let dx = canvas.viewport_width / 2.0 - cx;
    let dy = canvas.viewport_height / 2.0 - cy;
    for rect in rects.iter_mut() {
        rect.translate(dx, dy);
    }
}

/// Shift nodes and routes together when a route leaves the positive quadrant.
pub(super) fn clear_negative(rects: &mut [Rect], routes: &mut [Vec<(f32, f32)>]) {
    let points = routes.iter().flatten();
    let min_x = rects
        .iter()
        .map(|r| r.x)
        .chain(points.clone().map(|p| p.0))
        .fold(0.0f32, f32::min);
    let min_y = rects
        .iter()
        .map(|r| r.y)
        .chain(points.map(|p| p.1))
        .fold(0.0f32, f32::min);
    if min_x >= 0.0 && min_y >= 0.0 {
        return;
    }
    let (dx, dy) = (-min_x, -min_y);
    for rect in rects.iter_mut() {
        rect.translate(dx, dy);
    }
    for point in routes.iter_mut().flatten() {
        point.0 += dx;
        point.1 += dy;
    }
}

/// Canvas size: furthest node or route point plus padding.
pub(super) fn canvas_extent(rects: &[Rect], routes: &[Vec<(f32, f32)>], padding: f32) -> (f32, f32) {
    let points = routes.iter().flatten();
    let max_x = rects
        .iter()
        .map(Rect::right)
        .chain(points.clone().map(|p| p.0))
        .fold(0.0f32, f32::max);
    let max_y = rects
        .iter()
        .map(Rect::bottom)
        .chain(points.map(|p| p.1))
        .fold(0.0f32, f32::max);
    (max_x + padding, max_y + padding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::GraphSnapshot;
    use crate::layout::analysis::analyze;

    fn prepared(snapshot: &GraphSnapshot, config: &LayoutConfig) -> (Vec<Rect>, Vec<Problem>) {
        let mut problems = Vec::new();
        let graph = Graph::from_snapshot(snapshot, config, &mut problems).unwrap();
        let analysis = analyze(&graph, &mut problems);
        let mut rects: Vec<Rect> = graph.nodes.iter().map(|n| n.initial).collect();
        fit_to_canvas(&graph, &analysis, config, &mut rects, &mut problems);
        (rects, problems)
    }

    fn row(n: usize, gap: f32) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::new();
        for i in 0..n {
            snapshot.add_node(&format!("n{i:02}"), "screen", i as f32 * (180.0 + gap), -50.0);
        }
        snapshot
    }

    #[test]
    fn shifts_to_padding_corner() {
        let mut config = LayoutConfig::default();
        config.canvas.center_small_layouts = false;
        let (rects, _) = prepared(&row(3, 40.0), &config);
        assert_eq!((rects[0].x, rects[0].y), (20.0, 20.0));
        assert_eq!(rects[1].x, 240.0);
    }

    #[test]
    fn small_graphs_are_centered_in_viewport() {
        let config = LayoutConfig::default();
        let (rects, _) = prepared(&row(2, 40.0), &config);
        let bounds = bounds_of(rects.iter()).unwrap();
        let (cx, cy) = bounds.center();
        assert!((cx - 600.0).abs() < 1e-3);
        assert!((cy - 400.0).abs() < 1e-3);
    }

    #[test]
    fn oversized_layouts_scale_to_canvas() {
        let mut config = LayoutConfig::default();
        config.canvas.max_width = 2500.0;
        let (rects, problems) = prepared(&row(12, 200.0), &config);
        let bounds = bounds_of(rects.iter()).unwrap();
        // 4360 wide before; centers move in by 2500 / 4360.
        assert!(bounds.width < 4360.0 * 0.6);
        assert!((rects[1].x - rects[0].x - 380.0 * 2500.0 / 4360.0).abs() < 1e-2);
        // Mild scale: node sizes are kept.
        assert!(rects.iter().all(|r| r.width == 180.0));
        assert!(problems.iter().all(|p| !matches!(p, Problem::UnresolvedCollision { .. })));
    }

    #[test]
    fn severe_scale_shrinks_nodes() {
        let mut config = LayoutConfig::default();
        config.canvas.max_width = 1000.0;
        let (rects, _) = prepared(&row(12, 200.0), &config);
        assert!(rects.iter().all(|r| r.width < 180.0));
        assert!(rects.iter().all(|r| r.x >= 0.0 && r.y >= 0.0));
    }

    #[test]
    fn clamped_scale_reports_overflow() {
        let mut config = LayoutConfig::default();
        config.canvas.max_width = 1000.0;
        // 1000 / 4360 is below the 0.3 floor, so the row stays about 1300 wide.
        let (rects, problems) = prepared(&row(12, 200.0), &config);
        let bounds = bounds_of(rects.iter()).unwrap();
        assert!(bounds.width > 1000.0);
        let overflow: Vec<_> = problems
            .iter()
            .filter(|p| matches!(p, Problem::CanvasOverflow { .. }))
            .collect();
        assert_eq!(overflow.len(), 1);
        assert!(matches!(
            overflow[0],
            Problem::CanvasOverflow { max_width: 1000, max_height: 4000, width, .. } if *width as f32 >= bounds.width
        ));

        config.canvas.max_width = 10_000.0;
        let (_, problems) = prepared(&row(12, 200.0), &config);
        assert!(problems.iter().all(|p| !matches!(p, Problem::CanvasOverflow { .. })));
    }

    #[test]
    fn negative_route_points_shift_everything() {
        let mut rects = vec![Rect::new(0.0, 10.0, 10.0, 10.0)];
        let mut routes = vec![vec![(-5.0, 15.0), (5.0, -2.0)]];
        clear_negative(&mut rects, &mut routes);
        assert_eq!((rects[0].x, rects[0].y), (5.0, 12.0));
        assert_eq!(routes[0], vec![(0.0, 17.0), (10.0, 0.0)]);
        assert_eq!(canvas_extent(&rects, &routes, 20.0), (35.0, 42.0));
    }
}
