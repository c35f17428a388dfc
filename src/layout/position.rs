use std::collections::{BTreeMap, VecDeque};
use std::f32::consts::PI;

use crate::config::{LayoutConfig, LayoutMode};

use super::NodeIdx;
use super::analysis::Analysis;
use super::graph::Graph;

/// Share of pass-through nodes (in <= 1, out <= 1) that makes a graph linear.
const LINEAR_SHARE: f32 = 0.8;
/// Edge density above which `smart` switches to the compact mode.
const DENSE_GRAPH: f32 = 0.3;
const MIN_FORCE_DISTANCE: f32 = 0.01;

/// One placement problem: a set of sibling nodes sharing a coordinate space.
#[derive(Debug, Clone)]
pub(super) struct Scope<'s> {
    pub(super) members: Vec<NodeIdx>,
    pub(super) levels: BTreeMap<NodeIdx, usize>,
    pub(super) order: BTreeMap<NodeIdx, usize>,
    pub(super) edges: Vec<(NodeIdx, NodeIdx)>,
    pub(super) sizes: &'s [(f32, f32)],
}

impl Scope<'_> {
    fn size(&self, idx: NodeIdx) -> (f32, f32) {
        self.sizes[idx.0]
    }

    fn rows(&self) -> Vec<Vec<NodeIdx>> {
        let mut buckets: BTreeMap<usize, Vec<NodeIdx>> = BTreeMap::new();
        for &idx in &self.members {
            let level = self.levels.get(&idx).copied().unwrap_or(0);
            buckets.entry(level).or_default().push(idx);
        }
        buckets
            .into_values()
            .map(|mut row| {
                row.sort_by_key(|idx| (self.order.get(idx).copied().unwrap_or(usize::MAX), *idx));
                row
            })
            .collect()
    }

    fn extent(&self) -> f32 {
        self.members
            .iter()
            .map(|&idx| {
                let (w, h) = self.size(idx);
                w.max(h)
            })
            .fold(0.0, f32::max)
    }
}

/// Edges of the whole graph re-expressed between members of the scope owned
/// by `scope_parent`. Endpoints are lifted to their ancestor in that scope;
/// edges that leave the scope or collapse onto one member are dropped.
pub(super) fn scope_edges(
    graph: &Graph<'_>,
    analysis: &Analysis,
    scope_parent: Option<NodeIdx>,
) -> Vec<(NodeIdx, NodeIdx)> {
    graph
        .valid_edges()
        .filter_map(|(_, s, t)| {
            let s = lift(analysis, s, scope_parent)?;
            let t = lift(analysis, t, scope_parent)?;
            (s != t).then_some((s, t))
        })
        .collect()
}

fn lift(analysis: &Analysis, node: NodeIdx, scope_parent: Option<NodeIdx>) -> Option<NodeIdx> {
    let mut current = node;
    loop {
        let parent = analysis.parent_of(current);
        if parent == scope_parent {
            return Some(current);
        }
        current = parent?;
    }
}

/// Concrete mode for this pass. Only `smart` inspects the graph.
pub(super) fn resolve_mode(graph: &Graph<'_>, analysis: &Analysis, config: &LayoutConfig) -> LayoutMode {
    if config.mode != LayoutMode::Smart {
        return config.mode;
    }
    let n = graph.len();
    if n <= 1 {
        return LayoutMode::Vertical;
    }
    let edges: Vec<(NodeIdx, NodeIdx)> = graph.valid_edges().map(|(_, s, t)| (s, t)).collect();
    if edges.len() == n - 1 && !has_undirected_cycle(n, &edges) {
        return LayoutMode::Tree;
    }

    let mut indegree = vec![0usize; n];
    let mut outdegree = vec![0usize; n];
    for &(s, t) in &edges {
        outdegree[s.0] += 1;
        indegree[t.0] += 1;
    }
    let pass_through = (0..n)
        .filter(|&idx| indegree[idx] <= 1 && outdegree[idx] <= 1)
        .count();
    if pass_through as f32 >= LINEAR_SHARE * n as f32 {
        return pick_orientation(graph, analysis, config);
    }

    let density = edges.len() as f32 / (n * (n - 1)) as f32;
    if density > DENSE_GRAPH {
        LayoutMode::Compact
    } else {
        LayoutMode::Vertical
    }
}

fn has_undirected_cycle(n: usize, edges: &[(NodeIdx, NodeIdx)]) -> bool {
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    let mut parent: Vec<usize> = (0..n).collect();
    for &(s, t) in edges {
        let a = find(&mut parent, s.0);
        let b = find(&mut parent, t.0);
        if a == b {
            return true;
        }
        parent[a] = b;
    }
    false
}

// Frame sizes change from pass to pass, so the estimate only looks at the
// other node kinds to keep the choice stable when a layout is fed back in.
fn pick_orientation(graph: &Graph<'_>, analysis: &Analysis, config: &LayoutConfig) -> LayoutMode {
    let plain: Vec<(f32, f32)> = graph
        .nodes
        .iter()
        .filter(|node| !node.kind.is_frame())
        .map(|node| node.size())
        .collect();
    let (avg_w, avg_h) = if plain.is_empty() {
        (config.sizes.default_width, config.sizes.default_height)
    } else {
        let count = plain.len() as f32;
        (
            plain.iter().map(|s| s.0).sum::<f32>() / count,
            plain.iter().map(|s| s.1).sum::<f32>() / count,
        )
    };

    let mut per_level: BTreeMap<usize, usize> = BTreeMap::new();
    for level in &analysis.levels {
        *per_level.entry(*level).or_insert(0) += 1;
    }
    let depth = per_level.len().max(1) as f32;
    let breadth = per_level.values().copied().max().unwrap_or(1) as f32;

    let vertical = (
        breadth * (avg_w + config.node_spacing),
        depth * (avg_h + config.rank_spacing),
    );
    let horizontal = (
        depth * (avg_w + config.rank_spacing),
        breadth * (avg_h + config.node_spacing),
    );
    let target = config.canvas.viewport_width / config.canvas.viewport_height;
    let score = |(w, h): (f32, f32)| ((w / h) / target).ln().abs();
    if score(horizontal) < score(vertical) {
        LayoutMode::Horizontal
    } else {
        LayoutMode::Vertical
    }
}

/// Top-left corner per member, normalized so the scope starts at the origin.
pub(super) fn place_scope(
    scope: &Scope<'_>,
    mode: LayoutMode,
    config: &LayoutConfig,
) -> BTreeMap<NodeIdx, (f32, f32)> {
    if scope.members.is_empty() {
        return BTreeMap::new();
    }
    let positions = match mode {
        LayoutMode::Vertical | LayoutMode::Smart => layered(
            scope,
            Layered {
                horizontal: false,
                node_gap: config.node_spacing,
                rank_gap: config.rank_spacing,
                stagger: 0.0,
                center_rows: false,
            },
        ),
        LayoutMode::Horizontal => layered(
            scope,
            Layered {
                horizontal: true,
                node_gap: config.node_spacing,
                rank_gap: config.rank_spacing,
                stagger: 0.0,
                center_rows: false,
            },
        ),
        LayoutMode::Compact => layered(
            scope,
            Layered {
                horizontal: false,
                node_gap: config.node_spacing * config.compact.node_spacing_factor,
                rank_gap: config.rank_spacing * config.compact.rank_spacing_factor,
                stagger: config.compact.stagger,
                center_rows: false,
            },
        ),
        LayoutMode::Tree => layered(
            scope,
            Layered {
                horizontal: false,
                node_gap: config.node_spacing,
                rank_gap: config.rank_spacing,
                stagger: 0.0,
                center_rows: true,
            },
        ),
        LayoutMode::Radial => radial(scope, config),
        LayoutMode::Force => force_directed(scope, config),
    };
    normalize(positions)
}

#[derive(Debug, Clone, Copy)]
struct Layered {
    horizontal: bool,
    node_gap: f32,
    rank_gap: f32,
    /// Offset of odd rows, as a fraction of the slot pitch.
    stagger: f32,
    center_rows: bool,
}

fn layered(scope: &Scope<'_>, params: Layered) -> BTreeMap<NodeIdx, (f32, f32)> {
    let cross = |idx: NodeIdx| {
        let (w, h) = scope.size(idx);
        if params.horizontal { h } else { w }
    };
    let main = |idx: NodeIdx| {
        let (w, h) = scope.size(idx);
        if params.horizontal { w } else { h }
    };

    let rows = scope.rows();
    let slot = scope.members.iter().map(|&idx| cross(idx)).fold(0.0, f32::max);
    let pitch = slot + params.node_gap;
    let widest = rows.iter().map(Vec::len).max().unwrap_or(0);

    let mut positions = BTreeMap::new();
    let mut cursor = 0.0;
    for (row_idx, row) in rows.iter().enumerate() {
        let thickness = row.iter().map(|&idx| main(idx)).fold(0.0, f32::max);
        let mut offset = 0.0;
        if params.center_rows {
            offset += (widest - row.len()) as f32 * pitch / 2.0;
        }
        if row_idx % 2 == 1 {
            offset += params.stagger * pitch;
        }
        for (slot_idx, &idx) in row.iter().enumerate() {
            let c = offset + slot_idx as f32 * pitch + (slot - cross(idx)) / 2.0;
            let m = cursor + (thickness - main(idx)) / 2.0;
            let point = if params.horizontal { (m, c) } else { (c, m) };
            positions.insert(idx, point);
        }
        cursor += thickness + params.rank_gap;
    }
    positions
}

fn radial(scope: &Scope<'_>, config: &LayoutConfig) -> BTreeMap<NodeIdx, (f32, f32)> {
    let mut neighbors: BTreeMap<NodeIdx, Vec<NodeIdx>> = BTreeMap::new();
    for &(s, t) in &scope.edges {
        neighbors.entry(s).or_default().push(t);
        neighbors.entry(t).or_default().push(s);
    }
    for list in neighbors.values_mut() {
        list.sort();
        list.dedup();
    }

    let degree = |idx: &NodeIdx| neighbors.get(idx).map_or(0, Vec::len);
    let Some(hub) = scope
        .members
        .iter()
        .copied()
        .min_by_key(|idx| (std::cmp::Reverse(degree(idx)), *idx))
    else {
        return BTreeMap::new();
    };

    let mut ring_of: BTreeMap<NodeIdx, usize> = BTreeMap::new();
    ring_of.insert(hub, 0);
    let mut queue = VecDeque::from([hub]);
    while let Some(idx) = queue.pop_front() {
        let ring = ring_of[&idx];
        for &next in neighbors.get(&idx).into_iter().flatten() {
            if !ring_of.contains_key(&next) {
                ring_of.insert(next, ring + 1);
                queue.push_back(next);
            }
        }
    }
    let outer = ring_of.values().max().map_or(1, |max| max + 1);

    let mut rings: BTreeMap<usize, Vec<NodeIdx>> = BTreeMap::new();
    for &idx in &scope.members {
        let ring = ring_of.get(&idx).copied().unwrap_or(outer);
        rings.entry(ring).or_default().push(idx);
    }

    let extent = scope.extent();
    let step = extent + config.rank_spacing;
    let mut centers = BTreeMap::new();
    let mut previous = 0.0f32;
    for (ring, mut nodes) in rings {
        nodes.sort_by_key(|idx| {
            (
                scope.levels.get(idx).copied().unwrap_or(0),
                scope.order.get(idx).copied().unwrap_or(0),
                *idx,
            )
        });
        if ring == 0 {
            for idx in nodes {
                centers.insert(idx, (0.0, 0.0));
            }
            continue;
        }
        let count = nodes.len() as f32;
        let circumference_fit = count * (extent + config.node_spacing) / (2.0 * PI);
        let radius = (ring as f32 * step)
            .max(circumference_fit)
            .max(previous + step);
        previous = radius;
        for (i, idx) in nodes.into_iter().enumerate() {
            let angle = -PI / 2.0 + 2.0 * PI * i as f32 / count;
            centers.insert(idx, (radius * angle.cos(), radius * angle.sin()));
        }
    }

    centers
        .into_iter()
        .map(|(idx, (cx, cy))| {
            let (w, h) = scope.size(idx);
            (idx, (cx - w / 2.0, cy - h / 2.0))
        })
        .collect()
}

fn force_directed(scope: &Scope<'_>, config: &LayoutConfig) -> BTreeMap<NodeIdx, (f32, f32)> {
    let seed = layered(
        scope,
        Layered {
            horizontal: false,
            node_gap: config.node_spacing,
            rank_gap: config.rank_spacing,
            stagger: 0.0,
            center_rows: false,
        },
    );
    let nodes: Vec<NodeIdx> = seed.keys().copied().collect();
    let slot: BTreeMap<NodeIdx, usize> = nodes.iter().enumerate().map(|(i, idx)| (*idx, i)).collect();
    let mut centers: Vec<(f32, f32)> = nodes
        .iter()
        .map(|idx| {
            let (x, y) = seed[idx];
            let (w, h) = scope.size(*idx);
            (x + w / 2.0, y + h / 2.0)
        })
        .collect();

    let k = scope.extent() + config.node_spacing;
    let iterations = config.force.iterations;
    for iteration in 0..iterations {
        let temperature = k * (1.0 - iteration as f32 / iterations as f32);
        let mut disp = vec![(0.0f32, 0.0f32); nodes.len()];

        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let (dx, dy, dist) = separation(centers[i], centers[j], i, j);
                let force = k * k / dist;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                disp[i].0 += fx;
                disp[i].1 += fy;
                disp[j].0 -= fx;
                disp[j].1 -= fy;
            }
        }

        for (s, t) in &scope.edges {
            let (Some(&i), Some(&j)) = (slot.get(s), slot.get(t)) else {
                continue;
            };
            let (dx, dy, dist) = separation(centers[i], centers[j], i, j);
            let force = dist * dist / k;
            let (fx, fy) = (dx / dist * force, dy / dist * force);
            disp[i].0 -= fx;
            disp[i].1 -= fy;
            disp[j].0 += fx;
            disp[j].1 += fy;
        }

        for (center, (dx, dy)) in centers.iter_mut().zip(disp) {
            let len = (dx * dx + dy * dy).sqrt();
            if len > 0.0 {
                let step = len.min(temperature);
                center.0 += dx / len * step;
                center.1 += dy / len * step;
            }
        }
    }

    nodes
        .iter()
        .zip(centers)
        .map(|(idx, (cx, cy))| {
            let (w, h) = scope.size(*idx);
            (*idx, (cx - w / 2.0, cy - h / 2.0))
        })
        .collect()
}

/// Vector from `b` to `a` and its length. Coincident centers get a fixed
/// direction derived from the pair so runs stay reproducible.
fn separation(a: (f32, f32), b: (f32, f32), i: usize, j: usize) -> (f32, f32, f32) {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    let dist = (dx * dx + dy * dy).sqrt();
    if dist >= MIN_FORCE_DISTANCE {
        return (dx, dy, dist);
    }
    let angle = (i * 7 + j * 13) as f32;
    (
        angle.cos() * MIN_FORCE_DISTANCE,
        angle.sin() * MIN_FORCE_DISTANCE,
        MIN_FORCE_DISTANCE,
    )
}

fn normalize(positions: BTreeMap<NodeIdx, (f32, f32)>) -> BTreeMap<NodeIdx, (f32, f32)> {
    let min_x = positions.values().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let min_y = positions.values().map(|p| p.1).fold(f32::INFINITY, f32::min);
    if !min_x.is_finite() || !min_y.is_finite() {
        return positions;
    }
    positions
        .into_iter()
        .map(|(idx, (x, y))| (idx, (x - min_x, y - min_y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::GraphSnapshot;
    use crate::layout::analysis::analyze;

    fn with_graph<R>(snapshot: &GraphSnapshot, config: &LayoutConfig, f: impl FnOnce(&Graph<'_>, &Analysis) -> R) -> R {
        let mut problems = Vec::new();
        let graph = Graph::from_snapshot(snapshot, config, &mut problems).unwrap();
        let analysis = analyze(&graph, &mut problems);
        f(&graph, &analysis)
    }

    fn top_scope<'s>(graph: &Graph<'_>, analysis: &Analysis, sizes: &'s [(f32, f32)]) -> Scope<'s> {
        Scope {
            members: analysis.top_level(),
            levels: analysis.level_map(&analysis.top_level()),
            order: analysis
                .top_level()
                .into_iter()
                .map(|idx| (idx, analysis.ranks[idx.0]))
                .collect(),
            edges: scope_edges(graph, analysis, None),
            sizes,
        }
    }

    fn chain(n: usize) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::new();
        for i in 0..n {
            snapshot.add_node(&format!("n{i}"), "screen", 0.0, 0.0);
        }
        for i in 1..n {
            snapshot.add_edge(&format!("e{i}"), &format!("n{}", i - 1), &format!("n{i}"));
        }
        snapshot
    }

    fn branch_merge() -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::new();
        snapshot.add_node("A", "start", 0.0, 0.0);
        snapshot.add_node("B", "screen", 0.0, 0.0);
        snapshot.add_node("C", "screen", 0.0, 0.0);
        snapshot.add_node("D", "end", 0.0, 0.0);
        snapshot.add_edge("e1", "A", "B");
        snapshot.add_edge("e2", "A", "C");
        snapshot.add_edge("e3", "B", "D");
        snapshot.add_edge("e4", "C", "D");
        snapshot
    }

    #[test]
    fn smart_mode_classifies_shapes() {
        let config = LayoutConfig::default();
        let mode = with_graph(&chain(4), &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Tree);
        let mode = with_graph(&branch_merge(), &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Compact);

        let mut ring = chain(3);
        ring.add_edge("back", "n2", "n0");
        let mode = with_graph(&ring, &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Vertical);

        // Three side-by-side pairs: two levels deep, three wide.
        let mut pairs = GraphSnapshot::new();
        for i in 0..3 {
            pairs.add_node(&format!("a{i}"), "screen", 0.0, 0.0);
            pairs.add_node(&format!("b{i}"), "screen", 0.0, 0.0);
            pairs.add_edge(&format!("e{i}"), &format!("a{i}"), &format!("b{i}"));
        }
        let mode = with_graph(&pairs, &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Horizontal);

        let single = chain(1);
        let mode = with_graph(&single, &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Vertical);
    }

    #[test]
    fn explicit_mode_is_kept() {
        let config = LayoutConfig::default().with_mode(LayoutMode::Radial);
        let mode = with_graph(&branch_merge(), &config, |g, a| resolve_mode(g, a, &config));
        assert_eq!(mode, LayoutMode::Radial);
    }

    #[test]
    fn vertical_rows_follow_levels() {
        let config = LayoutConfig::default();
        let positions = with_graph(&branch_merge(), &config, |g, a| {
            let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
            place_scope(&top_scope(g, a, &sizes), LayoutMode::Vertical, &config)
        });
        let (a, b, c, d) = (
            positions[&NodeIdx(0)],
            positions[&NodeIdx(1)],
            positions[&NodeIdx(2)],
            positions[&NodeIdx(3)],
        );
        assert_eq!(a.1, 0.0);
        assert!(b.1 > a.1);
        assert_eq!(b.1, c.1);
        assert!(d.1 > b.1);
        // Slot pitch is the widest node plus node spacing.
        assert_eq!(c.0 - b.0, 180.0 + 60.0);
        // Terminals are centered in their slot.
        assert_eq!(a.0, 20.0);
    }

    #[test]
    fn horizontal_swaps_axes() {
        let config = LayoutConfig::default();
        let positions = with_graph(&chain(3), &config, |g, a| {
            let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
            place_scope(&top_scope(g, a, &sizes), LayoutMode::Horizontal, &config)
        });
        assert_eq!(positions[&NodeIdx(0)], (0.0, 0.0));
        assert_eq!(positions[&NodeIdx(1)], (260.0, 0.0));
        assert_eq!(positions[&NodeIdx(2)], (520.0, 0.0));
    }

    #[test]
    fn compact_staggers_odd_rows() {
        let config = LayoutConfig::default();
        let positions = with_graph(&branch_merge(), &config, |g, a| {
            let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
            place_scope(&top_scope(g, a, &sizes), LayoutMode::Compact, &config)
        });
        let pitch = 180.0 + 60.0 * 0.7;
        let a = positions[&NodeIdx(0)];
        let b = positions[&NodeIdx(1)];
        let c = positions[&NodeIdx(2)];
        assert!((c.0 - b.0 - pitch).abs() < 1e-3);
        // A sits 20 into its slot; B's slot starts a quarter pitch in.
        assert!((b.0 - a.0 - (pitch * 0.25 - 20.0)).abs() < 1e-3);
    }

    #[test]
    fn tree_rows_are_centered() {
        let config = LayoutConfig::default();
        let positions = with_graph(&branch_merge(), &config, |g, a| {
            let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
            place_scope(&top_scope(g, a, &sizes), LayoutMode::Tree, &config)
        });
        let center = |idx: usize, w: f32| positions[&NodeIdx(idx)].0 + w / 2.0;
        let middle = (center(1, 180.0) + center(2, 180.0)) / 2.0;
        assert!((center(0, 140.0) - middle).abs() < 1e-3);
        assert!((center(3, 140.0) - middle).abs() < 1e-3);
    }

    #[test]
    fn radial_puts_hub_in_the_middle() {
        let mut snapshot = GraphSnapshot::new();
        snapshot.add_node("hub", "screen", 0.0, 0.0);
        for i in 0..6 {
            snapshot.add_node(&format!("leaf{i}"), "screen", 0.0, 0.0);
            snapshot.add_edge(&format!("e{i}"), "hub", &format!("leaf{i}"));
        }
        let config = LayoutConfig::default();
        let positions = with_graph(&snapshot, &config, |g, a| {
            let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
            place_scope(&top_scope(g, a, &sizes), LayoutMode::Radial, &config)
        });
        let hub = positions[&NodeIdx(0)];
        let centers: Vec<(f32, f32)> = positions.values().map(|p| (p.0 + 90.0, p.1 + 40.0)).collect();
        let mid = (hub.0 + 90.0, hub.1 + 40.0);
        let radii: Vec<f32> = centers[1..]
            .iter()
            .map(|c| ((c.0 - mid.0).powi(2) + (c.1 - mid.1).powi(2)).sqrt())
            .collect();
        for r in &radii {
            assert!((r - radii[0]).abs() < 1e-2);
        }
        assert!(radii[0] >= 180.0 + 80.0 - 1e-3);
    }

    #[test]
    fn force_layout_is_reproducible_and_spread() {
        let config = LayoutConfig::default();
        let run = || {
            with_graph(&branch_merge(), &config, |g, a| {
                let sizes: Vec<(f32, f32)> = g.nodes.iter().map(|n| n.size()).collect();
                place_scope(&top_scope(g, a, &sizes), LayoutMode::Force, &config)
            })
        };
        let first = run();
        assert_eq!(first, run());
        let values: Vec<(f32, f32)> = first.values().copied().collect();
        for i in 0..values.len() {
            for j in (i + 1)..values.len() {
                let d = ((values[i].0 - values[j].0).powi(2) + (values[i].1 - values[j].1).powi(2)).sqrt();
                assert!(d > 1.0);
            }
        }
        assert!(values.iter().all(|p| p.0 >= 0.0 && p.1 >= 0.0));
    }
}
