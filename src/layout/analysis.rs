use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::graph::Graph;
use super::{NodeIdx, Problem};

/// Structural facts about one snapshot: frame membership, levels and ranks.
#[derive(Debug, Clone)]
pub(super) struct Analysis {
    pub(super) parent: Vec<Option<NodeIdx>>,
    pub(super) children: Vec<Vec<NodeIdx>>,
    pub(super) depth: Vec<usize>,
    pub(super) levels: Vec<usize>,
    pub(super) ranks: Vec<usize>,
    pub(super) isolated: Vec<bool>,
    pub(super) degree: Vec<usize>,
}

impl Analysis {
    pub(super) fn parent_of(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.parent[idx.0]
    }

    pub(super) fn children_of(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.children[idx.0]
    }

    pub(super) fn is_ancestor(&self, ancestor: NodeIdx, node: NodeIdx) -> bool {
        let mut current = self.parent[node.0];
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.parent[parent.0];
        }
        false
    }

    /// Every node nested (at any depth) inside `frame`.
    pub(super) fn descendants(&self, frame: NodeIdx) -> Vec<NodeIdx> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIdx> = self.children[frame.0].iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children[node.0].iter().rev().copied());
        }
        out
    }

    pub(super) fn top_level(&self) -> Vec<NodeIdx> {
        (0..self.parent.len())
            .filter(|&idx| self.parent[idx].is_none())
            .map(NodeIdx)
            .collect()
    }

    /// Frames that own at least one node or are frame-typed, deepest first.
    pub(super) fn frames_deepest_first(&self, graph: &Graph<'_>) -> Vec<NodeIdx> {
        let mut frames: Vec<NodeIdx> = graph
            .node_indices()
            .filter(|&idx| graph.node(idx).kind.is_frame())
            .collect();
        frames.sort_by_key(|idx| (Reverse(self.depth[idx.0]), *idx));
        frames
    }

    pub(super) fn level_map(&self, members: &[NodeIdx]) -> BTreeMap<NodeIdx, usize> {
        members
            .iter()
            .map(|&idx| (idx, self.levels[idx.0]))
            .collect()
    }
}

pub(super) fn analyze(graph: &Graph<'_>, problems: &mut Vec<Problem>) -> Analysis {
    let n = graph.len();
    let parent = resolve_frame_membership(graph, problems);

    let mut children = vec![Vec::new(); n];
    for (idx, parent) in parent.iter().enumerate() {
        if let Some(p) = parent {
            children[p.0].push(NodeIdx(idx));
        }
    }

    let mut depth = vec![0usize; n];
    for idx in 0..n {
        let mut current = parent[idx];
        while let Some(p) = current {
            depth[idx] += 1;
            current = parent[p.0];
        }
    }

    let mut degree = vec![0usize; n];
    for (_, s, t) in graph.valid_edges() {
        degree[s.0] += 1;
        degree[t.0] += 1;
    }

    // Edges between a node and its own frame do not advance levels.
    let level_edges: Vec<(NodeIdx, NodeIdx)> = graph
        .valid_edges()
        .filter(|&(_, s, t)| parent[s.0] != Some(t) && parent[t.0] != Some(s))
        .map(|(_, s, t)| (s, t))
        .collect();

    let members: Vec<NodeIdx> = graph.node_indices().collect();
    let layering = compute_levels(&members, &level_edges, |idx| {
        graph.node(idx).kind.is_entry()
    });

    let mut levels = vec![0usize; n];
    let mut isolated = vec![false; n];
    for (idx, level) in &layering.levels {
        levels[idx.0] = *level;
    }
    // Includes children wired only to their own frame: those edges never
    // advance levels, so nothing reaches them.
    for idx in &layering.isolated {
        isolated[idx.0] = true;
        problems.push(Problem::IsolatedNode {
            node: graph.node(*idx).id().to_string(),
        });
    }

    let ranked = compute_ranks(&members, &layering.levels, &parent, &degree);
    let mut ranks = vec![0usize; n];
    for (idx, rank) in ranked {
        ranks[idx.0] = rank;
    }

    Analysis {
        parent,
        children,
        depth,
        levels,
        ranks,
        isolated,
        degree,
    }
}

fn resolve_frame_membership(graph: &Graph<'_>, problems: &mut Vec<Problem>) -> Vec<Option<NodeIdx>> {
    let n = graph.len();
    let mut parent: Vec<Option<NodeIdx>> = vec![None; n];
    let mut explicit = vec![false; n];

    for idx in graph.node_indices() {
        let node = graph.node(idx);
        let Some(parent_id) = node.input.parent_id.as_deref() else {
            continue;
        };
        match graph.lookup(parent_id) {
            Some(p) if p != idx && graph.node(p).kind.is_frame() => {
                if creates_cycle(&parent, idx, p) {
                    problems.push(Problem::InvalidParent {
                        node: node.id().to_string(),
                        parent: parent_id.to_string(),
                    });
                } else {
                    parent[idx.0] = Some(p);
                    explicit[idx.0] = true;
                }
            }
            _ => problems.push(Problem::InvalidParent {
                node: node.id().to_string(),
                parent: parent_id.to_string(),
            }),
        }
    }

    // Innermost first: the smallest containing frame wins, ties by id.
    let mut frames: Vec<NodeIdx> = graph
        .node_indices()
        .filter(|&idx| graph.node(idx).kind.is_frame())
        .collect();
    frames.sort_by(|a, b| {
        let area_a = graph.node(*a).initial.area();
        let area_b = graph.node(*b).initial.area();
        area_a.total_cmp(&area_b).then(a.cmp(b))
    });
    for idx in graph.node_indices() {
        if explicit[idx.0] {
            continue;
        }
        let node = graph.node(idx);
        for &frame in &frames {
            if frame == idx {
                continue;
            }
            let frame_rect = graph.node(frame).initial;
            // A frame can only sit inside a strictly larger frame.
            if node.kind.is_frame() && frame_rect.area() <= node.initial.area() {
                continue;
            }
            if frame_rect.contains_rect(&node.initial) && !creates_cycle(&parent, idx, frame) {
                parent[idx.0] = Some(frame);
                break;
            }
        }
    }

    parent
}

fn creates_cycle(parent: &[Option<NodeIdx>], node: NodeIdx, candidate: NodeIdx) -> bool {
    let mut current = Some(candidate);
    let mut steps = 0;
    while let Some(p) = current {
        if p == node {
            return true;
        }
        steps += 1;
        if steps > parent.len() {
            return true;
        }
        current = parent[p.0];
    }
    false
}

#[derive(Debug, Clone, Default)]
pub(super) struct Layering {
    pub(super) levels: BTreeMap<NodeIdx, usize>,
    pub(super) isolated: Vec<NodeIdx>,
}

/// Multi-source BFS layering over `members`, using only edges with both
/// endpoints inside the member set.
///
/// Seeds are entry nodes plus connected nodes without incoming edges. A cycle
/// that no seed reaches is entered at its lowest member. Nodes without any
/// edge land one level below the deepest observed level and are returned as
/// isolated.
pub(super) fn compute_levels(
    members: &[NodeIdx],
    edges: &[(NodeIdx, NodeIdx)],
    is_entry: impl Fn(NodeIdx) -> bool,
) -> Layering {
    let set: BTreeSet<NodeIdx> = members.iter().copied().collect();
    let mut outgoing: BTreeMap<NodeIdx, Vec<NodeIdx>> = BTreeMap::new();
    let mut indegree: BTreeMap<NodeIdx, usize> = BTreeMap::new();
    let mut connected: BTreeSet<NodeIdx> = BTreeSet::new();

    for &(s, t) in edges {
        if !set.contains(&s) || !set.contains(&t) {
            continue;
        }
        outgoing.entry(s).or_default().push(t);
        *indegree.entry(t).or_insert(0) += 1;
        connected.insert(s);
        connected.insert(t);
    }
    for list in outgoing.values_mut() {
        list.sort();
    }

    let mut levels: BTreeMap<NodeIdx, usize> = BTreeMap::new();
    let mut queue: VecDeque<NodeIdx> = VecDeque::new();
    for &idx in &set {
        let no_incoming = indegree.get(&idx).copied().unwrap_or(0) == 0;
        if is_entry(idx) || (no_incoming && connected.contains(&idx)) {
            levels.insert(idx, 0);
            queue.push_back(idx);
        }
    }

    loop {
        while let Some(idx) = queue.pop_front() {
            let level = levels[&idx];
            if let Some(nexts) = outgoing.get(&idx) {
                for &next in nexts {
                    if levels.contains_key(&next) {
                        continue;
                    }
                    levels.insert(next, level + 1);
                    queue.push_back(next);
                }
            }
        }

        // Cycle with no way in: enter at its lowest member.
        let Some(entry) = connected
            .iter()
            .find(|idx| !levels.contains_key(idx))
            .copied()
        else {
            break;
        };
        levels.insert(entry, 0);
        queue.push_back(entry);
    }

    let fallback = levels.values().max().map(|max| max + 1).unwrap_or(0);
    let mut isolated = Vec::new();
    for &idx in &set {
        if !levels.contains_key(&idx) {
            levels.insert(idx, fallback);
            isolated.push(idx);
        }
    }

    Layering { levels, isolated }
}

/// Rank = order within a level by (frame parent, descending degree, id).
pub(super) fn compute_ranks(
    members: &[NodeIdx],
    levels: &BTreeMap<NodeIdx, usize>,
    parent: &[Option<NodeIdx>],
    degree: &[usize],
) -> BTreeMap<NodeIdx, usize> {
    let mut buckets: BTreeMap<usize, Vec<NodeIdx>> = BTreeMap::new();
    for &idx in members {
        if let Some(level) = levels.get(&idx) {
            buckets.entry(*level).or_default().push(idx);
        }
    }

    let mut ranks = BTreeMap::new();
    for bucket in buckets.values_mut() {
        bucket.sort_by_key(|idx| (parent[idx.0], Reverse(degree[idx.0]), *idx));
        for (rank, idx) in bucket.iter().enumerate() {
            ranks.insert(*idx, rank);
        }
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::GraphSnapshot;

    fn analyzed(snapshot: &GraphSnapshot) -> (Analysis, Vec<Problem>, Vec<String>) {
        let mut problems = Vec::new();
        let graph = Graph::from_snapshot(snapshot, &LayoutConfig::default(), &mut problems).unwrap();
        let analysis = analyze(&graph, &mut problems);
        let ids = graph.nodes.iter().map(|n| n.id().to_string()).collect();
        (analysis, problems, ids)
    }

    fn level_of(analysis: &Analysis, ids: &[String], id: &str) -> usize {
        let pos = ids.iter().position(|x| x == id).unwrap();
        analysis.levels[pos]
    }

    fn rank_of(analysis: &Analysis, ids: &[String], id: &str) -> usize {
        let pos = ids.iter().position(|x| x == id).unwrap();
        analysis.ranks[pos]
    }

    #[test]
    fn chain_levels_follow_edges() {
        let mut snapshot = GraphSnapshot::new();
        snapshot.add_node("A", "start", 0.0, 0.0);
        snapshot.add_node("B", "screen", 0.0, 0.0);
        snapshot.add_node("C", "end", 0.0, 0.0);
        snapshot.add_edge("e1", "A", "B");
        snapshot.add_edge("e2", "B", "C");
        let (analysis, problems, ids) = analyzed(&snapshot);
        assert_eq!(level_of(&analysis, &ids, "A"), 0);
        assert_eq!(level_of(&analysis, &ids, "B"), 1);
        assert_eq!(level_of(&analysis, &ids, "C"), 2);
        assert!(analysis.ranks.iter().all(|rank| *rank == 0));
        assert!(problems.is_empty());
    }

    #[test]
    fn cycles_keep_shortest_level() {
        let mut snapshot = GraphSnapshot::new();
        for id in ["a", "b", "c"] {
            snapshot.add_node(id, "screen", 0.0, 0.0);
        }
        snapshot.add_node("s", "start", 0.0, 0.0);
        snapshot.add_edge("e0", "s", "a");
        snapshot.add_edge("e1", "a", "b");
        snapshot.add_edge("e2", "b", "c");
        snapshot.add_edge("e3", "c", "a");
        let (analysis, problems, ids) = analyzed(&snapshot);
        assert_eq!(level_of(&analysis, &ids, "a"), 1);
        assert_eq!(level_of(&analysis, &ids, "b"), 2);
        assert_eq!(level_of(&analysis, &ids, "c"), 3);
        assert!(problems.is_empty());
    }

    #[test]
    fn closed_cycle_enters_at_lowest_id() {
        let mut snapshot = GraphSnapshot::new();
        for id in ["x", "y", "z"] {
            snapshot.add_node(id, "screen", 0.0, 0.0);
        }
        snapshot.add_edge("e1", "y", "z");
        snapshot.add_edge("e2", "z", "x");
        snapshot.add_edge("e3", "x", "y");
        let (analysis, problems, ids) = analyzed(&snapshot);
        assert_eq!(level_of(&analysis, &ids, "x"), 0);
        assert_eq!(level_of(&analysis, &ids, "y"), 1);
        assert_eq!(level_of(&analysis, &ids, "z"), 2);
        assert!(problems.is_empty());
    }

    #[test]
    fn disconnected_nodes_are_isolated_below_max_level() {
        let mut snapshot = GraphSnapshot::new();
        snapshot.add_node("a", "start", 0.0, 0.0);
        snapshot.add_node("b", "screen", 0.0, 0.0);
        snapshot.add_node("lonely", "screen", 0.0, 0.0);
        snapshot.add_edge("e1", "a", "b");
        let (analysis, problems, ids) = analyzed(&snapshot);
        assert_eq!(level_of(&analysis, &ids, "lonely"), 2);
        assert!(analysis.isolated[ids.iter().position(|x| x == "lonely").unwrap()]);
        assert_eq!(
            problems,
            vec![Problem::IsolatedNode {
                node: "lonely".to_string()
            }]
        );
    }

    #[test]
    fn ranks_prefer_hubs_then_ids() {
        let mut snapshot = GraphSnapshot::new();
        for id in ["root", "b", "c", "d", "e"] {
            snapshot.add_node(id, "screen", 0.0, 0.0);
        }
        snapshot.add_edge("e1", "root", "b");
        snapshot.add_edge("e2", "root", "c");
        snapshot.add_edge("e3", "root", "d");
        snapshot.add_edge("e4", "d", "e");
        let (analysis, _, ids) = analyzed(&snapshot);
        assert_eq!(rank_of(&analysis, &ids, "d"), 0);
        assert_eq!(rank_of(&analysis, &ids, "b"), 1);
        assert_eq!(rank_of(&analysis, &ids, "c"), 2);
    }

    #[test]
    fn containment_assigns_frame_parent() {
        let mut snapshot = GraphSnapshot::new();
        let frame = snapshot.add_node("F", "frame", 0.0, 0.0);
        frame.width = Some(400.0);
        frame.height = Some(300.0);
        snapshot.add_node("inside", "screen", 20.0, 20.0);
        snapshot.add_node("outside", "screen", 600.0, 20.0);
        snapshot.add_node("named", "screen", 900.0, 900.0).parent_id = Some("F".to_string());
        let (analysis, problems, ids) = analyzed(&snapshot);
        let f = NodeIdx(ids.iter().position(|x| x == "F").unwrap());
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();
        assert_eq!(analysis.parent[pos("inside")], Some(f));
        assert_eq!(analysis.parent[pos("named")], Some(f));
        assert_eq!(analysis.parent[pos("outside")], None);
        assert_eq!(analysis.depth[pos("inside")], 1);
        assert_eq!(analysis.children_of(f).len(), 2);
        assert!(problems.iter().all(|p| !matches!(p, Problem::InvalidParent { .. })));
    }

    #[test]
    fn bad_parent_references_are_reported() {
        let mut snapshot = GraphSnapshot::new();
        snapshot.add_node("plain", "screen", 0.0, 0.0);
        snapshot.add_node("child", "screen", 500.0, 0.0).parent_id = Some("plain".to_string());
        snapshot.add_node("f1", "frame", 1000.0, 0.0).parent_id = Some("f2".to_string());
        snapshot.add_node("f2", "frame", 2000.0, 0.0).parent_id = Some("f1".to_string());
        let (analysis, problems, ids) = analyzed(&snapshot);
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();
        assert_eq!(analysis.parent[pos("child")], None);
        assert_eq!(analysis.parent[pos("f1")], Some(NodeIdx(pos("f2"))));
        assert_eq!(analysis.parent[pos("f2")], None);
        let invalid = problems
            .iter()
            .filter(|p| matches!(p, Problem::InvalidParent { .. }))
            .count();
        assert_eq!(invalid, 2);
    }

    #[test]
    fn frame_edges_do_not_advance_levels() {
        let mut snapshot = GraphSnapshot::new();
        let frame = snapshot.add_node("F", "frame", 0.0, 0.0);
        frame.width = Some(400.0);
        frame.height = Some(300.0);
        snapshot.add_node("s", "start", 600.0, 0.0);
        snapshot.add_node("x", "screen", 20.0, 20.0);
        snapshot.add_edge("e1", "s", "F");
        snapshot.add_edge("e2", "F", "x");
        let (analysis, problems, ids) = analyzed(&snapshot);
        assert_eq!(level_of(&analysis, &ids, "F"), 1);
        assert_eq!(level_of(&analysis, &ids, "x"), 2);
        // Only the frame reaches `x`, which does not count as a path.
        assert!(analysis.isolated[ids.iter().position(|x| x == "x").unwrap()]);
        assert!(!analysis.isolated[ids.iter().position(|x| x == "F").unwrap()]);
        assert_eq!(
            problems,
            vec![Problem::IsolatedNode {
                node: "x".to_string()
            }]
        );
    }

    #[test]
    fn containment_prefers_innermost_frame() {
        let mut snapshot = GraphSnapshot::new();
        let outer = snapshot.add_node("A", "frame", 0.0, 0.0);
        outer.width = Some(1000.0);
        outer.height = Some(1000.0);
        let inner = snapshot.add_node("B", "frame", 100.0, 100.0);
        inner.width = Some(500.0);
        inner.height = Some(500.0);
        snapshot.add_node("x", "screen", 200.0, 200.0);
        let (analysis, _, ids) = analyzed(&snapshot);
        let pos = |id: &str| ids.iter().position(|x| x == id).unwrap();
        assert_eq!(analysis.parent[pos("x")], Some(NodeIdx(pos("B"))));
        assert_eq!(analysis.parent[pos("B")], Some(NodeIdx(pos("A"))));
        assert_eq!(analysis.depth[pos("x")], 2);
        assert_eq!(analysis.descendants(NodeIdx(pos("A"))), vec![NodeIdx(pos("B")), NodeIdx(pos("x"))]);
    }
}
