use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LayoutMode;
use crate::ir::{EdgeInput, GraphSnapshot, NodeInput, Point};

use super::Problem;

/// Stable handle into the per-pass node arena. Indices follow node id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub(crate) usize);

impl NodeIdx {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn inflate(&self, pad: f32) -> Rect {
        Rect::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f32 = 1e-3;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }

    /// Strictly inside; points on the boundary do not count.
    pub fn contains_point(&self, p: (f32, f32)) -> bool {
        p.0 > self.x && p.0 < self.right() && p.1 > self.y && p.1 < self.bottom()
    }

    /// Overlap extents along x and y after growing the gap requirement by
    /// `margin`. Both positive means the rectangles are too close.
    pub fn overlap(&self, other: &Rect, margin: f32) -> (f32, f32) {
        let ox = self.right().min(other.right()) - self.x.max(other.x) + margin;
        let oy = self.bottom().min(other.bottom()) - self.y.max(other.y) + margin;
        (ox, oy)
    }
}

pub(crate) fn bounds_of<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    let mut any = false;
    for rect in rects {
        any = true;
        min_x = min_x.min(rect.x);
        min_y = min_y.min(rect.y);
        max_x = max_x.max(rect.right());
        max_y = max_y.max(rect.bottom());
    }
    any.then(|| Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::Top, Side::Right, Side::Bottom, Side::Left];

    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Right => Side::Left,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
        }
    }

    /// Left/right sides: edges leave them horizontally.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    pub fn outward(self) -> (f32, f32) {
        match self {
            Side::Top => (0.0, -1.0),
            Side::Right => (1.0, 0.0),
            Side::Bottom => (0.0, 1.0),
            Side::Left => (-1.0, 0.0),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Side::Top => "top",
            Side::Right => "right",
            Side::Bottom => "bottom",
            Side::Left => "left",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleDirection {
    In,
    Out,
}

impl HandleDirection {
    pub fn opposite(self) -> HandleDirection {
        match self {
            HandleDirection::In => HandleDirection::Out,
            HandleDirection::Out => HandleDirection::In,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleSlot {
    pub node_id: String,
    pub side: Side,
    pub index: usize,
    pub direction: HandleDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLayout {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Point,
    pub width: f32,
    pub height: f32,
    /// Box before canvas fitting (shift, scale, centering). Re-layout starts
    /// from here, so a scaled-down pass is not shrunk again.
    pub base: Rect,
    pub level: usize,
    pub rank: usize,
    pub isolated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,
}

impl NodeLayout {
    pub fn rect(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeLayout {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub source_handle: Option<HandleSlot>,
    pub target_handle: Option<HandleSlot>,
    pub routing_points: Vec<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<usize>,
}

/// Result of one layout pass. Nodes and edges are ordered by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub mode: LayoutMode,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<EdgeLayout>,
    pub problems: Vec<Problem>,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeLayout> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    /// Feed a finished layout back in as the next pass's input. Nodes go back
    /// with their pre-fit boxes.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeInput {
                    id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    position: Point::new(node.base.x, node.base.y),
                    width: Some(node.base.width),
                    height: Some(node.base.height),
                    parent_id: node.parent_id.clone(),
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|edge| EdgeInput {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    label: edge.label.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_accounts_for_margin() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(105.0, 0.0, 100.0, 50.0);
        let (ox, oy) = a.overlap(&b, 0.0);
        assert!(ox < 0.0);
        assert!(oy > 0.0);
        let (ox, _) = a.overlap(&b, 10.0);
        assert!((ox - 5.0).abs() < 1e-4);
    }

    #[test]
    fn containment_is_inclusive() {
        let outer = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains_rect(&Rect::new(0.0, 0.0, 100.0, 100.0)));
        assert!(outer.contains_rect(&Rect::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains_rect(&Rect::new(90.0, 10.0, 20.0, 20.0)));
        assert!(!outer.contains_point((0.0, 50.0)));
        assert!(outer.contains_point((1.0, 50.0)));
    }

    #[test]
    fn bounds_cover_all_rects() {
        let rects = [
            Rect::new(10.0, 20.0, 5.0, 5.0),
            Rect::new(-5.0, 0.0, 10.0, 40.0),
        ];
        let bounds = bounds_of(rects.iter()).unwrap();
        assert_eq!(bounds, Rect::new(-5.0, 0.0, 20.0, 40.0));
        assert!(bounds_of(std::iter::empty::<&Rect>()).is_none());
    }

    #[test]
    fn sides_are_symmetric() {
        for side in Side::ALL {
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(side.is_horizontal(), side.opposite().is_horizontal());
        }
        assert_eq!(Side::Bottom.to_string(), "bottom");
    }
}
