use crate::config::LayoutMode;
use crate::ir::NodeKind;
use crate::layout::Layout;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Condensed view of a layout pass for quick inspection.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSummary {
    pub mode: LayoutMode,
    pub width: f32,
    pub height: f32,
    pub node_count: usize,
    pub edge_count: usize,
    pub frame_count: usize,
    pub max_level: usize,
    pub routed_edges: usize,
    pub bend_count: usize,
    pub problems: Vec<String>,
}

impl LayoutSummary {
    pub fn from_layout(layout: &Layout) -> Self {
        let routed: Vec<_> = layout
            .edges
            .iter()
            .filter(|edge| !edge.routing_points.is_empty())
            .collect();
        LayoutSummary {
            mode: layout.mode,
            width: layout.width,
            height: layout.height,
            node_count: layout.nodes.len(),
            edge_count: layout.edges.len(),
            frame_count: layout
                .nodes
                .iter()
                .filter(|node| NodeKind::from_token(&node.node_type).is_frame())
                .count(),
            max_level: layout.nodes.iter().map(|node| node.level).max().unwrap_or(0),
            routed_edges: routed.len(),
            bend_count: routed
                .iter()
                .map(|edge| edge.routing_points.len().saturating_sub(2))
                .sum(),
            problems: layout.problems.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Write `value` as JSON to `path`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T, pretty: bool) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            emit(writer, value, pretty)
        }
        None => {
            let stdout = io::stdout();
            emit(stdout.lock(), value, pretty)
        }
    }
}

fn emit<W: Write, T: Serialize>(mut writer: W, value: &T, pretty: bool) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_layout_dump(path: Option<&Path>, layout: &Layout, pretty: bool) -> anyhow::Result<()> {
    write_json(path, layout, pretty)
}
