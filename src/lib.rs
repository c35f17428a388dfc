#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{LayoutConfig, LayoutMode, load_config, merge_config_str};
pub use ir::{EdgeInput, GraphSnapshot, NodeInput, Point};
pub use layout::{Layout, LayoutError, Problem, compute_layout, verify_handle_separation};

/// Parse a snapshot document and lay it out in one call.
pub fn layout_json(input: &str, config: &LayoutConfig) -> anyhow::Result<Layout> {
    let snapshot = GraphSnapshot::from_json(input)?;
    Ok(compute_layout(&snapshot, config)?)
}
