use crate::ir::NodeKind;
use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LayoutMode {
    Vertical,
    Horizontal,
    Compact,
    Tree,
    Radial,
    Force,
    #[default]
    Smart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSizeConfig {
    pub default_width: f32,
    pub default_height: f32,
    pub terminal_width: f32,
    pub terminal_height: f32,
    pub decision_width: f32,
    pub decision_height: f32,
    pub frame_width: f32,
    pub frame_height: f32,
    pub min_frame_width: f32,
    pub min_frame_height: f32,
}

impl Default for NodeSizeConfig {
    fn default() -> Self {
        Self {
            default_width: 180.0,
            default_height: 80.0,
            terminal_width: 140.0,
            terminal_height: 56.0,
            decision_width: 160.0,
            decision_height: 96.0,
            frame_width: 320.0,
            frame_height: 220.0,
            min_frame_width: 120.0,
            min_frame_height: 80.0,
        }
    }
}

impl NodeSizeConfig {
    pub fn size_for(&self, kind: NodeKind) -> (f32, f32) {
        match kind {
            NodeKind::Start | NodeKind::End => (self.terminal_width, self.terminal_height),
            NodeKind::Decision => (self.decision_width, self.decision_height),
            NodeKind::Frame => (self.frame_width, self.frame_height),
            NodeKind::Standard => (self.default_width, self.default_height),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactConfig {
    pub node_spacing_factor: f32,
    pub rank_spacing_factor: f32,
    /// Offset of odd levels as a fraction of the column pitch.
    pub stagger: f32,
}

impl Default for CompactConfig {
    fn default() -> Self {
        Self {
            node_spacing_factor: 0.7,
            rank_spacing_factor: 0.75,
            stagger: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    pub iterations: usize,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self { iterations: 150 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    pub max_iterations: usize,
    pub margin: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            margin: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub edge_clearance: f32,
    pub lane_width: f32,
    pub obstacle_padding: f32,
    pub max_detour_passes: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            edge_clearance: 20.0,
            lane_width: 10.0,
            obstacle_padding: 8.0,
            max_detour_passes: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub max_width: f32,
    pub max_height: f32,
    pub padding: f32,
    pub min_scale: f32,
    /// Below this scale factor node sizes shrink along with positions.
    pub severe_scale: f32,
    pub center_small_layouts: bool,
    pub small_graph_threshold: usize,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            max_width: 4000.0,
            max_height: 4000.0,
            padding: 20.0,
            min_scale: 0.3,
            severe_scale: 0.5,
            center_small_layouts: true,
            small_graph_threshold: 10,
            viewport_width: 1200.0,
            viewport_height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub mode: LayoutMode,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub frame_padding: f32,
    pub handle_spacing: f32,
    pub sizes: NodeSizeConfig,
    pub compact: CompactConfig,
    pub force: ForceConfig,
    pub collision: CollisionConfig,
    pub routing: RoutingConfig,
    pub canvas: CanvasConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::Smart,
            node_spacing: 60.0,
            rank_spacing: 80.0,
            frame_padding: 24.0,
            handle_spacing: 12.0,
            sizes: NodeSizeConfig::default(),
            compact: CompactConfig::default(),
            force: ForceConfig::default(),
            collision: CollisionConfig::default(),
            routing: RoutingConfig::default(),
            canvas: CanvasConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn with_mode(mut self, mode: LayoutMode) -> Self {
        self.mode = mode;
        self
    }

    /// Spacing and padding values are contract inputs: zero, negative or
    /// non-finite values are rejected instead of degraded.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let positive = [
            ("nodeSpacing", self.node_spacing),
            ("rankSpacing", self.rank_spacing),
            ("framePadding", self.frame_padding),
            ("handleSpacing", self.handle_spacing),
            ("edgeClearance", self.routing.edge_clearance),
            ("laneWidth", self.routing.lane_width),
            ("canvasPadding", self.canvas.padding),
            ("maxCanvasWidth", self.canvas.max_width),
            ("maxCanvasHeight", self.canvas.max_height),
            ("minScale", self.canvas.min_scale),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidConfig { field, value });
            }
        }
        let non_negative = [
            ("collisionMargin", self.collision.margin),
            ("obstaclePadding", self.routing.obstacle_padding),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidConfig { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    mode: Option<LayoutMode>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    frame_padding: Option<f32>,
    handle_spacing: Option<f32>,
    max_canvas_width: Option<f32>,
    max_canvas_height: Option<f32>,
    max_collision_iterations: Option<usize>,
    collision_margin: Option<f32>,
    edge_clearance: Option<f32>,
    lane_width: Option<f32>,
    obstacle_padding: Option<f32>,
    max_detour_passes: Option<usize>,
    canvas_padding: Option<f32>,
    min_scale: Option<f32>,
    severe_scale: Option<f32>,
    center_small_layouts: Option<bool>,
    small_graph_threshold: Option<usize>,
    viewport_width: Option<f32>,
    viewport_height: Option<f32>,
    force_iterations: Option<usize>,
    compact_node_factor: Option<f32>,
    compact_rank_factor: Option<f32>,
    compact_stagger: Option<f32>,
    node_sizes: Option<NodeSizesFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NodeSizesFile {
    default_width: Option<f32>,
    default_height: Option<f32>,
    terminal_width: Option<f32>,
    terminal_height: Option<f32>,
    decision_width: Option<f32>,
    decision_height: Option<f32>,
    frame_width: Option<f32>,
    frame_height: Option<f32>,
}

impl ConfigFile {
    fn apply(self, config: &mut LayoutConfig) {
        if let Some(v) = self.mode {
            config.mode = v;
        }
        if let Some(v) = self.node_spacing {
            config.node_spacing = v;
        }
        if let Some(v) = self.rank_spacing {
            config.rank_spacing = v;
        }
        if let Some(v) = self.frame_padding {
            config.frame_padding = v;
        }
        if let Some(v) = self.handle_spacing {
            config.handle_spacing = v;
        }
        if let Some(v) = self.max_canvas_width {
            config.canvas.max_width = v;
        }
        if let Some(v) = self.max_canvas_height {
            config.canvas.max_height = v;
        }
        if let Some(v) = self.max_collision_iterations {
            config.collision.max_iterations = v;
        }
        if let Some(v) = self.collision_margin {
            config.collision.margin = v;
        }
        if let Some(v) = self.edge_clearance {
            config.routing.edge_clearance = v;
        }
        if let Some(v) = self.lane_width {
            config.routing.lane_width = v;
        }
        if let Some(v) = self.obstacle_padding {
            config.routing.obstacle_padding = v;
        }
        if let Some(v) = self.max_detour_passes {
            config.routing.max_detour_passes = v;
        }
        if let Some(v) = self.canvas_padding {
            config.canvas.padding = v;
        }
        if let Some(v) = self.min_scale {
            config.canvas.min_scale = v;
        }
        if let Some(v) = self.severe_scale {
            config.canvas.severe_scale = v;
        }
        if let Some(v) = self.center_small_layouts {
            config.canvas.center_small_layouts = v;
        }
        if let Some(v) = self.small_graph_threshold {
            config.canvas.small_graph_threshold = v;
        }
        if let Some(v) = self.viewport_width {
            config.canvas.viewport_width = v;
        }
        if let Some(v) = self.viewport_height {
            config.canvas.viewport_height = v;
        }
        if let Some(v) = self.force_iterations {
            config.force.iterations = v;
        }
        if let Some(v) = self.compact_node_factor {
            config.compact.node_spacing_factor = v;
        }
        if let Some(v) = self.compact_rank_factor {
            config.compact.rank_spacing_factor = v;
        }
        if let Some(v) = self.compact_stagger {
            config.compact.stagger = v;
        }
        if let Some(sizes) = self.node_sizes {
            let target = &mut config.sizes;
            if let Some(v) = sizes.default_width {
                target.default_width = v;
            }
            if let Some(v) = sizes.default_height {
                target.default_height = v;
            }
            if let Some(v) = sizes.terminal_width {
                target.terminal_width = v;
            }
            if let Some(v) = sizes.terminal_height {
                target.terminal_height = v;
            }
            if let Some(v) = sizes.decision_width {
                target.decision_width = v;
            }
            if let Some(v) = sizes.decision_height {
                target.decision_height = v;
            }
            if let Some(v) = sizes.frame_width {
                target.frame_width = v;
            }
            if let Some(v) = sizes.frame_height {
                target.frame_height = v;
            }
        }
    }
}

/// Overlay a flat camelCase config document (JSON or JSON5) onto `config`.
pub fn merge_config_str(mut config: LayoutConfig, contents: &str) -> anyhow::Result<LayoutConfig> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    parsed.apply(&mut config);
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let config = LayoutConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    merge_config_str(config, &contents)
}
