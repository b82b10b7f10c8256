use crate::integrity::MissingTargetPolicy;
use crate::ir::{Direction, FlowNodeKind};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub node_width: f32,
    pub node_height: f32,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub margin_x: f32,
    pub margin_y: f32,
    /// Clearance between a long edge's lane and the nodes it passes, and the
    /// offset between parallel edges.
    pub edge_spacing: f32,
    pub self_loop_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopDown,
            node_width: 280.0,
            node_height: 120.0,
            node_spacing: 80.0,
            rank_spacing: 120.0,
            margin_x: 50.0,
            margin_y: 50.0,
            edge_spacing: 28.0,
            self_loop_size: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Draw the detail lines under each node header.
    pub show_details: bool,
    pub png_scale: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            show_details: true,
            png_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub missing_targets: MissingTargetPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::light(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
            missing_targets: MissingTargetPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    node_background: Option<String>,
    text_color: Option<String>,
    detail_text_color: Option<String>,
    edge_color: Option<String>,
    edge_width: Option<f32>,
    edge_label_color: Option<String>,
    edge_label_background: Option<String>,
    broken_edge_color: Option<String>,
    /// Accent colour per node kind, keyed by kind name (`decision`, `loop`, ...).
    kind_colors: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    direction: Option<String>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    margin_x: Option<f32>,
    margin_y: Option<f32>,
    edge_spacing: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    show_details: Option<bool>,
    png_scale: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    render: Option<RenderConfigFile>,
    missing_targets: Option<MissingTargetPolicy>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Applies a JSON5 override document on top of the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "dark" => config.theme = Theme::dark(),
            "light" | "default" => config.theme = Theme::light(),
            other => anyhow::bail!("unknown theme '{other}' (expected light or dark)"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
        if let Some(v) = vars.node_background {
            config.theme.node_background = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.detail_text_color {
            config.theme.detail_text_color = v;
        }
        if let Some(v) = vars.edge_color {
            config.theme.edge_color = v;
        }
        if let Some(v) = vars.edge_width {
            config.theme.edge_width = v;
        }
        if let Some(v) = vars.edge_label_color {
            config.theme.edge_label_color = v;
        }
        if let Some(v) = vars.edge_label_background {
            config.theme.edge_label_background = v;
        }
        if let Some(v) = vars.broken_edge_color {
            config.theme.broken_edge_color = v;
        }
        for (name, color) in vars.kind_colors.unwrap_or_default() {
            let kind = FlowNodeKind::from_name(&name);
            if kind == FlowNodeKind::Default && name != "default" {
                tracing::warn!(kind = %name, "ignoring colour for unknown node kind");
                continue;
            }
            config.theme.kind_colors.insert(kind, color);
        }
    }

    if let Some(layout) = parsed.layout {
        if let Some(token) = layout.direction.as_deref() {
            config.layout.direction = Direction::from_token(token)
                .ok_or_else(|| anyhow::anyhow!("unknown direction '{token}' (expected TB or LR)"))?;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.rank_spacing {
            config.layout.rank_spacing = v;
        }
        if let Some(v) = layout.margin_x {
            config.layout.margin_x = v;
        }
        if let Some(v) = layout.margin_y {
            config.layout.margin_y = v;
        }
        if let Some(v) = layout.edge_spacing {
            config.layout.edge_spacing = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.show_details {
            config.render.show_details = v;
        }
        if let Some(v) = render.png_scale {
            config.render.png_scale = v;
        }
    }

    if let Some(policy) = parsed.missing_targets {
        config.missing_targets = policy;
    }

    Ok(config)
}
