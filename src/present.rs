//! Maps the extracted graph plus its layout to drawable records.
//!
//! Nothing here mutates the graph; every record is derived from a node or
//! edge and the theme.

use crate::integrity::IntegrityReport;
use crate::ir::{Direction, FlowDiagramData, FlowNode, FlowNodeKind, NodeDetails};
use crate::layout::GraphLayout;
use crate::theme::Theme;
use serde::Serialize;
use std::collections::HashSet;

pub const ARROW_SIZE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Circle,
    Card,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailLine {
    /// Field caption such as `Object:`; absent for the description line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<&'static str>,
    pub value: String,
}

impl DetailLine {
    fn field(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key: Some(key),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderNode {
    pub id: String,
    pub kind: FlowNodeKind,
    pub label: String,
    pub icon: &'static str,
    pub accent: String,
    pub shape: NodeShape,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub details: Vec<DetailLine>,
    /// Another node was declared with the same id.
    pub duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowMarker {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub width: f32,
    pub height: f32,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelStyle {
    pub font_size: f32,
    pub font_weight: u16,
    pub color: String,
    pub background: String,
    pub padding_x: f32,
    pub padding_y: f32,
    pub radius: f32,
}

impl LabelStyle {
    pub fn for_theme(theme: &Theme) -> Self {
        Self {
            font_size: 11.0,
            font_weight: 600,
            color: theme.edge_label_color.clone(),
            background: theme.edge_label_background.clone(),
            padding_x: 6.0,
            padding_y: 8.0,
            radius: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub points: Vec<(f32, f32)>,
    pub marker: ArrowMarker,
    pub stroke: String,
    pub stroke_width: f32,
    pub label_style: LabelStyle,
    /// Target was not a declared element.
    pub broken: bool,
    /// Drawn against the flow direction (a loop-back).
    pub reversed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub direction: Direction,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
}

/// `layout.nodes` and `layout.edges` must be aligned with `data.nodes` and
/// `data.edges`, which is how the pipeline builds the layout graph.
pub fn present_scene(
    data: &FlowDiagramData,
    layout: &GraphLayout,
    report: &IntegrityReport,
    theme: &Theme,
) -> Scene {
    let duplicate_ids: HashSet<&str> = report.duplicates.iter().map(|d| d.id.as_str()).collect();

    let nodes = data
        .nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            let (x, y, width, height) = layout
                .nodes
                .get(idx)
                .map(|p| (p.x, p.y, p.width, p.height))
                .unwrap_or_default();
            RenderNode {
                id: node.id.clone(),
                kind: node.kind,
                label: node.label.clone(),
                icon: theme.icon(node.kind),
                accent: theme.accent(node.kind).to_string(),
                shape: if node.kind == FlowNodeKind::Start {
                    NodeShape::Circle
                } else {
                    NodeShape::Card
                },
                x,
                y,
                width,
                height,
                details: detail_lines(node),
                duplicate: duplicate_ids.contains(node.id.as_str()),
            }
        })
        .collect();

    let label_style = LabelStyle::for_theme(theme);
    let edges = data
        .edges
        .iter()
        .enumerate()
        .map(|(idx, edge)| {
            let route = layout.edges.get(idx);
            let broken = report.is_broken_edge(&edge.id);
            let stroke = if broken {
                theme.broken_edge_color.clone()
            } else {
                theme.edge_color.clone()
            };
            RenderEdge {
                id: edge.id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.label.clone().filter(|label| !label.is_empty()),
                points: route.map(|r| r.points.clone()).unwrap_or_default(),
                marker: ArrowMarker {
                    kind: "arrowclosed",
                    width: ARROW_SIZE,
                    height: ARROW_SIZE,
                    color: stroke.clone(),
                },
                stroke,
                stroke_width: theme.edge_width,
                label_style: label_style.clone(),
                broken,
                reversed: route.is_some_and(|r| r.reversed),
            }
        })
        .collect();

    Scene {
        direction: layout.direction,
        width: layout.width,
        height: layout.height,
        nodes,
        edges,
    }
}

/// Body lines shown under the node header. The start node has none.
pub fn detail_lines(node: &FlowNode) -> Vec<DetailLine> {
    let mut lines = Vec::new();
    match &node.data.details {
        NodeDetails::Start(_) => return lines,
        NodeDetails::Record(record) => {
            if !record.object.is_empty() {
                lines.push(DetailLine::field("Object:", record.object.clone()));
            }
            if !record.queried_fields.is_empty() {
                lines.push(DetailLine::field(
                    "Fields:",
                    format!("{} field(s)", record.queried_fields.len()),
                ));
            }
        }
        NodeDetails::ActionCall(action) if !action.action_type.is_empty() => {
            lines.push(DetailLine::field("Action:", action.action_type.clone()));
        }
        NodeDetails::Decision(decision) if decision.rules_count > 0 => {
            lines.push(DetailLine::field("Rules:", decision.rules_count.to_string()));
        }
        NodeDetails::Assignment(assignment) if assignment.assignments_count > 0 => {
            lines.push(DetailLine::field(
                "Assignments:",
                assignment.assignments_count.to_string(),
            ));
        }
        NodeDetails::Screen(screen) if screen.fields_count > 0 => {
            lines.push(DetailLine::field("Screen Fields:", screen.fields_count.to_string()));
        }
        NodeDetails::Subflow(subflow) if !subflow.flow_name.is_empty() => {
            lines.push(DetailLine::field("Flow:", subflow.flow_name.clone()));
        }
        _ => {}
    }
    if !node.data.description.is_empty() {
        lines.push(DetailLine {
            key: None,
            value: node.data.description.clone(),
        });
    }
    lines
}
