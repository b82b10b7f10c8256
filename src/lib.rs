pub mod channel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod integrity;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod present;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::Config;
pub use error::{FlowError, Result};
pub use extract::parse_flow;
pub use ir::{FlowDiagramData, FlowEdge, FlowNode, FlowNodeKind};

use integrity::IntegrityReport;
use layout::{GraphLayout, LayoutGraph};
use present::Scene;

/// Everything one visualize request produces.
#[derive(Debug, Clone)]
pub struct RenderedFlow {
    pub data: FlowDiagramData,
    pub report: IntegrityReport,
    pub layout: GraphLayout,
    pub scene: Scene,
}

/// Topology of the graph in node and edge order, so layout edge routes line
/// up with `data.edges`.
pub fn build_layout_graph(data: &FlowDiagramData) -> LayoutGraph {
    let mut graph = LayoutGraph::new();
    for node in &data.nodes {
        graph.add_node(&node.id);
    }
    for edge in &data.edges {
        graph.add_edge(&edge.source, &edge.target);
    }
    graph
}

/// Extract, check, lay out and present. Fails before producing anything when
/// the document is malformed, has no flow root, or (under the strict policy)
/// names an undeclared target.
pub fn layout_flow(input: &str, config: &Config) -> Result<RenderedFlow> {
    let extracted = parse_flow(input)?;
    let (data, report) = integrity::resolve(&extracted, config.missing_targets)?;
    let layout = layout::compute_graph_layout(&build_layout_graph(&data), &config.layout);
    let scene = present::present_scene(&data, &layout, &report, &config.theme);
    Ok(RenderedFlow {
        data,
        report,
        layout,
        scene,
    })
}

pub fn render_flow_svg(input: &str, config: &Config) -> Result<String> {
    let rendered = layout_flow(input, config)?;
    Ok(render::render_svg(
        &rendered.scene,
        &config.theme,
        &config.render,
    ))
}
