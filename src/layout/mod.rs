//! Hierarchical layout for arbitrary directed graphs.
//!
//! The engine only sees node ids and directed pairs. Each connected component
//! is ranked and ordered by dagre on its own, then the components are packed
//! side by side along the cross axis. Edge routes are orthogonal polylines
//! built on top of the dagre placement.

mod routing;

use crate::config::LayoutConfig;
use crate::ir::Direction;
use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};
use std::collections::{BTreeSet, HashMap};

const RANK_TOLERANCE: f32 = 0.5;

/// Topology handed to the layout engine. Node payloads are opaque to it.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    node_ids: Vec<String>,
    index: HashMap<String, usize>,
    edges: Vec<Option<(usize, usize)>>,
}

impl LayoutGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a vertex and returns its index. Every call gets its own vertex,
    /// so a repeated id is placed separately; edges naming that id resolve to
    /// its first registration.
    pub fn add_node(&mut self, id: &str) -> usize {
        let idx = self.node_ids.len();
        self.node_ids.push(id.to_string());
        self.index.entry(id.to_string()).or_insert(idx);
        idx
    }

    /// Records an edge. Edges naming unknown nodes are kept as placeholders
    /// so edge indices stay aligned with the caller's list; they get no route.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        let pair = match (self.index.get(source), self.index.get(target)) {
            (Some(&s), Some(&t)) => Some((s, t)),
            _ => None,
        };
        self.edges.push(pair);
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Distinct non-loop pairs, in first-seen order.
    fn simple_edges(&self) -> Vec<(usize, usize)> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for &(s, t) in self.edges.iter().flatten() {
            if s != t && seen.insert((s, t)) {
                out.push((s, t));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePlacement {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rank: usize,
    pub order: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeRoute {
    pub points: Vec<(f32, f32)>,
    pub reversed: bool,
}

/// Placement for every vertex of the input graph, index-aligned with its
/// nodes and edges.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphLayout {
    pub direction: Direction,
    pub nodes: Vec<NodePlacement>,
    pub edges: Vec<EdgeRoute>,
    pub width: f32,
    pub height: f32,
}

impl GraphLayout {
    pub fn node(&self, id: &str) -> Option<&NodePlacement> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

fn dagre_rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::TopDown => "tb",
        Direction::LeftRight => "lr",
    }
}

fn vertex_key(idx: usize) -> String {
    format!("n{idx}")
}

/// Node centres of one component as (cross, main), aligned with `component`.
fn run_dagre(component: &[usize], edges: &[(usize, usize)], config: &LayoutConfig) -> Vec<(f32, f32)> {
    let horizontal = config.direction.is_horizontal();
    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(config.direction).to_string());
    graph_config.nodesep = Some(config.node_spacing);
    graph_config.ranksep = Some(config.rank_spacing);
    graph_config.marginx = Some(0.0);
    graph_config.marginy = Some(0.0);
    dagre_graph.set_graph(graph_config);

    for &node in component {
        let mut dagre_node = DagreNode::default();
        dagre_node.width = config.node_width;
        dagre_node.height = config.node_height;
        dagre_graph.set_node(vertex_key(node), Some(dagre_node));
    }
    for &(source, target) in edges {
        let from = vertex_key(source);
        let to = vertex_key(target);
        let _ = dagre_graph.set_edge(&from, &to, Some(DagreEdge::default()), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    let (cross_size, main_size) = cross_main(config.node_width, config.node_height, horizontal);
    component
        .iter()
        .enumerate()
        .map(|(order, &node)| {
            let key = vertex_key(node);
            match dagre_graph.node(&key) {
                Some(placed) => cross_main(placed.x, placed.y, horizontal),
                // not placed by dagre: fall back to a single row
                None => (
                    order as f32 * (cross_size + config.node_spacing) + cross_size / 2.0,
                    main_size / 2.0,
                ),
            }
        })
        .collect()
}

fn cross_main(x: f32, y: f32, horizontal: bool) -> (f32, f32) {
    if horizontal { (y, x) } else { (x, y) }
}

/// Rank index per main-axis centre: distinct levels counted from the top.
fn rank_levels(mains: &[f32]) -> Vec<usize> {
    let mut levels = mains.to_vec();
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| (*a - *b).abs() < RANK_TOLERANCE);
    mains
        .iter()
        .map(|main| {
            levels
                .iter()
                .position(|level| (main - level).abs() < RANK_TOLERANCE)
                .unwrap_or(0)
        })
        .collect()
}

pub fn compute_graph_layout(graph: &LayoutGraph, config: &LayoutConfig) -> GraphLayout {
    let direction = config.direction;
    let horizontal = direction.is_horizontal();
    let (cross_size, main_size) = cross_main(config.node_width, config.node_height, horizontal);

    let edges = graph.simple_edges();
    let components = connected_components(graph.node_count(), &edges);

    let mut node_cross = vec![0.0f32; graph.node_count()];
    let mut node_main = vec![0.0f32; graph.node_count()];
    let mut node_rank = vec![0usize; graph.node_count()];

    let mut cursor = 0.0f32;
    for component in &components {
        let centers = if component.len() == 1 {
            vec![(cross_size / 2.0, main_size / 2.0)]
        } else {
            let local_edges: Vec<(usize, usize)> = edges
                .iter()
                .copied()
                .filter(|(s, _)| component.binary_search(s).is_ok())
                .collect();
            run_dagre(component, &local_edges, config)
        };

        let min_cross = centers.iter().map(|c| c.0).fold(f32::MAX, f32::min) - cross_size / 2.0;
        let max_cross = centers.iter().map(|c| c.0).fold(f32::MIN, f32::max) + cross_size / 2.0;
        let min_main = centers.iter().map(|c| c.1).fold(f32::MAX, f32::min) - main_size / 2.0;
        let mains: Vec<f32> = centers.iter().map(|c| c.1).collect();
        let ranks = rank_levels(&mains);

        for ((&node, &(cross, main)), rank) in component.iter().zip(&centers).zip(ranks) {
            node_cross[node] = cursor + cross - min_cross;
            node_main[node] = main - min_main;
            node_rank[node] = rank;
        }
        cursor += max_cross - min_cross + config.node_spacing;
    }

    let mut by_rank: Vec<usize> = (0..graph.node_count()).collect();
    by_rank.sort_by(|&a, &b| {
        node_rank[a]
            .cmp(&node_rank[b])
            .then(node_cross[a].total_cmp(&node_cross[b]))
            .then(a.cmp(&b))
    });
    let mut node_order = vec![0usize; graph.node_count()];
    let mut previous: Option<usize> = None;
    let mut slot = 0usize;
    for idx in by_rank {
        if previous != Some(node_rank[idx]) {
            slot = 0;
            previous = Some(node_rank[idx]);
        }
        node_order[idx] = slot;
        slot += 1;
    }

    let nodes: Vec<NodePlacement> = graph
        .node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let cross = node_cross[idx] - cross_size / 2.0;
            let main = node_main[idx] - main_size / 2.0;
            let (x, y) = if horizontal {
                (config.margin_x + main, config.margin_y + cross)
            } else {
                (config.margin_x + cross, config.margin_y + main)
            };
            NodePlacement {
                id: id.clone(),
                x,
                y,
                width: config.node_width,
                height: config.node_height,
                rank: node_rank[idx],
                order: node_order[idx],
            }
        })
        .collect();

    let route_ctx = routing::RouteContext {
        nodes: &nodes,
        config,
    };
    let edge_routes = routing::route_edges(&graph.edges, &route_ctx);

    let mut width = config.margin_x * 2.0;
    let mut height = config.margin_y * 2.0;
    for node in &nodes {
        width = width.max(node.x + node.width + config.margin_x);
        height = height.max(node.y + node.height + config.margin_y);
    }
    for route in &edge_routes {
        for &(x, y) in &route.points {
            width = width.max(x + config.margin_x);
            height = height.max(y + config.margin_y);
        }
    }

    tracing::debug!(
        nodes = nodes.len(),
        components = components.len(),
        ranks = node_rank.iter().max().map_or(0, |r| r + 1),
        reversed = edge_routes.iter().filter(|r| r.reversed).count(),
        "computed graph layout"
    );

    GraphLayout {
        direction,
        nodes,
        edges: edge_routes,
        width,
        height,
    }
}

/// Weakly connected components, each sorted ascending, ordered by their
/// smallest member.
fn connected_components(node_count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..node_count).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for &(a, b) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            parent[hi] = lo;
        }
    }
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for node in 0..node_count {
        let root = find(&mut parent, node);
        let group = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(node);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> LayoutGraph {
        let mut g = LayoutGraph::new();
        for id in nodes {
            g.add_node(id);
        }
        for (s, t) in edges {
            g.add_edge(s, t);
        }
        g
    }

    fn distinct_positions(layout: &GraphLayout) -> bool {
        let mut seen = BTreeSet::new();
        layout
            .nodes
            .iter()
            .all(|n| seen.insert((n.x.to_bits(), n.y.to_bits())))
    }

    fn overlaps(a: &NodePlacement, b: &NodePlacement) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    /// Whether an axis-aligned segment passes through the node's interior.
    fn segment_hits(p: (f32, f32), q: (f32, f32), node: &NodePlacement) -> bool {
        let (min_x, max_x) = (p.0.min(q.0), p.0.max(q.0));
        let (min_y, max_y) = (p.1.min(q.1), p.1.max(q.1));
        min_x < node.x + node.width
            && max_x > node.x
            && min_y < node.y + node.height
            && max_y > node.y
    }

    #[test]
    fn tree_ranks_increase_top_to_bottom() {
        let g = graph(
            &["S", "D", "A", "B", "C"],
            &[("S", "D"), ("D", "A"), ("D", "B"), ("D", "C")],
        );
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        let s = layout.node("S").unwrap();
        let d = layout.node("D").unwrap();
        let a = layout.node("A").unwrap();
        assert_eq!((s.rank, d.rank, a.rank), (0, 1, 2));
        assert!(s.y < d.y && d.y < a.y);
        assert!(distinct_positions(&layout));
        for (i, n) in layout.nodes.iter().enumerate() {
            for m in &layout.nodes[i + 1..] {
                assert!(!overlaps(n, m), "{} overlaps {}", n.id, m.id);
            }
        }
    }

    #[test]
    fn left_right_uses_x_for_ranks() {
        let g = graph(&["A", "B"], &[("A", "B")]);
        let config = LayoutConfig {
            direction: Direction::LeftRight,
            ..LayoutConfig::default()
        };
        let layout = compute_graph_layout(&g, &config);
        let a = layout.node("A").unwrap();
        let b = layout.node("B").unwrap();
        assert!(a.x < b.x);
        assert!((a.y - b.y).abs() < 0.01);
        assert_eq!((a.rank, b.rank), (0, 1));
    }

    #[test]
    fn longest_path_rank_wins_over_shortcut() {
        let g = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("A", "C")]);
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(layout.node("C").unwrap().rank, 2);
        // the shortcut spans two ranks and must go around B
        let b = layout.node("B").unwrap();
        let shortcut = &layout.edges[2].points;
        assert!(shortcut.len() >= 4);
        for pair in shortcut.windows(2) {
            assert!(!segment_hits(pair[0], pair[1], b), "{pair:?} crosses B");
        }
    }

    #[test]
    fn cycles_are_broken_without_failing() {
        let g = graph(
            &["Start", "Loop", "Body", "After"],
            &[
                ("Start", "Loop"),
                ("Loop", "Body"),
                ("Body", "Loop"),
                ("Loop", "After"),
            ],
        );
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        let lp = layout.node("Loop").unwrap();
        let body = layout.node("Body").unwrap();
        assert_ne!(lp.rank, body.rank);
        assert!(layout.edges[1].reversed != layout.edges[2].reversed);
        // reversed or not, every route starts at its source
        let body_exit = layout.edges[2].points[0];
        assert!(body_exit.0 >= body.x && body_exit.0 <= body.x + body.width);
        assert!(body_exit.1 >= body.y && body_exit.1 <= body.y + body.height);
        assert!(distinct_positions(&layout));
    }

    #[test]
    fn repeated_ids_get_their_own_placement() {
        let g = graph(&["Start", "X", "X"], &[("Start", "X")]);
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(layout.nodes.len(), 3);
        assert_eq!(layout.nodes[1].id, "X");
        assert_eq!(layout.nodes[2].id, "X");
        assert!(distinct_positions(&layout));
        assert!(!overlaps(&layout.nodes[1], &layout.nodes[2]));
        // the edge lands on the first registration
        let first = &layout.nodes[1];
        let end = *layout.edges[0].points.last().unwrap();
        assert!(end.0 >= first.x && end.0 <= first.x + first.width);
        assert!((end.1 - first.y).abs() < 0.01);
    }

    #[test]
    fn self_loops_and_parallel_edges_are_tolerated() {
        let g = graph(&["A", "B"], &[("A", "A"), ("A", "B"), ("A", "B")]);
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(layout.edges.len(), 3);
        assert!(layout.edges[0].points.len() >= 4);
        assert_ne!(layout.edges[1].points, layout.edges[2].points);
        assert_eq!(layout.node("B").unwrap().rank, 1);
    }

    #[test]
    fn disconnected_components_do_not_overlap() {
        let g = graph(&["A", "B", "Lone", "C", "D"], &[("A", "B"), ("C", "D")]);
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(layout.node("Lone").unwrap().rank, 0);
        assert_eq!(layout.node("C").unwrap().rank, 0);
        for (i, n) in layout.nodes.iter().enumerate() {
            for m in &layout.nodes[i + 1..] {
                assert!(!overlaps(n, m), "{} overlaps {}", n.id, m.id);
            }
        }
        assert!(layout.width > 3.0 * 280.0);
    }

    #[test]
    fn unknown_endpoints_get_empty_routes() {
        let mut g = graph(&["A"], &[]);
        g.add_edge("A", "Nowhere");
        let layout = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(layout.edges.len(), 1);
        assert!(layout.edges[0].points.is_empty());
    }

    #[test]
    fn layout_is_deterministic() {
        let g = graph(
            &["S", "A", "B", "C", "D", "E"],
            &[
                ("S", "A"),
                ("S", "B"),
                ("A", "C"),
                ("B", "C"),
                ("C", "D"),
                ("D", "A"),
                ("B", "E"),
            ],
        );
        let first = compute_graph_layout(&g, &LayoutConfig::default());
        let second = compute_graph_layout(&g, &LayoutConfig::default());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_graph_has_margin_only_extent() {
        let layout = compute_graph_layout(&LayoutGraph::new(), &LayoutConfig::default());
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.width, 100.0);
        assert_eq!(layout.height, 100.0);
    }

    #[test]
    fn positions_respect_margins() {
        let g = graph(&["A", "B", "C"], &[("A", "B"), ("A", "C")]);
        let config = LayoutConfig::default();
        let layout = compute_graph_layout(&g, &config);
        let min_x = layout.nodes.iter().map(|n| n.x).fold(f32::MAX, f32::min);
        let min_y = layout.nodes.iter().map(|n| n.y).fold(f32::MAX, f32::min);
        assert!((min_x - config.margin_x).abs() < 0.01);
        assert!((min_y - config.margin_y).abs() < 0.01);
    }
}
