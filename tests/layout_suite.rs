use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use flowmeta_renderer::config::Config;
use flowmeta_renderer::ir::Direction;
use flowmeta_renderer::layout::GraphLayout;
use flowmeta_renderer::{layout_flow, render_flow_svg};

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.contains("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.contains("</svg>"), "{fixture}: missing </svg tag");
}

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).expect("fixture read failed")
}

fn assert_no_overlaps(layout: &GraphLayout, fixture: &str) {
    for (i, a) in layout.nodes.iter().enumerate() {
        for b in &layout.nodes[i + 1..] {
            let overlap = a.x < b.x + b.width
                && b.x < a.x + a.width
                && a.y < b.y + b.height
                && b.y < a.y + a.height;
            assert!(!overlap, "{fixture}: {} overlaps {}", a.id, b.id);
        }
    }
}

#[test]
fn render_all_fixtures() {
    // Keep this list explicit so new fixtures must be added intentionally.
    let candidates = [
        "order_routing.flow-meta.xml",
        "contact_sync.flow-meta.xml",
        "dangling_target.flow-meta.xml",
    ];

    for direction in [Direction::TopDown, Direction::LeftRight] {
        let mut config = Config::default();
        config.layout.direction = direction;
        for name in candidates {
            let input = fixture(name);
            let svg = render_flow_svg(&input, &config).expect("render failed");
            assert_valid_svg(&svg, name);

            let rendered = layout_flow(&input, &config).expect("layout failed");
            assert_eq!(rendered.layout.nodes.len(), rendered.data.nodes.len(), "{name}");
            assert_eq!(rendered.layout.edges.len(), rendered.data.edges.len(), "{name}");
            assert_no_overlaps(&rendered.layout, name);
            for node in &rendered.layout.nodes {
                assert!(node.x + node.width <= rendered.layout.width + 0.01, "{name}: {}", node.id);
                assert!(node.y + node.height <= rendered.layout.height + 0.01, "{name}: {}", node.id);
            }
        }
    }
}

#[test]
fn ranks_follow_forward_connectors() {
    let rendered = layout_flow(&fixture("order_routing.flow-meta.xml"), &Config::default()).unwrap();
    let rank: HashMap<&str, usize> = rendered
        .layout
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.rank))
        .collect();
    for edge in &rendered.data.edges {
        assert!(rank[edge.source.as_str()] < rank[edge.target.as_str()], "{}", edge.id);
    }
    let y: HashMap<&str, f32> = rendered
        .layout
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.y))
        .collect();
    assert!(y["START"] < y["Route_Order"]);
    assert!(y["Route_Order"] < y["Mark_Priority"]);
}

#[test]
fn loop_back_edge_is_reversed_not_fatal() {
    let rendered = layout_flow(&fixture("contact_sync.flow-meta.xml"), &Config::default()).unwrap();
    let idx = rendered
        .data
        .edges
        .iter()
        .position(|e| e.id == "edge-Copy_City")
        .unwrap();
    assert!(rendered.layout.edges[idx].reversed);

    let positions: BTreeSet<(u32, u32)> = rendered
        .layout
        .nodes
        .iter()
        .map(|n| (n.x.to_bits(), n.y.to_bits()))
        .collect();
    assert_eq!(positions.len(), rendered.layout.nodes.len());
}

#[test]
fn same_input_same_positions() {
    let input = fixture("contact_sync.flow-meta.xml");
    let first = layout_flow(&input, &Config::default()).unwrap();
    let second = layout_flow(&input, &Config::default()).unwrap();
    assert_eq!(first.layout, second.layout);
    assert_eq!(first.scene, second.scene);
}

#[test]
fn duplicate_names_get_separate_cards() {
    let input = r#"<Flow>
    <decisions><name>X</name></decisions>
    <recordUpdates><name>X</name></recordUpdates>
</Flow>"#;
    let rendered = layout_flow(input, &Config::default()).unwrap();
    assert_eq!(rendered.report.duplicates.len(), 1);
    assert_eq!(rendered.layout.nodes.len(), rendered.data.nodes.len());
    assert_no_overlaps(&rendered.layout, "duplicate names");
    let cards: Vec<(f32, f32)> = rendered
        .scene
        .nodes
        .iter()
        .filter(|n| n.id == "X")
        .map(|n| (n.x, n.y))
        .collect();
    assert_eq!(cards.len(), 2);
    assert_ne!(cards[0], cards[1]);
}
