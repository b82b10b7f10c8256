use std::collections::HashSet;
use std::path::Path;

use flowmeta_renderer::config::Config;
use flowmeta_renderer::extract::{AFTER_LAST_LABEL, FOR_EACH_LABEL, START_NODE_ID};
use flowmeta_renderer::integrity::{self, MissingTargetPolicy};
use flowmeta_renderer::ir::{FlowNodeKind, NodeDetails};
use flowmeta_renderer::{FlowError, layout_flow, parse_flow};

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).expect("fixture read failed")
}

#[test]
fn decision_round_trip_scenario() {
    let flow = parse_flow(&fixture("order_routing.flow-meta.xml")).unwrap();
    let ids: Vec<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            START_NODE_ID,
            "Route_Order",
            "Mark_Priority",
            "Mark_Standard",
            "Review_Screen"
        ]
    );
    assert_eq!(flow.edges.len(), 4);

    let edge = |id: &str| flow.edges.iter().find(|e| e.id == id).unwrap();
    assert_eq!(edge("edge-start").source, START_NODE_ID);
    assert_eq!(edge("edge-start").target, "Route_Order");
    assert_eq!(edge("edge-Route_Order-rule-0").target, "Mark_Priority");
    assert_eq!(edge("edge-Route_Order-rule-0").label.as_deref(), Some("Priority"));
    assert_eq!(edge("edge-Route_Order-rule-1").target, "Mark_Standard");
    assert_eq!(edge("edge-Route_Order-rule-1").label.as_deref(), Some("Standard"));
    assert_eq!(edge("edge-Route_Order-default").target, "Review_Screen");
    assert_eq!(
        edge("edge-Route_Order-default").label.as_deref(),
        Some("Needs Review")
    );

    // R rules plus a default connector
    assert_eq!(flow.outgoing("Route_Order").count(), 3);

    let decision = flow.node("Route_Order").unwrap();
    let NodeDetails::Decision(details) = &decision.data.details else {
        panic!("decision details expected");
    };
    assert_eq!(details.rules_count, 2);
    assert_eq!(details.rules[1].conditions, 2);

    let start = flow.node(START_NODE_ID).unwrap();
    let NodeDetails::Start(trigger) = &start.data.details else {
        panic!("start details expected");
    };
    assert_eq!(trigger.object.as_deref(), Some("Order"));
    assert_eq!(trigger.trigger_type.as_deref(), Some("RecordAfterSave"));

    let screen = flow.node("Review_Screen").unwrap();
    assert_eq!(screen.label, "Review & Approve");
}

#[test]
fn every_step_becomes_one_node_plus_start() {
    let flow = parse_flow(&fixture("contact_sync.flow-meta.xml")).unwrap();
    // 7 named steps across seven collections; variables are not steps
    assert_eq!(flow.nodes.len(), 8);
    let kinds: HashSet<FlowNodeKind> = flow.nodes.iter().map(|n| n.kind).collect();
    for kind in [
        FlowNodeKind::Start,
        FlowNodeKind::RecordLookup,
        FlowNodeKind::Loop,
        FlowNodeKind::Assignment,
        FlowNodeKind::RecordUpdate,
        FlowNodeKind::RecordCreate,
        FlowNodeKind::ActionCall,
        FlowNodeKind::Subflow,
    ] {
        assert!(kinds.contains(&kind), "{kind:?} missing");
    }

    let ids: HashSet<&str> = flow.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &flow.edges {
        assert!(ids.contains(edge.source.as_str()), "{}", edge.id);
        assert!(ids.contains(edge.target.as_str()), "{}", edge.id);
    }
    assert!(integrity::check(&flow).is_clean());
}

#[test]
fn loop_connectors_are_labelled() {
    let flow = parse_flow(&fixture("contact_sync.flow-meta.xml")).unwrap();
    let out: Vec<_> = flow.outgoing("Each_Contact").collect();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].label.as_deref(), Some(FOR_EACH_LABEL));
    assert_eq!(out[0].target, "Copy_City");
    assert_eq!(out[1].label.as_deref(), Some(AFTER_LAST_LABEL));
    assert_eq!(out[1].target, "Save_Contacts");
}

#[test]
fn extraction_is_idempotent() {
    let input = fixture("contact_sync.flow-meta.xml");
    assert_eq!(parse_flow(&input).unwrap(), parse_flow(&input).unwrap());
}

#[test]
fn malformed_and_rootless_documents_fail_without_output() {
    let err = parse_flow(&fixture("malformed.flow-meta.xml")).unwrap_err();
    assert!(matches!(err, FlowError::MalformedDocument { .. }), "{err}");

    let err = layout_flow(&fixture("not_a_flow.flow-meta.xml"), &Config::default()).unwrap_err();
    assert_eq!(
        err,
        FlowError::Structure {
            expected: "Flow".to_string(),
            found: "CustomObject".to_string(),
        }
    );
}

#[test]
fn dangling_target_policies() {
    let input = fixture("dangling_target.flow-meta.xml");

    let rendered = layout_flow(&input, &Config::default()).unwrap();
    assert_eq!(rendered.report.dangling.len(), 1);
    let broken = rendered
        .scene
        .edges
        .iter()
        .find(|e| e.id == "edge-Ask")
        .unwrap();
    assert!(broken.broken);
    let stand_in = rendered
        .scene
        .nodes
        .iter()
        .find(|n| n.id == "Deleted_Step")
        .unwrap();
    assert_eq!(stand_in.label, "Deleted_Step (missing)");

    let mut strict = Config::default();
    strict.missing_targets = MissingTargetPolicy::Error;
    let err = layout_flow(&input, &strict).unwrap_err();
    assert!(matches!(err, FlowError::DanglingReference { .. }));
    assert_eq!(
        err.to_string(),
        "Connector 'edge-Ask' from 'Ask' points at undeclared element 'Deleted_Step'"
    );
}
