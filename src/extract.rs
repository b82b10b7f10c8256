//! Flow document to node/edge graph.

use crate::document::{Document, Element, parse_document};
use crate::error::{FlowError, Result};
use crate::ir::{
    ActionCallDetails, AssignmentDetails, DecisionDetails, FlowDiagramData, FlowEdge, FlowNode,
    FlowNodeKind, LoopDetails, NodeData, NodeDetails, RecordDetails, RuleSummary, ScreenDetails,
    StartDetails, SubflowDetails,
};

pub const FLOW_ROOT: &str = "Flow";
pub const START_NODE_ID: &str = "START";

pub const FOR_EACH_LABEL: &str = "For Each Item";
pub const AFTER_LAST_LABEL: &str = "After Last Item";
pub const DEFAULT_BRANCH_LABEL: &str = "Default";

/// Step collections in the order they are walked.
pub const STEP_COLLECTIONS: [(&str, FlowNodeKind); 9] = [
    ("decisions", FlowNodeKind::Decision),
    ("actionCalls", FlowNodeKind::ActionCall),
    ("recordLookups", FlowNodeKind::RecordLookup),
    ("recordUpdates", FlowNodeKind::RecordUpdate),
    ("recordCreates", FlowNodeKind::RecordCreate),
    ("screens", FlowNodeKind::Screen),
    ("assignments", FlowNodeKind::Assignment),
    ("loops", FlowNodeKind::Loop),
    ("subflows", FlowNodeKind::Subflow),
];

pub fn parse_flow(input: &str) -> Result<FlowDiagramData> {
    let document = parse_document(input)?;
    extract_flow(&document)
}

pub fn extract_flow(document: &Document) -> Result<FlowDiagramData> {
    let flow = document.root();
    if flow.name() != FLOW_ROOT {
        return Err(FlowError::Structure {
            expected: FLOW_ROOT.to_string(),
            found: flow.name().to_string(),
        });
    }

    let mut out = FlowDiagramData::default();

    if let Some(start) = flow.child("start") {
        push_start(start, &mut out);
    }

    for (tag, kind) in STEP_COLLECTIONS {
        for element in flow.children(tag) {
            let Some(name) = element.child_text("name") else {
                tracing::debug!(collection = tag, "skipping element without a name");
                continue;
            };
            out.nodes.push(step_node(element, name, kind));
            push_step_edges(element, name, kind, &mut out.edges);
        }
    }

    tracing::info!(
        nodes = out.nodes.len(),
        edges = out.edges.len(),
        "extracted flow graph"
    );
    Ok(out)
}

fn push_start(start: &Element, out: &mut FlowDiagramData) {
    let details = StartDetails {
        object: owned(start.child_text("object")),
        trigger_type: owned(start.child_text("triggerType")),
        record_trigger_type: owned(start.child_text("recordTriggerType")),
        location_x: start.child_text("locationX").and_then(|v| v.parse().ok()),
        location_y: start.child_text("locationY").and_then(|v| v.parse().ok()),
    };
    out.nodes.push(FlowNode {
        id: START_NODE_ID.to_string(),
        kind: FlowNodeKind::Start,
        label: "Start".to_string(),
        data: NodeData {
            name: START_NODE_ID.to_string(),
            label: "Start".to_string(),
            description: String::new(),
            details: NodeDetails::Start(details),
            raw_data: start.to_value(),
        },
    });
    if let Some(target) = connector_target(start, "connector") {
        out.edges.push(FlowEdge {
            id: "edge-start".to_string(),
            source: START_NODE_ID.to_string(),
            target: target.to_string(),
            label: None,
        });
    }
}

fn step_node(element: &Element, name: &str, kind: FlowNodeKind) -> FlowNode {
    let label = element.child_text("label").unwrap_or(name).to_string();
    FlowNode {
        id: name.to_string(),
        kind,
        label: label.clone(),
        data: NodeData {
            name: name.to_string(),
            label,
            description: element.child_text("description").unwrap_or_default().to_string(),
            details: step_details(element, kind),
            raw_data: element.to_value(),
        },
    }
}

fn step_details(element: &Element, kind: FlowNodeKind) -> NodeDetails {
    let text = |tag: &str| element.child_text(tag).unwrap_or_default().to_string();
    match kind {
        FlowNodeKind::Decision => {
            let rules: Vec<RuleSummary> = element
                .children("rules")
                .iter()
                .map(|rule| RuleSummary {
                    name: rule.child_text("name").unwrap_or_default().to_string(),
                    label: rule.child_text("label").unwrap_or("Rule").to_string(),
                    conditions: rule.children("conditions").len(),
                })
                .collect();
            NodeDetails::Decision(DecisionDetails {
                rules_count: rules.len(),
                rules,
            })
        }
        FlowNodeKind::ActionCall => NodeDetails::ActionCall(ActionCallDetails {
            action_type: text("actionType"),
            action_name: text("actionName"),
        }),
        FlowNodeKind::RecordLookup | FlowNodeKind::RecordUpdate | FlowNodeKind::RecordCreate => {
            NodeDetails::Record(RecordDetails {
                object: text("object"),
                filter_logic: text("filterLogic"),
                filter_count: element.children("filters").len(),
                queried_fields: element
                    .children("queriedFields")
                    .iter()
                    .filter_map(Element::text)
                    .map(str::to_string)
                    .collect(),
            })
        }
        FlowNodeKind::Screen => NodeDetails::Screen(ScreenDetails {
            fields_count: element.children("fields").len(),
        }),
        FlowNodeKind::Assignment => NodeDetails::Assignment(AssignmentDetails {
            assignments_count: element.children("assignmentItems").len(),
        }),
        FlowNodeKind::Loop => NodeDetails::Loop(LoopDetails {
            collection_reference: text("collectionReference"),
            iteration_order: text("iterationOrder"),
        }),
        FlowNodeKind::Subflow => NodeDetails::Subflow(SubflowDetails {
            flow_name: text("flowName"),
        }),
        FlowNodeKind::Start | FlowNodeKind::Default => NodeDetails::Plain(Default::default()),
    }
}

fn push_step_edges(element: &Element, name: &str, kind: FlowNodeKind, edges: &mut Vec<FlowEdge>) {
    let mut push = |suffix: Option<String>, target: &str, label: Option<String>| {
        let id = match suffix {
            Some(suffix) => format!("edge-{name}-{suffix}"),
            None => format!("edge-{name}"),
        };
        edges.push(FlowEdge {
            id,
            source: name.to_string(),
            target: target.to_string(),
            label,
        });
    };

    match kind {
        FlowNodeKind::Decision => {
            let default_label = element.child_text("defaultConnectorLabel");
            for (index, rule) in element.children("rules").iter().enumerate() {
                if let Some(target) = connector_target(rule, "connector") {
                    let label = rule.child_text("label").or(default_label);
                    push(Some(format!("rule-{index}")), target, owned(label));
                }
            }
            if let Some(target) = connector_target(element, "defaultConnector") {
                let label = default_label.unwrap_or(DEFAULT_BRANCH_LABEL);
                push(Some("default".to_string()), target, Some(label.to_string()));
            }
        }
        FlowNodeKind::Loop => {
            if let Some(target) = connector_target(element, "nextValueConnector") {
                push(
                    Some("next".to_string()),
                    target,
                    Some(FOR_EACH_LABEL.to_string()),
                );
            }
            if let Some(target) = connector_target(element, "noMoreValuesConnector") {
                push(
                    Some("done".to_string()),
                    target,
                    Some(AFTER_LAST_LABEL.to_string()),
                );
            }
        }
        _ => {
            if let Some(target) = connector_target(element, "connector") {
                push(None, target, None);
            }
        }
    }
}

fn connector_target<'a>(element: &'a Element, connector: &str) -> Option<&'a str> {
    element
        .child(connector)
        .and_then(|c| c.child_text("targetReference"))
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}
