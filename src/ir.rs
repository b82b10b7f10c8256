use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB")]
    TopDown,
    #[serde(rename = "LR")]
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::LeftRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowNodeKind {
    Start,
    Decision,
    ActionCall,
    RecordLookup,
    RecordUpdate,
    RecordCreate,
    Screen,
    Assignment,
    Loop,
    Subflow,
    Default,
}

impl FlowNodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowNodeKind::Start => "start",
            FlowNodeKind::Decision => "decision",
            FlowNodeKind::ActionCall => "actionCall",
            FlowNodeKind::RecordLookup => "recordLookup",
            FlowNodeKind::RecordUpdate => "recordUpdate",
            FlowNodeKind::RecordCreate => "recordCreate",
            FlowNodeKind::Screen => "screen",
            FlowNodeKind::Assignment => "assignment",
            FlowNodeKind::Loop => "loop",
            FlowNodeKind::Subflow => "subflow",
            FlowNodeKind::Default => "default",
        }
    }

    /// Unknown names map to `Default` so styling always has a fallback.
    pub fn from_name(name: &str) -> Self {
        match name {
            "start" => FlowNodeKind::Start,
            "decision" => FlowNodeKind::Decision,
            "actionCall" => FlowNodeKind::ActionCall,
            "recordLookup" => FlowNodeKind::RecordLookup,
            "recordUpdate" => FlowNodeKind::RecordUpdate,
            "recordCreate" => FlowNodeKind::RecordCreate,
            "screen" => FlowNodeKind::Screen,
            "assignment" => FlowNodeKind::Assignment,
            "loop" => FlowNodeKind::Loop,
            "subflow" => FlowNodeKind::Subflow,
            _ => FlowNodeKind::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FlowNodeKind,
    pub label: String,
    pub data: NodeData,
}

/// Fields shared by every node plus the kind-specific details.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(flatten)]
    pub details: NodeDetails,
    pub raw_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeDetails {
    Start(StartDetails),
    Decision(DecisionDetails),
    ActionCall(ActionCallDetails),
    Record(RecordDetails),
    Screen(ScreenDetails),
    Assignment(AssignmentDetails),
    Loop(LoopDetails),
    Subflow(SubflowDetails),
    Plain(PlainDetails),
}

/// Details for nodes that carry nothing beyond the shared fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlainDetails {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_trigger_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_y: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionDetails {
    pub rules_count: usize,
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSummary {
    pub name: String,
    pub label: String,
    pub conditions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCallDetails {
    pub action_type: String,
    pub action_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetails {
    pub object: String,
    pub filter_logic: String,
    pub filter_count: usize,
    pub queried_fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDetails {
    pub fields_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDetails {
    pub assignments_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopDetails {
    pub collection_reference: String,
    pub iteration_order: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubflowDetails {
    pub flow_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowDiagramData {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowDiagramData {
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |edge| edge.source == id)
    }
}
