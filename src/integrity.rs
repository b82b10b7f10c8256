//! Referential checks over an extracted graph.
//!
//! The extractor never validates connector targets or id uniqueness; this
//! module reports both so the caller can decide what to do with them.

use crate::error::{FlowError, Result};
use crate::ir::{FlowDiagramData, FlowNode, FlowNodeKind, NodeData, NodeDetails};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const MISSING_SUFFIX: &str = " (missing)";

/// What to do with connectors whose target is not a declared element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTargetPolicy {
    /// Add a `default`-kind stand-in node and draw the edge as broken.
    #[default]
    Placeholder,
    /// Fail the request.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub edge_id: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateId {
    pub id: String,
    pub kinds: Vec<FlowNodeKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub dangling: Vec<DanglingReference>,
    pub duplicates: Vec<DuplicateId>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.duplicates.is_empty()
    }

    pub fn is_broken_edge(&self, edge_id: &str) -> bool {
        self.dangling.iter().any(|d| d.edge_id == edge_id)
    }
}

pub fn check(data: &FlowDiagramData) -> IntegrityReport {
    let mut seen: BTreeMap<&str, Vec<FlowNodeKind>> = BTreeMap::new();
    for node in &data.nodes {
        seen.entry(node.id.as_str()).or_default().push(node.kind);
    }
    let duplicates = seen
        .iter()
        .filter(|(_, kinds)| kinds.len() > 1)
        .map(|(id, kinds)| DuplicateId {
            id: (*id).to_string(),
            kinds: kinds.clone(),
        })
        .collect();

    let dangling = data
        .edges
        .iter()
        .filter(|edge| !seen.contains_key(edge.target.as_str()))
        .map(|edge| DanglingReference {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
        })
        .collect();

    IntegrityReport {
        dangling,
        duplicates,
    }
}

/// Logs the report and applies `policy` to dangling targets. Duplicate ids
/// are only reported; both nodes stay in the graph.
pub fn resolve(
    data: &FlowDiagramData,
    policy: MissingTargetPolicy,
) -> Result<(FlowDiagramData, IntegrityReport)> {
    let report = check(data);
    for dup in &report.duplicates {
        tracing::warn!(id = %dup.id, count = dup.kinds.len(), "element name declared more than once");
    }
    for dangling in &report.dangling {
        tracing::warn!(
            edge = %dangling.edge_id,
            source = %dangling.source,
            target = %dangling.target,
            "connector targets an undeclared element"
        );
    }

    if let (MissingTargetPolicy::Error, Some(first)) = (policy, report.dangling.first()) {
        return Err(FlowError::DanglingReference {
            edge_id: first.edge_id.clone(),
            source_id: first.source.clone(),
            target_id: first.target.clone(),
        });
    }

    let mut resolved = data.clone();
    let mut added: HashSet<&str> = HashSet::new();
    for dangling in &report.dangling {
        if !added.insert(dangling.target.as_str()) {
            continue;
        }
        resolved.nodes.push(placeholder_node(&dangling.target));
    }
    Ok((resolved, report))
}

fn placeholder_node(target: &str) -> FlowNode {
    let label = format!("{target}{MISSING_SUFFIX}");
    FlowNode {
        id: target.to_string(),
        kind: FlowNodeKind::Default,
        label: label.clone(),
        data: NodeData {
            name: target.to_string(),
            label,
            description: String::new(),
            details: NodeDetails::Plain(Default::default()),
            raw_data: serde_json::Value::Null,
        },
    }
}
