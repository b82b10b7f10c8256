use crate::ir::FlowNodeKind;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FALLBACK_ICON: &str = "\u{2022}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindStyle {
    pub color: &'static str,
    pub icon: &'static str,
}

static KIND_PALETTE: Lazy<BTreeMap<FlowNodeKind, KindStyle>> = Lazy::new(|| {
    let style = |color, icon| KindStyle { color, icon };
    BTreeMap::from([
        (FlowNodeKind::Start, style("#2e844a", "\u{25b6}")),
        (FlowNodeKind::Decision, style("#f59e0b", "\u{25c6}")),
        (FlowNodeKind::ActionCall, style("#0070d2", "\u{26a1}")),
        (FlowNodeKind::RecordLookup, style("#0070d2", "\u{1f50d}")),
        (FlowNodeKind::RecordUpdate, style("#0070d2", "\u{270f}\u{fe0f}")),
        (FlowNodeKind::RecordCreate, style("#0070d2", "\u{2795}")),
        (FlowNodeKind::Screen, style("#e83e8c", "\u{1f4cb}")),
        (FlowNodeKind::Assignment, style("#8b5cf6", "=")),
        (FlowNodeKind::Loop, style("#f59e0b", "\u{21bb}")),
        (FlowNodeKind::Subflow, style("#06b6d4", FALLBACK_ICON)),
        (FlowNodeKind::Default, style("#6b7280", FALLBACK_ICON)),
    ])
});

/// Built-in colour and icon for a kind; anything without an entry falls
/// back to the `default` style.
pub fn kind_style(kind: FlowNodeKind) -> KindStyle {
    KIND_PALETTE
        .get(&kind)
        .or_else(|| KIND_PALETTE.get(&FlowNodeKind::Default))
        .copied()
        .unwrap_or(KindStyle {
            color: "#6b7280",
            icon: FALLBACK_ICON,
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub node_background: String,
    pub header_text_color: String,
    pub text_color: String,
    pub detail_text_color: String,
    pub edge_color: String,
    pub edge_width: f32,
    pub edge_label_color: String,
    pub edge_label_background: String,
    pub broken_edge_color: String,
    /// Accent overrides on top of the built-in palette.
    pub kind_colors: BTreeMap<FlowNodeKind, String>,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#F8FAFC".to_string(),
            node_background: "#FFFFFF".to_string(),
            header_text_color: "#FFFFFF".to_string(),
            text_color: "#333333".to_string(),
            detail_text_color: "#666666".to_string(),
            edge_color: "#94a3b8".to_string(),
            edge_width: 2.0,
            edge_label_color: "#1e293b".to_string(),
            edge_label_background: "#FFFFFF".to_string(),
            broken_edge_color: "#ef4444".to_string(),
            kind_colors: BTreeMap::new(),
        }
    }

    pub fn dark() -> Self {
        Self {
            background: "#0F172A".to_string(),
            node_background: "#1E293B".to_string(),
            text_color: "#E2E8F0".to_string(),
            detail_text_color: "#94A3B8".to_string(),
            edge_color: "#64748B".to_string(),
            edge_label_color: "#E2E8F0".to_string(),
            edge_label_background: "#1E293B".to_string(),
            broken_edge_color: "#F87171".to_string(),
            ..Self::light()
        }
    }

    pub fn accent(&self, kind: FlowNodeKind) -> &str {
        self.kind_colors
            .get(&kind)
            .map(String::as_str)
            .unwrap_or(kind_style(kind).color)
    }

    pub fn icon(&self, kind: FlowNodeKind) -> &'static str {
        kind_style(kind).icon
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_style() {
        let theme = Theme::light();
        assert_eq!(theme.accent(FlowNodeKind::Start), "#2e844a");
        assert_eq!(theme.accent(FlowNodeKind::RecordUpdate), "#0070d2");
        assert_eq!(theme.accent(FlowNodeKind::Default), "#6b7280");
        assert_eq!(theme.icon(FlowNodeKind::Loop), "\u{21bb}");
        assert_eq!(theme.icon(FlowNodeKind::Subflow), FALLBACK_ICON);
    }

    #[test]
    fn overrides_win_over_palette() {
        let mut theme = Theme::dark();
        theme
            .kind_colors
            .insert(FlowNodeKind::Screen, "#000000".to_string());
        assert_eq!(theme.accent(FlowNodeKind::Screen), "#000000");
        assert_eq!(theme.accent(FlowNodeKind::Decision), "#f59e0b");
    }
}
