use crate::config::RenderConfig;
use crate::present::{NodeShape, RenderEdge, RenderNode, Scene};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const HEADER_HEIGHT: f32 = 34.0;
const CARD_RADIUS: f32 = 8.0;
const TEXT_PAD_X: f32 = 12.0;
const DETAIL_LINE_HEIGHT: f32 = 16.0;
/// Rough advance of one character relative to the font size.
const CHAR_WIDTH_RATIO: f32 = 0.6;

pub fn render_svg(scene: &Scene, theme: &Theme, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let width = scene.width.max(200.0);
    let height = scene.height.max(200.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    let markers = marker_ids(&scene.edges);
    svg.push_str("<defs>");
    let mut ordered: Vec<(&String, &String)> = markers.iter().collect();
    ordered.sort_by(|a, b| a.1.cmp(b.1));
    for (color, id) in ordered {
        let size = scene
            .edges
            .iter()
            .find(|edge| &edge.marker.color == color)
            .map(|edge| (edge.marker.width, edge.marker.height))
            .unwrap_or((20.0, 20.0));
        svg.push_str(&format!(
            "<marker id=\"{id}\" viewBox=\"0 0 20 20\" refX=\"18\" refY=\"10\" markerUnits=\"userSpaceOnUse\" markerWidth=\"{}\" markerHeight=\"{}\" orient=\"auto-start-reverse\"><path d=\"M 2 4 L 18 10 L 2 16 z\" fill=\"{color}\"/></marker>",
            size.0 * 0.6,
            size.1 * 0.6,
        ));
    }
    svg.push_str("</defs>");

    for edge in &scene.edges {
        if edge.points.len() < 2 {
            continue;
        }
        let dash = if edge.broken {
            " stroke-dasharray=\"6 4\""
        } else {
            ""
        };
        let marker = markers
            .get(&edge.marker.color)
            .map(|id| format!(" marker-end=\"url(#{id})\""))
            .unwrap_or_default();
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{dash}{marker}/>",
            points_to_path(&edge.points),
            edge.stroke,
            edge.stroke_width,
        ));
    }

    for node in &scene.nodes {
        match node.shape {
            NodeShape::Circle => svg.push_str(&circle_node_svg(node, theme)),
            NodeShape::Card => svg.push_str(&card_node_svg(node, theme, config)),
        }
    }

    // labels go last so they sit above nodes they happen to cross
    for (edge, placed) in scene
        .edges
        .iter()
        .zip(compute_edge_label_positions(&scene.edges))
    {
        let (Some(label), Some((x, y, w, h))) = (edge.label.as_deref(), placed) else {
            continue;
        };
        let style = &edge.label_style;
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"{r}\" ry=\"{r}\" fill=\"{}\"/>",
            x - w / 2.0,
            y - h / 2.0,
            style.background,
            r = style.radius,
        ));
        svg.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\">{}</text>",
            y + style.font_size * 0.35,
            theme.font_family,
            style.font_size,
            style.font_weight,
            style.color,
            escape_xml(label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// One marker per distinct arrow colour, so broken edges get their own.
fn marker_ids(edges: &[RenderEdge]) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    for edge in edges {
        let next = ids.len();
        ids.entry(edge.marker.color.clone())
            .or_insert_with(|| format!("arrow-{next}"));
    }
    ids
}

fn circle_node_svg(node: &RenderNode, theme: &Theme) -> String {
    let cx = node.x + node.width / 2.0;
    let cy = node.y + node.height / 2.0;
    let r = node.width.min(node.height) / 2.0;
    let mut out = format!(
        "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{r:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\"/>",
        node.accent, node.accent
    );
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"14\" fill=\"{}\">{}</text>",
        cy - 4.0,
        theme.font_family,
        theme.header_text_color,
        escape_xml(node.icon)
    ));
    out.push_str(&format!(
        "<text x=\"{cx:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"14\" font-weight=\"700\" fill=\"{}\">{}</text>",
        cy + 14.0,
        theme.font_family,
        theme.header_text_color,
        escape_xml(&node.label)
    ));
    out
}

fn card_node_svg(node: &RenderNode, theme: &Theme, config: &RenderConfig) -> String {
    let (x, y, w, h) = (node.x, node.y, node.width, node.height);
    let dash = if node.duplicate {
        " stroke-dasharray=\"5 3\""
    } else {
        ""
    };
    let mut out = format!(
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"{CARD_RADIUS}\" ry=\"{CARD_RADIUS}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\"{dash}/>",
        theme.node_background, node.accent
    );
    out.push_str(&format!(
        "<path d=\"{}\" fill=\"{}\"/>",
        header_path(x, y, w, HEADER_HEIGHT.min(h), CARD_RADIUS),
        node.accent
    ));

    let max_chars = chars_that_fit(w - 2.0 * TEXT_PAD_X - theme.font_size * 2.0, theme.font_size);
    out.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}  {}</text>",
        x + w / 2.0,
        y + HEADER_HEIGHT / 2.0 + theme.font_size * 0.35,
        theme.font_family,
        theme.font_size,
        theme.header_text_color,
        escape_xml(node.icon),
        escape_xml(&fit_text(&node.label, max_chars))
    ));

    if !config.show_details {
        return out;
    }
    let detail_size = theme.font_size - 1.0;
    let max_chars = chars_that_fit(w - 2.0 * TEXT_PAD_X, detail_size);
    let mut line_y = y + HEADER_HEIGHT + DETAIL_LINE_HEIGHT;
    for line in &node.details {
        if line_y > y + h - 4.0 {
            break;
        }
        let text = match line.key {
            Some(key) => format!(
                "<tspan font-weight=\"700\">{}</tspan> {}",
                escape_xml(key),
                escape_xml(&fit_text(&line.value, max_chars.saturating_sub(key.len() + 1)))
            ),
            None => escape_xml(&fit_text(&line.value, max_chars)),
        };
        let (fill, style) = match line.key {
            Some(_) => (theme.text_color.as_str(), ""),
            None => (theme.detail_text_color.as_str(), " font-style=\"italic\""),
        };
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{line_y:.2}\" font-family=\"{}\" font-size=\"{detail_size}\" fill=\"{fill}\"{style}>{text}</text>",
            x + TEXT_PAD_X,
            theme.font_family,
        ));
        line_y += DETAIL_LINE_HEIGHT;
    }
    out
}

/// Rectangle with only the top corners rounded.
fn header_path(x: f32, y: f32, w: f32, h: f32, r: f32) -> String {
    format!(
        "M {x:.2} {:.2} L {x:.2} {:.2} Q {x:.2} {y:.2} {:.2} {y:.2} L {:.2} {y:.2} Q {:.2} {y:.2} {:.2} {:.2} L {:.2} {:.2} Z",
        y + h,
        y + r,
        x + r,
        x + w - r,
        x + w,
        x + w,
        y + r,
        x + w,
        y + h,
    )
}

fn chars_that_fit(width: f32, font_size: f32) -> usize {
    (width / (font_size * CHAR_WIDTH_RATIO)).max(1.0) as usize
}

fn fit_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}\u{2026}")
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

/// Label boxes as (center x, center y, width, height), nudged along the
/// edge's main axis until they stop overlapping earlier labels.
fn compute_edge_label_positions(edges: &[RenderEdge]) -> Vec<Option<(f32, f32, f32, f32)>> {
    let mut occupied: Vec<(f32, f32, f32, f32)> = Vec::new();
    let mut positions = Vec::with_capacity(edges.len());

    for edge in edges {
        let Some(label) = edge.label.as_deref() else {
            positions.push(None);
            continue;
        };
        if edge.points.len() < 2 {
            positions.push(None);
            continue;
        }
        let style = &edge.label_style;
        let w = label.chars().count() as f32 * style.font_size * CHAR_WIDTH_RATIO
            + 2.0 * style.padding_x;
        let h = style.font_size + 2.0 * style.padding_y;
        let (mid_x, mid_y) = edge_midpoint(&edge.points);
        let mut offset = 0.0;
        let mut placed = None;

        for _ in 0..6 {
            let x = mid_x;
            let y = mid_y + offset;
            let rect = (x - w / 2.0, y - h / 2.0, w, h);
            if !collides(&rect, &occupied) {
                occupied.push(rect);
                placed = Some((x, y, w, h));
                break;
            }
            offset += h + 6.0;
        }

        positions.push(placed.or(Some((mid_x, mid_y, w, h))));
    }

    positions
}

fn edge_midpoint(points: &[(f32, f32)]) -> (f32, f32) {
    if points.len() >= 4 {
        let p1 = points[1];
        let p2 = points[2];
        ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0)
    } else if points.len() >= 2 {
        let p1 = points[0];
        let p2 = points[points.len() - 1];
        ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0)
    } else {
        (0.0, 0.0)
    }
}

fn collides(rect: &(f32, f32, f32, f32), occupied: &[(f32, f32, f32, f32)]) -> bool {
    for (x, y, w, h) in occupied {
        if rect.0 < x + w && rect.0 + rect.2 > *x && rect.1 < y + h && rect.1 + rect.3 > *y {
            return true;
        }
    }
    false
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let scale = if render_cfg.png_scale > 0.0 {
        render_cfg.png_scale
    } else {
        1.0
    };
    let size = tree.size().to_int_size();
    let width = (size.width() as f32 * scale).ceil() as u32;
    let height = (size.height() as f32 * scale).ceil() as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap_mut,
    );
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::render_flow_svg;

    const FLOW: &str = "<Flow>\
        <start><connector><targetReference>Check</targetReference></connector></start>\
        <decisions><name>Check</name><label>Check &amp; Route</label>\
            <rules><name>Yes</name><label>Yes</label><connector><targetReference>Done</targetReference></connector></rules>\
            <defaultConnector><targetReference>Missing</targetReference></defaultConnector></decisions>\
        <screens><name>Done</name></screens>\
        </Flow>";

    #[test]
    fn render_svg_basic() {
        let svg = render_flow_svg(FLOW, &Config::default()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Check &amp; Route"));
        assert!(svg.contains("Missing (missing)"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains(">Yes</text>"));
        assert!(svg.contains("stroke-dasharray=\"6 4\""));
        // two arrow colours: regular and broken
        assert!(svg.contains("id=\"arrow-0\""));
        assert!(svg.contains("id=\"arrow-1\""));
    }

    #[test]
    fn long_text_is_clipped_with_ellipsis() {
        assert_eq!(fit_text("short", 10), "short");
        assert_eq!(fit_text("abcdefghij", 5), "abcd\u{2026}");
    }

    #[test]
    fn details_can_be_hidden() {
        let flow = "<Flow><recordLookups><name>Find</name><object>Account</object></recordLookups></Flow>";
        let mut config = Config::default();
        assert!(render_flow_svg(flow, &config).unwrap().contains("Object:"));
        config.render.show_details = false;
        assert!(!render_flow_svg(flow, &config).unwrap().contains("Object:"));
    }

    #[test]
    fn background_follows_theme_overrides() {
        let config = crate::config::parse_config(
            r##"{ theme: "dark", themeVariables: { background: "#101010" } }"##,
        )
        .unwrap();
        let svg = render_flow_svg("<Flow><screens><name>Ask</name></screens></Flow>", &config).unwrap();
        assert!(svg.contains("<rect width=\"100%\" height=\"100%\" fill=\"#101010\"/>"));
    }
}
