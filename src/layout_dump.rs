use crate::present::Scene;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub shape: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub detail_lines: Vec<String>,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: Option<String>,
    pub broken: bool,
    pub reversed: bool,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_scene(scene: &Scene) -> Self {
        let nodes = scene
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.as_str().to_string(),
                label: node.label.clone(),
                shape: format!("{:?}", node.shape),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                detail_lines: node
                    .details
                    .iter()
                    .map(|line| match line.key {
                        Some(key) => format!("{key} {}", line.value),
                        None => line.value.clone(),
                    })
                    .collect(),
                duplicate: node.duplicate,
            })
            .collect();

        let edges = scene
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.source.clone(),
                to: edge.target.clone(),
                label: edge.label.clone(),
                broken: edge.broken,
                reversed: edge.reversed,
                points: edge.points.iter().map(|(x, y)| [*x, *y]).collect(),
            })
            .collect();

        LayoutDump {
            direction: format!("{:?}", scene.direction),
            width: scene.width,
            height: scene.height,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, scene: &Scene) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_scene(scene);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
