//! Message channel to a rendering surface and the session that owns it.
//!
//! Delivery is send-and-forget: the host posts one `renderFlow` message per
//! successful extraction and never waits for the surface. The surface can
//! talk back with free-text `alert` and `error` messages, which become
//! notices for the user.

use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::ir::FlowDiagramData;
use crate::present::Scene;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const FLOW_FILE_SUFFIX: &str = ".flow-meta.xml";

/// Host to surface.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command")]
pub enum HostMessage {
    #[serde(rename = "renderFlow")]
    RenderFlow {
        data: FlowDiagramData,
        /// Positioned scene, when layout ran on the sending side.
        #[serde(skip_serializing_if = "Option::is_none")]
        scene: Option<Scene>,
    },
}

/// Surface to host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum SurfaceMessage {
    Alert { text: String },
    Error { text: String },
}

impl SurfaceMessage {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| FlowError::InvalidMessage(err.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Something to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNotice {
    pub level: NoticeLevel,
    pub text: String,
}

pub trait RenderSurface {
    fn post(&mut self, message: &HostMessage);
    /// Bring an already open surface back to the front.
    fn reveal(&mut self);
}

/// Writes each message as one JSON line.
#[derive(Debug)]
pub struct JsonLinesSurface<W: Write> {
    writer: W,
    reveals: usize,
}

impl<W: Write> JsonLinesSurface<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, reveals: 0 }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn reveals(&self) -> usize {
        self.reveals
    }
}

impl<W: Write> RenderSurface for JsonLinesSurface<W> {
    fn post(&mut self, message: &HostMessage) {
        let written = serde_json::to_writer(&mut self.writer, message)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        if let Err(err) = written {
            tracing::error!(error = %err, "failed to post message to render surface");
        }
    }

    fn reveal(&mut self) {
        self.reveals += 1;
        tracing::info!(reveals = self.reveals, "revealing render surface");
    }
}

/// Owns at most one surface. The first visualize creates it; later ones
/// reuse it until it is disposed.
pub struct VisualizerSession<S, F>
where
    S: RenderSurface,
    F: FnMut() -> S,
{
    create_surface: F,
    surface: Option<S>,
    config: Config,
    include_scene: bool,
}

impl<S, F> VisualizerSession<S, F>
where
    S: RenderSurface,
    F: FnMut() -> S,
{
    pub fn new(config: Config, create_surface: F) -> Self {
        Self {
            create_surface,
            surface: None,
            config,
            include_scene: true,
        }
    }

    /// Send only the extracted graph and leave layout to the surface.
    pub fn without_scene(mut self) -> Self {
        self.include_scene = false;
        self
    }

    pub fn is_open(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Runs the pipeline on `text` and posts the result. Nothing is posted
    /// when any step fails.
    pub fn visualize(&mut self, file_name: &str, text: &str) -> Result<UserNotice> {
        if !file_name.ends_with(FLOW_FILE_SUFFIX) {
            return Err(FlowError::UnsupportedFile {
                file_name: file_name.to_string(),
                expected_suffix: FLOW_FILE_SUFFIX,
            });
        }

        let rendered = crate::layout_flow(text, &self.config)?;
        let notice = UserNotice {
            level: NoticeLevel::Info,
            text: format!(
                "Found {} nodes and {} edges",
                rendered.data.nodes.len(),
                rendered.data.edges.len()
            ),
        };

        let surface = match self.surface.take() {
            Some(mut surface) => {
                surface.reveal();
                surface
            }
            None => {
                tracing::info!(file = file_name, "opening render surface");
                (self.create_surface)()
            }
        };
        let surface = self.surface.insert(surface);
        let scene = self.include_scene.then_some(rendered.scene);
        surface.post(&HostMessage::RenderFlow {
            data: rendered.data,
            scene,
        });
        Ok(notice)
    }

    pub fn dispose(&mut self) {
        if self.surface.take().is_some() {
            tracing::info!("render surface disposed");
        }
    }

    pub fn handle_surface_message(&self, raw: &str) -> Result<UserNotice> {
        let notice = match SurfaceMessage::parse(raw)? {
            SurfaceMessage::Alert { text } => {
                tracing::info!(%text, "surface alert");
                UserNotice {
                    level: NoticeLevel::Info,
                    text,
                }
            }
            SurfaceMessage::Error { text } => {
                tracing::error!(%text, "surface error");
                UserNotice {
                    level: NoticeLevel::Error,
                    text,
                }
            }
        };
        Ok(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const FLOW: &str = "<Flow>\
        <start><connector><targetReference>Show</targetReference></connector></start>\
        <screens><name>Show</name><fields><name>A</name></fields></screens>\
        </Flow>";

    fn lines(surface: &JsonLinesSurface<Vec<u8>>) -> Vec<serde_json::Value> {
        String::from_utf8_lossy(surface.get_ref())
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn render_flow_message_shape() {
        let message = HostMessage::RenderFlow {
            data: FlowDiagramData::default(),
            scene: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "renderFlow", "data": {"nodes": [], "edges": []}})
        );
    }

    #[test]
    fn surface_messages_parse() {
        assert_eq!(
            SurfaceMessage::parse(r#"{"command":"alert","text":"hi"}"#).unwrap(),
            SurfaceMessage::Alert {
                text: "hi".to_string()
            }
        );
        assert!(matches!(
            SurfaceMessage::parse(r#"{"command":"reload"}"#),
            Err(FlowError::InvalidMessage(_))
        ));
    }

    #[test]
    fn session_creates_once_then_reveals() {
        let created = Cell::new(0);
        let mut session = VisualizerSession::new(Config::default(), || {
            created.set(created.get() + 1);
            JsonLinesSurface::new(Vec::new())
        });
        assert!(!session.is_open());

        let notice = session.visualize("Order.flow-meta.xml", FLOW).unwrap();
        assert_eq!(notice.text, "Found 2 nodes and 1 edges");
        session.visualize("Order.flow-meta.xml", FLOW).unwrap();
        assert_eq!(created.get(), 1);

        let surface = session.surface().unwrap();
        assert_eq!(surface.reveals(), 1);
        let posted = lines(surface);
        assert_eq!(posted.len(), 2);
        assert_eq!(posted[0]["command"], "renderFlow");
        assert_eq!(posted[0]["data"]["nodes"][0]["id"], "START");
        assert!(posted[0]["scene"]["nodes"][0]["x"].is_number());

        session.dispose();
        assert!(!session.is_open());
        session.visualize("Order.flow-meta.xml", FLOW).unwrap();
        assert_eq!(created.get(), 2);
    }

    #[test]
    fn wrong_extension_and_bad_markup_post_nothing() {
        let mut session =
            VisualizerSession::new(Config::default(), || JsonLinesSurface::new(Vec::new()))
                .without_scene();
        let err = session.visualize("Order.xml", FLOW).unwrap_err();
        assert!(matches!(err, FlowError::UnsupportedFile { .. }));
        let err = session
            .visualize("Order.flow-meta.xml", "<Flow><decisions>")
            .unwrap_err();
        assert!(matches!(err, FlowError::MalformedDocument { .. }));
        assert!(!session.is_open());
    }

    #[test]
    fn reverse_channel_becomes_notices() {
        let session = VisualizerSession::new(Config::default(), || JsonLinesSurface::new(Vec::new()));
        let notice = session
            .handle_surface_message(r#"{"command":"error","text":"layout failed"}"#)
            .unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.text, "layout failed");
        assert!(session.handle_surface_message("not json").is_err());
    }
}
