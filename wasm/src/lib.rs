use flowmeta_renderer::channel::HostMessage;
use flowmeta_renderer::config::{Config, parse_config};
use flowmeta_renderer::ir::Direction;
use flowmeta_renderer::{layout_flow, render_flow_svg};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowRenderOptions {
    theme: Option<String>,
    direction: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    show_details: Option<bool>,
}

fn build_config(options: FlowRenderOptions) -> Result<Config, String> {
    let mut config = match options.theme.as_deref() {
        Some(theme) => parse_config(&format!("{{ theme: {} }}", serde_json::json!(theme)))
            .map_err(|error| error.to_string())?,
        None => Config::default(),
    };
    if let Some(token) = options.direction.as_deref() {
        config.layout.direction =
            Direction::from_token(token).ok_or_else(|| format!("unknown direction '{token}'"))?;
    }
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    if let Some(show_details) = options.show_details {
        config.render.show_details = show_details;
    }
    Ok(config)
}

fn config_from_json(options_json: Option<String>) -> Result<Config, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<FlowRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        FlowRenderOptions::default()
    };
    build_config(options).map_err(|error| JsValue::from_str(&error))
}

#[wasm_bindgen]
pub fn render_flow_meta_svg(xml: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let config = config_from_json(options_json)?;
    render_flow_svg(xml, &config).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// The `renderFlow` message, with the positioned scene, for a surface that
/// draws on its own.
#[wasm_bindgen]
pub fn render_flow_message(xml: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let config = config_from_json(options_json)?;
    let rendered = layout_flow(xml, &config).map_err(|error| JsValue::from_str(&error.to_string()))?;
    let message = HostMessage::RenderFlow {
        data: rendered.data,
        scene: Some(rendered.scene),
    };
    serde_json::to_string(&message).map_err(|error| JsValue::from_str(&error.to_string()))
}
