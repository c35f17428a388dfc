use flowgraph_layout::{GraphSnapshot, Layout, LayoutConfig, compute_layout, merge_config_str};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

/// Per-call switches that are not part of the layout config itself.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallOptions {
    pretty: Option<bool>,
}

fn to_js(error: impl ToString) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn run_layout(input_json: &str, options_json: Option<&str>) -> Result<(Layout, bool), String> {
    let snapshot = GraphSnapshot::from_json(input_json).map_err(|error| error.to_string())?;
    let (config, call) = match options_json {
        Some(raw) => {
            let call: CallOptions = serde_json::from_str(raw).map_err(|error| error.to_string())?;
            // Unknown keys such as `pretty` are ignored by the config overlay.
            let config = merge_config_str(LayoutConfig::default(), raw).map_err(|error| error.to_string())?;
            (config, call)
        }
        None => (LayoutConfig::default(), CallOptions::default()),
    };
    let layout = compute_layout(&snapshot, &config).map_err(|error| error.to_string())?;
    Ok((layout, call.pretty.unwrap_or(false)))
}

/// Lay out a `{nodes, edges}` snapshot. `options_json` takes the same flat
/// camelCase keys as a config file, plus `pretty`.
#[wasm_bindgen]
pub fn layout_graph(input_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let (layout, pretty) = run_layout(input_json, options_json.as_deref()).map_err(to_js)?;
    let out = if pretty {
        serde_json::to_string_pretty(&layout)
    } else {
        serde_json::to_string(&layout)
    };
    out.map_err(to_js)
}
