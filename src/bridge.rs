//! JSON round trip between JS values and the serde types of the core.

use pano_core::{SourceKind, TransferOutcome};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::JsValue;

/// `JSON.stringify` of a JS value; `undefined` becomes `null`.
pub fn json_text(value: &JsValue) -> anyhow::Result<String> {
    if value.is_undefined() {
        return Ok("null".to_string());
    }
    let text = js_sys::JSON::stringify(value).map_err(|e| anyhow::anyhow!("{:?}", e))?;
    text.as_string()
        .ok_or_else(|| anyhow::anyhow!("value is not JSON-serializable"))
}

pub fn json_value(value: &JsValue) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_str(&json_text(value)?)?)
}

/// `null` and `undefined` read as `None`.
pub fn from_js_opt<T: DeserializeOwned>(value: &JsValue) -> anyhow::Result<Option<T>> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&json_text(value)?)?))
}

pub fn to_js<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<JsValue> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text).map_err(|e| anyhow::anyhow!("{:?}", e))
}

pub fn js_error(e: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

pub fn source_kind_name(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Image => "image",
        SourceKind::Video => "video",
    }
}

/// What a transition promise resolves with.
pub fn outcome_name(outcome: TransferOutcome) -> &'static str {
    match outcome {
        TransferOutcome::Completed => "completed",
        TransferOutcome::Busy => "busy",
        TransferOutcome::Degenerate => "degenerate",
    }
}
