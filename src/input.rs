// Pure mapping from browser input to engine input.
// Nothing here touches `web_sys`, so the host tests can `include!` this file.

use std::time::Duration;

use glam::{Vec2, Vec3};
use pano_core::{InboundEvent, Key, MarkEdit, RawHit, RenderHandle, SceneConfig, SceneSource};
use serde::Deserialize;

/// Pointer position in CSS pixels (relative to the viewport) to normalized
/// device coordinates of the element whose bounding rect is given, y up.
pub fn ndc_from_client(client: Vec2, rect_origin: Vec2, rect_size: Vec2) -> Option<Vec2> {
    if rect_size.x <= 0.0 || rect_size.y <= 0.0 {
        return None;
    }
    let local = client - rect_origin;
    Some(Vec2::new(
        local.x / rect_size.x * 2.0 - 1.0,
        1.0 - local.y / rect_size.y * 2.0,
    ))
}

/// `KeyboardEvent.key` to an engine key. Case is kept: Shift+z is `Z`.
pub fn key_from_dom(key: &str) -> Key {
    if key == "Alt" {
        return Key::Alt;
    }
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Key::Char(c),
        _ => Key::Other(key.to_string()),
    }
}

/// Container size from `offsetWidth`/`offsetHeight`. A collapsed container
/// (display: none, detached) reports zero and is ignored.
pub fn view_size_from_offset(width: i32, height: i32) -> Option<pano_core::ViewSize> {
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(pano_core::ViewSize::new(width as u32, height as u32))
}

/// Optional JS duration in milliseconds. Negative, NaN and missing values
/// fall back to the engine default; values too large for a `Duration`
/// saturate and are capped by the engine.
pub fn duration_from_ms(ms: Option<f64>) -> Option<Duration> {
    match ms {
        Some(ms) if ms.is_finite() && ms >= 0.0 => {
            Some(Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct EditScenePayload {
    id: String,
    #[serde(default)]
    source: Option<SceneSource>,
}

/// Name and JSON payload of a command pushed through `viewer.emit(..)`.
pub fn parse_inbound(name: &str, payload: serde_json::Value) -> anyhow::Result<InboundEvent> {
    let event = match name {
        "addScene" => {
            if payload.is_null() {
                InboundEvent::AddScene(None)
            } else {
                InboundEvent::AddScene(Some(serde_json::from_value::<SceneConfig>(payload)?))
            }
        }
        "editScene" => {
            let edit: EditScenePayload = serde_json::from_value(payload)?;
            InboundEvent::EditScene {
                id: edit.id,
                source: edit.source,
            }
        }
        "removeScene" => InboundEvent::RemoveScene(serde_json::from_value(payload)?),
        "editMark" => InboundEvent::EditMark(serde_json::from_value::<MarkEdit>(payload)?),
        "removeMark" => InboundEvent::RemoveMark(serde_json::from_value(payload)?),
        other => anyhow::bail!("unknown inbound event '{other}'"),
    };
    Ok(event)
}

#[derive(Debug, Deserialize)]
struct HitPoint {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Debug, Deserialize)]
struct JsHit {
    distance: f32,
    point: HitPoint,
    handle: u32,
    #[serde(default)]
    parent: Option<u32>,
}

/// Hits reported by a renderer that raycasts itself, nearest first.
pub fn hits_from_json(value: serde_json::Value) -> anyhow::Result<Vec<RawHit>> {
    let raw: Vec<JsHit> = serde_json::from_value(value)?;
    let mut hits: Vec<RawHit> = raw
        .into_iter()
        .filter(|h| h.distance.is_finite())
        .map(|h| RawHit {
            distance: h.distance,
            point: Vec3::new(h.point.x, h.point.y, h.point.z),
            handle: RenderHandle(h.handle),
            parent: h.parent.map(RenderHandle),
        })
        .collect();
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Ok(hits)
}
