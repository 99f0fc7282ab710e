//! Serializable configuration: the global options plus the scene/mark tree.
//!
//! Field names follow the JS-facing configuration surface (`camelCase`), and
//! vectors travel as `{x, y, z}` objects so snapshots can be handed to a host
//! page unchanged.

use std::time::Duration;

use glam::Vec3;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::color::{decode_color, Rgba, ZoneColors};
use crate::constants::{
    DEFAULT_HOVER_BORDER_COLOR, DEFAULT_HOVER_FILL_COLOR, DEFAULT_MASK_COLOR,
    DEFAULT_TRANSFER_SECS, DEFAULT_ZONE_BORDER_COLOR, DEFAULT_ZONE_FILL_COLOR, MARK_ID_LEN,
    MAX_TRANSFER_SECS,
};
use crate::error::{EngineError, EngineResult};

/// Random alphanumeric id used for scenes and marks created without one.
pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(MARK_ID_LEN)
        .map(char::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Image,
    Video,
}

/// Media shown on a scene surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSource {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    Point,
    #[serde(alias = "zoon")]
    Zone,
}

/// One mark as stored in the registry and handed to listeners.
///
/// `position` is relative to the owning scene's origin. For zones, `points`
/// are offsets around `position` (the polygon centroid), not absolute
/// coordinates, while a point mark's `position` is its scene-local location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MarkKind,
    #[serde(default = "unit_scale")]
    pub scale: f32,
    #[serde(with = "xyz")]
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "xyz_list")]
    pub points: Option<Vec<Vec3>>,
    #[serde(default, alias = "markZoonBorderColor", skip_serializing_if = "Option::is_none")]
    pub zone_border_color: Option<String>,
    #[serde(default, alias = "markZoonFillColor", skip_serializing_if = "Option::is_none")]
    pub zone_fill_color: Option<String>,
    #[serde(default, alias = "markPointSprite", skip_serializing_if = "Option::is_none")]
    pub point_sprite_url: Option<String>,
}

fn unit_scale() -> f32 {
    1.0
}

impl MarkConfig {
    fn fresh(kind: MarkKind, position: Vec3, points: Option<Vec<Vec3>>) -> Self {
        Self {
            id: generate_id(),
            kind,
            scale: 1.0,
            position,
            points,
            zone_border_color: Some(DEFAULT_ZONE_BORDER_COLOR.to_string()),
            zone_fill_color: Some(DEFAULT_ZONE_FILL_COLOR.to_string()),
            point_sprite_url: Some(String::new()),
        }
    }

    pub fn new_point(position: Vec3) -> Self {
        Self::fresh(MarkKind::Point, position, None)
    }

    /// `points` must already be recentered around `center`.
    pub fn new_zone(center: Vec3, points: Vec<Vec3>) -> Self {
        Self::fresh(MarkKind::Zone, center, Some(points))
    }

    pub fn points(&self) -> &[Vec3] {
        self.points.as_deref().unwrap_or(&[])
    }

    pub fn sprite(&self) -> Option<&str> {
        self.point_sprite_url.as_deref().filter(|s| !s.is_empty())
    }

    /// Configured zone colors, falling back to the defaults.
    pub fn zone_colors(&self) -> ZoneColors {
        ZoneColors::decode(
            self.zone_border_color
                .as_deref()
                .unwrap_or(DEFAULT_ZONE_BORDER_COLOR),
            self.zone_fill_color
                .as_deref()
                .unwrap_or(DEFAULT_ZONE_FILL_COLOR),
        )
    }
}

/// Host-side edit of an existing mark. Only the fields present are applied;
/// anything else in the payload (type, position, points) is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEdit {
    pub id: String,
    #[serde(default)]
    pub scale: Option<f32>,
    #[serde(default, alias = "markZoonBorderColor")]
    pub zone_border_color: Option<String>,
    #[serde(default, alias = "markZoonFillColor")]
    pub zone_fill_color: Option<String>,
    #[serde(default, alias = "markPointSprite")]
    pub point_sprite_url: Option<String>,
}

impl MarkEdit {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl From<&MarkConfig> for MarkEdit {
    fn from(mark: &MarkConfig) -> Self {
        Self {
            id: mark.id.clone(),
            scale: Some(mark.scale),
            zone_border_color: mark.zone_border_color.clone(),
            zone_fill_color: mark.zone_fill_color.clone(),
            point_sprite_url: mark.point_sprite_url.clone(),
        }
    }
}

impl From<&MarkEdit> for MarkEdit {
    fn from(edit: &MarkEdit) -> Self {
        edit.clone()
    }
}

/// One scene with its media source and marks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: Option<SceneSource>,
    #[serde(default)]
    pub marks: Vec<MarkConfig>,
}

impl SceneConfig {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Allowed mark scale interval. Either bound may be missing and the two may
/// arrive inverted; [`ScaleRange::bounds`] normalizes both cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    #[serde(default)]
    pub min: Option<f32>,
    #[serde(default)]
    pub max: Option<f32>,
}

impl ScaleRange {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// `(min, max)` with `min <= max`; missing min is 0, missing max is unbounded.
    pub fn bounds(&self) -> (f32, f32) {
        let lo = self.min.filter(|v| !v.is_nan()).unwrap_or(0.0);
        let hi = self.max.filter(|v| !v.is_nan()).unwrap_or(f32::INFINITY);
        (lo.min(hi), lo.max(hi))
    }

    pub fn clamp(&self, value: f32) -> f32 {
        let (lo, hi) = self.bounds();
        value.max(lo).min(hi)
    }
}

/// Options fixed at engine construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalConfig {
    pub is_editable: bool,
    pub is_show_fps: bool,
    pub max_mark_count: Option<usize>,
    pub max_mark_zoon_point_count: Option<usize>,
    /// Seconds.
    pub transfer_duration: Option<f32>,
    pub transfer_mask_color: Option<String>,
    pub mark_zoon_hover_bg_color: Option<String>,
    pub mark_zoon_hover_bdr_color: Option<String>,
    pub scale_range: Option<ScaleRange>,
}

impl GlobalConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Per-scene mark limit; zero or absent means unlimited.
    pub fn max_marks(&self) -> usize {
        self.max_mark_count.filter(|&n| n > 0).unwrap_or(usize::MAX)
    }

    /// Per-zone point limit while drawing; zero or absent means unlimited.
    pub fn max_zone_points(&self) -> usize {
        self.max_mark_zoon_point_count
            .filter(|&n| n > 0)
            .unwrap_or(usize::MAX)
    }

    /// Scene transition length, capped at [`MAX_TRANSFER_SECS`].
    pub fn transfer_duration(&self) -> Duration {
        let secs = self
            .transfer_duration
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_TRANSFER_SECS);
        Duration::from_secs_f32(secs.min(MAX_TRANSFER_SECS as f32))
    }

    pub fn mask_color(&self) -> Rgba {
        decode_color(
            self.transfer_mask_color
                .as_deref()
                .unwrap_or(DEFAULT_MASK_COLOR),
        )
    }

    pub fn hover_colors(&self) -> ZoneColors {
        ZoneColors::decode(
            self.mark_zoon_hover_bdr_color
                .as_deref()
                .unwrap_or(DEFAULT_HOVER_BORDER_COLOR),
            self.mark_zoon_hover_bg_color
                .as_deref()
                .unwrap_or(DEFAULT_HOVER_FILL_COLOR),
        )
    }

    pub fn scale_range(&self) -> ScaleRange {
        self.scale_range.unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize)]
struct Xyz {
    x: f32,
    y: f32,
    z: f32,
}

impl From<Vec3> for Xyz {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Xyz> for Vec3 {
    fn from(v: Xyz) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

mod xyz {
    use super::Xyz;
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        Xyz::from(*v).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        Xyz::deserialize(d).map(Vec3::from)
    }
}

mod xyz_list {
    use super::Xyz;
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Vec<Vec3>>, s: S) -> Result<S::Ok, S::Error> {
        v.as_ref()
            .map(|pts| pts.iter().copied().map(Xyz::from).collect::<Vec<_>>())
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<Vec3>>, D::Error> {
        let raw: Option<Vec<Xyz>> = Option::deserialize(d)?;
        Ok(raw.map(|pts| pts.into_iter().map(Vec3::from).collect()))
    }
}
