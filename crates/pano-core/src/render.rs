//! The renderer seam.
//!
//! The engine never draws anything itself. It creates and mutates opaque
//! render primitives through [`RenderBackend`] and keeps its own index from
//! [`RenderHandle`] to scene/mark ids, so hit results coming back from the
//! renderer can be resolved without inspecting names.

use glam::Vec3;

use crate::color::{Rgba, ZoneColors};
use crate::config::SceneSource;
use crate::geometry::ZoneShape;

/// Opaque id of one render primitive, issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u32);

/// One ray intersection as reported by a raycaster.
///
/// `parent` is the immediate parent primitive of `handle`, when the hit
/// landed on a child of a compound object (a sprite inside a point mark, the
/// outline of a zone, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    pub distance: f32,
    pub point: Vec3,
    pub handle: RenderHandle,
    pub parent: Option<RenderHandle>,
}

impl RawHit {
    pub fn new(distance: f32, point: Vec3, handle: RenderHandle) -> Self {
        Self {
            distance,
            point,
            handle,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: RenderHandle) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Drawing surface size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewSize {
    pub width: u32,
    pub height: u32,
}

impl ViewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

pub trait RenderBackend {
    /// Inside-out sphere carrying a panorama. Created hidden.
    fn create_scene_surface(&mut self, radius: f32) -> RenderHandle;
    /// Sphere hotspot; `sprite` replaces the sphere visually when present.
    fn create_point_mark(&mut self, radius: f32, sprite: Option<&str>) -> RenderHandle;
    /// Zone or zone preview built from local points.
    fn create_zone_mark(&mut self, shape: &ZoneShape, colors: ZoneColors) -> RenderHandle;
    fn attach(&mut self, child: RenderHandle, parent: RenderHandle);
    /// Detach from any parent and free GPU resources.
    fn dispose(&mut self, handle: RenderHandle);

    fn set_visible(&mut self, handle: RenderHandle, visible: bool);
    fn set_position(&mut self, handle: RenderHandle, position: Vec3);
    fn set_scale(&mut self, handle: RenderHandle, scale: f32);
    /// `None` drops the current material.
    fn set_scene_source(&mut self, handle: RenderHandle, source: Option<&SceneSource>);
    fn set_point_sprite(&mut self, handle: RenderHandle, sprite: Option<&str>);
    fn set_zone_colors(&mut self, handle: RenderHandle, colors: ZoneColors);

    fn set_camera(&mut self, eye: Vec3, target: Vec3);
    /// Current camera pose when something outside the engine (orbit
    /// controls) may have moved it.
    fn read_camera(&self) -> Option<(Vec3, Vec3)> {
        None
    }
    /// Depth fog density and canvas blur used during scene transitions.
    fn set_mask(&mut self, density: f32, blur_px: f32);
    fn set_mask_color(&mut self, color: Rgba);
    fn set_view_size(&mut self, size: ViewSize);

    /// Attach the transform gizmo to `target`, or detach it.
    fn attach_gizmo(&mut self, target: Option<RenderHandle>);
    fn set_orbit_enabled(&mut self, enabled: bool);
    fn show_fps(&mut self, _enabled: bool) {}

    fn render_frame(&mut self);
    /// Tear down everything the backend owns.
    fn release(&mut self);
}
