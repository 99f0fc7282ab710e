//! `RenderBackend` over a host-provided JavaScript renderer object.
//!
//! The JS side owns the canvas, the WebGL resources, orbit controls and the
//! transform gizmo. Handles are plain `u32`s it hands out; vertex data crosses
//! as `Float32Array`s.

use glam::{Vec2, Vec3};
use js_sys::{Float32Array, Function};
use pano_core::constants::{POINT_SPRITE_SIZE, ZONE_DOT_RADIUS};
use pano_core::geometry::{as_flat, ZoneShape};
use pano_core::{RawHit, RenderBackend, RenderHandle, Rgba, SceneSource, ViewSize, ZoneColors};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::bridge;
use crate::input;

#[wasm_bindgen]
extern "C" {
    pub type JsRenderer;

    #[wasm_bindgen(method, getter, js_name = domElement)]
    pub fn dom_element(this: &JsRenderer) -> web::HtmlElement;

    #[wasm_bindgen(method, js_name = createSceneSurface)]
    fn create_scene_surface(this: &JsRenderer, radius: f32) -> u32;

    #[wasm_bindgen(method, js_name = createPointMark)]
    fn create_point_mark(
        this: &JsRenderer,
        radius: f32,
        sprite: Option<String>,
        sprite_size: f32,
    ) -> u32;

    /// `kind` is one of `empty`, `dot`, `polyline`, `polygon`.
    #[wasm_bindgen(method, js_name = createZoneMark)]
    fn create_zone_mark(
        this: &JsRenderer,
        kind: &str,
        outline: Float32Array,
        triangles: Float32Array,
        dot_radius: f32,
        border: u32,
        border_opacity: f32,
        fill: u32,
        fill_opacity: f32,
    ) -> u32;

    #[wasm_bindgen(method)]
    fn attach(this: &JsRenderer, child: u32, parent: u32);

    #[wasm_bindgen(method)]
    fn dispose(this: &JsRenderer, handle: u32);

    #[wasm_bindgen(method, js_name = setVisible)]
    fn set_visible(this: &JsRenderer, handle: u32, visible: bool);

    #[wasm_bindgen(method, js_name = setPosition)]
    fn set_position(this: &JsRenderer, handle: u32, x: f32, y: f32, z: f32);

    #[wasm_bindgen(method, js_name = setScale)]
    fn set_scale(this: &JsRenderer, handle: u32, scale: f32);

    #[wasm_bindgen(method, js_name = setSceneSource)]
    fn set_scene_source(this: &JsRenderer, handle: u32, url: Option<String>, kind: Option<String>);

    #[wasm_bindgen(method, js_name = setPointSprite)]
    fn set_point_sprite(this: &JsRenderer, handle: u32, sprite: Option<String>);

    #[wasm_bindgen(method, js_name = setZoneColors)]
    fn set_zone_colors(
        this: &JsRenderer,
        handle: u32,
        border: u32,
        border_opacity: f32,
        fill: u32,
        fill_opacity: f32,
    );

    #[wasm_bindgen(method, js_name = setCamera)]
    fn set_camera(this: &JsRenderer, ex: f32, ey: f32, ez: f32, tx: f32, ty: f32, tz: f32);

    /// `[ex, ey, ez, tx, ty, tz]`, or `undefined` when the JS side does not
    /// track an orbit camera.
    #[wasm_bindgen(method, catch, js_name = readCamera)]
    fn read_camera(this: &JsRenderer) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, js_name = setMask)]
    fn set_mask(this: &JsRenderer, density: f32, blur_px: f32);

    #[wasm_bindgen(method, js_name = setMaskColor)]
    fn set_mask_color(this: &JsRenderer, color: u32, opacity: f32);

    #[wasm_bindgen(method, js_name = setViewSize)]
    fn set_view_size(this: &JsRenderer, width: u32, height: u32);

    #[wasm_bindgen(method, js_name = attachGizmo)]
    fn attach_gizmo(this: &JsRenderer, handle: Option<u32>);

    #[wasm_bindgen(method, js_name = setOrbitEnabled)]
    fn set_orbit_enabled(this: &JsRenderer, enabled: bool);

    #[wasm_bindgen(method, catch, js_name = showFps)]
    fn show_fps(this: &JsRenderer, enabled: bool) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn render(this: &JsRenderer);

    #[wasm_bindgen(method)]
    fn release(this: &JsRenderer);

    /// Gizmo callbacks: `onDragging(bool)` and `onMoved(x, y, z)` with the
    /// mark's scene-local position.
    #[wasm_bindgen(method, js_name = bindGizmo)]
    fn bind_gizmo(this: &JsRenderer, on_dragging: &Function, on_moved: &Function);
}

pub struct JsBackend {
    renderer: JsRenderer,
}

impl JsBackend {
    pub fn new(renderer: JsRenderer) -> Self {
        Self { renderer }
    }

    pub fn bind_gizmo(&self, on_dragging: &Function, on_moved: &Function) {
        self.renderer.bind_gizmo(on_dragging, on_moved);
    }

    /// Hits from the renderer's own raycaster, when it has one.
    pub fn raycast(&self, ndc: Vec2) -> Option<Vec<RawHit>> {
        let raycast = js_sys::Reflect::get(&self.renderer, &JsValue::from_str("raycast"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        let result = raycast
            .call2(
                &self.renderer,
                &JsValue::from_f64(ndc.x as f64),
                &JsValue::from_f64(ndc.y as f64),
            )
            .map_err(|e| log::warn!("[pick] renderer raycast threw: {:?}", e))
            .ok()?;
        match bridge::json_value(&result).and_then(input::hits_from_json) {
            Ok(hits) => Some(hits),
            Err(e) => {
                log::warn!("[pick] bad raycast result, falling back: {e}");
                None
            }
        }
    }
}

fn zone_kind(shape: &ZoneShape) -> (&'static str, &[Vec3], &[Vec3]) {
    const ORIGIN: [Vec3; 1] = [Vec3::ZERO];
    match shape {
        ZoneShape::Empty => ("empty", &[], &[]),
        ZoneShape::Dot => ("dot", &ORIGIN, &[]),
        ZoneShape::Polyline(points) => ("polyline", points.as_slice(), &[]),
        ZoneShape::Polygon { outline, triangles } => {
            ("polygon", outline.as_slice(), triangles.as_slice())
        }
    }
}

impl RenderBackend for JsBackend {
    fn create_scene_surface(&mut self, radius: f32) -> RenderHandle {
        RenderHandle(self.renderer.create_scene_surface(radius))
    }

    fn create_point_mark(&mut self, radius: f32, sprite: Option<&str>) -> RenderHandle {
        RenderHandle(self.renderer.create_point_mark(
            radius,
            sprite.map(str::to_string),
            POINT_SPRITE_SIZE,
        ))
    }

    fn create_zone_mark(&mut self, shape: &ZoneShape, colors: ZoneColors) -> RenderHandle {
        let (kind, outline, triangles) = zone_kind(shape);
        RenderHandle(self.renderer.create_zone_mark(
            kind,
            Float32Array::from(as_flat(outline)),
            Float32Array::from(as_flat(triangles)),
            ZONE_DOT_RADIUS,
            colors.border.color,
            colors.border.opacity,
            colors.fill.color,
            colors.fill.opacity,
        ))
    }

    fn attach(&mut self, child: RenderHandle, parent: RenderHandle) {
        self.renderer.attach(child.0, parent.0);
    }

    fn dispose(&mut self, handle: RenderHandle) {
        self.renderer.dispose(handle.0);
    }

    fn set_visible(&mut self, handle: RenderHandle, visible: bool) {
        self.renderer.set_visible(handle.0, visible);
    }

    fn set_position(&mut self, handle: RenderHandle, position: Vec3) {
        self.renderer
            .set_position(handle.0, position.x, position.y, position.z);
    }

    fn set_scale(&mut self, handle: RenderHandle, scale: f32) {
        self.renderer.set_scale(handle.0, scale);
    }

    fn set_scene_source(&mut self, handle: RenderHandle, source: Option<&SceneSource>) {
        let kind = source.map(|s| bridge::source_kind_name(s.kind).to_string());
        self.renderer
            .set_scene_source(handle.0, source.map(|s| s.url.clone()), kind);
    }

    fn set_point_sprite(&mut self, handle: RenderHandle, sprite: Option<&str>) {
        self.renderer
            .set_point_sprite(handle.0, sprite.map(str::to_string));
    }

    fn set_zone_colors(&mut self, handle: RenderHandle, colors: ZoneColors) {
        self.renderer.set_zone_colors(
            handle.0,
            colors.border.color,
            colors.border.opacity,
            colors.fill.color,
            colors.fill.opacity,
        );
    }

    fn set_camera(&mut self, eye: Vec3, target: Vec3) {
        self.renderer
            .set_camera(eye.x, eye.y, eye.z, target.x, target.y, target.z);
    }

    fn read_camera(&self) -> Option<(Vec3, Vec3)> {
        let value = self.renderer.read_camera().ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        let pose = Float32Array::new(&value).to_vec();
        if pose.len() < 6 {
            return None;
        }
        Some((
            Vec3::new(pose[0], pose[1], pose[2]),
            Vec3::new(pose[3], pose[4], pose[5]),
        ))
    }

    fn set_mask(&mut self, density: f32, blur_px: f32) {
        self.renderer.set_mask(density, blur_px);
    }

    fn set_mask_color(&mut self, color: Rgba) {
        self.renderer.set_mask_color(color.color, color.opacity);
    }

    fn set_view_size(&mut self, size: ViewSize) {
        self.renderer.set_view_size(size.width, size.height);
    }

    fn attach_gizmo(&mut self, target: Option<RenderHandle>) {
        self.renderer.attach_gizmo(target.map(|h| h.0));
    }

    fn set_orbit_enabled(&mut self, enabled: bool) {
        self.renderer.set_orbit_enabled(enabled);
    }

    fn show_fps(&mut self, enabled: bool) {
        if let Err(e) = self.renderer.show_fps(enabled) {
            log::debug!("[render] showFps unsupported: {:?}", e);
        }
    }

    fn render_frame(&mut self) {
        self.renderer.render();
    }

    fn release(&mut self) {
        self.renderer.release();
    }
}
