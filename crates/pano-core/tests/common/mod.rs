// Shared fixtures for the engine integration tests: a renderer that records
// every call and a tween engine that counts starts.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;
use instant::Instant;
use pano_core::color::{Rgba, ZoneColors};
use pano_core::config::{MarkConfig, SceneConfig, SceneSource, SourceKind};
use pano_core::events::{EngineEvent, EventKind};
use pano_core::geometry::ZoneShape;
use pano_core::render::{RawHit, RenderBackend, RenderHandle, ViewSize};
use pano_core::transition::{ClockTweens, TweenEngine, TweenId, TweenSpec, TweenStep};
use pano_core::{Engine, GlobalConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateScene(RenderHandle),
    CreatePoint(RenderHandle, Option<String>),
    CreateZone(RenderHandle, ZoneShape),
    Attach(RenderHandle, RenderHandle),
    Dispose(RenderHandle),
    Visible(RenderHandle, bool),
    Position(RenderHandle, Vec3),
    Scale(RenderHandle, f32),
    Source(RenderHandle, Option<SceneSource>),
    Sprite(RenderHandle, Option<String>),
    Colors(RenderHandle, ZoneColors),
    Camera(Vec3, Vec3),
    Mask(f32, f32),
    MaskColor(Rgba),
    ViewSize(ViewSize),
    Gizmo(Option<RenderHandle>),
    Orbit(bool),
    Fps(bool),
    Render,
    Release,
}

#[derive(Default)]
pub struct RecordingBackend {
    next: u32,
    pub calls: Vec<Call>,
    /// Same calls, readable after the engine has consumed the backend.
    pub shared: Rc<RefCell<Vec<Call>>>,
}

impl RecordingBackend {
    fn issue(&mut self) -> RenderHandle {
        self.next += 1;
        RenderHandle(self.next)
    }

    fn push(&mut self, call: Call) {
        self.shared.borrow_mut().push(call.clone());
        self.calls.push(call);
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn position_of(&self, handle: RenderHandle) -> Option<Vec3> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Position(h, p) if *h == handle => Some(*p),
            _ => None,
        })
    }

    pub fn is_visible(&self, handle: RenderHandle) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Visible(h, v) if *h == handle => Some(*v),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn is_disposed(&self, handle: RenderHandle) -> bool {
        self.calls.contains(&Call::Dispose(handle))
    }

    pub fn colors_of(&self, handle: RenderHandle) -> Option<ZoneColors> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Colors(h, colors) if *h == handle => Some(*colors),
            _ => None,
        })
    }

    pub fn gizmo(&self) -> Option<RenderHandle> {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                Call::Gizmo(g) => Some(*g),
                _ => None,
            })
            .flatten()
    }

    pub fn last_camera(&self) -> Option<(Vec3, Vec3)> {
        self.calls.iter().rev().find_map(|c| match c {
            Call::Camera(eye, target) => Some((*eye, *target)),
            _ => None,
        })
    }

    pub fn zone_creations(&self) -> Vec<(RenderHandle, ZoneShape)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateZone(h, shape) => Some((*h, shape.clone())),
                _ => None,
            })
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_scene_surface(&mut self, _radius: f32) -> RenderHandle {
        let h = self.issue();
        self.push(Call::CreateScene(h));
        h
    }

    fn create_point_mark(&mut self, _radius: f32, sprite: Option<&str>) -> RenderHandle {
        let h = self.issue();
        self.push(Call::CreatePoint(h, sprite.map(str::to_owned)));
        h
    }

    fn create_zone_mark(&mut self, shape: &ZoneShape, colors: ZoneColors) -> RenderHandle {
        let h = self.issue();
        self.push(Call::CreateZone(h, shape.clone()));
        self.push(Call::Colors(h, colors));
        h
    }

    fn attach(&mut self, child: RenderHandle, parent: RenderHandle) {
        self.push(Call::Attach(child, parent));
    }

    fn dispose(&mut self, handle: RenderHandle) {
        self.push(Call::Dispose(handle));
    }

    fn set_visible(&mut self, handle: RenderHandle, visible: bool) {
        self.push(Call::Visible(handle, visible));
    }

    fn set_position(&mut self, handle: RenderHandle, position: Vec3) {
        self.push(Call::Position(handle, position));
    }

    fn set_scale(&mut self, handle: RenderHandle, scale: f32) {
        self.push(Call::Scale(handle, scale));
    }

    fn set_scene_source(&mut self, handle: RenderHandle, source: Option<&SceneSource>) {
        self.push(Call::Source(handle, source.cloned()));
    }

    fn set_point_sprite(&mut self, handle: RenderHandle, sprite: Option<&str>) {
        self.push(Call::Sprite(handle, sprite.map(str::to_owned)));
    }

    fn set_zone_colors(&mut self, handle: RenderHandle, colors: ZoneColors) {
        self.push(Call::Colors(handle, colors));
    }

    fn set_camera(&mut self, eye: Vec3, target: Vec3) {
        self.push(Call::Camera(eye, target));
    }

    fn set_mask(&mut self, density: f32, blur_px: f32) {
        self.push(Call::Mask(density, blur_px));
    }

    fn set_mask_color(&mut self, color: Rgba) {
        self.push(Call::MaskColor(color));
    }

    fn set_view_size(&mut self, size: ViewSize) {
        self.push(Call::ViewSize(size));
    }

    fn attach_gizmo(&mut self, target: Option<RenderHandle>) {
        self.push(Call::Gizmo(target));
    }

    fn set_orbit_enabled(&mut self, enabled: bool) {
        self.push(Call::Orbit(enabled));
    }

    fn show_fps(&mut self, enabled: bool) {
        self.push(Call::Fps(enabled));
    }

    fn render_frame(&mut self) {
        self.push(Call::Render);
    }

    fn release(&mut self) {
        self.push(Call::Release);
    }
}

/// Clock tweens that also count how often a tween was started.
#[derive(Default)]
pub struct CountingTweens {
    inner: ClockTweens,
    pub starts: usize,
}

impl TweenEngine for CountingTweens {
    fn start(&mut self, spec: TweenSpec, now: Instant) -> TweenId {
        self.starts += 1;
        self.inner.start(spec, now)
    }

    fn sample(&mut self, id: TweenId, now: Instant) -> TweenStep {
        self.inner.sample(id, now)
    }
}

pub type TestEngine = Engine<RecordingBackend, CountingTweens>;

pub fn image(url: &str) -> SceneSource {
    SceneSource {
        url: url.to_string(),
        kind: SourceKind::Image,
    }
}

pub fn scene(id: &str) -> SceneConfig {
    SceneConfig {
        id: id.to_string(),
        source: Some(image(&format!("https://cdn.example/{id}.jpg"))),
        marks: Vec::new(),
    }
}

pub fn point(id: &str, position: Vec3) -> MarkConfig {
    let mut mark = MarkConfig::new_point(position);
    mark.id = id.to_string();
    mark
}

pub fn triangle_zone(id: &str, center: Vec3) -> MarkConfig {
    let mut mark = MarkConfig::new_zone(
        center,
        vec![
            Vec3::new(-10.0, -10.0, 0.0),
            Vec3::new(10.0, -10.0, 0.0),
            Vec3::new(0.0, 20.0, 0.0),
        ],
    );
    mark.id = id.to_string();
    mark
}

pub fn editable() -> GlobalConfig {
    GlobalConfig {
        is_editable: true,
        ..GlobalConfig::default()
    }
}

pub fn engine_with(config: GlobalConfig, scenes: Vec<SceneConfig>) -> TestEngine {
    Engine::new(
        RecordingBackend::default(),
        CountingTweens::default(),
        config,
        scenes,
    )
}

/// Two plain scenes, `s1` and `s2`.
pub fn two_scene_engine(config: GlobalConfig) -> TestEngine {
    engine_with(config, vec![scene("s1"), scene("s2")])
}

/// Run frames until no transition is in flight; returns the time reached.
pub fn settle(engine: &mut TestEngine, mut now: Instant) -> Instant {
    for _ in 0..100 {
        now += Duration::from_millis(50);
        engine.frame(now);
        if !engine.is_transferring() {
            break;
        }
    }
    now
}

/// Enter `scene_id` and let the transition finish.
pub fn enter(engine: &mut TestEngine, scene_id: &str, now: Instant) -> Instant {
    engine.frame(now);
    let _transfer = engine.view_scene(scene_id, None).expect("scene exists");
    settle(engine, now)
}

pub type Recorded = Rc<RefCell<Vec<EngineEvent>>>;

pub fn record(engine: &mut TestEngine, kinds: &[EventKind]) -> Recorded {
    let log: Recorded = Rc::new(RefCell::new(Vec::new()));
    for kind in kinds {
        let sink = log.clone();
        engine.subscribe(*kind, move |e| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });
    }
    log
}

pub fn scene_handle(engine: &TestEngine, scene_id: &str) -> RenderHandle {
    engine.registry().scene(scene_id).expect("scene").handle
}

pub fn mark_handle(engine: &TestEngine, mark_id: &str) -> RenderHandle {
    engine.registry().find_mark(mark_id).expect("mark").1.handle
}

/// A hit on the current scene surface at a world point.
pub fn surface_hit(engine: &TestEngine, scene_id: &str, point: Vec3) -> RawHit {
    RawHit::new(point.length(), point, scene_handle(engine, scene_id))
}

/// A hit on a mark, closer than any surface.
pub fn mark_hit(engine: &TestEngine, mark_id: &str) -> RawHit {
    RawHit::new(10.0, Vec3::new(0.0, 0.0, 10.0), mark_handle(engine, mark_id))
}
