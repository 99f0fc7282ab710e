//! The engine façade: owns the registry, interaction state and transitions,
//! and drives the render backend once per frame.

use std::time::Duration;

use glam::{Vec2, Vec3};
use instant::Instant;

use crate::camera::CameraRig;
use crate::color::ZoneColors;
use crate::config::{GlobalConfig, MarkConfig, MarkEdit, MarkKind, SceneConfig, SceneSource};
use crate::constants::{
    CAMERA_LEG_RATIO, DEFAULT_MARK_FOCUS_MS, DEFAULT_ZONE_BORDER_COLOR, DEFAULT_ZONE_FILL_COLOR,
    FOCUS_OFFSET, FOG_PEAK_BLUR_PX, FOG_PEAK_DENSITY, MARK_MOVE_THROTTLE_MS, MAX_TRANSFER_SECS,
    RESIZE_DEBOUNCE_MS, WHEEL_SCALE_FACTOR,
};
use crate::dispatch::{resolve_event_source, Dispatcher, Intent, PointerKind};
use crate::error::{Capacity, EngineError, EngineResult};
use crate::events::{
    AddedMark, EngineEvent, EventBus, EventKind, InboundEvent, InputEvent, SubscriptionId,
    ZoneKeyAction,
};
use crate::geometry::{line_intersect_sphere, nearer_to, round2};
use crate::pick;
use crate::registry::{EntityTag, MarkEntry, Registry, SceneEntry};
use crate::render::{RawHit, RenderBackend, RenderHandle, ViewSize};
use crate::selection::{gizmo_target, Selection};
use crate::timing::{Debouncer, Throttle};
use crate::transition::{
    CameraPath, ClockTweens, Completion, Easing, Finished, Orchestrator, Transfer,
    TransferOutcome, TransitionKind, TweenEngine, TweenSpec,
};
use crate::zone::ZoneDraft;

/// Fallback to the first scene, queued because the current scene was removed
/// while another transition was in flight.
struct PendingFallback {
    waiters: Vec<Completion>,
    started: Option<Transfer>,
}

impl PendingFallback {
    fn settle(self, outcome: TransferOutcome) {
        for waiter in self.waiters {
            waiter.resolve(outcome);
        }
    }
}

/// Caller durations are capped so tween arithmetic cannot overflow.
fn capped(duration: Duration) -> Duration {
    duration.min(Duration::from_secs(MAX_TRANSFER_SECS))
}

pub struct Engine<R: RenderBackend, T: TweenEngine = ClockTweens> {
    backend: R,
    tweens: T,
    config: GlobalConfig,
    registry: Registry,
    bus: EventBus,
    dispatcher: Dispatcher,
    selection: Selection,
    draft: ZoneDraft,
    preview: Option<RenderHandle>,
    orchestrator: Orchestrator,
    fallback: Option<PendingFallback>,
    camera: CameraRig,
    current_scene: Option<String>,
    resize: Debouncer<ViewSize>,
    mark_moves: Throttle<(String, Vec3)>,
    /// Latest timestamp seen; transitions start from here.
    clock: Instant,
    inited: bool,
}

impl<R: RenderBackend> Engine<R, ClockTweens> {
    pub fn with_clock(backend: R, config: GlobalConfig, scenes: Vec<SceneConfig>) -> Self {
        Self::new(backend, ClockTweens::new(), config, scenes)
    }
}

impl<R: RenderBackend, T: TweenEngine> Engine<R, T> {
    pub fn new(mut backend: R, tweens: T, config: GlobalConfig, scenes: Vec<SceneConfig>) -> Self {
        backend.show_fps(config.is_show_fps);
        backend.set_mask_color(config.mask_color());
        let camera = CameraRig::default();
        backend.set_camera(camera.eye, camera.target);

        let mut registry = Registry::new(config.max_marks());
        for scene in scenes {
            registry.add_scene(&mut backend, scene);
        }
        log::info!(
            "[engine] created: scenes={} editable={} transfer={:?}",
            registry.scenes().len(),
            config.is_editable,
            config.transfer_duration()
        );

        Self {
            backend,
            tweens,
            registry,
            bus: EventBus::new(),
            dispatcher: Dispatcher::new(),
            selection: Selection::default(),
            draft: ZoneDraft::Idle,
            preview: None,
            orchestrator: Orchestrator::default(),
            fallback: None,
            camera,
            current_scene: None,
            resize: Debouncer::new(Duration::from_millis(RESIZE_DEBOUNCE_MS)),
            mark_moves: Throttle::new(Duration::from_millis(MARK_MOVE_THROTTLE_MS)),
            clock: Instant::now(),
            inited: false,
            config,
        }
    }

    // ---------------- accessors ----------------

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn backend(&self) -> &R {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut R {
        &mut self.backend
    }

    pub fn tweens(&self) -> &T {
        &self.tweens
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn draft(&self) -> &ZoneDraft {
        &self.draft
    }

    pub fn preview_handle(&self) -> Option<RenderHandle> {
        self.preview
    }

    pub fn current_scene_id(&self) -> Option<&str> {
        self.current_scene.as_deref()
    }

    pub fn current_scene(&self) -> Option<&SceneEntry> {
        self.current_scene
            .as_deref()
            .and_then(|id| self.registry.scene(id))
    }

    pub fn selected_mark_id(&self) -> Option<&str> {
        self.selection.mark_id()
    }

    pub fn is_transferring(&self) -> bool {
        self.orchestrator.is_transferring()
    }

    // ---------------- subscriptions ----------------

    pub fn subscribe(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(kind, Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn unsubscribe_all(&mut self, kind: EventKind) {
        self.bus.unsubscribe_all(kind);
    }

    // ---------------- scenes ----------------

    pub fn add_scene(&mut self, config: SceneConfig) -> SceneConfig {
        let added = self.registry.add_scene(&mut self.backend, config).config();
        log::info!("[registry] added scene {}", added.id);
        self.bus.emit(&EngineEvent::AddedScene(added.clone()));
        self.emit_changed();
        added
    }

    pub fn add_scenes(&mut self, configs: Vec<SceneConfig>) -> Vec<SceneConfig> {
        let mut added = Vec::with_capacity(configs.len());
        for config in configs {
            let scene = self.registry.add_scene(&mut self.backend, config).config();
            self.bus.emit(&EngineEvent::AddedScene(scene.clone()));
            added.push(scene);
        }
        if !added.is_empty() {
            self.emit_changed();
        }
        added
    }

    /// Remove a scene. If it was current, navigation falls back to the first
    /// remaining scene and the returned transfer tracks that move. While
    /// another transition is running the fallback waits for it to finish.
    pub fn remove_scene(&mut self, id: &str) -> EngineResult<Option<Transfer>> {
        if self.registry.scene(id).is_none() {
            return Err(EngineError::scene_not_found(id));
        }
        let was_current = self.current_scene.as_deref() == Some(id);
        if was_current {
            self.clear_draft();
        }
        let removed = self.registry.remove_scene(&mut self.backend, id)?;
        for mark in &removed.marks {
            self.dispatcher.forget(mark.handle);
        }
        let selected_removed = self
            .selection
            .mark_id()
            .is_some_and(|sel| removed.mark(sel).is_some());
        if selected_removed {
            self.set_selection(None);
        }
        log::info!("[registry] removed scene {} ({} marks)", id, removed.marks.len());
        self.emit_changed();

        if !was_current {
            return Ok(None);
        }
        self.current_scene = None;
        let transfer = self.view_first_scene();
        if transfer.peek() != Some(TransferOutcome::Busy) {
            return Ok(Some(transfer));
        }
        log::info!("[transfer] fallback to the first scene queued");
        let (transfer, completion) = Transfer::pending();
        let fallback = self.fallback.get_or_insert_with(|| PendingFallback {
            waiters: Vec::new(),
            started: None,
        });
        // a fallback already flying may be heading to the scene just removed
        fallback.started = None;
        fallback.waiters.push(completion);
        Ok(Some(transfer))
    }

    pub fn change_scene_material(&mut self, id: &str, source: Option<SceneSource>) -> EngineResult<()> {
        self.registry.change_scene_source(&mut self.backend, id, source)?;
        self.emit_changed();
        Ok(())
    }

    pub fn change_view_size(&mut self, size: ViewSize) {
        self.camera.set_view_size(size);
        self.backend.set_view_size(size);
    }

    pub fn get_all_configs(&self) -> Vec<SceneConfig> {
        self.registry.snapshot()
    }

    // ---------------- transitions ----------------

    /// Fly to a scene. Resolves `Busy` at once, without side effects, while
    /// another transition is running.
    pub fn view_scene(&mut self, id: &str, duration: Option<Duration>) -> EngineResult<Transfer> {
        if self.registry.scene(id).is_none() {
            return Err(EngineError::scene_not_found(id));
        }
        if self.orchestrator.is_transferring() {
            log::warn!("[transfer] busy, dropping viewScene({})", id);
            return Ok(Transfer::ready(TransferOutcome::Busy));
        }
        let duration = duration.map_or_else(|| self.config.transfer_duration(), capped);
        let previous = self.current_scene.clone();
        if previous.as_deref() != Some(id) {
            self.clear_draft();
        }

        let show = self.registry.show_scene(&mut self.backend, id)?;
        self.current_scene = Some(id.to_string());
        let path = CameraPath {
            from_eye: self.camera.eye,
            to_eye: show,
            from_target: self.camera.target,
            to_target: show + FOCUS_OFFSET,
        };
        let camera_spec = TweenSpec {
            duration: duration.mul_f32(CAMERA_LEG_RATIO),
            easing: Easing::QuadraticOut,
            yoyo: false,
        };
        let mask_spec = TweenSpec {
            duration,
            easing: Easing::CubicOut,
            yoyo: true,
        };
        let kind = TransitionKind::Scene {
            scene_id: id.to_string(),
            previous,
        };
        log::info!("[transfer] scene -> {} over {:?}", id, duration);
        Ok(self
            .orchestrator
            .begin(&mut self.tweens, self.clock, kind, path, camera_spec, Some(mask_spec))
            .unwrap_or_else(|| Transfer::ready(TransferOutcome::Busy)))
    }

    /// View the first scene, or nothing when there are none.
    pub fn view_first_scene(&mut self) -> Transfer {
        let Some(first) = self.registry.first_scene_id().map(str::to_owned) else {
            self.current_scene = None;
            return Transfer::ready(TransferOutcome::Completed);
        };
        match self.view_scene(&first, None) {
            Ok(transfer) => transfer,
            Err(e) => {
                log::error!("[transfer] first scene vanished: {}", e);
                Transfer::ready(TransferOutcome::Degenerate)
            }
        }
    }

    /// Swing the camera around the orbit focus so it lines up with a mark of
    /// the current scene, keeping the orbit radius.
    pub fn view_mark(&mut self, id: &str, duration: Option<Duration>) -> EngineResult<Transfer> {
        let mark_world = self
            .current_scene()
            .and_then(|scene| scene.mark(id).map(|m| scene.origin + m.config.position))
            .ok_or_else(|| EngineError::mark_not_found(id))?;
        if self.orchestrator.is_transferring() {
            log::warn!("[transfer] busy, dropping viewMark({})", id);
            return Ok(Transfer::ready(TransferOutcome::Busy));
        }
        let duration = duration.map_or(Duration::from_millis(DEFAULT_MARK_FOCUS_MS), capped);
        let focus = self.camera.target;
        let radius = self.camera.orbit_radius();
        let Some((a, b)) = line_intersect_sphere(mark_world, focus, focus, radius) else {
            log::warn!("[transfer] no camera placement for mark {}", id);
            return Ok(Transfer::ready(TransferOutcome::Degenerate));
        };
        let path = CameraPath {
            from_eye: self.camera.eye,
            to_eye: nearer_to(mark_world, a, b),
            from_target: focus,
            to_target: focus,
        };
        let camera_spec = TweenSpec {
            duration: duration.mul_f32(CAMERA_LEG_RATIO),
            easing: Easing::QuadraticOut,
            yoyo: false,
        };
        let kind = TransitionKind::Mark {
            mark_id: id.to_string(),
        };
        Ok(self
            .orchestrator
            .begin(&mut self.tweens, self.clock, kind, path, camera_spec, None)
            .unwrap_or_else(|| Transfer::ready(TransferOutcome::Busy)))
    }

    // ---------------- marks ----------------

    /// Attach the gizmo to a mark of the current scene.
    pub fn select_mark(&mut self, id: &str) -> EngineResult<()> {
        let found = self
            .current_scene()
            .is_some_and(|scene| scene.mark(id).is_some());
        if !found {
            return Err(EngineError::mark_not_found(id));
        }
        self.set_selection(Some(id.to_string()));
        Ok(())
    }

    pub fn remove_scene_mark(&mut self, id: &str) -> EngineResult<()> {
        let removed = self.registry.remove_mark(&mut self.backend, id)?;
        self.dispatcher.forget(removed.handle);
        if self.selection.is_selected(id) {
            self.set_selection(None);
        }
        self.emit_changed();
        Ok(())
    }

    /// Apply a partial mark edit from the host. Returns whether it changed
    /// anything. A full [`MarkConfig`] converts into an edit of every field.
    pub fn edit_mark(&mut self, edit: impl Into<MarkEdit>) -> EngineResult<bool> {
        let edit = edit.into();
        let changed = self.registry.edit_mark(&mut self.backend, &edit)?;
        if changed {
            self.emit_changed();
        }
        Ok(changed)
    }

    pub fn receive(&mut self, event: InboundEvent) -> EngineResult<()> {
        match event {
            InboundEvent::AddScene(config) => {
                self.add_scene(config.unwrap_or_default());
                Ok(())
            }
            InboundEvent::EditScene { id, source } => self.change_scene_material(&id, source),
            InboundEvent::RemoveScene(id) => self.remove_scene(&id).map(|_| ()),
            InboundEvent::EditMark(edit) => self.edit_mark(edit).map(|_| ()),
            InboundEvent::RemoveMark(id) => self.remove_scene_mark(&id),
        }
    }

    // ---------------- input ----------------

    /// Software raycast through normalized device coordinates.
    pub fn pick(&self, ndc: Vec2) -> Vec<RawHit> {
        pick::pick(&self.registry, &self.camera, ndc)
    }

    /// Feed one input event. `Err(Desync)` means a hit referenced a mark the
    /// current scene does not own; the interaction is dropped.
    pub fn handle_input(&mut self, event: InputEvent, now: Instant) -> EngineResult<()> {
        self.clock = self.clock.max(now);
        match event {
            InputEvent::PointerMove { hits } => self.dispatch_pointer(PointerKind::Move, &hits),
            InputEvent::Click { hits } => self.dispatch_pointer(PointerKind::Click, &hits),
            InputEvent::PointerDown {
                hits,
                button,
                modifiers,
            } => self.dispatch_pointer(PointerKind::Down { button, modifiers }, &hits),
            InputEvent::KeyDown { key, modifiers } => {
                match ZoneKeyAction::from_key_down(&key, modifiers) {
                    Some(action) => self.apply_zone_key(action),
                    None => Ok(()),
                }
            }
            InputEvent::KeyUp { key, .. } => match ZoneKeyAction::from_key_up(&key) {
                Some(action) => self.apply_zone_key(action),
                None => Ok(()),
            },
            InputEvent::Wheel { delta_y } => {
                self.scale_selected(delta_y);
                Ok(())
            }
            InputEvent::GizmoDragging(dragging) => {
                self.backend.set_orbit_enabled(!dragging);
                Ok(())
            }
            InputEvent::GizmoMoved { position } => {
                if let Some(id) = self.selection.mark_id() {
                    self.mark_moves.push((id.to_string(), position), now);
                }
                Ok(())
            }
            InputEvent::Resize(size) => {
                self.resize.push(size, now);
                Ok(())
            }
        }
    }

    fn dispatch_pointer(&mut self, kind: PointerKind, hits: &[RawHit]) -> EngineResult<()> {
        let source = resolve_event_source(hits, &self.registry);
        let intents = self
            .dispatcher
            .dispatch(kind, source.as_ref(), self.config.is_editable);
        for intent in intents {
            self.apply_intent(intent)?;
        }
        Ok(())
    }

    fn apply_intent(&mut self, intent: Intent) -> EngineResult<()> {
        match intent {
            Intent::HoverEnter(handle) => {
                if self.is_zone(handle) {
                    self.backend
                        .set_zone_colors(handle, self.config.hover_colors());
                }
            }
            Intent::HoverLeave(handle) => {
                let colors = self
                    .mark_by_handle(handle)
                    .filter(|m| m.config.kind == MarkKind::Zone)
                    .map(|m| m.config.zone_colors());
                if let Some(colors) = colors {
                    self.backend.set_zone_colors(handle, colors);
                }
            }
            Intent::ClickMark(handle) => {
                let config = self.current_mark_by_handle(handle)?.config.clone();
                log::debug!("[dispatch] clicked mark {}", config.id);
                self.bus.emit(&EngineEvent::ClickedMark(config));
            }
            Intent::EndAdjust => self.set_selection(None),
            Intent::BeginAdjust(handle) => {
                let id = self.current_mark_by_handle(handle)?.config.id.clone();
                self.set_selection(Some(id));
            }
            Intent::DrawZonePoint(world) => self.draw_zone_point(world)?,
            Intent::AddPointMark(world) => self.add_point_mark(world)?,
        }
        Ok(())
    }

    fn mark_by_handle(&self, handle: RenderHandle) -> Option<&MarkEntry> {
        match self.registry.tag(handle)? {
            EntityTag::Mark { scene_id, mark_id } => self.registry.scene(scene_id)?.mark(mark_id),
            EntityTag::SceneSurface { .. } => None,
        }
    }

    fn current_mark_by_handle(&self, handle: RenderHandle) -> EngineResult<&MarkEntry> {
        self.current_scene()
            .and_then(|scene| scene.mark_by_handle(handle))
            .ok_or(EngineError::Desync { handle })
    }

    fn is_zone(&self, handle: RenderHandle) -> bool {
        self.mark_by_handle(handle)
            .is_some_and(|m| m.config.kind == MarkKind::Zone)
    }

    fn add_point_mark(&mut self, world: Vec3) -> EngineResult<()> {
        let Some(scene) = self.current_scene() else {
            return Ok(());
        };
        let scene_id = scene.id.clone();
        let local = world - scene.origin;
        self.insert_mark(&scene_id, MarkConfig::new_point(local))
    }

    fn insert_mark(&mut self, scene_id: &str, config: MarkConfig) -> EngineResult<()> {
        let added = self
            .registry
            .add_mark(&mut self.backend, scene_id, config)
            .cloned();
        match added {
            Ok(mark) => {
                log::info!("[registry] added {:?} mark {} to {}", mark.kind, mark.id, scene_id);
                self.set_selection(Some(mark.id.clone()));
                self.bus.emit(&EngineEvent::AddedMark(AddedMark {
                    parent_id: scene_id.to_string(),
                    payload: mark,
                }));
                self.emit_changed();
                Ok(())
            }
            Err(EngineError::CapacityExceeded(capacity)) => {
                self.alarm(capacity);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn draw_zone_point(&mut self, world: Vec3) -> EngineResult<()> {
        let Some(scene) = self.current_scene() else {
            return Ok(());
        };
        let local = world - scene.origin;
        let limit = self.config.max_marks();
        if scene.marks.len() + 1 > limit {
            self.alarm(Capacity::Marks { limit });
            return Ok(());
        }
        if let Err(capacity) = self.draft.add_point(local, self.config.max_zone_points()) {
            self.alarm(capacity);
            return Ok(());
        }
        self.refresh_preview();
        Ok(())
    }

    fn apply_zone_key(&mut self, action: ZoneKeyAction) -> EngineResult<()> {
        match action {
            ZoneKeyAction::StepBack => {
                if self.draft.step_back() {
                    self.refresh_preview();
                }
                Ok(())
            }
            ZoneKeyAction::StepForward => {
                if self.draft.step_forward() {
                    self.refresh_preview();
                }
                Ok(())
            }
            ZoneKeyAction::Commit => self.commit_zone(),
        }
    }

    fn commit_zone(&mut self) -> EngineResult<()> {
        self.dispose_preview();
        let Some((center, points)) = self.draft.commit() else {
            return Ok(());
        };
        let Some(scene_id) = self.current_scene.clone() else {
            return Ok(());
        };
        self.insert_mark(&scene_id, MarkConfig::new_zone(center, points))
    }

    fn refresh_preview(&mut self) {
        self.dispose_preview();
        let Some((center, shape)) = self.draft.preview() else {
            return;
        };
        let Some(scene_handle) = self.current_scene().map(|s| s.handle) else {
            return;
        };
        let colors = ZoneColors::decode(DEFAULT_ZONE_BORDER_COLOR, DEFAULT_ZONE_FILL_COLOR);
        let handle = self.backend.create_zone_mark(&shape, colors);
        self.backend.set_position(handle, center);
        self.backend.attach(handle, scene_handle);
        self.preview = Some(handle);
    }

    fn dispose_preview(&mut self) {
        if let Some(handle) = self.preview.take() {
            self.backend.dispose(handle);
        }
    }

    fn clear_draft(&mut self) {
        self.draft.cancel();
        self.dispose_preview();
    }

    fn scale_selected(&mut self, delta_y: f32) {
        let Some(id) = self.selection.mark_id().map(str::to_owned) else {
            return;
        };
        let Some(before) = self.registry.find_mark(&id).map(|(_, m)| m.config.scale) else {
            return;
        };
        let target = round2((before + delta_y * WHEEL_SCALE_FACTOR).max(0.0));
        let scale = self.config.scale_range().clamp(target);
        if scale == before {
            return;
        }
        if self
            .registry
            .set_mark_scale(&mut self.backend, &id, scale)
            .is_ok()
        {
            self.emit_mark_edited(&id);
        }
    }

    fn apply_mark_move(&mut self, id: &str, position: Vec3) {
        match self.registry.set_mark_position(&mut self.backend, id, position) {
            Ok(true) => {
                self.dispatcher.mark_edited();
                self.emit_mark_edited(id);
            }
            Ok(false) => {}
            Err(_) => log::debug!("[gizmo] moved mark {} no longer exists", id),
        }
    }

    fn set_selection(&mut self, mark_id: Option<String>) {
        let changed = self.selection.select(mark_id);
        self.backend
            .attach_gizmo(gizmo_target(&self.selection, &self.registry));
        if changed {
            let payload = self
                .selection
                .mark_id()
                .and_then(|id| self.registry.find_mark(id))
                .map(|(_, m)| m.config.clone());
            self.bus.emit(&EngineEvent::SelectedMark(payload));
        }
    }

    // ---------------- events ----------------

    fn emit_mark_edited(&mut self, id: &str) {
        if let Some((_, mark)) = self.registry.find_mark(id) {
            let config = mark.config.clone();
            self.bus.emit(&EngineEvent::EditedMark(config));
            self.emit_changed();
        }
    }

    fn emit_changed(&mut self) {
        if !self.bus.has_listeners(EventKind::Changed) {
            return;
        }
        let snapshot = self.registry.snapshot();
        self.bus.emit(&EngineEvent::Changed(snapshot));
    }

    fn alarm(&mut self, capacity: Capacity) {
        let message = capacity.to_string();
        log::warn!("[registry] {}", message);
        self.bus.emit(&EngineEvent::Alarmed(message));
    }

    // ---------------- frame ----------------

    /// Advance one frame: lifecycle events, coalesced inputs, transitions,
    /// then draw.
    pub fn frame(&mut self, now: Instant) {
        self.clock = self.clock.max(now);
        if !self.inited {
            self.inited = true;
            let snapshot = self.registry.snapshot();
            self.bus.emit(&EngineEvent::Inited(snapshot));
        }
        if !self.orchestrator.is_transferring() {
            if let Some((eye, target)) = self.backend.read_camera() {
                self.camera.eye = eye;
                self.camera.target = target;
            }
        }
        if let Some(size) = self.resize.poll(now) {
            self.change_view_size(size);
        }
        if let Some((id, position)) = self.mark_moves.poll(now) {
            self.apply_mark_move(&id, position);
        }
        self.step_transition(now);
        self.poll_fallback();
        self.backend.render_frame();
    }

    fn poll_fallback(&mut self) {
        let Some(mut fallback) = self.fallback.take() else {
            return;
        };
        if fallback.started.is_none() {
            if self.orchestrator.is_transferring() {
                self.fallback = Some(fallback);
                return;
            }
            if self.current_scene.is_none() {
                fallback.started = Some(self.view_first_scene());
            }
        }
        let outcome = match &fallback.started {
            Some(transfer) => transfer.peek(),
            None => Some(TransferOutcome::Completed),
        };
        match outcome {
            Some(outcome) => fallback.settle(outcome),
            None => self.fallback = Some(fallback),
        }
    }

    fn step_transition(&mut self, now: Instant) {
        let frame = self.orchestrator.step(&mut self.tweens, now);
        if let Some((eye, target)) = frame.camera {
            self.camera.eye = eye;
            self.camera.target = target;
            self.backend.set_camera(eye, target);
        }
        if let Some(level) = frame.mask {
            self.backend
                .set_mask(FOG_PEAK_DENSITY * level, FOG_PEAK_BLUR_PX * level);
        }
        if let Some(finished) = frame.finished {
            self.finish_transition(finished);
        }
    }

    fn finish_transition(&mut self, finished: Finished) {
        if let TransitionKind::Scene { scene_id, previous } = &finished.kind {
            match self.registry.reset_scene(&mut self.backend, scene_id) {
                Ok(origin) => {
                    self.camera.reset_to(origin);
                    self.backend.set_camera(self.camera.eye, self.camera.target);
                    self.backend.set_mask(0.0, 0.0);
                    if let Some(prev) = previous.as_deref().filter(|p| *p != scene_id.as_str()) {
                        // the outgoing scene may have been removed while the camera flew
                        if let Err(e) = self.registry.hide_scene(&mut self.backend, prev) {
                            log::warn!("[transfer] previous scene not hidden: {}", e);
                        }
                    }
                    if let Some(scene) = self.registry.scene(scene_id) {
                        let config = scene.config();
                        log::info!("[transfer] switched to {}", scene_id);
                        self.bus.emit(&EngineEvent::SwitchedScene(config));
                    }
                }
                Err(_) => log::warn!("[transfer] scene {} was removed mid-transition", scene_id),
            }
        }
        finished.resolve(TransferOutcome::Completed);
    }

    /// Tear everything down: subscribers, primitives, gizmo and backend.
    pub fn destroy(mut self) {
        self.bus.clear();
        if let Some(finished) = self.orchestrator.abandon() {
            log::info!("[transfer] abandoned {:?} on destroy", finished.kind);
            finished.resolve(TransferOutcome::Completed);
        }
        if let Some(fallback) = self.fallback.take() {
            fallback.settle(TransferOutcome::Completed);
        }
        self.backend.attach_gizmo(None);
        self.dispose_preview();
        self.registry.dispose_all(&mut self.backend);
        self.backend.release();
        log::info!("[engine] destroyed");
    }
}
