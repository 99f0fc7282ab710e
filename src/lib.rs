#![cfg(target_arch = "wasm32")]
use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use pano_core::{
    Engine, EngineResult, EventKind, GlobalConfig, InputEvent, MarkEdit, SceneConfig,
    SceneSource, Transfer, ViewSize,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;
use web_sys as web;

mod backend;
mod bridge;
mod dom;
mod events;
mod frame;
mod input;
mod state;

pub use backend::JsRenderer;

use backend::JsBackend;
use dom::{DomBindings, ResizeWatch};
use frame::FrameLoop;
use state::{ViewerState, WebEngine};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("pano-web loaded");
    Ok(())
}

/// Closures handed to the renderer's transform gizmo.
struct GizmoHooks {
    dragging: Closure<dyn FnMut(bool)>,
    moved: Closure<dyn FnMut(f32, f32, f32)>,
}

impl GizmoHooks {
    fn bind(state: &Rc<ViewerState>) -> Self {
        let state_drag = state.clone();
        let dragging = Closure::wrap(Box::new(move |active: bool| {
            state_drag.input(InputEvent::GizmoDragging(active));
        }) as Box<dyn FnMut(bool)>);
        let state_move = state.clone();
        let moved = Closure::wrap(Box::new(move |x: f32, y: f32, z: f32| {
            state_move.input(InputEvent::GizmoMoved {
                position: Vec3::new(x, y, z),
            });
        }) as Box<dyn FnMut(f32, f32, f32)>);
        _ = state.peek_engine(|engine| {
            engine.backend().bind_gizmo(
                dragging.as_ref().unchecked_ref(),
                moved.as_ref().unchecked_ref(),
            )
        });
        Self { dragging, moved }
    }

    fn release(self) {
        dom::drop_later(self.dragging);
        dom::drop_later(self.moved);
    }
}

struct Teardown {
    frames: FrameLoop,
    bindings: DomBindings,
    gizmo: GizmoHooks,
    surface: web::HtmlElement,
}

/// 360° panorama viewer driven by a JS renderer object.
///
/// Transition methods return promises resolving with `"completed"`, `"busy"`
/// or `"degenerate"`; unknown ids reject.
#[wasm_bindgen]
pub struct PanoramaViewer {
    state: Rc<ViewerState>,
    teardown: RefCell<Option<Teardown>>,
}

#[wasm_bindgen]
impl PanoramaViewer {
    #[wasm_bindgen(constructor)]
    pub fn new(
        container: web::HtmlElement,
        renderer: JsRenderer,
        scenes: JsValue,
        config: JsValue,
    ) -> Result<PanoramaViewer, JsValue> {
        Self::build(container, renderer, &scenes, &config).map_err(bridge::js_error)
    }

    /// Add one scene; `undefined` creates an empty one. Returns its config.
    #[wasm_bindgen(js_name = addScene)]
    pub fn add_scene(&self, config: JsValue) -> Result<JsValue, JsValue> {
        let config: SceneConfig = bridge::from_js_opt(&config)
            .map_err(bridge::js_error)?
            .unwrap_or_default();
        let added = self.call(|engine| Ok(engine.add_scene(config)))?;
        bridge::to_js(&added).map_err(bridge::js_error)
    }

    /// Add a scene or an array of scenes.
    #[wasm_bindgen(js_name = addScenes)]
    pub fn add_scenes(&self, configs: JsValue) -> Result<JsValue, JsValue> {
        let value = bridge::json_value(&configs).map_err(bridge::js_error)?;
        let configs: Vec<SceneConfig> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value),
            serde_json::Value::Null => Ok(Vec::new()),
            single => serde_json::from_value(single).map(|c| vec![c]),
        }
        .map_err(bridge::js_error)?;
        let added = self.call(|engine| Ok(engine.add_scenes(configs)))?;
        bridge::to_js(&added).map_err(bridge::js_error)
    }

    /// Resolves once the fallback transition (if the current scene was
    /// removed) settles.
    #[wasm_bindgen(js_name = removeScene)]
    pub fn remove_scene(&self, id: &str) -> js_sys::Promise {
        self.transfer_promise(|engine| {
            engine.remove_scene(id).map(|fallback| {
                fallback.unwrap_or_else(|| Transfer::ready(pano_core::TransferOutcome::Completed))
            })
        })
    }

    #[wasm_bindgen(js_name = changeSceneMaterial)]
    pub fn change_scene_material(&self, id: &str, source: JsValue) -> Result<(), JsValue> {
        let source: Option<SceneSource> = bridge::from_js_opt(&source).map_err(bridge::js_error)?;
        self.call(|engine| engine.change_scene_material(id, source))
    }

    #[wasm_bindgen(js_name = changeViewSize)]
    pub fn change_view_size(&self, width: u32, height: u32) -> Result<(), JsValue> {
        self.call(|engine| {
            engine.change_view_size(ViewSize::new(width, height));
            Ok(())
        })
    }

    /// `duration` in milliseconds; defaults to the configured transfer time.
    #[wasm_bindgen(js_name = viewScene)]
    pub fn view_scene(&self, id: &str, duration: Option<f64>) -> js_sys::Promise {
        let duration = input::duration_from_ms(duration);
        self.transfer_promise(|engine| engine.view_scene(id, duration))
    }

    #[wasm_bindgen(js_name = viewFirstScene)]
    pub fn view_first_scene(&self) -> js_sys::Promise {
        self.transfer_promise(|engine| Ok(engine.view_first_scene()))
    }

    /// `duration` in milliseconds; defaults to 500.
    #[wasm_bindgen(js_name = viewMark)]
    pub fn view_mark(&self, id: &str, duration: Option<f64>) -> js_sys::Promise {
        let duration = input::duration_from_ms(duration);
        self.transfer_promise(|engine| engine.view_mark(id, duration))
    }

    #[wasm_bindgen(js_name = selectMark)]
    pub fn select_mark(&self, id: &str) -> Result<(), JsValue> {
        self.call(|engine| engine.select_mark(id))
    }

    #[wasm_bindgen(js_name = removeSceneMark)]
    pub fn remove_scene_mark(&self, id: &str) -> Result<(), JsValue> {
        self.call(|engine| engine.remove_scene_mark(id))
    }

    /// Apply a mark edit from the host: `id` plus any of `scale`,
    /// `pointSpriteUrl`, `zoneBorderColor`, `zoneFillColor`. `false` when
    /// nothing changed.
    #[wasm_bindgen(js_name = editMark)]
    pub fn edit_mark(&self, edit: JsValue) -> Result<bool, JsValue> {
        let edit: MarkEdit = bridge::from_js_opt(&edit)
            .map_err(bridge::js_error)?
            .ok_or_else(|| bridge::js_error("editMark needs at least a mark id"))?;
        self.call(|engine| engine.edit_mark(edit))
    }

    #[wasm_bindgen(js_name = getAllConfigs)]
    pub fn get_all_configs(&self) -> Result<JsValue, JsValue> {
        let configs = self.call(|engine| Ok(engine.get_all_configs()))?;
        bridge::to_js(&configs).map_err(bridge::js_error)
    }

    /// Subscribe a JS callback to an outbound event (`changed`,
    /// `selectedMark`, ...). Callbacks receive the JSON payload.
    pub fn on(&self, event: &str, callback: js_sys::Function) -> Result<(), JsValue> {
        let kind = EventKind::from_name(event)
            .ok_or_else(|| bridge::js_error(format!("unknown event '{event}'")))?;
        self.state.on(kind, callback);
        Ok(())
    }

    /// Drop every JS callback for `event`.
    pub fn off(&self, event: &str) {
        match EventKind::from_name(event) {
            Some(kind) => self.state.off(kind),
            None => log::warn!("[viewer] off: unknown event '{event}'"),
        }
    }

    /// Push an inbound command: `addScene`, `editScene`, `removeScene`,
    /// `editMark` or `removeMark`.
    pub fn emit(&self, event: &str, payload: JsValue) -> Result<(), JsValue> {
        let inbound = bridge::json_value(&payload)
            .and_then(|value| input::parse_inbound(event, value))
            .map_err(bridge::js_error)?;
        self.call(|engine| engine.receive(inbound))
    }

    /// Stop the frame loop, remove DOM listeners and release the renderer.
    pub fn destroy(&self) {
        let Some(teardown) = self.teardown.borrow_mut().take() else {
            return;
        };
        teardown.frames.stop();
        teardown.bindings.detach();
        teardown.gizmo.release();
        self.state.destroy();
        teardown.surface.remove();
        log::info!("[viewer] destroyed");
    }
}

impl PanoramaViewer {
    fn build(
        container: web::HtmlElement,
        renderer: JsRenderer,
        scenes: &JsValue,
        config: &JsValue,
    ) -> anyhow::Result<Self> {
        let config = match bridge::from_js_opt::<serde_json::Value>(config)? {
            Some(value) => GlobalConfig::from_json(&value.to_string())?,
            None => GlobalConfig::default(),
        };
        let scenes: Vec<SceneConfig> = bridge::from_js_opt(scenes)?.unwrap_or_default();

        let surface = renderer.dom_element();
        container
            .append_child(&surface)
            .map_err(|e| anyhow::anyhow!("append renderer element: {:?}", e))?;

        let mut engine: WebEngine = Engine::with_clock(JsBackend::new(renderer), config, scenes);
        if let Some(size) =
            input::view_size_from_offset(container.offset_width(), container.offset_height())
        {
            engine.change_view_size(size);
        }
        let state = ViewerState::new(engine);

        let mut bindings = DomBindings::default();
        let wiring = events::pointer::PointerWiring {
            surface: surface.clone(),
            state: state.clone(),
        };
        events::pointer::wire_pointer_handlers(&wiring, &mut bindings)?;
        events::keyboard::wire_keyboard_and_wheel(&surface, &state, &mut bindings)?;
        bindings.resize = Some(ResizeWatch::observe(&container, state.clone())?);
        let gizmo = GizmoHooks::bind(&state);

        let state_frame = state.clone();
        let frames = FrameLoop::start(move || state_frame.frame())?;

        log::info!("[viewer] ready");
        Ok(Self {
            state,
            teardown: RefCell::new(Some(Teardown {
                frames,
                bindings,
                gizmo,
                surface,
            })),
        })
    }

    fn call<T>(&self, f: impl FnOnce(&mut WebEngine) -> EngineResult<T>) -> Result<T, JsValue> {
        match self.state.with_engine(f) {
            Some(result) => result.map_err(bridge::js_error),
            None => Err(bridge::js_error("viewer destroyed")),
        }
    }

    fn transfer_promise(
        &self,
        f: impl FnOnce(&mut WebEngine) -> EngineResult<Transfer>,
    ) -> js_sys::Promise {
        match self.call(f) {
            Ok(transfer) => future_to_promise(async move {
                let outcome = transfer.await;
                Ok(JsValue::from_str(bridge::outcome_name(outcome)))
            }),
            Err(e) => js_sys::Promise::reject(&e),
        }
    }
}
