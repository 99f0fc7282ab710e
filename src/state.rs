use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use fnv::FnvHashMap;
use instant::Instant;
use pano_core::{Engine, EngineEvent, EventKind, InputEvent, SubscriptionId};
use wasm_bindgen::JsValue;

use crate::backend::JsBackend;
use crate::bridge;

pub type WebEngine = Engine<JsBackend>;

struct JsListeners {
    subscription: SubscriptionId,
    callbacks: Vec<js_sys::Function>,
}

/// Engine plus the JS-facing event plumbing, shared by the DOM closures and
/// the `PanoramaViewer` handle.
///
/// Core listeners only push into `outbox`; JS callbacks run from [`flush`]
/// once the engine borrow is released, so they may call back into the viewer.
///
/// [`flush`]: ViewerState::flush
pub struct ViewerState {
    engine: RefCell<Option<WebEngine>>,
    outbox: Rc<RefCell<VecDeque<EngineEvent>>>,
    js_listeners: RefCell<FnvHashMap<EventKind, JsListeners>>,
}

impl ViewerState {
    pub fn new(engine: WebEngine) -> Rc<Self> {
        Rc::new(Self {
            engine: RefCell::new(Some(engine)),
            outbox: Rc::new(RefCell::new(VecDeque::new())),
            js_listeners: RefCell::new(FnvHashMap::default()),
        })
    }

    /// Run `f` on the engine, then deliver whatever it emitted. `None` once
    /// destroyed, or when called re-entrantly from inside the renderer.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut WebEngine) -> T) -> Option<T> {
        let out = {
            let Ok(mut engine) = self.engine.try_borrow_mut() else {
                log::warn!("[viewer] engine busy, call dropped");
                return None;
            };
            engine.as_mut().map(f)
        };
        self.flush();
        out
    }

    pub fn peek_engine<T>(&self, f: impl FnOnce(&WebEngine) -> T) -> Option<T> {
        let engine = self.engine.try_borrow().ok()?;
        engine.as_ref().map(f)
    }

    pub fn input(&self, event: InputEvent) {
        if let Some(Err(e)) = self.with_engine(|engine| engine.handle_input(event, Instant::now())) {
            log::warn!("[input] interaction dropped: {e}");
        }
    }

    pub fn frame(&self) {
        self.with_engine(|engine| engine.frame(Instant::now()));
    }

    pub fn on(&self, kind: EventKind, callback: js_sys::Function) {
        let mut listeners = self.js_listeners.borrow_mut();
        if let Some(existing) = listeners.get_mut(&kind) {
            existing.callbacks.push(callback);
            return;
        }
        let outbox = self.outbox.clone();
        let subscription = {
            let Ok(mut engine) = self.engine.try_borrow_mut() else {
                log::warn!("[viewer] engine busy, on({}) dropped", kind.name());
                return;
            };
            let Some(engine) = engine.as_mut() else {
                return;
            };
            engine.subscribe(kind, move |event: &EngineEvent| {
                outbox.borrow_mut().push_back(event.clone());
                Ok(())
            })
        };
        listeners.insert(
            kind,
            JsListeners {
                subscription,
                callbacks: vec![callback],
            },
        );
    }

    pub fn off(&self, kind: EventKind) {
        let Some(removed) = self.js_listeners.borrow_mut().remove(&kind) else {
            return;
        };
        if let Ok(mut engine) = self.engine.try_borrow_mut() {
            if let Some(engine) = engine.as_mut() {
                engine.unsubscribe(removed.subscription);
            }
        }
        self.outbox.borrow_mut().retain(|event| event.kind() != kind);
    }

    /// Deliver queued events to JS callbacks, in emission order.
    pub fn flush(&self) {
        loop {
            let Some(event) = self.outbox.borrow_mut().pop_front() else {
                break;
            };
            let kind = event.kind();
            let callbacks = match self.js_listeners.borrow().get(&kind) {
                Some(listeners) => listeners.callbacks.clone(),
                None => continue,
            };
            let payload = match event
                .payload_json()
                .map_err(anyhow::Error::from)
                .and_then(|value| bridge::to_js(&value))
            {
                Ok(payload) => payload,
                Err(e) => {
                    log::error!("[bus] could not convert {} payload: {e}", kind.name());
                    continue;
                }
            };
            for callback in callbacks {
                if let Err(e) = callback.call1(&JsValue::NULL, &payload) {
                    log::error!("[bus] listener for {} threw: {:?}", kind.name(), e);
                }
            }
        }
    }

    /// Tear the engine down and forget every JS callback. Idempotent.
    pub fn destroy(&self) {
        let engine = match self.engine.try_borrow_mut() {
            Ok(mut engine) => engine.take(),
            Err(_) => {
                log::error!("[viewer] destroy while the engine is in use");
                return;
            }
        };
        self.js_listeners.borrow_mut().clear();
        self.outbox.borrow_mut().clear();
        if let Some(engine) = engine {
            engine.destroy();
        }
    }
}
