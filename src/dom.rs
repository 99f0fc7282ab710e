use std::rc::Rc;

use pano_core::InputEvent;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::input;
use crate::state::ViewerState;

#[inline]
pub fn window_document() -> Option<web::Document> {
    web::window().and_then(|w| w.document())
}

/// Drop a JS-owned closure after the current call stack unwinds, so a
/// listener can tear itself down.
pub fn drop_later<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move {
        drop(value);
    });
}

/// One `addEventListener` registration, removed again by [`Listener::detach`].
pub struct Listener {
    target: web::EventTarget,
    name: &'static str,
    closure: Closure<dyn FnMut(web::Event)>,
}

impl Listener {
    pub fn attach(
        target: &web::EventTarget,
        name: &'static str,
        handler: impl FnMut(web::Event) + 'static,
    ) -> anyhow::Result<Self> {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web::Event)>);
        target
            .add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
            .map_err(|e| anyhow::anyhow!("addEventListener({name}) failed: {:?}", e))?;
        Ok(Self {
            target: target.clone(),
            name,
            closure,
        })
    }

    pub fn detach(self) {
        _ = self
            .target
            .remove_event_listener_with_callback(self.name, self.closure.as_ref().unchecked_ref());
        drop_later(self.closure);
    }
}

/// Watches the container and feeds its size to the engine, which debounces it.
pub struct ResizeWatch {
    observer: web::ResizeObserver,
    closure: Closure<dyn FnMut(js_sys::Array)>,
}

impl ResizeWatch {
    pub fn observe(container: &web::HtmlElement, state: Rc<ViewerState>) -> anyhow::Result<Self> {
        let target = container.clone();
        let closure = Closure::wrap(Box::new(move |_entries: js_sys::Array| {
            if let Some(size) = input::view_size_from_offset(target.offset_width(), target.offset_height()) {
                state.input(InputEvent::Resize(size));
            }
        }) as Box<dyn FnMut(js_sys::Array)>);
        let observer = web::ResizeObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| anyhow::anyhow!("ResizeObserver: {:?}", e))?;
        observer.observe(container);
        Ok(Self { observer, closure })
    }

    pub fn disconnect(self) {
        self.observer.disconnect();
        drop_later(self.closure);
    }
}

/// Everything registered on the page for one viewer.
#[derive(Default)]
pub struct DomBindings {
    pub listeners: Vec<Listener>,
    pub resize: Option<ResizeWatch>,
}

impl DomBindings {
    pub fn detach(self) {
        for listener in self.listeners {
            listener.detach();
        }
        if let Some(resize) = self.resize {
            resize.disconnect();
        }
    }
}
