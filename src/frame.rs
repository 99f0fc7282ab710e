use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::dom;

/// A `requestAnimationFrame` loop that can be stopped, including from inside
/// its own frame callback.
pub struct FrameLoop {
    window: web::Window,
    running: Rc<Cell<bool>>,
    request: Rc<Cell<Option<i32>>>,
    tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
}

impl FrameLoop {
    pub fn start(mut on_frame: impl FnMut() + 'static) -> anyhow::Result<Self> {
        let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
        let running = Rc::new(Cell::new(true));
        let request = Rc::new(Cell::new(None::<i32>));
        let tick: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

        let tick_clone = tick.clone();
        let running_tick = running.clone();
        let request_tick = request.clone();
        let window_tick = window.clone();
        *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            request_tick.set(None);
            if !running_tick.get() {
                return;
            }
            on_frame();
            // on_frame may have stopped the loop
            if !running_tick.get() {
                return;
            }
            if let Some(cb) = tick_clone.borrow().as_ref() {
                request_tick.set(
                    window_tick
                        .request_animation_frame(cb.as_ref().unchecked_ref())
                        .ok(),
                );
            }
        }) as Box<dyn FnMut()>));

        if let Some(cb) = tick.borrow().as_ref() {
            request.set(
                window
                    .request_animation_frame(cb.as_ref().unchecked_ref())
                    .ok(),
            );
        }
        Ok(Self {
            window,
            running,
            request,
            tick,
        })
    }

    pub fn stop(&self) {
        self.running.set(false);
        if let Some(id) = self.request.take() {
            _ = self.window.cancel_animation_frame(id);
        }
        // The closure holds a handle to itself; dropping it breaks the cycle.
        if let Some(cb) = self.tick.borrow_mut().take() {
            dom::drop_later(cb);
        }
    }
}
