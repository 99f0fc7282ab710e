use std::rc::Rc;

use glam::Vec2;
use pano_core::{Button, InputEvent, Modifiers, RawHit};
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::dom::{DomBindings, Listener};
use crate::input;
use crate::state::ViewerState;

#[derive(Clone)]
pub struct PointerWiring {
    pub surface: web::HtmlElement,
    pub state: Rc<ViewerState>,
}

pub fn wire_pointer_handlers(w: &PointerWiring, bindings: &mut DomBindings) -> anyhow::Result<()> {
    bindings.listeners.push(wire_pointermove(w)?);
    bindings.listeners.push(wire_click(w)?);
    bindings.listeners.push(wire_mousedown(w)?);
    Ok(())
}

fn modifiers_of(ev: &web::MouseEvent) -> Modifiers {
    Modifiers {
        shift: ev.shift_key(),
        ctrl: ev.ctrl_key(),
        alt: ev.alt_key(),
        meta: ev.meta_key(),
    }
}

/// Ranked hits under the pointer. The renderer's own raycaster wins when it
/// has one; otherwise the engine picks analytically.
fn hits_under(w: &PointerWiring, ev: &web::MouseEvent) -> Option<Vec<RawHit>> {
    let rect = w.surface.get_bounding_client_rect();
    let ndc = input::ndc_from_client(
        Vec2::new(ev.client_x() as f32, ev.client_y() as f32),
        Vec2::new(rect.left() as f32, rect.top() as f32),
        Vec2::new(rect.width() as f32, rect.height() as f32),
    )?;
    w.state.peek_engine(|engine| {
        engine
            .backend()
            .raycast(ndc)
            .unwrap_or_else(|| engine.pick(ndc))
    })
}

fn wire_pointermove(w: &PointerWiring) -> anyhow::Result<Listener> {
    let w_move = w.clone();
    Listener::attach(&w.surface, "pointermove", move |ev: web::Event| {
        let ev: web::MouseEvent = ev.unchecked_into();
        if let Some(hits) = hits_under(&w_move, &ev) {
            w_move.state.input(InputEvent::PointerMove { hits });
        }
    })
}

fn wire_click(w: &PointerWiring) -> anyhow::Result<Listener> {
    let w_click = w.clone();
    Listener::attach(&w.surface, "click", move |ev: web::Event| {
        let ev: web::MouseEvent = ev.unchecked_into();
        if let Some(hits) = hits_under(&w_click, &ev) {
            w_click.state.input(InputEvent::Click { hits });
        }
    })
}

fn wire_mousedown(w: &PointerWiring) -> anyhow::Result<Listener> {
    let w_down = w.clone();
    Listener::attach(&w.surface, "mousedown", move |ev: web::Event| {
        let ev: web::MouseEvent = ev.unchecked_into();
        let Some(button) = Button::from_dom(ev.button()) else {
            return;
        };
        if let Some(hits) = hits_under(&w_down, &ev) {
            w_down.state.input(InputEvent::PointerDown {
                hits,
                button,
                modifiers: modifiers_of(&ev),
            });
        }
    })
}
