use std::rc::Rc;

use pano_core::{InputEvent, Modifiers};
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::dom::{self, DomBindings, Listener};
use crate::input;
use crate::state::ViewerState;

/// Zone drafting keys on the document (Alt+z, Alt+a, Alt up) and the
/// mark-scaling wheel on the render surface.
pub fn wire_keyboard_and_wheel(
    surface: &web::HtmlElement,
    state: &Rc<ViewerState>,
    bindings: &mut DomBindings,
) -> anyhow::Result<()> {
    let document = dom::window_document().ok_or_else(|| anyhow::anyhow!("no document"))?;

    let state_down = state.clone();
    bindings.listeners.push(Listener::attach(&document, "keydown", move |ev: web::Event| {
        let ev: web::KeyboardEvent = ev.unchecked_into();
        state_down.input(InputEvent::KeyDown {
            key: input::key_from_dom(&ev.key()),
            modifiers: key_modifiers(&ev),
        });
    })?);

    let state_up = state.clone();
    bindings.listeners.push(Listener::attach(&document, "keyup", move |ev: web::Event| {
        let ev: web::KeyboardEvent = ev.unchecked_into();
        state_up.input(InputEvent::KeyUp {
            key: input::key_from_dom(&ev.key()),
            modifiers: key_modifiers(&ev),
        });
    })?);

    let state_wheel = state.clone();
    bindings.listeners.push(Listener::attach(surface, "wheel", move |ev: web::Event| {
        let ev: web::WheelEvent = ev.unchecked_into();
        state_wheel.input(InputEvent::Wheel {
            delta_y: ev.delta_y() as f32,
        });
    })?);
    Ok(())
}

fn key_modifiers(ev: &web::KeyboardEvent) -> Modifiers {
    Modifiers {
        shift: ev.shift_key(),
        ctrl: ev.ctrl_key(),
        alt: ev.alt_key(),
        meta: ev.meta_key(),
    }
}
