//! Pointer dispatch: raw ray hits in, semantic intents out.
//!
//! The dispatcher holds only the hover and click-suppression state; what an
//! intent actually does to the registry is up to the engine.

use glam::Vec3;
use smallvec::SmallVec;

use crate::events::{Button, Modifiers};
use crate::registry::{EntityTag, Registry};
use crate::render::{RawHit, RenderHandle};

/// Nearest tagged hit of one pointer event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSource {
    pub handle: RenderHandle,
    pub tag: EntityTag,
    pub point: Vec3,
    pub distance: f32,
}

impl EventSource {
    pub fn is_mark(&self) -> bool {
        matches!(self.tag, EntityTag::Mark { .. })
    }
}

/// Keep hits on tagged primitives, promote children of marks to the mark
/// itself and return the nearest one.
pub fn resolve_event_source(hits: &[RawHit], registry: &Registry) -> Option<EventSource> {
    hits.iter()
        .filter_map(|hit| {
            let parent_mark = hit
                .parent
                .and_then(|p| registry.tag(p).map(|tag| (p, tag)))
                .filter(|(_, tag)| matches!(tag, EntityTag::Mark { .. }));
            let (handle, tag) = match parent_mark {
                Some(found) => found,
                None => (hit.handle, registry.tag(hit.handle)?),
            };
            Some(EventSource {
                handle,
                tag: tag.clone(),
                point: hit.point,
                distance: hit.distance,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerKind {
    Move,
    Click,
    Down { button: Button, modifiers: Modifiers },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    HoverEnter(RenderHandle),
    HoverLeave(RenderHandle),
    /// Primary click on a mark.
    ClickMark(RenderHandle),
    /// Primary click on a scene surface while editable: drop the selection.
    EndAdjust,
    /// Secondary press on a mark while editable: attach it to the gizmo.
    BeginAdjust(RenderHandle),
    /// Secondary press with Alt on a scene surface: add a zone vertex (world).
    DrawZonePoint(Vec3),
    /// Secondary press on a scene surface: add a point mark (world).
    AddPointMark(Vec3),
}

pub type Intents = SmallVec<[Intent; 4]>;

#[derive(Debug, Default)]
pub struct Dispatcher {
    active_mark: Option<RenderHandle>,
    editing_just_happened: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_mark(&self) -> Option<RenderHandle> {
        self.active_mark
    }

    /// The next click is the tail end of a gizmo interaction; swallow it.
    pub fn mark_edited(&mut self) {
        self.editing_just_happened = true;
    }

    /// Drop hover state for a primitive that no longer exists.
    pub fn forget(&mut self, handle: RenderHandle) {
        if self.active_mark == Some(handle) {
            self.active_mark = None;
        }
    }

    pub fn dispatch(
        &mut self,
        kind: PointerKind,
        source: Option<&EventSource>,
        editable: bool,
    ) -> Intents {
        let mut out = Intents::new();
        let Some(source) = source else {
            return out;
        };

        match kind {
            PointerKind::Down {
                button: Button::Secondary,
                modifiers,
            } if editable => {
                if source.is_mark() {
                    out.push(Intent::BeginAdjust(source.handle));
                } else if modifiers.alt {
                    out.push(Intent::DrawZonePoint(source.point));
                } else {
                    out.push(Intent::AddPointMark(source.point));
                }
            }
            PointerKind::Click => {
                if !self.editing_just_happened {
                    if source.is_mark() {
                        out.push(Intent::ClickMark(source.handle));
                    } else if editable {
                        out.push(Intent::EndAdjust);
                    }
                }
                self.editing_just_happened = false;
            }
            _ => {}
        }

        let hovered = source.is_mark().then_some(source.handle);
        match (self.active_mark, hovered) {
            (None, Some(next)) => out.push(Intent::HoverEnter(next)),
            (Some(prev), None) => out.push(Intent::HoverLeave(prev)),
            (Some(prev), Some(next)) if prev != next => {
                out.push(Intent::HoverLeave(prev));
                out.push(Intent::HoverEnter(next));
            }
            _ => {}
        }
        self.active_mark = hovered;
        out
    }
}
