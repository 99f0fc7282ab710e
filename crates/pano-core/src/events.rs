//! Typed publish/subscribe for the engine's outbound events, plus the
//! inbound commands a host can push at the engine.

use std::panic::{catch_unwind, AssertUnwindSafe};

use fnv::FnvHashMap;
use glam::Vec3;
use serde::Serialize;

use crate::config::{MarkConfig, MarkEdit, SceneConfig, SceneSource};

/// Payload of [`EngineEvent::AddedMark`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedMark {
    pub parent_id: String,
    pub payload: MarkConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Full snapshot, once, on the first frame.
    Inited(Vec<SceneConfig>),
    AddedScene(SceneConfig),
    AddedMark(AddedMark),
    EditedMark(MarkConfig),
    ClickedMark(MarkConfig),
    /// The gizmo moved to another mark, or was detached (`None`).
    SelectedMark(Option<MarkConfig>),
    SwitchedScene(SceneConfig),
    /// Full snapshot after a visible mutation. Only built when someone listens.
    Changed(Vec<SceneConfig>),
    /// A soft limit was hit. Human-readable.
    Alarmed(String),
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Inited(_) => EventKind::Inited,
            Self::AddedScene(_) => EventKind::AddedScene,
            Self::AddedMark(_) => EventKind::AddedMark,
            Self::EditedMark(_) => EventKind::EditedMark,
            Self::ClickedMark(_) => EventKind::ClickedMark,
            Self::SelectedMark(_) => EventKind::SelectedMark,
            Self::SwitchedScene(_) => EventKind::SwitchedScene,
            Self::Changed(_) => EventKind::Changed,
            Self::Alarmed(_) => EventKind::Alarmed,
        }
    }

    /// The payload as JSON, the shape JS listeners receive.
    pub fn payload_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Inited(all) | Self::Changed(all) => serde_json::to_value(all),
            Self::AddedScene(scene) | Self::SwitchedScene(scene) => serde_json::to_value(scene),
            Self::AddedMark(added) => serde_json::to_value(added),
            Self::EditedMark(mark) | Self::ClickedMark(mark) => serde_json::to_value(mark),
            Self::SelectedMark(mark) => serde_json::to_value(mark),
            Self::Alarmed(msg) => serde_json::to_value(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Inited,
    AddedScene,
    AddedMark,
    EditedMark,
    ClickedMark,
    SelectedMark,
    SwitchedScene,
    Changed,
    Alarmed,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        Self::Inited,
        Self::AddedScene,
        Self::AddedMark,
        Self::EditedMark,
        Self::ClickedMark,
        Self::SelectedMark,
        Self::SwitchedScene,
        Self::Changed,
        Self::Alarmed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Inited => "inited",
            Self::AddedScene => "addedScene",
            Self::AddedMark => "addedMark",
            Self::EditedMark => "editedMark",
            Self::ClickedMark => "clickedMark",
            Self::SelectedMark => "selectedMark",
            Self::SwitchedScene => "switchedScene",
            Self::Changed => "changed",
            Self::Alarmed => "alarmed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// Commands accepted through [`crate::Engine::receive`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Add a scene; `None` creates an empty one with a fresh id.
    AddScene(Option<SceneConfig>),
    EditScene {
        id: String,
        source: Option<SceneSource>,
    },
    RemoveScene(String),
    EditMark(MarkEdit),
    RemoveMark(String),
}

/// Listener signature. Errors are logged and otherwise ignored.
pub type Listener = Box<dyn FnMut(&EngineEvent) -> anyhow::Result<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered subscriber lists keyed by event kind.
///
/// A listener that returns `Err` or panics is logged and skipped; the rest of
/// the list still runs.
#[derive(Default)]
pub struct EventBus {
    subscribers: FnvHashMap<EventKind, Vec<(SubscriptionId, Listener)>>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.entry(kind).or_default().push((id, listener));
        id
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                drop(list.remove(pos));
                return true;
            }
        }
        false
    }

    /// Remove every subscription for `kind`.
    pub fn unsubscribe_all(&mut self, kind: EventKind) {
        self.subscribers.remove(&kind);
    }

    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.subscribers.get(&kind).is_some_and(|l| !l.is_empty())
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        let kind = event.kind();
        let Some(list) = self.subscribers.get_mut(&kind) else {
            return;
        };
        for (id, listener) in list.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("[bus] listener {:?} for {} failed: {:#}", id, kind.name(), e)
                }
                Err(_) => log::error!("[bus] listener {:?} for {} panicked", id, kind.name()),
            }
        }
    }
}

/// Keys the core reacts to. Everything else maps to `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Alt,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const ALT: Self = Self {
        shift: false,
        ctrl: false,
        alt: true,
        meta: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

impl Button {
    /// DOM `MouseEvent.button` numbering.
    pub fn from_dom(button: i16) -> Option<Self> {
        match button {
            0 => Some(Self::Primary),
            1 => Some(Self::Middle),
            2 => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// Pointer, keyboard and gizmo input, already resolved to hits where a ray
/// is involved.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMove {
        hits: Vec<crate::render::RawHit>,
    },
    Click {
        hits: Vec<crate::render::RawHit>,
    },
    PointerDown {
        hits: Vec<crate::render::RawHit>,
        button: Button,
        modifiers: Modifiers,
    },
    KeyDown {
        key: Key,
        modifiers: Modifiers,
    },
    KeyUp {
        key: Key,
        modifiers: Modifiers,
    },
    Wheel {
        delta_y: f32,
    },
    /// Gizmo drag started (`true`) or stopped.
    GizmoDragging(bool),
    /// The gizmo moved the selected mark to this scene-local position.
    GizmoMoved {
        position: Vec3,
    },
    Resize(crate::render::ViewSize),
}

/// What a key event means for the zone draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKeyAction {
    StepBack,
    StepForward,
    Commit,
}

impl ZoneKeyAction {
    pub fn from_key_down(key: &Key, modifiers: Modifiers) -> Option<Self> {
        if !modifiers.alt {
            return None;
        }
        match key {
            Key::Char('z') => Some(Self::StepBack),
            Key::Char('a') => Some(Self::StepForward),
            _ => None,
        }
    }

    pub fn from_key_up(key: &Key) -> Option<Self> {
        matches!(key, Key::Alt).then_some(Self::Commit)
    }
}
