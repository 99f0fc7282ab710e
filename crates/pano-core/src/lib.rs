//! Scene/mark interaction engine for 360° panorama viewers.
//!
//! The crate is renderer-agnostic: drawing goes through [`RenderBackend`],
//! eased interpolation through [`TweenEngine`]. Everything is driven from a
//! single thread by calling [`Engine::frame`] once per animation frame and
//! feeding pointer/keyboard input through [`Engine::handle_input`].

pub mod camera;
pub mod color;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod geometry;
pub mod pick;
pub mod registry;
pub mod render;
pub mod selection;
pub mod timing;
pub mod transition;
pub mod zone;

pub use color::{decode_color, Rgba, ZoneColors};
pub use config::{
    GlobalConfig, MarkConfig, MarkEdit, MarkKind, ScaleRange, SceneConfig, SceneSource, SourceKind,
};
pub use engine::Engine;
pub use error::{Capacity, EngineError, EngineResult, EntityKind, GeometryError};
pub use events::{
    AddedMark, Button, EngineEvent, EventKind, InboundEvent, InputEvent, Key, Modifiers,
    SubscriptionId,
};
pub use render::{RawHit, RenderBackend, RenderHandle, ViewSize};
pub use transition::{ClockTweens, Transfer, TransferOutcome, TweenEngine};
