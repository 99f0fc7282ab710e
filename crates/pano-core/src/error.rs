//! Error taxonomy for the engine.
//!
//! Only `NotFound`, `Desync`, `Geometry` and `Config` ever reach a caller as
//! `Err`. `CapacityExceeded` is turned into an `Alarmed` event and `Busy` into a
//! resolved [`crate::transition::TransferOutcome::Busy`], both at the engine
//! boundary.

use crate::render::RenderHandle;

/// Which registry table a failed lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntityKind {
    #[error("scene")]
    Scene,
    #[error("mark")]
    Mark,
}

/// A soft interactive limit that was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Capacity {
    #[error("marks per scene reached the limit of {limit}")]
    Marks { limit: usize },
    #[error("points in the zone being drawn reached the limit of {limit}")]
    ZonePoints { limit: usize },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("a zone polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("{0}")]
    CapacityExceeded(Capacity),
    #[error("a camera transition is already in flight")]
    Busy,
    #[error("hit target {handle:?} has no mark in the current scene")]
    Desync { handle: RenderHandle },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn scene_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Scene,
            id: id.into(),
        }
    }

    pub fn mark_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Mark,
            id: id.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
