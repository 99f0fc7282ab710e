//! Freehand zone drafting with undo/redo.

use std::collections::VecDeque;

use glam::Vec3;

use crate::constants::MIN_ZONE_POINTS;
use crate::error::Capacity;
use crate::geometry::{recenter, ZoneShape};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ZoneDraft {
    #[default]
    Idle,
    Drawing {
        points: Vec<Vec3>,
        /// Undone points, most recently undone first.
        redo: VecDeque<Vec3>,
    },
}

impl ZoneDraft {
    pub fn is_drawing(&self) -> bool {
        matches!(self, Self::Drawing { .. })
    }

    pub fn points(&self) -> &[Vec3] {
        match self {
            Self::Idle => &[],
            Self::Drawing { points, .. } => points,
        }
    }

    pub fn redo_len(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Drawing { redo, .. } => redo.len(),
        }
    }

    /// Append a vertex, starting a draft if idle. Discards the redo buffer.
    pub fn add_point(&mut self, point: Vec3, max_points: usize) -> Result<(), Capacity> {
        if self.points().len() + 1 > max_points {
            return Err(Capacity::ZonePoints { limit: max_points });
        }
        match self {
            Self::Idle => {
                *self = Self::Drawing {
                    points: vec![point],
                    redo: VecDeque::new(),
                };
            }
            Self::Drawing { points, redo } => {
                points.push(point);
                redo.clear();
            }
        }
        Ok(())
    }

    /// Undo the last vertex. Returns false if there was nothing to undo.
    pub fn step_back(&mut self) -> bool {
        let Self::Drawing { points, redo } = self else {
            return false;
        };
        match points.pop() {
            Some(p) => {
                redo.push_front(p);
                true
            }
            None => false,
        }
    }

    /// Redo the most recently undone vertex.
    pub fn step_forward(&mut self) -> bool {
        let Self::Drawing { points, redo } = self else {
            return false;
        };
        match redo.pop_front() {
            Some(p) => {
                points.push(p);
                true
            }
            None => false,
        }
    }

    /// Finish the draft. With at least three points returns the centroid and
    /// the recentered points; always resets to idle.
    pub fn commit(&mut self) -> Option<(Vec3, Vec<Vec3>)> {
        let draft = std::mem::take(self);
        let points = draft.points();
        if points.len() < MIN_ZONE_POINTS {
            if !points.is_empty() {
                log::debug!("[zone] discarding draft with {} points", points.len());
            }
            return None;
        }
        Some(recenter(points))
    }

    pub fn cancel(&mut self) {
        *self = Self::Idle;
    }

    /// Preview geometry for the current points: position plus local shape.
    pub fn preview(&self) -> Option<(Vec3, ZoneShape)> {
        let points = self.points();
        if points.is_empty() {
            return None;
        }
        let (center, local) = recenter(points);
        Some((center, ZoneShape::from_points(&local)))
    }
}
