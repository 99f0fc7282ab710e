//! Mark selection. At most one mark is selected at a time and the
//! transform gizmo follows it.

use crate::registry::Registry;
use crate::render::RenderHandle;

/// Which mark, if any, the transform gizmo is attached to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    mark_id: Option<String>,
}

impl Selection {
    pub fn mark_id(&self) -> Option<&str> {
        self.mark_id.as_deref()
    }

    /// Returns true if the selected identity changed.
    pub fn select(&mut self, mark_id: Option<String>) -> bool {
        if self.mark_id == mark_id {
            return false;
        }
        self.mark_id = mark_id;
        true
    }

    pub fn is_selected(&self, mark_id: &str) -> bool {
        self.mark_id.as_deref() == Some(mark_id)
    }
}

/// Where the gizmo should be attached for `selection`.
pub fn gizmo_target(selection: &Selection, registry: &Registry) -> Option<RenderHandle> {
    let id = selection.mark_id()?;
    registry.find_mark(id).map(|(_, mark)| mark.handle)
}
