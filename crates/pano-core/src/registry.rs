//! Scene and mark registry: the single source of truth for configuration,
//! plus the render-handle index used to resolve hits.

use fnv::{FnvHashMap, FnvHashSet};
use glam::Vec3;

use crate::config::{generate_id, MarkConfig, MarkEdit, MarkKind, SceneConfig, SceneSource};
use crate::constants::{
    MIN_ZONE_POINTS, POINT_MARK_RADIUS, SCENE_HIDDEN_POSITION, SCENE_RADIUS,
    SCENE_RESET_POSITION, SCENE_SHOW_POSITION,
};
use crate::error::{Capacity, EngineError, EngineResult, GeometryError};
use crate::geometry::ZoneShape;
use crate::render::{RenderBackend, RenderHandle};

/// What a render handle stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTag {
    SceneSurface { scene_id: String },
    Mark { scene_id: String, mark_id: String },
}

#[derive(Debug, Clone)]
pub struct MarkEntry {
    pub config: MarkConfig,
    pub handle: RenderHandle,
}

#[derive(Debug, Clone)]
pub struct SceneEntry {
    pub id: String,
    pub source: Option<SceneSource>,
    pub handle: RenderHandle,
    pub marks: Vec<MarkEntry>,
    pub visible: bool,
    /// World position of the surface; marks are relative to it.
    pub origin: Vec3,
}

impl SceneEntry {
    pub fn config(&self) -> SceneConfig {
        SceneConfig {
            id: self.id.clone(),
            source: self.source.clone(),
            marks: self.marks.iter().map(|m| m.config.clone()).collect(),
        }
    }

    pub fn mark(&self, id: &str) -> Option<&MarkEntry> {
        self.marks.iter().find(|m| m.config.id == id)
    }

    pub fn mark_by_handle(&self, handle: RenderHandle) -> Option<&MarkEntry> {
        self.marks.iter().find(|m| m.handle == handle)
    }
}

pub struct Registry {
    scenes: Vec<SceneEntry>,
    index: FnvHashMap<RenderHandle, EntityTag>,
    max_marks: usize,
}

impl Registry {
    pub fn new(max_marks: usize) -> Self {
        Self {
            scenes: Vec::new(),
            index: FnvHashMap::default(),
            max_marks,
        }
    }

    pub fn scenes(&self) -> &[SceneEntry] {
        &self.scenes
    }

    pub fn scene(&self, id: &str) -> Option<&SceneEntry> {
        self.scenes.iter().find(|s| s.id == id)
    }

    fn scene_mut(&mut self, id: &str) -> EngineResult<&mut SceneEntry> {
        self.scenes
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| EngineError::scene_not_found(id))
    }

    pub fn first_scene_id(&self) -> Option<&str> {
        self.scenes.first().map(|s| s.id.as_str())
    }

    pub fn tag(&self, handle: RenderHandle) -> Option<&EntityTag> {
        self.index.get(&handle)
    }

    /// Mark with `id` in any scene, plus its owner.
    pub fn find_mark(&self, id: &str) -> Option<(&SceneEntry, &MarkEntry)> {
        self.scenes
            .iter()
            .find_map(|s| s.mark(id).map(|m| (s, m)))
    }

    fn find_mark_mut(&mut self, id: &str) -> Option<&mut MarkEntry> {
        self.scenes
            .iter_mut()
            .flat_map(|s| s.marks.iter_mut())
            .find(|m| m.config.id == id)
    }

    pub fn contains_mark_id(&self, id: &str) -> bool {
        self.find_mark(id).is_some()
    }

    pub fn snapshot(&self) -> Vec<SceneConfig> {
        self.scenes.iter().map(SceneEntry::config).collect()
    }

    /// Register a scene and build its primitives. Missing or clashing ids are
    /// replaced with fresh ones; zones with too few points are dropped.
    pub fn add_scene(&mut self, backend: &mut dyn RenderBackend, config: SceneConfig) -> &SceneEntry {
        let SceneConfig { id, source, marks } = config;
        let id = if id.is_empty() || self.scene(&id).is_some() {
            if !id.is_empty() {
                log::warn!("[registry] scene id `{}` already in use, generating a new one", id);
            }
            generate_id()
        } else {
            id
        };

        let handle = backend.create_scene_surface(SCENE_RADIUS);
        backend.set_visible(handle, false);
        self.index.insert(
            handle,
            EntityTag::SceneSurface {
                scene_id: id.clone(),
            },
        );

        let mut seen = FnvHashSet::default();
        let mut entries = Vec::with_capacity(marks.len());
        for mut mark in marks {
            if mark.kind == MarkKind::Zone && mark.points().len() < MIN_ZONE_POINTS {
                log::warn!(
                    "[registry] dropping zone `{}` with {} points",
                    mark.id,
                    mark.points().len()
                );
                continue;
            }
            if mark.id.is_empty() || seen.contains(&mark.id) || self.contains_mark_id(&mark.id) {
                let fresh = generate_id();
                if !mark.id.is_empty() {
                    log::warn!("[registry] duplicate mark id `{}` renamed to `{}`", mark.id, fresh);
                }
                mark.id = fresh;
            }
            seen.insert(mark.id.clone());
            let mark_handle = build_mark(backend, &mark);
            backend.attach(mark_handle, handle);
            self.index.insert(
                mark_handle,
                EntityTag::Mark {
                    scene_id: id.clone(),
                    mark_id: mark.id.clone(),
                },
            );
            entries.push(MarkEntry {
                config: mark,
                handle: mark_handle,
            });
        }
        if entries.len() > self.max_marks {
            log::warn!(
                "[registry] scene `{}` loaded with {} marks, above the limit of {}",
                id,
                entries.len(),
                self.max_marks
            );
        }

        self.scenes.push(SceneEntry {
            id,
            source,
            handle,
            marks: entries,
            visible: false,
            origin: SCENE_HIDDEN_POSITION,
        });
        backend.set_position(handle, SCENE_HIDDEN_POSITION);
        &self.scenes[self.scenes.len() - 1]
    }

    pub fn remove_scene(&mut self, backend: &mut dyn RenderBackend, id: &str) -> EngineResult<SceneEntry> {
        let pos = self
            .scenes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| EngineError::scene_not_found(id))?;
        let scene = self.scenes.remove(pos);
        for mark in &scene.marks {
            self.index.remove(&mark.handle);
            backend.dispose(mark.handle);
        }
        self.index.remove(&scene.handle);
        backend.dispose(scene.handle);
        Ok(scene)
    }

    pub fn change_scene_source(
        &mut self,
        backend: &mut dyn RenderBackend,
        id: &str,
        source: Option<SceneSource>,
    ) -> EngineResult<()> {
        let scene = self.scene_mut(id)?;
        scene.source = source;
        backend.set_scene_source(scene.handle, scene.source.as_ref());
        Ok(())
    }

    /// Add a mark to `scene_id`. Zone marks must carry at least three
    /// (already recentered) points.
    pub fn add_mark(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene_id: &str,
        mut config: MarkConfig,
    ) -> EngineResult<&MarkConfig> {
        if config.kind == MarkKind::Zone && config.points().len() < MIN_ZONE_POINTS {
            return Err(GeometryError::TooFewPoints(config.points().len()).into());
        }
        if config.id.is_empty() || self.contains_mark_id(&config.id) {
            config.id = generate_id();
        }
        let max_marks = self.max_marks;
        let scene = self.scene_mut(scene_id)?;
        if scene.marks.len() + 1 > max_marks {
            return Err(EngineError::CapacityExceeded(Capacity::Marks { limit: max_marks }));
        }

        let handle = build_mark(backend, &config);
        backend.attach(handle, scene.handle);
        scene.marks.push(MarkEntry { config, handle });
        let tag = EntityTag::Mark {
            scene_id: scene_id.to_string(),
            mark_id: scene.marks[scene.marks.len() - 1].config.id.clone(),
        };
        self.index.insert(handle, tag);

        let scene = self.scene_mut(scene_id)?;
        Ok(&scene.marks[scene.marks.len() - 1].config)
    }

    /// Remove a mark from whichever scene owns it.
    pub fn remove_mark(&mut self, backend: &mut dyn RenderBackend, id: &str) -> EngineResult<MarkEntry> {
        for scene in &mut self.scenes {
            if let Some(pos) = scene.marks.iter().position(|m| m.config.id == id) {
                let mark = scene.marks.remove(pos);
                self.index.remove(&mark.handle);
                backend.dispose(mark.handle);
                return Ok(mark);
            }
        }
        Err(EngineError::mark_not_found(id))
    }

    /// Apply the scale, sprite (points) and colors (zones) of `edit` to the
    /// mark with the same id, touching only what differs. Fields left unset
    /// in `edit` are kept. Returns whether anything changed.
    pub fn edit_mark(&mut self, backend: &mut dyn RenderBackend, edit: &MarkEdit) -> EngineResult<bool> {
        let mark = self
            .find_mark_mut(&edit.id)
            .ok_or_else(|| EngineError::mark_not_found(&edit.id))?;
        let mut changed = false;

        if let Some(scale) = edit
            .scale
            .filter(|s| s.is_finite() && *s != mark.config.scale)
        {
            backend.set_scale(mark.handle, scale);
            mark.config.scale = scale;
            changed = true;
        }

        match mark.config.kind {
            MarkKind::Point => {
                if edit.point_sprite_url.is_some()
                    && mark.config.point_sprite_url != edit.point_sprite_url
                {
                    mark.config.point_sprite_url = edit.point_sprite_url.clone();
                    backend.set_point_sprite(mark.handle, mark.config.sprite());
                    changed = true;
                }
            }
            MarkKind::Zone => {
                let border = edit
                    .zone_border_color
                    .as_ref()
                    .filter(|c| mark.config.zone_border_color.as_ref() != Some(*c));
                let fill = edit
                    .zone_fill_color
                    .as_ref()
                    .filter(|c| mark.config.zone_fill_color.as_ref() != Some(*c));
                if border.is_some() || fill.is_some() {
                    if let Some(border) = border {
                        mark.config.zone_border_color = Some(border.clone());
                    }
                    if let Some(fill) = fill {
                        mark.config.zone_fill_color = Some(fill.clone());
                    }
                    backend.set_zone_colors(mark.handle, mark.config.zone_colors());
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    pub fn set_mark_scale(&mut self, backend: &mut dyn RenderBackend, id: &str, scale: f32) -> EngineResult<()> {
        let mark = self
            .find_mark_mut(id)
            .ok_or_else(|| EngineError::mark_not_found(id))?;
        mark.config.scale = scale;
        backend.set_scale(mark.handle, scale);
        Ok(())
    }

    /// Move a mark to a new scene-local position. Returns false when the
    /// position is unchanged.
    pub fn set_mark_position(
        &mut self,
        backend: &mut dyn RenderBackend,
        id: &str,
        position: Vec3,
    ) -> EngineResult<bool> {
        let mark = self
            .find_mark_mut(id)
            .ok_or_else(|| EngineError::mark_not_found(id))?;
        if mark.config.position == position {
            return Ok(false);
        }
        mark.config.position = position;
        backend.set_position(mark.handle, position);
        Ok(true)
    }

    /// Make a scene visible at the show position with its media applied and
    /// zone colors restored. Returns the show position.
    pub fn show_scene(&mut self, backend: &mut dyn RenderBackend, id: &str) -> EngineResult<Vec3> {
        let scene = self.scene_mut(id)?;
        for mark in scene.marks.iter().filter(|m| m.config.kind == MarkKind::Zone) {
            backend.set_zone_colors(mark.handle, mark.config.zone_colors());
        }
        scene.visible = true;
        scene.origin = SCENE_SHOW_POSITION;
        backend.set_visible(scene.handle, true);
        backend.set_position(scene.handle, SCENE_SHOW_POSITION);
        backend.set_scene_source(scene.handle, scene.source.as_ref());
        Ok(SCENE_SHOW_POSITION)
    }

    pub fn hide_scene(&mut self, backend: &mut dyn RenderBackend, id: &str) -> EngineResult<()> {
        let scene = self.scene_mut(id)?;
        scene.visible = false;
        scene.origin = SCENE_HIDDEN_POSITION;
        backend.set_visible(scene.handle, false);
        backend.set_position(scene.handle, SCENE_HIDDEN_POSITION);
        backend.set_scene_source(scene.handle, None);
        Ok(())
    }

    /// Move a scene back to the world origin once the camera has arrived.
    pub fn reset_scene(&mut self, backend: &mut dyn RenderBackend, id: &str) -> EngineResult<Vec3> {
        let scene = self.scene_mut(id)?;
        scene.origin = SCENE_RESET_POSITION;
        backend.set_position(scene.handle, SCENE_RESET_POSITION);
        Ok(SCENE_RESET_POSITION)
    }

    /// Dispose every primitive and forget all scenes.
    pub fn dispose_all(&mut self, backend: &mut dyn RenderBackend) {
        for scene in self.scenes.drain(..) {
            for mark in &scene.marks {
                backend.dispose(mark.handle);
            }
            backend.dispose(scene.handle);
        }
        self.index.clear();
    }
}

fn build_mark(backend: &mut dyn RenderBackend, config: &MarkConfig) -> RenderHandle {
    let handle = match config.kind {
        MarkKind::Point => backend.create_point_mark(POINT_MARK_RADIUS, config.sprite()),
        MarkKind::Zone => backend.create_zone_mark(
            &ZoneShape::from_points(config.points()),
            config.zone_colors(),
        ),
    };
    backend.set_position(handle, config.position);
    backend.set_scale(handle, config.scale);
    handle
}
