//! Analytic raycasting over the registry, for backends that do not raycast
//! themselves.

use glam::{Vec2, Vec3};

use crate::camera::CameraRig;
use crate::config::MarkKind;
use crate::constants::{POINT_MARK_RADIUS, SCENE_RADIUS};
use crate::geometry::fan_triangulate;
use crate::registry::Registry;
use crate::render::RawHit;

/// Distance along a normalized ray to the first crossing with a sphere, or
/// the exit point when the ray starts inside it.
#[inline]
pub fn ray_sphere(ray_origin: Vec3, ray_dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray_origin - center;
    let b = oc.dot(ray_dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let near = -b - sq;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sq;
    (far >= 0.0).then_some(far)
}

/// Möller–Trumbore, double sided.
#[inline]
pub fn ray_triangle(ray_origin: Vec3, ray_dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPS: f32 = 1e-7;
    let e1 = b - a;
    let e2 = c - a;
    let p = ray_dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPS {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray_origin - a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = ray_dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t >= 0.0).then_some(t)
}

/// Every hit of the ray through `ndc` against visible scenes and their marks,
/// nearest first.
pub fn pick(registry: &Registry, camera: &CameraRig, ndc: Vec2) -> Vec<RawHit> {
    let (ro, rd) = camera.ray_from_ndc(ndc);
    if rd == Vec3::ZERO {
        return Vec::new();
    }
    let mut hits = Vec::new();
    for scene in registry.scenes().iter().filter(|s| s.visible) {
        if let Some(t) = ray_sphere(ro, rd, scene.origin, SCENE_RADIUS) {
            hits.push(RawHit::new(t, ro + rd * t, scene.handle));
        }
        for mark in &scene.marks {
            let base = scene.origin + mark.config.position;
            let t = match mark.config.kind {
                MarkKind::Point => {
                    ray_sphere(ro, rd, base, POINT_MARK_RADIUS * mark.config.scale)
                }
                MarkKind::Zone => {
                    let world: Vec<Vec3> = mark
                        .config
                        .points()
                        .iter()
                        .map(|p| base + *p * mark.config.scale)
                        .collect();
                    fan_triangulate(&world).ok().and_then(|tris| {
                        tris.chunks_exact(3)
                            .filter_map(|t| ray_triangle(ro, rd, t[0], t[1], t[2]))
                            .min_by(f32::total_cmp)
                    })
                }
            };
            if let Some(t) = t {
                hits.push(RawHit::new(t, ro + rd * t, mark.handle));
            }
        }
    }
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}
