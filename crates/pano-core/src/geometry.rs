//! Analytic geometry used by zone drafting and camera placement.
//!
//! Coordinates follow the renderer convention: Y up, X right-to-left on
//! screen, Z near-to-far.

use glam::Vec3;

use crate::constants::MIN_ZONE_POINTS;
use crate::error::GeometryError;

/// Arithmetic mean of `points`. Empty input yields the origin.
pub fn centroid(points: &[Vec3]) -> Vec3 {
    match points {
        [] => Vec3::ZERO,
        [only] => *only,
        _ => points.iter().copied().sum::<Vec3>() / points.len() as f32,
    }
}

/// Shift `points` so their centroid is the origin. Returns the centroid and
/// the local offsets, the form zone marks are stored in.
pub fn recenter(points: &[Vec3]) -> (Vec3, Vec<Vec3>) {
    let center = centroid(points);
    let local = points.iter().map(|p| *p - center).collect();
    (center, local)
}

/// Fan triangulation around the centroid: for each edge `(prev, current)`
/// emit the triangle `(centroid, prev, current)`, wrapping the first edge to
/// the last point. Output is a flat triangle list, three vertices per face.
pub fn fan_triangulate(points: &[Vec3]) -> Result<Vec<Vec3>, GeometryError> {
    if points.len() < MIN_ZONE_POINTS {
        return Err(GeometryError::TooFewPoints(points.len()));
    }
    let center = centroid(points);
    let mut out = Vec::with_capacity(points.len() * 3);
    for (i, current) in points.iter().enumerate() {
        let prev = if i == 0 {
            points[points.len() - 1]
        } else {
            points[i - 1]
        };
        out.extend_from_slice(&[center, prev, *current]);
    }
    Ok(out)
}

/// View a vertex list as packed `f32`s for buffer upload.
pub fn as_flat(vertices: &[Vec3]) -> &[f32] {
    bytemuck::cast_slice(vertices)
}

/// Geometry to build for a zone with the given (local) points.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneShape {
    Empty,
    /// A single vertex, drawn as a small dot.
    Dot,
    /// Two vertices, an open line.
    Polyline(Vec<Vec3>),
    /// A filled polygon: closed outline plus fan triangles.
    Polygon {
        outline: Vec<Vec3>,
        triangles: Vec<Vec3>,
    },
}

impl ZoneShape {
    pub fn from_points(points: &[Vec3]) -> Self {
        match points.len() {
            0 => Self::Empty,
            1 => Self::Dot,
            2 => Self::Polyline(points.to_vec()),
            _ => {
                let mut outline = points.to_vec();
                outline.push(points[0]);
                // len >= 3 checked above
                let triangles = fan_triangulate(points).unwrap_or_default();
                Self::Polygon { outline, triangles }
            }
        }
    }
}

/// Spherical to Cartesian with Y up.
///
/// `polar` is the angle between the radius and +Y; `azimuth` is the angle of
/// the projection on the XZ plane measured from +Z.
pub fn spherical_to_cartesian(radius: f32, polar: f32, azimuth: f32) -> Vec3 {
    let (sin_p, cos_p) = polar.sin_cos();
    let (sin_a, cos_a) = azimuth.sin_cos();
    Vec3::new(
        radius * sin_p * sin_a,
        radius * cos_p,
        radius * sin_p * cos_a,
    )
}

/// Intersect the infinite line through `line_start` and `line_end` with a
/// sphere.
///
/// Returns both crossing points (the `+sqrt` root first; they coincide on a
/// tangent) or `None` when the line misses or the two points are equal.
pub fn line_intersect_sphere(
    line_start: Vec3,
    line_end: Vec3,
    center: Vec3,
    radius: f32,
) -> Option<(Vec3, Vec3)> {
    let dir = line_end - line_start;
    let a = dir.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let oc = line_start - center;
    let b = 2.0 * oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_d = disc.sqrt();
    let t1 = (-b + sqrt_d) / (2.0 * a);
    let t2 = (-b - sqrt_d) / (2.0 * a);
    Some((line_start + dir * t1, line_start + dir * t2))
}

/// Whichever of `a`, `b` lies closer to `target`; `a` on a tie.
pub fn nearer_to(target: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    if a.distance_squared(target) <= b.distance_squared(target) {
        a
    } else {
        b
    }
}

/// Round to two decimal places (half away from zero).
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
