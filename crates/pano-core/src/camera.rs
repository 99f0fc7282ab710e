use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::constants::{CAMERA_FAR, CAMERA_FOV_DEGREES, CAMERA_NEAR, FOCUS_OFFSET};
use crate::render::ViewSize;

/// Perspective camera plus its orbit focus.
///
/// The engine keeps this in sync with whatever the backend draws so rays for
/// picking and mark focusing start from the right place.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub eye: Vec3,
    /// Orbit focus. Never equal to `eye`, or the orbit control locks up.
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            eye: Vec3::ZERO,
            target: FOCUS_OFFSET,
            up: Vec3::Y,
            aspect: 1.0,
            fovy_radians: CAMERA_FOV_DEGREES.to_radians(),
            znear: CAMERA_NEAR,
            zfar: CAMERA_FAR,
        }
    }
}

impl CameraRig {
    /// Compute the clip-space projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect, self.znear, self.zfar)
    }

    /// Compute the view matrix that transforms world to view space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn set_view_size(&mut self, size: ViewSize) {
        self.aspect = size.aspect();
    }

    /// Snap to `origin` looking one unit down +Z.
    pub fn reset_to(&mut self, origin: Vec3) {
        self.eye = origin;
        self.target = origin + FOCUS_OFFSET;
    }

    pub fn orbit_radius(&self) -> f32 {
        self.eye.distance(self.target)
    }

    /// World-space ray through normalized device coordinates (`-1..1`, +Y up).
    ///
    /// Returns `(ray_origin, ray_direction)`.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> (Vec3, Vec3) {
        let inv = (self.projection_matrix() * self.view_matrix()).inverse();
        let p_far = inv * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let far: Vec3 = p_far.truncate() / p_far.w;
        let dir = (far - self.eye).normalize_or_zero();
        (self.eye, dir)
    }
}
