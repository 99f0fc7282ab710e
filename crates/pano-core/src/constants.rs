use glam::Vec3;

// Shared scene-layout and interaction tuning constants.

// Scene surfaces
pub const SCENE_RADIUS: f32 = 500.0; // panorama sphere radius
pub const SCENE_SHOW_POSITION: Vec3 = Vec3::new(0.0, 0.0, 600.0); // where an incoming scene waits
pub const SCENE_HIDDEN_POSITION: Vec3 = Vec3::new(999.0, 999.0, 999.0);
pub const SCENE_RESET_POSITION: Vec3 = Vec3::ZERO;

// Orbit focus sits one unit ahead of the eye; eye == focus locks the orbit control.
pub const FOCUS_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 1.0);

// Camera
pub const CAMERA_FOV_DEGREES: f32 = 75.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 1100.0;

// Mark geometry
pub const POINT_MARK_RADIUS: f32 = 15.0;
pub const ZONE_DOT_RADIUS: f32 = 2.0; // single-point zone preview
pub const POINT_SPRITE_SIZE: f32 = 45.0;
pub const MIN_ZONE_POINTS: usize = 3;
pub const MARK_ID_LEN: usize = 21;

// Default colors (CSS strings, alpha in the last hex pair)
pub const DEFAULT_ZONE_BORDER_COLOR: &str = "#cccccc4d";
pub const DEFAULT_ZONE_FILL_COLOR: &str = "#ffffff4d";
pub const DEFAULT_HOVER_BORDER_COLOR: &str = "#ee00004d";
pub const DEFAULT_HOVER_FILL_COLOR: &str = "#66ccff4d";
pub const DEFAULT_MASK_COLOR: &str = "#000000";

// Transitions
pub const DEFAULT_TRANSFER_SECS: f32 = 1.0;
pub const DEFAULT_MARK_FOCUS_MS: u64 = 500;
pub const MAX_TRANSFER_SECS: u64 = 3600;
pub const CAMERA_LEG_RATIO: f32 = 0.75; // camera leg runs for 75% of the nominal duration
pub const FOG_PEAK_DENSITY: f32 = 0.0045;
pub const FOG_PEAK_BLUR_PX: f32 = 25.0;

// Editing
pub const WHEEL_SCALE_FACTOR: f32 = 0.001; // empirical wheel delta -> scale multiplier
pub const MARK_MOVE_THROTTLE_MS: u64 = 100;
pub const RESIZE_DEBOUNCE_MS: u64 = 500;
