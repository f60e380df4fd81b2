//! Chase Drive - a 3D driving scene with knock-away obstacles
//!
//! Core modules:
//! - `sim`: Frame simulation (driving, collisions, falling, chase camera)
//! - `renderer`: WebGPU rendering pipeline and mesh sources
//! - `tuning`: Data-driven scene constants
//! - `settings`: Player preferences

pub mod renderer;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use settings::{QualityPreset, Settings};
pub use tuning::{Tuning, TuningError};

use glam::Vec3;

/// Scene configuration constants
pub mod consts {
    /// Index of the chassis in the object list
    pub const CHASSIS_INDEX: usize = 0;
    /// Number of wheels parented to the chassis (indices 1..=4)
    pub const WHEEL_COUNT: usize = 4;
    /// First front wheel index (front wheels steer)
    pub const FIRST_FRONT_WHEEL: usize = 3;

    /// Wheel mounting offsets relative to the chassis
    pub const WHEEL_OFFSET_X: f32 = 7.0;
    pub const WHEEL_OFFSET_Z: f32 = 10.0;
    pub const WHEEL_Y: f32 = -3.0;

    /// Gravity (world units/s², pointing down)
    pub const GRAVITY: f32 = 9.81;

    /// Nominal frame step for headless runs
    pub const FRAME_DT: f32 = 1.0 / 60.0;
}

/// Unit vector the chassis drives along for a given yaw
#[inline]
pub fn forward(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Whether a heading points down-track (+z)
#[inline]
pub fn car_faces_forward(yaw: f32) -> bool {
    forward(yaw).normalize().z > 0.0
}

/// Move `value` toward `target` by at most `max_delta`, never overshooting
#[inline]
pub fn approach(value: f32, target: f32, max_delta: f32) -> f32 {
    if value > target {
        (value - max_delta).max(target)
    } else if value < target {
        (value + max_delta).min(target)
    } else {
        value
    }
}
