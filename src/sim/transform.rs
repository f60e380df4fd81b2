//! Euler-angle transforms
//!
//! Objects carry accumulated yaw/pitch/roll. The local matrix applies scale,
//! then roll (z), pitch (x), yaw (y), then translation. A child's world matrix is
//! its parent's world matrix times its own local matrix.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Rotation for accumulated Euler angles (yaw about y, pitch about x, roll about z)
#[inline]
pub fn orientation(yaw: f32, pitch: f32, roll: f32) -> Quat {
    Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll)
}

/// Local transform of an object
pub fn local_matrix(position: Vec3, yaw: f32, pitch: f32, roll: f32, scale: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(scale, orientation(yaw, pitch, roll), position)
}

/// Compose a local transform with an optional parent world transform
#[inline]
pub fn world_matrix(local: Mat4, parent: Option<&Mat4>) -> Mat4 {
    match parent {
        Some(parent) => *parent * local,
        None => local,
    }
}
