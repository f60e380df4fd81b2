//! Chase camera
//!
//! The camera trails the avatar at a fixed offset in the avatar's heading frame.
//! A spring-damper pulls it toward that point each frame and it always looks at
//! the avatar itself.

use glam::{Mat4, Vec3};

/// Perspective camera driven by a spring-damper
#[derive(Debug, Clone)]
pub struct ChaseCamera {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Unit look direction
    pub ahead: Vec3,
    /// Vertical field of view (radians)
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            ahead: Vec3::Z,
            fov_y: 60.0_f32.to_radians(),
            aspect: 1.0,
            near: 0.5,
            far: 5000.0,
        }
    }
}

/// Spring parameters
#[derive(Debug, Clone, Copy)]
pub struct Spring {
    pub stiffness: f32,
    pub damping: f32,
}

/// Point the camera should trail toward: `offset` rotated by the avatar's heading
pub fn chase_target(avatar_position: Vec3, avatar_yaw: f32, offset: Vec3) -> Vec3 {
    let cos_yaw = (-avatar_yaw).cos();
    let sin_yaw = (-avatar_yaw).sin();
    let rotated = Vec3::new(
        offset.x * cos_yaw - offset.z * sin_yaw,
        offset.y,
        offset.x * sin_yaw + offset.z * cos_yaw,
    );
    avatar_position + rotated
}

impl ChaseCamera {
    /// Advance the spring toward the chase target and re-aim at the avatar
    pub fn follow(
        &mut self,
        avatar_position: Vec3,
        avatar_yaw: f32,
        offset: Vec3,
        spring: Spring,
        dt: f32,
    ) {
        let target = chase_target(avatar_position, avatar_yaw, offset);
        let displacement = target - self.position;

        let spring_force = displacement * spring.stiffness;
        let damping_force = self.velocity * spring.damping;
        self.velocity += (spring_force - damping_force) * dt;
        self.position += self.velocity * dt;

        self.look_at(avatar_position);
    }

    /// Aim at a point. Keeps the previous direction when the point coincides
    /// with the camera.
    pub fn look_at(&mut self, target: Vec3) {
        let to_target = target - self.position;
        if to_target.length_squared() > 1e-8 {
            self.ahead = to_target.normalize();
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.ahead, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
