//! Collision detection and push response
//!
//! The chassis is approximated by an axis-aligned box around its position and
//! every obstacle by a sphere whose radius is half its x scale. The push is
//! positional only: it moves the sphere away from the car by a fixed distance.

use glam::Vec3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Closest point inside the box to `p`
    #[inline]
    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Bounding sphere of an object from its position and scale
    pub fn of(position: Vec3, scale: Vec3) -> Self {
        Self {
            center: position,
            radius: scale.x / 2.0,
        }
    }
}

/// Box-vs-sphere overlap test.
///
/// Compares the squared distance from the sphere center to its closest point on
/// the box against the squared radius. Touching counts as a hit.
#[inline]
pub fn box_sphere_overlap(aabb: &Aabb, sphere: &BoundingSphere) -> bool {
    let closest = aabb.closest_point(sphere.center);
    (closest - sphere.center).length_squared() <= sphere.radius * sphere.radius
}

/// Chassis-vs-obstacle test
pub fn detect_collision(
    car_position: Vec3,
    half_extents: Vec3,
    sphere_position: Vec3,
    sphere_scale: Vec3,
) -> bool {
    let aabb = Aabb::from_center(car_position, half_extents);
    box_sphere_overlap(&aabb, &BoundingSphere::of(sphere_position, sphere_scale))
}

/// Direction a struck sphere is pushed: from the car toward the sphere.
///
/// Coincident centers give a zero direction.
#[inline]
pub fn push_direction(car_position: Vec3, sphere_position: Vec3) -> Vec3 {
    (sphere_position - car_position).normalize_or_zero()
}

/// Result of pushing a sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Push {
    pub direction: Vec3,
    pub new_position: Vec3,
}

/// Displace a sphere away from the car by `magnitude`
pub fn apply_push(car_position: Vec3, sphere_position: Vec3, magnitude: f32) -> Push {
    let direction = push_direction(car_position, sphere_position);
    Push {
        direction,
        new_position: sphere_position + direction * magnitude,
    }
}
