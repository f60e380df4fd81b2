//! Scene simulation module
//!
//! All driving logic lives here. Nothing in this module touches the GPU or the
//! browser:
//! - Frame time and randomness come in as arguments
//! - Stable iteration order (objects by index, pushed spheres by id)
//! - Outcomes come back as [`SceneEvent`]s

pub mod camera;
pub mod collision;
pub mod input;
pub mod state;
pub mod tick;
pub mod transform;

pub use camera::{ChaseCamera, Spring, chase_target};
pub use collision::{Aabb, BoundingSphere, Push, apply_push, box_sphere_overlap, detect_collision};
pub use input::{Key, KeySet};
pub use state::{
    Axle, DrawGroup, EntityIds, GameObject, Light, ObjectId, ObjectKind, Scene, SceneEvent,
};
pub use tick::{
    FrameClock, FrameTime, MoveContext, Spawner, TickInput, continue_moving_spheres, move_object,
    tick,
};
