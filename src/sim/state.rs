//! Scene state and entity types
//!
//! Everything the frame loop mutates lives in [`Scene`]. Objects refer to each
//! other through stable [`ObjectId`] handles rather than references.

use std::collections::BTreeMap;

use glam::{Mat4, Vec3, Vec4};
use rand::Rng;

use super::camera::ChaseCamera;
use super::transform::{local_matrix, world_matrix};
use crate::consts::*;
use crate::tuning::Tuning;

/// Stable per-object handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

/// Hands out object IDs in increasing order
#[derive(Debug, Clone)]
pub struct EntityIds {
    next: u32,
}

impl Default for EntityIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl EntityIds {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }
}

/// Which axle a wheel is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axle {
    Rear,
    /// Front wheels steer
    Front,
}

/// Entity kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    /// The player-controlled car body
    Chassis,
    Wheel { axle: Axle },
    /// Obstacle on the road
    Sphere,
    /// Static road segment
    Road,
    /// Impact debris with remaining lifetime in seconds
    Spark { ttl: f32 },
}

/// A scene entity
#[derive(Debug, Clone)]
pub struct GameObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub scale: Vec3,
    /// Transform parent (wheels ride on the chassis)
    pub parent: Option<ObjectId>,
    /// World transform, refreshed by [`GameObject::update`]
    pub model: Mat4,
}

impl GameObject {
    pub fn new(id: ObjectId, kind: ObjectKind, position: Vec3) -> Self {
        Self {
            id,
            kind,
            position,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            scale: Vec3::ONE,
            parent: None,
            model: Mat4::IDENTITY,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Transform relative to the parent
    pub fn local_matrix(&self) -> Mat4 {
        local_matrix(self.position, self.yaw, self.pitch, self.roll, self.scale)
    }

    /// Recompute the world transform from the pose and the parent's world transform
    pub fn update(&mut self, parent_model: Option<&Mat4>) {
        self.model = world_matrix(self.local_matrix(), parent_model);
    }

    pub fn is_front_wheel(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Wheel {
                axle: Axle::Front
            }
        )
    }

    /// Integrate one frame of free fall. The first falling frame seeds the
    /// downward speed; returns true on that frame.
    pub fn fall(&mut self, seed_speed: f32, gravity: f32, dt: f32) -> bool {
        let seeded = self.velocity.y == 0.0;
        if seeded {
            self.velocity.y = seed_speed;
        }
        self.velocity += Vec3::new(0.0, -gravity, 0.0) * dt;
        self.position += self.velocity * dt;
        seeded
    }
}

/// Directional light
#[derive(Debug, Clone, Copy)]
pub struct Light {
    /// Homogeneous position; w = 0 marks a direction
    pub position: Vec4,
    pub power_density: Vec3,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec4::new(1.0, 1.0, 1.0, 0.0).normalize(),
            power_density: Vec3::splat(5.0),
        }
    }
}

/// Something that happened during a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneEvent {
    /// The chassis hit a sphere that was still on the road
    SphereStruck {
        id: ObjectId,
        direction: Vec3,
        contact: Vec3,
    },
    /// A sphere rolled off the road and started falling
    SphereFalling { id: ObjectId },
    /// The car left the road; input no longer steers it
    ControlLost,
}

/// Render groups, in draw order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawGroup {
    Vehicle,
    Spheres,
    Roads,
    PushedSpheres,
}

impl DrawGroup {
    pub const ORDER: [DrawGroup; 4] = [
        DrawGroup::Vehicle,
        DrawGroup::Spheres,
        DrawGroup::Roads,
        DrawGroup::PushedSpheres,
    ];
}

/// The whole driving scene
#[derive(Debug, Clone)]
pub struct Scene {
    /// Chassis at index 0, wheels at 1..=4, spawned objects after
    pub objects: Vec<GameObject>,
    /// Every sphere ever placed, ordered by id
    pub obstacles: Vec<GameObject>,
    /// Spheres not yet struck
    pub spheres: Vec<ObjectId>,
    /// Struck spheres and the direction they were pushed
    pub push_directions: BTreeMap<ObjectId, Vec3>,
    pub roads: Vec<GameObject>,
    pub camera: ChaseCamera,
    pub light: Light,
    /// Cleared for good once the car leaves the road
    pub is_controllable: bool,
    pub tuning: Tuning,
    pub ids: EntityIds,
}

impl Scene {
    /// Build the scene: chassis, four wheels, scattered spheres and the road
    pub fn new(tuning: Tuning, rng: &mut impl Rng) -> Self {
        let mut scene = Self {
            objects: Vec::with_capacity(1 + WHEEL_COUNT),
            obstacles: Vec::with_capacity(tuning.sphere_count),
            spheres: Vec::with_capacity(tuning.sphere_count),
            push_directions: BTreeMap::new(),
            roads: Vec::with_capacity(tuning.road_count),
            camera: ChaseCamera::default(),
            light: Light::default(),
            is_controllable: true,
            tuning,
            ids: EntityIds::default(),
        };

        let chassis_id = scene.next_entity_id();
        scene
            .objects
            .push(GameObject::new(chassis_id, ObjectKind::Chassis, Vec3::ZERO));

        let mounts = [
            (-WHEEL_OFFSET_X, -WHEEL_OFFSET_Z - 1.0, Axle::Rear),
            (WHEEL_OFFSET_X, -WHEEL_OFFSET_Z - 1.0, Axle::Rear),
            (-WHEEL_OFFSET_X, WHEEL_OFFSET_Z + 4.0, Axle::Front),
            (WHEEL_OFFSET_X, WHEEL_OFFSET_Z + 4.0, Axle::Front),
        ];
        for (x, z, axle) in mounts {
            let id = scene.next_entity_id();
            let wheel = GameObject::new(id, ObjectKind::Wheel { axle }, Vec3::new(x, WHEEL_Y, z))
                .with_parent(chassis_id);
            scene.objects.push(wheel);
        }

        let t = &scene.tuning;
        let (x_min, x_max) = t.sphere_spawn_x;
        let (z_min, z_max) = t.sphere_spawn_z;
        let sphere_scale = Vec3::splat(t.sphere_scale);
        for _ in 0..scene.tuning.sphere_count {
            let position = Vec3::new(
                rng.random_range(x_min..x_max),
                0.0,
                rng.random_range(z_min..z_max),
            );
            let id = scene.next_entity_id();
            scene
                .obstacles
                .push(GameObject::new(id, ObjectKind::Sphere, position).with_scale(sphere_scale));
            scene.spheres.push(id);
        }

        for i in 0..scene.tuning.road_count {
            let t = &scene.tuning;
            let position = Vec3::new(
                0.0,
                t.road_height,
                t.road_start_z - i as f32 * t.road_spacing,
            );
            let scale = Vec3::splat(t.road_scale);
            let id = scene.next_entity_id();
            let mut road = GameObject::new(id, ObjectKind::Road, position).with_scale(scale);
            road.pitch = std::f32::consts::FRAC_PI_2;
            road.roll = std::f32::consts::FRAC_PI_2;
            scene.roads.push(road);
        }

        scene.update_transforms();

        log::info!(
            "Scene built: {} objects, {} spheres, {} road segments",
            scene.objects.len(),
            scene.obstacles.len(),
            scene.roads.len()
        );

        scene
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> ObjectId {
        self.ids.allocate()
    }

    pub fn chassis(&self) -> &GameObject {
        &self.objects[CHASSIS_INDEX]
    }

    pub fn chassis_mut(&mut self) -> &mut GameObject {
        &mut self.objects[CHASSIS_INDEX]
    }

    /// Look up a sphere in the obstacle arena
    pub fn obstacle(&self, id: ObjectId) -> Option<&GameObject> {
        let index = self.obstacles.binary_search_by_key(&id, |o| o.id).ok()?;
        Some(&self.obstacles[index])
    }

    pub fn obstacle_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        let index = self.obstacles.binary_search_by_key(&id, |o| o.id).ok()?;
        Some(&mut self.obstacles[index])
    }

    /// Number of spheres the car has knocked off course
    pub fn struck_count(&self) -> usize {
        self.push_directions.len()
    }

    /// Refresh every world transform. Parents precede their children in
    /// `objects`, so a child always sees its parent's matrix for this frame.
    pub fn update_transforms(&mut self) {
        for i in 0..self.objects.len() {
            let parent_model = self.objects[i].parent.and_then(|pid| {
                self.objects[..i]
                    .iter()
                    .find(|o| o.id == pid)
                    .map(|o| o.model)
            });
            self.objects[i].update(parent_model.as_ref());
        }
        for sphere in &mut self.obstacles {
            sphere.update(None);
        }
        for road in &mut self.roads {
            road.update(None);
        }
    }

    /// Objects to draw, grouped in back-to-front order
    pub fn draw_groups(&self) -> Vec<(DrawGroup, Vec<&GameObject>)> {
        DrawGroup::ORDER
            .iter()
            .map(|&group| {
                let members: Vec<&GameObject> = match group {
                    DrawGroup::Vehicle => self.objects.iter().collect(),
                    DrawGroup::Spheres => self
                        .spheres
                        .iter()
                        .filter_map(|id| self.obstacle(*id))
                        .collect(),
                    DrawGroup::Roads => self.roads.iter().collect(),
                    DrawGroup::PushedSpheres => self
                        .push_directions
                        .keys()
                        .filter_map(|id| self.obstacle(*id))
                        .collect(),
                };
                (group, members)
            })
            .collect()
    }
}
