//! Per-frame scene update
//!
//! One call to [`tick`] advances the whole scene by the wall-clock time since the
//! previous frame: chase camera, driving, collisions, falling, pushed-sphere
//! motion, per-object move rules, then world transforms.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use super::camera::Spring;
use super::collision::{Aabb, BoundingSphere, apply_push, box_sphere_overlap};
use super::input::{Key, KeySet};
use super::state::{EntityIds, GameObject, ObjectId, ObjectKind, Scene, SceneEvent};
use crate::consts::*;
use crate::tuning::Tuning;
use crate::{approach, car_faces_forward, forward};

/// Input commands for a single frame
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Keys held down this frame
    pub keys: KeySet,
}

impl TickInput {
    pub fn with_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

/// Frame timing in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Time since the previous frame
    pub dt: f32,
    /// Time since the first frame
    pub t: f32,
}

impl FrameTime {
    pub fn new(dt: f32, t: f32) -> Self {
        Self { dt, t }
    }
}

/// Wall-clock bookkeeping for frame deltas
#[derive(Debug, Clone)]
pub struct FrameClock {
    first_ms: f64,
    last_ms: f64,
}

impl FrameClock {
    pub fn new(now_ms: f64) -> Self {
        Self {
            first_ms: now_ms,
            last_ms: now_ms,
        }
    }

    /// Record a new frame at `now_ms`. A clock that steps backwards yields dt = 0.
    pub fn advance(&mut self, now_ms: f64) -> FrameTime {
        let dt = ((now_ms - self.last_ms) / 1000.0).max(0.0) as f32;
        let t = ((now_ms - self.first_ms) / 1000.0) as f32;
        self.last_ms = now_ms;
        FrameTime { dt, t }
    }
}

/// What an object's move rule can see
pub struct MoveContext<'a> {
    pub dt: f32,
    pub t: f32,
    pub keys: KeySet,
    /// Every object as it was before this frame's move step
    pub objects: &'a [GameObject],
    /// Contact points of spheres struck this frame
    pub impacts: &'a [Vec3],
    pub tuning: &'a Tuning,
}

/// Collects objects spawned during the move step
pub struct Spawner<'a> {
    ids: &'a mut EntityIds,
    spawned: Vec<GameObject>,
}

impl<'a> Spawner<'a> {
    pub fn new(ids: &'a mut EntityIds) -> Self {
        Self {
            ids,
            spawned: Vec::new(),
        }
    }

    pub fn spawn(&mut self, kind: ObjectKind, position: Vec3) -> &mut GameObject {
        let id = self.ids.allocate();
        self.spawned.push(GameObject::new(id, kind, position));
        let last = self.spawned.len() - 1;
        &mut self.spawned[last]
    }

    pub fn into_spawned(self) -> Vec<GameObject> {
        self.spawned
    }
}

/// Advance the scene by one frame
pub fn tick(
    scene: &mut Scene,
    input: &TickInput,
    time: FrameTime,
    rng: &mut impl Rng,
) -> Vec<SceneEvent> {
    let dt = time.dt;
    let mut events = Vec::new();

    update_camera(scene, dt);

    if scene.is_controllable {
        drive(scene, &input.keys, dt);
    }
    if !input.keys.steering() {
        straighten_wheels(scene, dt);
    }

    resolve_collisions(scene, &mut events);
    drift_spheres(scene, dt, rng);
    apply_gravity(scene, dt, &mut events);
    check_chassis_exit(scene, dt, &mut events);
    continue_moving_spheres(scene, dt);
    move_objects(scene, input, time, &events);
    scene.update_transforms();

    events
}

/// Pull the chase camera toward its spot behind the chassis
fn update_camera(scene: &mut Scene, dt: f32) {
    let chassis = &scene.objects[CHASSIS_INDEX];
    let spring = Spring {
        stiffness: scene.tuning.camera_stiffness,
        damping: scene.tuning.camera_damping,
    };
    scene.camera.follow(
        chassis.position,
        chassis.yaw,
        scene.tuning.camera_offset,
        spring,
        dt,
    );
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Steer {
    Left,
    Right,
}

/// Apply player input to the chassis and its wheels
fn drive(scene: &mut Scene, keys: &KeySet, dt: f32) {
    let t = &scene.tuning;
    let up = keys.contains(Key::Up);

    // (yaw rate, forward speed, wheel spin, steering)
    let (turn, speed, spin, steer) = if keys.contains(Key::Left) && up {
        (t.turn_rate, t.turn_speed, t.wheel_spin_turning, Some(Steer::Left))
    } else if keys.contains(Key::Right) && up {
        (-t.turn_rate, t.turn_speed, t.wheel_spin_turning, Some(Steer::Right))
    } else if up {
        (0.0, t.drive_speed, t.wheel_spin_straight, None)
    } else if keys.contains(Key::Down) {
        (0.0, -t.reverse_speed, -t.wheel_spin_reverse, None)
    } else {
        return;
    };
    let max_steer = t.max_steer_angle;
    let steer_step = t.steer_rate * dt;

    let chassis = &mut scene.objects[CHASSIS_INDEX];
    chassis.yaw += turn * dt;
    chassis.position += forward(chassis.yaw) * speed * dt;

    for wheel in scene.objects.iter_mut().skip(1).take(WHEEL_COUNT) {
        if wheel.is_front_wheel() {
            match steer {
                Some(Steer::Left) => wheel.yaw = (wheel.yaw + steer_step).min(max_steer),
                Some(Steer::Right) => wheel.yaw = (wheel.yaw - steer_step).max(-max_steer),
                None => {}
            }
        }
        wheel.pitch += spin * dt;
    }
}

/// Relax the front wheels back to straight ahead
fn straighten_wheels(scene: &mut Scene, dt: f32) {
    let step = scene.tuning.steer_rate * dt;
    for wheel in scene.objects.iter_mut().skip(FIRST_FRONT_WHEEL).take(2) {
        wheel.yaw = approach(wheel.yaw, 0.0, step);
    }
}

/// Knock away every sphere the chassis box touches.
///
/// Spheres still on the road are swept back to front so removal is safe; each hit
/// one moves into `push_directions`. Spheres already pushed are then tested again
/// and re-pushed while they still overlap.
fn resolve_collisions(scene: &mut Scene, events: &mut Vec<SceneEvent>) {
    let car = scene.objects[CHASSIS_INDEX].position;
    let aabb = Aabb::from_center(car, scene.tuning.chassis_half_extents);
    let magnitude = scene.tuning.push_magnitude;

    for i in (0..scene.spheres.len()).rev() {
        let id = scene.spheres[i];
        let Some(hit) = push_if_touching(scene, id, &aabb, car, magnitude) else {
            continue;
        };
        scene.spheres.remove(i);
        scene.push_directions.insert(id, hit.direction);

        log::debug!(
            "Sphere {:?} struck, pushed along ({:.2}, {:.2}, {:.2})",
            id,
            hit.direction.x,
            hit.direction.y,
            hit.direction.z
        );
        events.push(SceneEvent::SphereStruck {
            id,
            direction: hit.direction,
            contact: hit.contact,
        });
    }

    let pushed: Vec<ObjectId> = scene.push_directions.keys().copied().collect();
    for id in pushed {
        if let Some(hit) = push_if_touching(scene, id, &aabb, car, magnitude) {
            scene.push_directions.insert(id, hit.direction);
        }
    }
}

struct Hit {
    direction: Vec3,
    contact: Vec3,
}

fn push_if_touching(
    scene: &mut Scene,
    id: ObjectId,
    aabb: &Aabb,
    car: Vec3,
    magnitude: f32,
) -> Option<Hit> {
    let sphere = scene.obstacle_mut(id)?;
    let bounds = BoundingSphere::of(sphere.position, sphere.scale);
    if !box_sphere_overlap(aabb, &bounds) {
        return None;
    }
    let push = apply_push(car, sphere.position, magnitude);
    sphere.position = push.new_position;
    Some(Hit {
        direction: push.direction,
        contact: aabb.closest_point(bounds.center),
    })
}

/// Oncoming spheres roll toward the car at a fresh random speed each frame
fn drift_spheres(scene: &mut Scene, dt: f32, rng: &mut impl Rng) {
    let (min_speed, max_speed) = scene.tuning.sphere_drift_speed;
    let spin = scene.tuning.sphere_drift_spin;
    for i in 0..scene.spheres.len() {
        let id = scene.spheres[i];
        let speed = rng.random_range(min_speed..max_speed);
        if let Some(sphere) = scene.obstacle_mut(id) {
            sphere.position.z -= dt * speed;
            sphere.pitch -= dt * spin;
        }
    }
}

/// Spheres past the road edge fall, whether or not they were struck
fn apply_gravity(scene: &mut Scene, dt: f32, events: &mut Vec<SceneEvent>) {
    if dt <= 0.0 {
        return;
    }
    let t = &scene.tuning;
    for sphere in &mut scene.obstacles {
        if sphere.position.x.abs() > t.road_half_width
            && sphere.fall(t.fall_seed_speed, t.gravity, dt)
        {
            log::debug!("Sphere {:?} left the road", sphere.id);
            events.push(SceneEvent::SphereFalling { id: sphere.id });
        }
    }
}

/// Once the chassis leaves the road it tumbles and falls for good
fn check_chassis_exit(scene: &mut Scene, dt: f32, events: &mut Vec<SceneEvent>) {
    let width = scene.tuning.road_half_width;
    let x = scene.objects[CHASSIS_INDEX].position.x;
    if x.abs() <= width {
        return;
    }

    if scene.is_controllable {
        scene.is_controllable = false;
        log::info!("Car left the road at x = {:.1}", x);
        events.push(SceneEvent::ControlLost);
    }
    if dt <= 0.0 {
        return;
    }

    let t = &scene.tuning;
    let chassis = &mut scene.objects[CHASSIS_INDEX];
    let roll_sign = if (x < -width) == car_faces_forward(chassis.yaw) {
        1.0
    } else {
        -1.0
    };
    chassis.fall(t.fall_seed_speed, t.gravity, dt);
    chassis.roll += roll_sign * t.tumble_roll_rate * dt;
    chassis.pitch += t.tumble_pitch_rate * dt;
    chassis.yaw += t.tumble_yaw_rate * dt;
}

/// Struck spheres keep sliding along the direction they were pushed
pub fn continue_moving_spheres(scene: &mut Scene, dt: f32) {
    let speed = scene.tuning.pushed_speed;
    let spin = scene.tuning.pushed_spin;
    for sphere in &mut scene.obstacles {
        if let Some(direction) = scene.push_directions.get(&sphere.id) {
            sphere.position += *direction * dt * speed;
            sphere.pitch += dt * spin * direction.z;
        }
    }
}

/// Run every object's move rule, then drop the dead and append the spawned
fn move_objects(scene: &mut Scene, input: &TickInput, time: FrameTime, events: &[SceneEvent]) {
    let snapshot = scene.objects.clone();
    let impacts: Vec<Vec3> = events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::SphereStruck { contact, .. } => Some(*contact),
            _ => None,
        })
        .collect();

    let ctx = MoveContext {
        dt: time.dt,
        t: time.t,
        keys: input.keys,
        objects: &snapshot,
        impacts: &impacts,
        tuning: &scene.tuning,
    };
    let mut spawner = Spawner::new(&mut scene.ids);

    let alive: Vec<bool> = scene
        .objects
        .iter_mut()
        .map(|obj| move_object(obj, &ctx, &mut spawner))
        .collect();

    let mut index = 0;
    scene.objects.retain(|_| {
        let keep = alive[index];
        index += 1;
        keep
    });
    scene.objects.extend(spawner.into_spawned());
}

/// Per-kind move rule. Returns false when the object should be removed.
pub fn move_object(obj: &mut GameObject, ctx: &MoveContext, spawner: &mut Spawner) -> bool {
    match obj.kind {
        ObjectKind::Chassis => {
            emit_sparks(ctx, spawner);
            true
        }
        ObjectKind::Wheel { .. } | ObjectKind::Sphere | ObjectKind::Road => true,
        ObjectKind::Spark { ttl } => {
            let dt = ctx.dt;
            obj.velocity.y -= ctx.tuning.gravity * dt;
            obj.position += obj.velocity * dt;
            obj.pitch += dt * 9.0;
            obj.yaw += dt * 7.0;
            let ttl = ttl - dt;
            obj.kind = ObjectKind::Spark { ttl };
            ttl > 0.0
        }
    }
}

/// Debris burst at every contact point of this frame
fn emit_sparks(ctx: &MoveContext, spawner: &mut Spawner) {
    let t = ctx.tuning;
    let count = t.sparks_per_impact;
    if count == 0 {
        return;
    }

    for (i, contact) in ctx.impacts.iter().enumerate() {
        for j in 0..count {
            let hash = ctx
                .t
                .to_bits()
                .wrapping_mul(2654435761)
                .wrapping_add((i as u32).wrapping_mul(count).wrapping_add(j).wrapping_mul(7919));
            let rand1 = (hash % 1000) as f32 / 1000.0;
            let rand2 = ((hash >> 10) % 1000) as f32 / 1000.0;
            let rand3 = ((hash >> 20) % 1000) as f32 / 1000.0;

            // Upward cone, spread all the way around
            let azimuth = rand1 * TAU + j as f32 * (TAU / count as f32);
            let rise = 0.4 + rand2 * 0.6;
            let across = (1.0 - rise * rise).sqrt();
            let direction = Vec3::new(azimuth.cos() * across, rise, azimuth.sin() * across);
            let speed = t.spark_speed * (0.6 + 0.4 * rand3);

            let spark = spawner.spawn(
                ObjectKind::Spark {
                    ttl: t.spark_lifetime * (0.7 + 0.3 * rand3),
                },
                *contact,
            );
            spark.velocity = direction * speed;
            spark.scale = Vec3::splat(t.spark_scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Axle;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;
    use std::f32::consts::PI;

    const DT: f32 = 1.0 / 60.0;

    fn empty_road() -> Tuning {
        Tuning {
            sphere_count: 0,
            ..Default::default()
        }
    }

    fn scene_with(tuning: Tuning) -> (Scene, Pcg32) {
        let mut rng = Pcg32::seed_from_u64(42);
        let scene = Scene::new(tuning, &mut rng);
        (scene, rng)
    }

    /// Place one sphere in an otherwise empty scene
    fn add_sphere(scene: &mut Scene, position: Vec3, scale: f32) -> ObjectId {
        let id = scene.next_entity_id();
        let sphere = GameObject::new(id, ObjectKind::Sphere, position).with_scale(Vec3::splat(scale));
        scene.obstacles.push(sphere);
        scene.spheres.push(id);
        id
    }

    fn run(scene: &mut Scene, rng: &mut Pcg32, keys: &[Key], frames: usize) -> Vec<SceneEvent> {
        let input = TickInput::with_keys(keys.iter().copied());
        let mut events = Vec::new();
        for frame in 0..frames {
            let time = FrameTime::new(DT, frame as f32 * DT);
            events.extend(tick(scene, &input, time, rng));
        }
        events
    }

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::new(1000.0);
        let time = clock.advance(1016.0);
        assert!((time.dt - 0.016).abs() < 1e-6);
        assert!((time.t - 0.016).abs() < 1e-6);
        let time = clock.advance(1050.0);
        assert!((time.dt - 0.034).abs() < 1e-6);
        assert!((time.t - 0.05).abs() < 1e-6);
        // Clock stepping backwards
        let time = clock.advance(1040.0);
        assert_eq!(time.dt, 0.0);
    }

    #[test]
    fn test_struck_sphere_moves_to_push_directions() {
        let (mut scene, mut rng) = scene_with(empty_road());
        let id = add_sphere(&mut scene, Vec3::new(0.0, 0.0, 15.0), 10.0);

        let events = tick(&mut scene, &TickInput::default(), FrameTime::new(0.0, 0.0), &mut rng);

        assert!(!scene.spheres.contains(&id));
        assert_eq!(scene.push_directions.len(), 1);
        let direction = scene.push_directions[&id];
        assert!((direction - Vec3::Z).length() < 1e-5);
        assert!(matches!(
            events[0],
            SceneEvent::SphereStruck { id: hit, .. } if hit == id
        ));

        // Pushed once on the first hit and again by the pushed-sphere re-test
        let sphere = scene.obstacle(id).unwrap();
        assert!((sphere.position - Vec3::new(0.0, 0.0, 17.0)).length() < 1e-5);
    }

    #[test]
    fn test_push_direction_recorded_at_impact() {
        let (mut scene, mut rng) = scene_with(empty_road());
        let start = Vec3::new(6.0, 0.0, 10.0);
        let id = add_sphere(&mut scene, start, 10.0);

        tick(&mut scene, &TickInput::default(), FrameTime::new(0.0, 0.0), &mut rng);
        let direction = scene.push_directions[&id];
        assert!((direction - start.normalize()).length() < 1e-5);
    }

    #[test]
    fn test_continue_moving_keeps_direction() {
        let (mut scene, _) = scene_with(empty_road());
        let id = add_sphere(&mut scene, Vec3::new(40.0, 0.0, 300.0), 5.0);
        scene.spheres.clear();
        let direction = Vec3::new(0.6, 0.0, 0.8);
        scene.push_directions.insert(id, direction);

        let before = scene.obstacle(id).unwrap().position;
        continue_moving_spheres(&mut scene, 0.5);
        let after = scene.obstacle(id).unwrap().position;

        assert_eq!(scene.push_directions[&id], direction);
        assert!((after - (before + direction * 0.5 * 17.0)).length() < 1e-4);

        continue_moving_spheres(&mut scene, 0.5);
        assert_eq!(scene.push_directions[&id], direction);
        assert_ne!(scene.obstacle(id).unwrap().position, after);
    }

    #[test]
    fn test_zero_dt_changes_nothing() {
        let (mut scene, mut rng) = scene_with(Tuning::default());
        let before = scene.clone();

        let input = TickInput::with_keys([Key::Left, Key::Up]);
        tick(&mut scene, &input, FrameTime::new(0.0, 0.0), &mut rng);

        for (a, b) in before.objects.iter().zip(&scene.objects) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
            assert_eq!(a.yaw, b.yaw);
        }
        for (a, b) in before.obstacles.iter().zip(&scene.obstacles) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
        }
        assert_eq!(before.camera.position, scene.camera.position);
        assert!(scene.objects.iter().all(|o| o.model.is_finite()));
    }

    #[test]
    fn test_sphere_falls_off_road() {
        let (mut scene, mut rng) = scene_with(empty_road());
        let id = add_sphere(&mut scene, Vec3::new(110.0, 0.0, 900.0), 5.0);

        let events = run(&mut scene, &mut rng, &[], 1);
        assert!(events.contains(&SceneEvent::SphereFalling { id }));

        let mut last = scene.obstacle(id).unwrap().clone();
        assert!(last.velocity.y < -70.0);
        for _ in 0..30 {
            run(&mut scene, &mut rng, &[], 1);
            let now = scene.obstacle(id).unwrap().clone();
            assert!(now.velocity.y.abs() > last.velocity.y.abs());
            assert!(now.position.y < last.position.y);
            last = now;
        }
    }

    #[test]
    fn test_pushed_sphere_falls_while_sliding() {
        let (mut scene, mut rng) = scene_with(empty_road());
        let id = add_sphere(&mut scene, Vec3::new(110.0, 0.0, 500.0), 5.0);
        scene.spheres.clear();
        scene.push_directions.insert(id, Vec3::X);

        let events = run(&mut scene, &mut rng, &[], 1);
        assert!(events.contains(&SceneEvent::SphereFalling { id }));

        let sphere = scene.obstacle(id).unwrap();
        assert!((sphere.position.x - (110.0 + 17.0 * DT)).abs() < 1e-3);
        assert_eq!(sphere.position.z, 500.0);
        assert!(sphere.position.y < 0.0);
        assert!(sphere.velocity.y < -70.0);
        assert_eq!(sphere.velocity.x, 0.0);
        assert_eq!(scene.push_directions[&id], Vec3::X);
    }

    #[test]
    fn test_sphere_on_road_does_not_fall() {
        let (mut scene, mut rng) = scene_with(empty_road());
        let id = add_sphere(&mut scene, Vec3::new(100.0, 0.0, 900.0), 5.0);
        run(&mut scene, &mut rng, &[], 10);
        let sphere = scene.obstacle(id).unwrap();
        assert_eq!(sphere.position.y, 0.0);
        assert_eq!(sphere.velocity, Vec3::ZERO);
        assert!(sphere.position.z < 900.0);
    }

    #[test]
    fn test_control_lost_once_and_for_good() {
        let (mut scene, mut rng) = scene_with(empty_road());
        scene.chassis_mut().position.x = 104.0;

        let events = run(&mut scene, &mut rng, &[Key::Up], 5);
        assert!(!scene.is_controllable);
        let lost = events
            .iter()
            .filter(|e| **e == SceneEvent::ControlLost)
            .count();
        assert_eq!(lost, 1);
        assert!(scene.chassis().position.y < 0.0);

        // Even back on the road, input stays ignored
        scene.chassis_mut().position = Vec3::ZERO;
        scene.chassis_mut().velocity = Vec3::ZERO;
        let events = run(&mut scene, &mut rng, &[Key::Up], 5);
        assert!(!scene.is_controllable);
        assert!(events.is_empty());
        assert_eq!(scene.chassis().position, Vec3::ZERO);
    }

    #[test]
    fn test_tumble_direction_depends_on_exit_side() {
        let (mut left, mut rng) = scene_with(empty_road());
        left.chassis_mut().position.x = -104.0;
        run(&mut left, &mut rng, &[], 1);
        assert!(left.chassis().roll > 0.0);

        let (mut right, mut rng) = scene_with(empty_road());
        right.chassis_mut().position.x = 104.0;
        run(&mut right, &mut rng, &[], 1);
        assert!(right.chassis().roll < 0.0);
        assert!(right.chassis().pitch > 0.0);
    }

    #[test]
    fn test_tumble_direction_flips_when_facing_backward() {
        let (mut right, mut rng) = scene_with(empty_road());
        right.chassis_mut().position.x = 104.0;
        right.chassis_mut().yaw = PI;
        run(&mut right, &mut rng, &[], 1);
        assert!((right.chassis().roll - 5.0 * DT).abs() < 1e-5);

        let (mut left, mut rng) = scene_with(empty_road());
        left.chassis_mut().position.x = -104.0;
        left.chassis_mut().yaw = PI;
        run(&mut left, &mut rng, &[], 1);
        assert!((left.chassis().roll + 5.0 * DT).abs() < 1e-5);
    }

    #[test]
    fn test_spark_hash_does_not_overflow() {
        let (mut scene, mut rng) = scene_with(Tuning {
            sparks_per_impact: crate::tuning::MAX_SPARKS_PER_IMPACT,
            ..empty_road()
        });
        add_sphere(&mut scene, Vec3::new(0.0, 0.0, 15.0), 10.0);
        add_sphere(&mut scene, Vec3::new(-4.0, 0.0, -15.0), 10.0);
        let events = run(&mut scene, &mut rng, &[], 1);

        let impacts = events
            .iter()
            .filter(|e| matches!(e, SceneEvent::SphereStruck { .. }))
            .count();
        assert_eq!(impacts, 2);
        let sparks = scene
            .objects
            .iter()
            .filter(|o| matches!(o.kind, ObjectKind::Spark { .. }))
            .count();
        assert_eq!(sparks, 2 * crate::tuning::MAX_SPARKS_PER_IMPACT as usize);
    }

    #[test]
    fn test_drive_straight() {
        let (mut scene, mut rng) = scene_with(empty_road());
        run(&mut scene, &mut rng, &[Key::Up], 60);
        let chassis = scene.chassis();
        assert!((chassis.position.z - 50.0).abs() < 1e-2);
        assert!(chassis.position.x.abs() < 1e-4);
        assert!((scene.objects[1].pitch - 10.0).abs() < 1e-2);

        run(&mut scene, &mut rng, &[Key::Down], 60);
        assert!((scene.chassis().position.z - 36.0).abs() < 1e-2);
    }

    #[test]
    fn test_left_without_up_does_not_move() {
        let (mut scene, mut rng) = scene_with(empty_road());
        run(&mut scene, &mut rng, &[Key::Left], 30);
        assert_eq!(scene.chassis().position, Vec3::ZERO);
        assert_eq!(scene.chassis().yaw, 0.0);
    }

    #[test]
    fn test_steering_clamped_then_straightens() {
        let max = PI / 6.0;
        let (mut scene, mut rng) = scene_with(empty_road());

        for _ in 0..120 {
            run(&mut scene, &mut rng, &[Key::Left, Key::Up], 1);
            for wheel in &scene.objects[3..5] {
                assert!(wheel.yaw <= max);
            }
        }
        assert!((scene.objects[3].yaw - max).abs() < 1e-6);
        assert_eq!(scene.objects[1].yaw, 0.0);
        assert!(scene.chassis().yaw > 0.0);

        run(&mut scene, &mut rng, &[Key::Up], 60);
        assert_eq!(scene.objects[3].yaw, 0.0);
        assert_eq!(scene.objects[4].yaw, 0.0);

        for _ in 0..120 {
            run(&mut scene, &mut rng, &[Key::Right, Key::Up], 1);
            for wheel in &scene.objects[3..5] {
                assert!(wheel.yaw >= -max);
            }
        }
        assert!((scene.objects[4].yaw + max).abs() < 1e-6);
    }

    #[test]
    fn test_sparks_spawn_and_expire() {
        let (mut scene, mut rng) = scene_with(empty_road());
        add_sphere(&mut scene, Vec3::new(0.0, 0.0, 15.0), 10.0);

        run(&mut scene, &mut rng, &[], 1);
        let sparks = scene
            .objects
            .iter()
            .filter(|o| matches!(o.kind, ObjectKind::Spark { .. }))
            .count();
        assert_eq!(sparks, 6);
        assert_eq!(scene.objects[0].kind, ObjectKind::Chassis);
        assert_eq!(scene.objects[1].kind, ObjectKind::Wheel { axle: Axle::Rear });

        run(&mut scene, &mut rng, &[], 60);
        assert_eq!(scene.objects.len(), 5);
    }

    #[test]
    fn test_sparks_disabled() {
        let (mut scene, mut rng) = scene_with(Tuning {
            sparks_per_impact: 0,
            ..empty_road()
        });
        add_sphere(&mut scene, Vec3::new(0.0, 0.0, 15.0), 10.0);
        run(&mut scene, &mut rng, &[], 1);
        assert_eq!(scene.objects.len(), 5);
        assert_eq!(scene.struck_count(), 1);
    }

    #[test]
    fn test_determinism() {
        let (mut a, mut rng_a) = scene_with(Tuning::default());
        let (mut b, mut rng_b) = scene_with(Tuning::default());

        let script: [&[Key]; 4] = [&[Key::Up], &[Key::Left, Key::Up], &[], &[Key::Right, Key::Up]];
        for keys in script {
            run(&mut a, &mut rng_a, keys, 30);
            run(&mut b, &mut rng_b, keys, 30);
        }

        assert_eq!(a.chassis().position, b.chassis().position);
        assert_eq!(a.spheres, b.spheres);
        for (x, y) in a.obstacles.iter().zip(&b.obstacles) {
            assert_eq!(x.position, y.position);
        }
        assert_eq!(a.camera.position, b.camera.position);
    }

    proptest! {
        #[test]
        fn prop_steering_never_exceeds_limit(frames in 1usize..200, dt in 0.001f32..0.2) {
            let (mut scene, mut rng) = scene_with(empty_road());
            let input = TickInput::with_keys([Key::Left, Key::Up]);
            for frame in 0..frames {
                tick(&mut scene, &input, FrameTime::new(dt, frame as f32 * dt), &mut rng);
                for wheel in &scene.objects[3..5] {
                    prop_assert!(wheel.yaw <= PI / 6.0);
                    prop_assert!(wheel.yaw >= 0.0);
                }
            }
        }

        #[test]
        fn prop_controllable_never_returns(xs in proptest::collection::vec(-150.0f32..150.0, 1..20)) {
            let (mut scene, mut rng) = scene_with(empty_road());
            let mut was_lost = false;
            for x in xs {
                scene.chassis_mut().position.x = x;
                tick(&mut scene, &TickInput::default(), FrameTime::new(DT, 0.0), &mut rng);
                if was_lost {
                    prop_assert!(!scene.is_controllable);
                }
                was_lost = !scene.is_controllable;
            }
        }
    }
}
