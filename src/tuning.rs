//! Data-driven scene tuning
//!
//! Every constant the frame loop uses lives here so a scene can be re-balanced
//! from a JSON document without a rebuild. Missing fields keep their defaults.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading a tuning document
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("could not read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("tuning JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("tuning field `{field}` must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("tuning range `{field}` is empty ({min} >= {max})")]
    EmptyRange { field: &'static str, min: f32, max: f32 },
    #[error("tuning field `{field}` is {value}, at most {max} allowed")]
    TooLarge { field: &'static str, value: u32, max: u32 },
}

/// Upper bound on debris spawned per struck sphere
pub const MAX_SPARKS_PER_IMPACT: u32 = 64;

/// Scene constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Driving ===
    /// Forward speed while steering (units/s)
    pub turn_speed: f32,
    /// Forward speed driving straight
    pub drive_speed: f32,
    /// Reverse speed
    pub reverse_speed: f32,
    /// Chassis yaw rate while steering (rad/s)
    pub turn_rate: f32,
    /// Front wheel steering limit (radians)
    pub max_steer_angle: f32,
    /// Front wheel steer/straighten rate (rad/s)
    pub steer_rate: f32,
    /// Wheel spin rates (rad/s) for turning, straight, reverse
    pub wheel_spin_turning: f32,
    pub wheel_spin_straight: f32,
    pub wheel_spin_reverse: f32,

    // === Collision ===
    /// Chassis bounding box half-extents
    pub chassis_half_extents: Vec3,
    /// Displacement applied to a struck sphere
    pub push_magnitude: f32,

    // === Road & falling ===
    /// |x| beyond which anything leaves the road and falls
    pub road_half_width: f32,
    /// Downward speed seeded on the first falling frame
    pub fall_seed_speed: f32,
    /// Gravity magnitude
    pub gravity: f32,
    /// Chassis tumble rates once off the road (rad/s)
    pub tumble_roll_rate: f32,
    pub tumble_pitch_rate: f32,
    pub tumble_yaw_rate: f32,

    // === Spheres ===
    pub sphere_count: usize,
    pub sphere_scale: f32,
    /// Spawn range across the road
    pub sphere_spawn_x: (f32, f32),
    /// Spawn range down the road
    pub sphere_spawn_z: (f32, f32),
    /// Oncoming drift speed range, drawn per sphere per frame
    pub sphere_drift_speed: (f32, f32),
    /// Spin of oncoming spheres (rad/s)
    pub sphere_drift_spin: f32,
    /// Speed of a pushed sphere along its push direction
    pub pushed_speed: f32,
    /// Spin of a pushed sphere, scaled by the direction's z component
    pub pushed_spin: f32,

    // === Roads ===
    pub road_count: usize,
    pub road_start_z: f32,
    pub road_spacing: f32,
    pub road_height: f32,
    pub road_scale: f32,

    // === Chase camera ===
    /// Camera offset behind the avatar in its local frame
    pub camera_offset: Vec3,
    pub camera_stiffness: f32,
    pub camera_damping: f32,

    // === Sparks ===
    pub sparks_per_impact: u32,
    pub spark_lifetime: f32,
    pub spark_speed: f32,
    pub spark_scale: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            turn_speed: 34.0,
            drive_speed: 50.0,
            reverse_speed: 14.0,
            turn_rate: 2.0,
            max_steer_angle: std::f32::consts::PI / 6.0,
            steer_rate: 2.0,
            wheel_spin_turning: 8.0,
            wheel_spin_straight: 10.0,
            wheel_spin_reverse: 5.0,

            chassis_half_extents: Vec3::new(8.0, 2.5, 18.0),
            push_magnitude: 1.0,

            road_half_width: 103.0,
            fall_seed_speed: -70.0,
            gravity: crate::consts::GRAVITY,
            tumble_roll_rate: 5.0,
            tumble_pitch_rate: 3.0,
            tumble_yaw_rate: 2.0,

            sphere_count: 20,
            sphere_scale: 5.0,
            sphere_spawn_x: (-100.0, 100.0),
            sphere_spawn_z: (25.0, 2000.0),
            sphere_drift_speed: (1.0, 60.0),
            sphere_drift_spin: 6.0,
            pushed_speed: 17.0,
            pushed_spin: 6.0,

            road_count: 20,
            road_start_z: 2000.0,
            road_spacing: 200.0,
            road_height: 44.0,
            road_scale: 100.0,

            camera_offset: Vec3::new(0.0, 15.0, -50.0),
            camera_stiffness: 220.0,
            camera_damping: 100.0,

            sparks_per_impact: 6,
            spark_lifetime: 0.6,
            spark_speed: 25.0,
            spark_scale: 0.8,
        }
    }
}

impl Tuning {
    /// Parse and validate a tuning document
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Self = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Read, parse and validate a tuning file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check values the frame loop relies on
    pub fn validate(&self) -> Result<(), TuningError> {
        let positive = [
            ("sphere_scale", self.sphere_scale),
            ("road_half_width", self.road_half_width),
            ("road_scale", self.road_scale),
            ("max_steer_angle", self.max_steer_angle),
            ("chassis_half_extents.x", self.chassis_half_extents.x),
            ("chassis_half_extents.y", self.chassis_half_extents.y),
            ("chassis_half_extents.z", self.chassis_half_extents.z),
            ("spark_lifetime", self.spark_lifetime),
            ("spark_speed", self.spark_speed),
            ("spark_scale", self.spark_scale),
        ];
        for (field, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(TuningError::NotPositive { field, value });
            }
        }

        let ranges = [
            ("sphere_spawn_x", self.sphere_spawn_x),
            ("sphere_spawn_z", self.sphere_spawn_z),
            ("sphere_drift_speed", self.sphere_drift_speed),
        ];
        for (field, (min, max)) in ranges {
            if min >= max {
                return Err(TuningError::EmptyRange { field, min, max });
            }
        }

        if self.sparks_per_impact > MAX_SPARKS_PER_IMPACT {
            return Err(TuningError::TooLarge {
                field: "sparks_per_impact",
                value: self.sparks_per_impact,
                max: MAX_SPARKS_PER_IMPACT,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Tuning::default().validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let tuning = Tuning::from_json(r#"{ "drive_speed": 80.0, "sphere_count": 3 }"#).unwrap();
        assert_eq!(tuning.drive_speed, 80.0);
        assert_eq!(tuning.sphere_count, 3);
        assert_eq!(tuning.turn_speed, 34.0);
        assert_eq!(tuning.camera_stiffness, 220.0);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = Tuning::from_json("{ drive_speed: ").unwrap_err();
        assert!(matches!(err, TuningError::Parse(_)));
    }

    #[test]
    fn test_rejects_non_positive_width() {
        let err = Tuning::from_json(r#"{ "road_half_width": 0.0 }"#).unwrap_err();
        assert!(matches!(
            err,
            TuningError::NotPositive {
                field: "road_half_width",
                ..
            }
        ));
    }

    #[test]
    fn test_spark_limits() {
        let err = Tuning {
            sparks_per_impact: 3_000_000_000,
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, TuningError::TooLarge { field: "sparks_per_impact", .. }));

        let at_cap = Tuning {
            sparks_per_impact: MAX_SPARKS_PER_IMPACT,
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());

        for doc in [
            r#"{ "spark_lifetime": 0.0 }"#,
            r#"{ "spark_speed": -1.0 }"#,
            r#"{ "spark_scale": 0.0 }"#,
        ] {
            let err = Tuning::from_json(doc).unwrap_err();
            assert!(matches!(err, TuningError::NotPositive { .. }), "{}", doc);
        }
    }

    #[test]
    fn test_from_path() {
        let err = Tuning::from_path("/nonexistent/chase-drive/tuning.json").unwrap_err();
        assert!(matches!(err, TuningError::Io(_)));

        let path = std::env::temp_dir().join(format!("chase_drive_tuning_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "drive_speed": 70.0 }"#).unwrap();
        let tuning = Tuning::from_path(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(tuning.unwrap().drive_speed, 70.0);
    }

    #[test]
    fn test_rejects_empty_range() {
        let err = Tuning::from_json(r#"{ "sphere_drift_speed": [5.0, 5.0] }"#).unwrap_err();
        assert!(matches!(err, TuningError::EmptyRange { .. }));
    }
}
