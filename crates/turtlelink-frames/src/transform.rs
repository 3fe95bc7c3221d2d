//! Frame transform between robot coordinates and the presentation frame.
//!
//! The presentation frame places the robot as a percentage of the arena
//! extent on each axis and rotates the marker by a screen angle in degrees.
//! The mapping is linear and deliberately unclamped: a pose outside the
//! nominal arena produces percentages outside `0..=100`, and a heading
//! beyond ±π produces a screen angle outside `0..=360`. Clipping is the
//! renderer's job.
//!
//! # Example
//!
//! ```rust
//! use turtlelink_frames::{to_normalized, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD};
//! use turtlelink_types::Pose;
//!
//! let pose = Pose { x: 0.0, y: 0.0, theta: 0.0 };
//! let ui = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
//! assert!((ui.ui_x - 0.0).abs() < 1e-9);
//! assert!((ui.ui_theta - 90.0).abs() < 1e-9);
//! ```

use turtlelink_types::{LinkError, NormalizedPose, Pose};

/// Arena half-extent in metres: the turtlesim window spans `0..=11.09` on
/// both axes. Calibrates the percentage scale of the presentation frame.
pub const ARENA_HALF_EXTENT: f64 = 11.09;

/// Reference angle scale in radians (≈π). A heading of `ANGLE_SCALE_RAD`
/// maps to a half-turn of the on-screen marker.
pub const ANGLE_SCALE_RAD: f64 = 3.14;

/// Map a robot-frame pose into the presentation frame.
///
/// * `ui_x = (x / arena_max) * 100`
/// * `ui_y = (y / arena_max) * 100`
/// * `ui_theta = -(theta / angle_max) * 180 + 90`
///
/// `arena_max` and `angle_max` are the calibration constants the
/// presentation frame was scaled with; callers must pass the same values
/// everywhere or the visual mapping shifts while the underlying pose stays
/// unchanged.
///
/// # Errors
///
/// Returns [`LinkError::InvalidConfiguration`] when either scale constant
/// is zero, rather than dividing by it.
pub fn to_normalized(
    pose: &Pose,
    arena_max: f64,
    angle_max: f64,
) -> Result<NormalizedPose, LinkError> {
    check_scales(arena_max, angle_max)?;
    Ok(NormalizedPose {
        ui_x: (pose.x / arena_max) * 100.0,
        ui_y: (pose.y / arena_max) * 100.0,
        ui_theta: -(pose.theta / angle_max) * 180.0 + 90.0,
    })
}

/// Inverse of [`to_normalized`]: recover the robot-frame pose a normalized
/// pose was derived from.
///
/// # Errors
///
/// Returns [`LinkError::InvalidConfiguration`] when either scale constant
/// is zero.
pub fn to_robot_frame(
    normalized: &NormalizedPose,
    arena_max: f64,
    angle_max: f64,
) -> Result<Pose, LinkError> {
    check_scales(arena_max, angle_max)?;
    Ok(Pose {
        x: (normalized.ui_x / 100.0) * arena_max,
        y: (normalized.ui_y / 100.0) * arena_max,
        theta: ((90.0 - normalized.ui_theta) / 180.0) * angle_max,
    })
}

fn check_scales(arena_max: f64, angle_max: f64) -> Result<(), LinkError> {
    if arena_max == 0.0 {
        return Err(LinkError::InvalidConfiguration(
            "arena_max must be non-zero".to_string(),
        ));
    }
    if angle_max == 0.0 {
        return Err(LinkError::InvalidConfiguration(
            "angle_max must be non-zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_maps_to_corner_facing_up() {
        let ui = to_normalized(&Pose::ORIGIN, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        assert!((ui.ui_x - 0.0).abs() < 1e-9);
        assert!((ui.ui_y - 0.0).abs() < 1e-9);
        assert!((ui.ui_theta - 90.0).abs() < 1e-9);
    }

    #[test]
    fn origin_maps_to_ui_theta_90_for_any_positive_scales() {
        for arena_max in [1.0, 5.5, 11.09, 100.0] {
            for angle_max in [1.0, 3.14, 6.28] {
                let ui = to_normalized(&Pose::ORIGIN, arena_max, angle_max).unwrap();
                assert!((ui.ui_x).abs() < 1e-9);
                assert!((ui.ui_y).abs() < 1e-9);
                assert!((ui.ui_theta - 90.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn transform_is_deterministic() {
        let pose = Pose {
            x: 5.0,
            y: 3.0,
            theta: 1.57,
        };
        let a = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        let b = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mid_arena_pose_maps_to_expected_percentages() {
        let pose = Pose {
            x: 5.0,
            y: 3.0,
            theta: 1.57,
        };
        let ui = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        assert!((ui.ui_x - (5.0 / ARENA_HALF_EXTENT) * 100.0).abs() < 1e-9);
        assert!((ui.ui_y - (3.0 / ARENA_HALF_EXTENT) * 100.0).abs() < 1e-9);
        assert!((ui.ui_theta - (-(1.57 / ANGLE_SCALE_RAD) * 180.0 + 90.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_arena_scale_is_rejected() {
        let pose = Pose {
            x: 1.0,
            y: 1.0,
            theta: 0.5,
        };
        let result = to_normalized(&pose, 0.0, ANGLE_SCALE_RAD);
        assert!(matches!(result, Err(LinkError::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_angle_scale_is_rejected() {
        let pose = Pose {
            x: 1.0,
            y: 1.0,
            theta: 0.5,
        };
        let result = to_normalized(&pose, ARENA_HALF_EXTENT, 0.0);
        assert!(matches!(result, Err(LinkError::InvalidConfiguration(_))));
    }

    #[test]
    fn out_of_envelope_pose_is_not_clamped() {
        let pose = Pose {
            x: ARENA_HALF_EXTENT * 2.0,
            y: -1.0,
            theta: 10.0,
        };
        let ui = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        assert!((ui.ui_x - 200.0).abs() < 1e-9);
        assert!(ui.ui_y < 0.0);
        // Rotations beyond ±π stay on the unbounded linear formula.
        assert!(ui.ui_theta < -360.0);
    }

    #[test]
    fn inverse_recovers_robot_frame() {
        let pose = Pose {
            x: 7.25,
            y: 2.5,
            theta: -0.8,
        };
        let ui = to_normalized(&pose, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        let back = to_robot_frame(&ui, ARENA_HALF_EXTENT, ANGLE_SCALE_RAD).unwrap();
        assert!((back.x - pose.x).abs() < 1e-9);
        assert!((back.y - pose.y).abs() < 1e-9);
        assert!((back.theta - pose.theta).abs() < 1e-9);
    }

    #[test]
    fn inverse_rejects_zero_scales() {
        let result = to_robot_frame(&NormalizedPose::INITIAL, 0.0, ANGLE_SCALE_RAD);
        assert!(matches!(result, Err(LinkError::InvalidConfiguration(_))));
        let result = to_robot_frame(&NormalizedPose::INITIAL, ARENA_HALF_EXTENT, 0.0);
        assert!(matches!(result, Err(LinkError::InvalidConfiguration(_))));
    }
}
