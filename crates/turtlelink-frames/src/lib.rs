//! `turtlelink-frames` – pure coordinate-frame mathematics.
//!
//! Maps between the robot's native metric/radian frame and the normalized
//! 0–100% presentation frame used by any renderer. Stateless: every function
//! is a pure mapping of its inputs.
//!
//! # Modules
//!
//! - [`transform`] – the forward and inverse frame transforms plus the
//!   calibration constants of the turtlesim arena.

pub mod transform;

pub use transform::{ANGLE_SCALE_RAD, ARENA_HALF_EXTENT, to_normalized, to_robot_frame};
