//! Link configuration, readable from a TOML file.
//!
//! Every field has a default matching the turtlesim panel, so an empty
//! document (or no file at all) yields a working configuration for a local
//! `rosbridge_server`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use turtlelink_frames::{ANGLE_SCALE_RAD, ARENA_HALF_EXTENT};
use turtlelink_types::LinkError;

/// Default rosbridge WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:9090";

/// Default pose telemetry topic.
pub const DEFAULT_POSE_TOPIC: &str = "/turtle1/pose";

/// Default velocity command topic.
pub const DEFAULT_COMMAND_TOPIC: &str = "/turtle1/cmd_vel";

/// Configuration of one robot link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// WebSocket URI of the rosbridge endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Topic carrying `turtlesim/msg/Pose` telemetry.
    #[serde(default = "default_pose_topic")]
    pub pose_topic: String,

    /// Topic accepting `geometry_msgs/msg/Twist` commands.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Arena half-extent in metres; calibrates the percentage scale.
    #[serde(default = "default_arena_max")]
    pub arena_max: f64,

    /// Reference angle scale in radians.
    #[serde(default = "default_angle_max")]
    pub angle_max: f64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_pose_topic() -> String {
    DEFAULT_POSE_TOPIC.to_string()
}

fn default_command_topic() -> String {
    DEFAULT_COMMAND_TOPIC.to_string()
}

fn default_arena_max() -> f64 {
    ARENA_HALF_EXTENT
}

fn default_angle_max() -> f64 {
    ANGLE_SCALE_RAD
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            pose_topic: default_pose_topic(),
            command_topic: default_command_topic(),
            arena_max: default_arena_max(),
            angle_max: default_angle_max(),
        }
    }
}

impl LinkConfig {
    /// Read a configuration from a TOML file. Missing fields fall back to
    /// the panel defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfiguration`] when the file cannot be
    /// read or parsed, or when a field fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, LinkError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            LinkError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: LinkConfig = toml::from_str(&raw).map_err(|e| {
            LinkError::InvalidConfiguration(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the transform and the connection
    /// cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfiguration`] for an empty endpoint or
    /// a zero scale constant.
    pub fn validate(&self) -> Result<(), LinkError> {
        if self.endpoint.is_empty() {
            return Err(LinkError::InvalidConfiguration(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.arena_max == 0.0 {
            return Err(LinkError::InvalidConfiguration(
                "arena_max must be non-zero".to_string(),
            ));
        }
        if self.angle_max == 0.0 {
            return Err(LinkError::InvalidConfiguration(
                "angle_max must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
