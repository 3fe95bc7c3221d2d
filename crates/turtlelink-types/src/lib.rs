//! `turtlelink-types` – shared data model for the robot link.
//!
//! Every other crate in the workspace depends on this one. It defines the
//! pose types in both reference frames, the connection state machine's
//! vocabulary, the velocity command value object, the error taxonomy, and
//! the event wrapper consumers subscribe to for status/pose notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Robot-frame pose as reported by telemetry: SI metres and signed radians.
///
/// Produced only by telemetry decoding. Each record supersedes the previous
/// one wholesale; no history is retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    /// The documented default pose before any telemetry record has arrived.
    pub const ORIGIN: Pose = Pose {
        x: 0.0,
        y: 0.0,
        theta: 0.0,
    };
}

/// Presentation-frame pose: percentages of the arena extent and a screen
/// rotation in degrees.
///
/// Always derived from the latest [`Pose`] through the frame transform;
/// never mutated independently. Values outside `0..=100` are legitimate
/// when the robot leaves its nominal envelope — the renderer clips, the
/// link reports faithfully. `ui_theta` is deliberately unbounded (no ±360°
/// wrap).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPose {
    pub ui_x: f64,
    pub ui_y: f64,
    pub ui_theta: f64,
}

impl NormalizedPose {
    /// Initial presentation pose shown before the first telemetry record:
    /// the arena centre with the marker facing up.
    ///
    /// This is an explicit initial value, not the transform of
    /// [`Pose::ORIGIN`] (which maps to the arena corner). The first record
    /// replaces it wholesale.
    pub const INITIAL: NormalizedPose = NormalizedPose {
        ui_x: 50.0,
        ui_y: 50.0,
        ui_theta: 90.0,
    };
}

/// Lifecycle state of the bridge connection.
///
/// Transitions: `Idle -> Connecting -> Connected -> (Disconnected | Error)`.
/// `Disconnected` and `Error` are terminal until the operator explicitly
/// re-opens; no automatic retry exists anywhere in the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No connection attempt has been made yet.
    Idle,
    /// A transport handshake is in flight.
    Connecting,
    /// Handshake succeeded; channels may be bound.
    Connected,
    /// Orderly teardown (remote close or explicit close).
    Disconnected,
    /// Transport-level failure; the diagnostic travels on the event surface.
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Idle => "Idle",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Error => "Error",
        };
        write!(f, "{s}")
    }
}

/// A transient velocity command: constructed per operator intent, sent once,
/// never queued or retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Forward/back magnitude (m/s in the robot frame).
    pub linear: f64,
    /// Turn magnitude (rad/s, positive anticlockwise).
    pub angular: f64,
}

/// Error taxonomy for the whole link.
///
/// Transport faults are absorbed at the connection boundary and surface as
/// status + events, never as caller-facing panics. `NotConnected` and
/// `InvalidConfiguration` are caller-misuse errors returned synchronously.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkError {
    #[error("Bridge connection failed: {0}")]
    Connection(String),

    #[error("Malformed telemetry record: {0}")]
    MalformedRecord(String),

    #[error("Bridge is not connected")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Notification wrapper delivered to renderer-side subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: LinkEventPayload,
}

impl LinkEvent {
    /// Build an event stamped with a fresh id and the current time.
    pub fn now(payload: LinkEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Variants of the consumer-facing notification surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkEventPayload {
    /// The connection entered a new lifecycle state.
    StatusChanged(ConnectionStatus),
    /// A telemetry record arrived and replaced the current pose.
    PoseChanged {
        pose: Pose,
        normalized: NormalizedPose,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_serialization_roundtrip() {
        let pose = Pose {
            x: 5.0,
            y: 3.0,
            theta: 1.57,
        };
        let json = serde_json::to_string(&pose).unwrap();
        let back: Pose = serde_json::from_str(&json).unwrap();
        assert_eq!(pose, back);
    }

    #[test]
    fn initial_normalized_pose_is_arena_centre() {
        assert!((NormalizedPose::INITIAL.ui_x - 50.0).abs() < f64::EPSILON);
        assert!((NormalizedPose::INITIAL.ui_y - 50.0).abs() < f64::EPSILON);
        assert!((NormalizedPose::INITIAL.ui_theta - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn connection_status_display_matches_panel_labels() {
        assert_eq!(ConnectionStatus::Connected.to_string(), "Connected");
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionStatus::Error.to_string(), "Error");
    }

    #[test]
    fn command_roundtrip() {
        let cmd = Command {
            linear: 1.0,
            angular: -0.5,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let back: Command = serde_json::from_str(&json).unwrap();
        assert!((back.linear - 1.0).abs() < f64::EPSILON);
        assert!((back.angular - (-0.5)).abs() < f64::EPSILON);
    }

    #[test]
    fn link_error_display() {
        assert!(
            LinkError::NotConnected
                .to_string()
                .contains("not connected")
        );
        let err = LinkError::InvalidConfiguration("arena_max must be non-zero".to_string());
        assert!(err.to_string().contains("arena_max"));
    }

    #[test]
    fn link_event_roundtrip() {
        let event = LinkEvent::now(LinkEventPayload::PoseChanged {
            pose: Pose::ORIGIN,
            normalized: NormalizedPose::INITIAL,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: LinkEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert!(matches!(back.payload, LinkEventPayload::PoseChanged { .. }));
    }
}
