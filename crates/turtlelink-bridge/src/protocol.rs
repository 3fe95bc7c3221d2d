//! rosbridge v2 frame codec.
//!
//! Everything on the wire is a JSON object with an `"op"` field. The link
//! uses four operations: `subscribe` / `unsubscribe` for the pose feed,
//! `advertise` for the command topic, and `publish` in both directions.
//! Frames the link does not understand (rosbridge status messages, fragments,
//! publishes on foreign topics) are ignored, not errors.

use serde_json::{Value, json};
use turtlelink_types::{Command, LinkError, Pose};
use uuid::Uuid;

/// rosbridge message type of the telemetry feed.
pub const POSE_MSG_TYPE: &str = "turtlesim/msg/Pose";

/// rosbridge message type of the command topic.
pub const TWIST_MSG_TYPE: &str = "geometry_msgs/msg/Twist";

/// Build a `subscribe` frame for `topic`, tagged with the subscription id so
/// the matching `unsubscribe` can target it.
pub fn subscribe_frame(topic: &str, id: &Uuid) -> String {
    json!({
        "op": "subscribe",
        "id": id.to_string(),
        "topic": topic,
        "type": POSE_MSG_TYPE
    })
    .to_string()
}

/// Build the `unsubscribe` frame matching [`subscribe_frame`].
pub fn unsubscribe_frame(topic: &str, id: &Uuid) -> String {
    json!({
        "op": "unsubscribe",
        "id": id.to_string(),
        "topic": topic
    })
    .to_string()
}

/// Build an `advertise` frame declaring intent to publish `msg_type` on
/// `topic`. rosbridge requires this before the first `publish`.
pub fn advertise_frame(topic: &str, msg_type: &str) -> String {
    json!({
        "op": "advertise",
        "topic": topic,
        "type": msg_type
    })
    .to_string()
}

/// Build the `geometry_msgs/msg/Twist` publish frame for a velocity command.
///
/// Only planar motion is expressible: linear velocity rides on `linear.x`,
/// turn rate on `angular.z`, every other axis is zero.
pub fn twist_frame(topic: &str, cmd: &Command) -> String {
    json!({
        "op": "publish",
        "topic": topic,
        "msg": {
            "linear":  { "x": cmd.linear, "y": 0.0, "z": 0.0 },
            "angular": { "x": 0.0, "y": 0.0, "z": cmd.angular }
        }
    })
    .to_string()
}

/// Extract `(topic, msg)` from an inbound frame if it is a `publish`.
///
/// Returns `None` for non-JSON text, non-publish operations, and publishes
/// without a `msg` object; those frames are simply not for us.
pub fn publish_payload(frame: &str) -> Option<(String, Value)> {
    let value: Value = serde_json::from_str(frame).ok()?;
    if value.get("op").and_then(Value::as_str) != Some("publish") {
        return None;
    }
    let topic = value.get("topic")?.as_str()?.to_string();
    let msg = value.get("msg")?.clone();
    Some((topic, msg))
}

/// Decode a `turtlesim/msg/Pose` record from a publish payload.
///
/// # Errors
///
/// Returns [`LinkError::MalformedRecord`] when any of the three required
/// numeric fields is missing or non-numeric. Extra fields (turtlesim also
/// sends `linear_velocity` / `angular_velocity`) are ignored.
pub fn decode_pose(msg: &Value) -> Result<Pose, LinkError> {
    let field = |name: &str| -> Result<f64, LinkError> {
        msg.get(name).and_then(Value::as_f64).ok_or_else(|| {
            LinkError::MalformedRecord(format!("missing or non-numeric field '{name}'"))
        })
    };
    Ok(Pose {
        x: field("x")?,
        y: field("y")?,
        theta: field("theta")?,
    })
}
