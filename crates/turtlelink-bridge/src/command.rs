//! Command channel: publish-only velocity commands.
//!
//! Bound to one live [`BridgeConnection`] exactly like the telemetry
//! channel, and discarded the same way when the connection leaves
//! `Connected`. Sends are fire-and-forget with no queueing: a command
//! issued while disconnected fails with `NotConnected` and is never
//! buffered for later replay.

use tracing::debug;
use turtlelink_types::{Command, ConnectionStatus, LinkError};

use crate::connection::BridgeConnection;
use crate::protocol;

/// Publisher for `geometry_msgs/msg/Twist` commands on one topic.
pub struct CommandChannel {
    connection: BridgeConnection,
    topic: String,
}

impl CommandChannel {
    /// Bind a command channel for `topic` to a live connection and advertise
    /// the Twist type to the bridge.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] unless the connection is
    /// currently `Connected`.
    pub fn new(
        connection: BridgeConnection,
        topic: impl Into<String>,
    ) -> Result<Self, LinkError> {
        if connection.status() != ConnectionStatus::Connected {
            return Err(LinkError::NotConnected);
        }
        let topic = topic.into();
        connection.send_frame(protocol::advertise_frame(&topic, protocol::TWIST_MSG_TYPE))?;
        Ok(Self { connection, topic })
    }

    /// The topic this channel publishes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one velocity command. No acknowledgment is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] when the underlying connection
    /// is no longer `Connected`; the command is dropped, not queued.
    pub fn send(&self, cmd: &Command) -> Result<(), LinkError> {
        self.connection
            .send_frame(protocol::twist_frame(&self.topic, cmd))?;
        debug!(topic = %self.topic, linear = cmd.linear, angular = cmd.angular, "sent velocity command");
        Ok(())
    }
}
