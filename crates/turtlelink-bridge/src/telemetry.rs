//! Telemetry channel: subscription to one named pose feed.
//!
//! A [`TelemetryChannel`] is bound to exactly one live [`BridgeConnection`]
//! at construction time and becomes invalid the moment that connection
//! leaves `Connected`; it must then be discarded, never reused. Records are
//! delivered to the callback one at a time in arrival order, with no
//! batching or deduplication. Malformed records are logged and dropped
//! without disturbing the subscription.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use turtlelink_types::{ConnectionStatus, LinkError, Pose};
use uuid::Uuid;

use crate::connection::BridgeConnection;
use crate::protocol;

/// Subscription to a pose topic over one live connection.
pub struct TelemetryChannel {
    connection: BridgeConnection,
    topic: String,
}

impl TelemetryChannel {
    /// Bind a channel for `topic` to a live connection.
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
        Ok(Self {
            connection,
            topic: topic.into(),
        })
    }

    /// The topic this channel is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Register `on_record`, invoked once per inbound record in arrival
    /// order, and tell the bridge to start the feed.
    ///
    /// Records that fail to decode (missing or non-numeric fields) are
    /// dropped with a logged diagnostic; the callback never sees them and
    /// the subscription keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] when the connection has left
    /// `Connected` since construction.
    pub fn subscribe<F>(&self, on_record: F) -> Result<SubscriptionHandle, LinkError>
    where
        F: Fn(Pose) + Send + 'static,
    {
        let id = Uuid::new_v4();
        self.connection
            .send_frame(protocol::subscribe_frame(&self.topic, &id))?;

        let mut frames = self.connection.frames();
        let topic = self.topic.clone();
        let task = tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(frame) => {
                        let Some((frame_topic, msg)) = protocol::publish_payload(&frame) else {
                            continue;
                        };
                        if frame_topic != topic {
                            continue;
                        }
                        match protocol::decode_pose(&msg) {
                            Ok(pose) => on_record(pose),
                            Err(e) => {
                                warn!(topic = %topic, error = %e, "dropping malformed telemetry record");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(topic = %topic, lagged_by = n, "telemetry subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(SubscriptionHandle {
            id,
            topic: self.topic.clone(),
            connection: self.connection.clone(),
            task,
            cancelled: AtomicBool::new(false),
        })
    }

    /// Stop a subscription created by [`subscribe`](Self::subscribe).
    /// Safe to call any number of times.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        handle.cancel();
    }
}

/// Handle to one active pose subscription.
///
/// Dropping the handle stops callback delivery; [`cancel`](Self::cancel)
/// additionally tells the bridge to stop the feed while the connection is
/// still up.
pub struct SubscriptionHandle {
    id: Uuid,
    topic: String,
    connection: BridgeConnection,
    task: JoinHandle<()>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    /// The client-side id this subscription was registered under.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop callback delivery and send the matching `unsubscribe` frame.
    ///
    /// Idempotent. The frame send is best-effort: when the connection is
    /// already gone the remote feed is gone with it.
    pub fn cancel(&self) {
        self.task.abort();
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self
                .connection
                .send_frame(protocol::unsubscribe_frame(&self.topic, &self.id));
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
