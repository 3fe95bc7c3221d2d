//! The robot link orchestrator.
//!
//! Owns one [`BridgeConnection`] plus the telemetry and command channels
//! derived from it. Channels exist exactly while the connection is
//! `Connected`; any transition away tears them down and they are never
//! reused. A session counter guards the shared `(pose, channels)` tuple so
//! a telemetry callback racing a teardown can never write stale state.
//!
//! No reconnect or backoff lives here: when the bridge reports `Error` or
//! `Disconnected` the adapter stays put until the operator calls
//! [`start`](RobotLinkAdapter::start) again.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;
use turtlelink_bridge::{
    BridgeConnection, BridgeEvent, CommandChannel, SubscriptionHandle, TelemetryChannel, Transport,
};
use turtlelink_frames::to_normalized;
use turtlelink_types::{
    Command, ConnectionStatus, LinkError, LinkEvent, LinkEventPayload, NormalizedPose, Pose,
};

use crate::config::{DEFAULT_COMMAND_TOPIC, DEFAULT_POSE_TOPIC, LinkConfig};

/// Broadcast capacity of the consumer-facing notification surface.
const EVENT_CAPACITY: usize = 256;

/// State behind the adapter's single mutual-exclusion boundary.
struct LinkShared {
    pose: Pose,
    normalized: NormalizedPose,
    arena_max: f64,
    angle_max: f64,
    pose_topic: String,
    command_topic: String,
    /// Bumped on every channel teardown; telemetry callbacks from an older
    /// session see the mismatch and become inert.
    session: u64,
    telemetry: Option<(TelemetryChannel, SubscriptionHandle)>,
    command: Option<CommandChannel>,
}

/// Orchestrator owning the connection, both channels, and the latest pose.
///
/// All reads (`current_status`, `current_pose`) are synchronous and
/// atomic from the caller's perspective; a reader never observes a
/// half-updated pose.
pub struct RobotLinkAdapter {
    connection: BridgeConnection,
    shared: Arc<Mutex<LinkShared>>,
    events: broadcast::Sender<LinkEvent>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RobotLinkAdapter {
    /// Create an adapter over the production WebSocket transport.
    pub fn new() -> Self {
        Self::with_connection(BridgeConnection::websocket())
    }

    /// Create an adapter over a custom transport (tests use the loopback).
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::with_connection(BridgeConnection::new(transport))
    }

    fn with_connection(connection: BridgeConnection) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connection,
            shared: Arc::new(Mutex::new(LinkShared {
                pose: Pose::ORIGIN,
                normalized: NormalizedPose::INITIAL,
                arena_max: turtlelink_frames::ARENA_HALF_EXTENT,
                angle_max: turtlelink_frames::ANGLE_SCALE_RAD,
                pose_topic: DEFAULT_POSE_TOPIC.to_string(),
                command_topic: DEFAULT_COMMAND_TOPIC.to_string(),
                session: 0,
                telemetry: None,
                command: None,
            })),
            events,
            supervisor: Mutex::new(None),
        }
    }

    /// Subscribe to status-changed / pose-changed notifications.
    ///
    /// Subscribe before [`start`](Self::start) to observe the initial
    /// `Connected` transition.
    pub fn subscribe_events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Open the bridge connection and begin orchestrating channels.
    ///
    /// Never blocks on the handshake; progress is reported through
    /// [`subscribe_events`](Self::subscribe_events) and
    /// [`current_status`](Self::current_status). Calling `start` again
    /// while the connection is live is a no-op; after a failure it retries
    /// the handshake (the operator's deliberate decision, the adapter
    /// never retries on its own).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfiguration`] when either scale
    /// constant is zero. Transport failures are not returned here; they
    /// surface as an `Error` status plus an event.
    pub fn start(&self, endpoint: &str, arena_max: f64, angle_max: f64) -> Result<(), LinkError> {
        // Same rejection path the per-record transform would take.
        to_normalized(&Pose::ORIGIN, arena_max, angle_max)?;
        {
            let mut shared = lock(&self.shared);
            shared.arena_max = arena_max;
            shared.angle_max = angle_max;
        }

        {
            let mut supervisor = lock(&self.supervisor);
            if supervisor.is_none() {
                let mut bridge_events = self.connection.events();
                let connection = self.connection.clone();
                let shared = Arc::clone(&self.shared);
                let events = self.events.clone();
                *supervisor = Some(tokio::spawn(async move {
                    loop {
                        match bridge_events.recv().await {
                            Ok(BridgeEvent::Connected) => {
                                bind_channels(&connection, &shared, &events);
                                let _ = events.send(LinkEvent::now(
                                    LinkEventPayload::StatusChanged(ConnectionStatus::Connected),
                                ));
                            }
                            Ok(BridgeEvent::Closed) => {
                                release_channels(&shared);
                                let _ = events.send(LinkEvent::now(
                                    LinkEventPayload::StatusChanged(ConnectionStatus::Disconnected),
                                ));
                            }
                            Ok(BridgeEvent::Error(diag)) => {
                                warn!(error = %diag, "bridge reported a fault");
                                release_channels(&shared);
                                let _ = events.send(LinkEvent::now(
                                    LinkEventPayload::StatusChanged(ConnectionStatus::Error),
                                ));
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(lagged_by = n, "adapter supervisor lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }));
            }
        }

        self.connection.open(endpoint);
        Ok(())
    }

    /// [`start`](Self::start) with endpoint, topics, and scales taken from
    /// a [`LinkConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::InvalidConfiguration`] for a config that fails
    /// [`LinkConfig::validate`].
    pub fn start_with_config(&self, config: &LinkConfig) -> Result<(), LinkError> {
        config.validate()?;
        {
            let mut shared = lock(&self.shared);
            shared.pose_topic = config.pose_topic.clone();
            shared.command_topic = config.command_topic.clone();
        }
        self.start(&config.endpoint, config.arena_max, config.angle_max)
    }

    /// Current lifecycle state of the bridge connection.
    pub fn current_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// The most recent pose in both frames.
    ///
    /// Before any telemetry record has arrived this is [`Pose::ORIGIN`]
    /// paired with [`NormalizedPose::INITIAL`] (the arena centre).
    pub fn current_pose(&self) -> (Pose, NormalizedPose) {
        let shared = lock(&self.shared);
        (shared.pose, shared.normalized)
    }

    /// Send one velocity command to the robot.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] when no command channel is
    /// bound; the command is dropped, never queued.
    pub fn drive(&self, linear: f64, angular: f64) -> Result<(), LinkError> {
        let shared = lock(&self.shared);
        let channel = shared.command.as_ref().ok_or(LinkError::NotConnected)?;
        channel.send(&Command { linear, angular })
    }

    /// Shut the link down: close the connection and release both channels.
    ///
    /// Safe at any point in the lifecycle, including while a handshake is
    /// in flight. After `stop` returns, no further telemetry callback can
    /// alter the pose and every `drive` fails with `NotConnected`.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.supervisor).take() {
            task.abort();
        }
        release_channels(&self.shared);

        let was = self.connection.status();
        self.connection.close();
        if was != ConnectionStatus::Disconnected {
            let _ = self.events.send(LinkEvent::now(LinkEventPayload::StatusChanged(
                ConnectionStatus::Disconnected,
            )));
        }
    }
}

impl Default for RobotLinkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RobotLinkAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind fresh telemetry and command channels after a `Connected` event.
///
/// A failure here means the connection dropped again between the event and
/// the bind; the subsequent `Closed`/`Error` event will run the teardown,
/// so the miss is logged and left alone.
fn bind_channels(
    connection: &BridgeConnection,
    shared: &Arc<Mutex<LinkShared>>,
    events: &broadcast::Sender<LinkEvent>,
) {
    let (pose_topic, command_topic, session) = {
        let shared = lock(shared);
        (
            shared.pose_topic.clone(),
            shared.command_topic.clone(),
            shared.session,
        )
    };

    type Bound = (TelemetryChannel, SubscriptionHandle, CommandChannel);
    let bound = (|| -> Result<Bound, LinkError> {
        let telemetry = TelemetryChannel::new(connection.clone(), pose_topic)?;
        let callback_shared = Arc::clone(shared);
        let callback_events = events.clone();
        let handle = telemetry.subscribe(move |pose| {
            let mut guard = lock(&callback_shared);
            if guard.session != session {
                return;
            }
            let normalized = match to_normalized(&pose, guard.arena_max, guard.angle_max) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "cannot transform telemetry pose");
                    return;
                }
            };
            guard.pose = pose;
            guard.normalized = normalized;
            drop(guard);
            let _ = callback_events.send(LinkEvent::now(LinkEventPayload::PoseChanged {
                pose,
                normalized,
            }));
        })?;
        let command = CommandChannel::new(connection.clone(), command_topic)?;
        Ok((telemetry, handle, command))
    })();

    match bound {
        Ok((telemetry, handle, command)) => {
            let mut guard = lock(shared);
            guard.telemetry = Some((telemetry, handle));
            guard.command = Some(command);
        }
        Err(e) => {
            warn!(error = %e, "connection dropped before channels could bind");
        }
    }
}

/// Tear both channels down and invalidate in-flight telemetry callbacks.
fn release_channels(shared: &Arc<Mutex<LinkShared>>) {
    let mut guard = lock(shared);
    guard.session += 1;
    if let Some((channel, handle)) = guard.telemetry.take() {
        channel.unsubscribe(&handle);
    }
    guard.command = None;
}

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_adapter_reports_idle_and_initial_pose() {
        let adapter = RobotLinkAdapter::new();
        assert_eq!(adapter.current_status(), ConnectionStatus::Idle);

        let (pose, normalized) = adapter.current_pose();
        assert_eq!(pose, Pose::ORIGIN);
        assert_eq!(normalized, NormalizedPose::INITIAL);
    }

    #[tokio::test]
    async fn drive_before_start_is_not_connected() {
        let adapter = RobotLinkAdapter::new();
        assert_eq!(adapter.drive(1.0, 0.0), Err(LinkError::NotConnected));
    }

    #[tokio::test]
    async fn start_rejects_zero_scales() {
        let adapter = RobotLinkAdapter::new();
        let result = adapter.start("ws://localhost:9090", 0.0, 3.14);
        assert!(matches!(result, Err(LinkError::InvalidConfiguration(_))));
        // Nothing was opened.
        assert_eq!(adapter.current_status(), ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn stop_before_start_is_safe() {
        let adapter = RobotLinkAdapter::new();
        adapter.stop();
        assert_eq!(adapter.current_status(), ConnectionStatus::Disconnected);
    }
}
