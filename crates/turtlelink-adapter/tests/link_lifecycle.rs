//! End-to-end lifecycle tests for [`RobotLinkAdapter`] over the loopback
//! transport: connect, telemetry flow, command flow, faults, teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use turtlelink_adapter::{LinkConfig, RobotLinkAdapter};
use turtlelink_bridge::testkit::LoopbackTransport;
use turtlelink_bridge::transport::Transport;
use turtlelink_frames::{ANGLE_SCALE_RAD, ARENA_HALF_EXTENT};
use turtlelink_types::{
    ConnectionStatus, LinkError, LinkEvent, LinkEventPayload, NormalizedPose, Pose,
};

const TICK: Duration = Duration::from_millis(500);

fn make_adapter() -> (Arc<LoopbackTransport>, RobotLinkAdapter) {
    let transport = Arc::new(LoopbackTransport::new());
    let adapter = RobotLinkAdapter::with_transport(Arc::clone(&transport) as Arc<dyn Transport>);
    (transport, adapter)
}

async fn next_event(rx: &mut broadcast::Receiver<LinkEvent>) -> LinkEventPayload {
    timeout(TICK, rx.recv())
        .await
        .expect("timed out waiting for link event")
        .expect("event channel closed")
        .payload
}

async fn expect_status(rx: &mut broadcast::Receiver<LinkEvent>, expected: ConnectionStatus) {
    match next_event(rx).await {
        LinkEventPayload::StatusChanged(status) => assert_eq!(status, expected),
        other => panic!("expected StatusChanged({expected}), got {other:?}"),
    }
}

async fn started_adapter() -> (
    Arc<LoopbackTransport>,
    RobotLinkAdapter,
    broadcast::Receiver<LinkEvent>,
) {
    let (transport, adapter) = make_adapter();
    let mut events = adapter.subscribe_events();
    adapter
        .start("ws://localhost:9090", ARENA_HALF_EXTENT, ANGLE_SCALE_RAD)
        .unwrap();
    expect_status(&mut events, ConnectionStatus::Connected).await;
    (transport, adapter, events)
}

fn pose_frame(topic: &str, x: f64, y: f64, theta: f64) -> String {
    format!(r#"{{"op":"publish","topic":"{topic}","msg":{{"x":{x},"y":{y},"theta":{theta}}}}}"#)
}

#[tokio::test]
async fn start_reaches_connected() {
    let (_, adapter, _events) = started_adapter().await;
    assert_eq!(adapter.current_status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn pose_defaults_to_origin_and_arena_centre_before_telemetry() {
    let (_, adapter, _events) = started_adapter().await;
    let (pose, normalized) = adapter.current_pose();
    assert_eq!(pose, Pose::ORIGIN);
    assert_eq!(normalized, NormalizedPose::INITIAL);
}

#[tokio::test]
async fn telemetry_record_updates_both_frames() {
    let (transport, adapter, mut events) = started_adapter().await;

    transport.push_frame(&pose_frame("/turtle1/pose", 5.0, 3.0, 1.57));

    match next_event(&mut events).await {
        LinkEventPayload::PoseChanged { pose, normalized } => {
            assert!((pose.x - 5.0).abs() < 1e-9);
            assert!((normalized.ui_x - (5.0 / ARENA_HALF_EXTENT) * 100.0).abs() < 1e-9);
        }
        other => panic!("expected PoseChanged, got {other:?}"),
    }

    let (pose, normalized) = adapter.current_pose();
    assert!((pose.x - 5.0).abs() < 1e-9);
    assert!((pose.y - 3.0).abs() < 1e-9);
    assert!((pose.theta - 1.57).abs() < 1e-9);
    assert!((normalized.ui_x - (5.0 / ARENA_HALF_EXTENT) * 100.0).abs() < 1e-9);
    assert!((normalized.ui_y - (3.0 / ARENA_HALF_EXTENT) * 100.0).abs() < 1e-9);
    assert!((normalized.ui_theta - (-(1.57 / ANGLE_SCALE_RAD) * 180.0 + 90.0)).abs() < 1e-9);
}

#[tokio::test]
async fn malformed_record_preserves_last_good_pose() {
    let (transport, adapter, mut events) = started_adapter().await;

    transport.push_frame(&pose_frame("/turtle1/pose", 2.0, 2.0, 0.5));
    assert!(matches!(
        next_event(&mut events).await,
        LinkEventPayload::PoseChanged { .. }
    ));

    // Missing theta: dropped with a diagnostic, last good value retained.
    transport.push_frame(r#"{"op":"publish","topic":"/turtle1/pose","msg":{"x":8.0,"y":8.0}}"#);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (pose, _) = adapter.current_pose();
    assert!((pose.x - 2.0).abs() < 1e-9);
    assert!(events.try_recv().is_err(), "no event for a dropped record");
}

#[tokio::test]
async fn drive_publishes_twist_on_the_wire() {
    let (transport, adapter, _events) = started_adapter().await;

    // Channel binding sent the subscribe and advertise frames already.
    transport.wait_for_sent_count(2).await;

    adapter.drive(1.0, -0.5).unwrap();
    transport.wait_for_sent_count(3).await;

    let sent = transport.sent_frames();
    assert!(sent[0].contains(r#""op":"subscribe""#));
    assert!(sent[1].contains(r#""op":"advertise""#));
    assert!(sent[2].contains(r#""op":"publish""#));
    assert!(sent[2].contains("/turtle1/cmd_vel"));
    assert!(sent[2].contains(r#""z":-0.5"#));
}

#[tokio::test]
async fn unreachable_endpoint_surfaces_error_then_not_connected() {
    let (transport, adapter) = make_adapter();
    transport.fail_next_connect("connection refused");
    let mut events = adapter.subscribe_events();

    adapter
        .start("ws://localhost:9090", ARENA_HALF_EXTENT, ANGLE_SCALE_RAD)
        .unwrap();

    expect_status(&mut events, ConnectionStatus::Error).await;
    assert_eq!(adapter.current_status(), ConnectionStatus::Error);
    assert_eq!(adapter.drive(1.0, 0.0), Err(LinkError::NotConnected));
}

#[tokio::test]
async fn remote_close_tears_channels_down() {
    let (transport, adapter, mut events) = started_adapter().await;

    transport.close_remote();
    expect_status(&mut events, ConnectionStatus::Disconnected).await;

    assert_eq!(adapter.current_status(), ConnectionStatus::Disconnected);
    assert_eq!(adapter.drive(1.0, 0.0), Err(LinkError::NotConnected));
}

#[tokio::test]
async fn stop_disconnects_and_silences_stale_telemetry() {
    let (transport, adapter, mut events) = started_adapter().await;

    transport.push_frame(&pose_frame("/turtle1/pose", 4.0, 4.0, 0.4));
    assert!(matches!(
        next_event(&mut events).await,
        LinkEventPayload::PoseChanged { .. }
    ));

    adapter.stop();
    assert_eq!(adapter.current_status(), ConnectionStatus::Disconnected);

    // A record delivered to the stale session must not alter the pose.
    transport.push_frame(&pose_frame("/turtle1/pose", 9.0, 9.0, 0.9));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (pose, _) = adapter.current_pose();
    assert!((pose.x - 4.0).abs() < 1e-9);
    assert_eq!(adapter.drive(1.0, 0.0), Err(LinkError::NotConnected));
}

// Stop while the handshake is resolving: the io task may already be past
// the point an abort can reach, so Disconnected must still stand.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_overrides_a_resolving_handshake() {
    let (transport, adapter) = make_adapter();
    let gate = transport.gate_next_connect();

    adapter
        .start("ws://localhost:9090", ARENA_HALF_EXTENT, ANGLE_SCALE_RAD)
        .unwrap();
    gate.entered().await;

    adapter.stop();
    assert_eq!(adapter.current_status(), ConnectionStatus::Disconnected);

    gate.release();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(adapter.current_status(), ConnectionStatus::Disconnected);
    assert_eq!(adapter.drive(1.0, 0.0), Err(LinkError::NotConnected));
}

#[tokio::test]
async fn operator_can_restart_after_stop() {
    let (transport, adapter, mut events) = started_adapter().await;

    adapter.stop();
    expect_status(&mut events, ConnectionStatus::Disconnected).await;

    let mut events = adapter.subscribe_events();
    adapter
        .start("ws://localhost:9090", ARENA_HALF_EXTENT, ANGLE_SCALE_RAD)
        .unwrap();
    expect_status(&mut events, ConnectionStatus::Connected).await;

    assert_eq!(transport.connect_count(), 2);
    transport.wait_for_sent_count(2).await;
    adapter.drive(0.5, 0.0).unwrap();
}

#[tokio::test]
async fn config_topics_are_honoured() {
    let (transport, adapter) = make_adapter();
    let mut events = adapter.subscribe_events();

    let config = LinkConfig {
        pose_topic: "/turtle5/pose".to_string(),
        command_topic: "/turtle5/cmd_vel".to_string(),
        ..LinkConfig::default()
    };
    adapter.start_with_config(&config).unwrap();
    expect_status(&mut events, ConnectionStatus::Connected).await;

    transport.wait_for_sent_count(2).await;
    let sent = transport.sent_frames();
    assert!(sent[0].contains("/turtle5/pose"));
    assert!(sent[1].contains("/turtle5/cmd_vel"));

    transport.push_frame(&pose_frame("/turtle5/pose", 1.0, 2.0, 0.0));
    match next_event(&mut events).await {
        LinkEventPayload::PoseChanged { pose, .. } => {
            assert!((pose.y - 2.0).abs() < 1e-9);
        }
        other => panic!("expected PoseChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn start_with_invalid_config_is_rejected() {
    let (_, adapter) = make_adapter();
    let config = LinkConfig {
        angle_max: 0.0,
        ..LinkConfig::default()
    };
    assert!(matches!(
        adapter.start_with_config(&config),
        Err(LinkError::InvalidConfiguration(_))
    ));
    assert_eq!(adapter.current_status(), ConnectionStatus::Idle);
}
