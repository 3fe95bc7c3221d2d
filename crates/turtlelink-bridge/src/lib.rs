//! `turtlelink-bridge` – connection lifecycle and topic channels.
//!
//! Speaks the `rosbridge_server` JSON protocol over a WebSocket and owns
//! everything stateful between the wire and the adapter:
//!
//! - [`connection`] – the [`BridgeConnection`] lifecycle state machine
//!   (`Idle -> Connecting -> Connected -> Disconnected | Error`).
//! - [`telemetry`] – subscription to a named pose feed with per-record
//!   callback delivery.
//! - [`command`] – fire-and-forget velocity command publishing.
//! - [`protocol`] – the rosbridge frame codec (subscribe / advertise /
//!   publish, Twist encoding, Pose decoding).
//! - [`transport`] – the seam between the state machine and the actual
//!   WebSocket, so tests can swap in a recording double.
//! - [`testkit`] – the [`LoopbackTransport`] double used across the
//!   workspace's test suites.

pub mod command;
pub mod connection;
pub mod protocol;
pub mod telemetry;
pub mod testkit;
pub mod transport;

pub use command::CommandChannel;
pub use connection::{BridgeConnection, BridgeEvent};
pub use telemetry::{SubscriptionHandle, TelemetryChannel};
pub use testkit::{HandshakeGate, LoopbackTransport};
pub use transport::{Transport, WirePipe, WireEvent, WsTransport};
