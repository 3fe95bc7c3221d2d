//! Transport seam between the connection state machine and the wire.
//!
//! [`BridgeConnection`](crate::connection::BridgeConnection) never touches
//! tokio-tungstenite directly; it drives a [`Transport`] trait object that
//! yields a [`WirePipe`] on a successful handshake. Production uses
//! [`WsTransport`]; tests use the recording
//! [`LoopbackTransport`](crate::testkit::LoopbackTransport).

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error};
use turtlelink_types::LinkError;

/// An inbound occurrence on an established pipe.
#[derive(Debug, Clone, PartialEq)]
pub enum WireEvent {
    /// A text frame arrived from the peer.
    Frame(String),
    /// The peer closed the connection in an orderly fashion.
    Closed,
    /// The transport failed mid-stream; carries a diagnostic description.
    Faulted(String),
}

/// Both directions of one established connection.
///
/// `outbound` accepts serialised frames for the peer; `inbound` yields
/// [`WireEvent`]s until the connection ends. Dropping the pipe tears the
/// underlying transport down.
pub struct WirePipe {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<WireEvent>,
}

/// A factory for wire pipes: one `connect` call performs one handshake.
///
/// Implementations must not retry internally; retry is a deliberate
/// operator decision made above the connection state machine.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform a handshake with `endpoint` and return the live pipe.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Connection`] when the handshake fails.
    async fn connect(&self, endpoint: &str) -> Result<WirePipe, LinkError>;
}

/// The production transport: a tokio-tungstenite WebSocket client.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<WirePipe, LinkError> {
        let (ws_stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| LinkError::Connection(format!("ws handshake with {endpoint}: {e}")))?;
        debug!(endpoint, "ws handshake complete");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<WireEvent>();

        // Writer pump: frames from the pipe to the socket.
        let fault_tx = inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                    error!(error = %e, "ws send failed");
                    let _ = fault_tx.send(WireEvent::Faulted(format!("ws send failed: {e}")));
                    break;
                }
            }
        });

        // Reader pump: socket frames onto the pipe.
        tokio::spawn(async move {
            loop {
                match ws_rx.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(WireEvent::Frame(text.to_string())).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        let _ = inbound_tx.send(WireEvent::Closed);
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = inbound_tx.send(WireEvent::Faulted(format!("ws receive: {e}")));
                        break;
                    }
                    // Ping/pong and binary frames carry nothing for us.
                    Some(Ok(_)) => {}
                }
            }
        });

        Ok(WirePipe {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
