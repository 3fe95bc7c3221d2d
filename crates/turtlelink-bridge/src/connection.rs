//! Bridge connection lifecycle state machine.
//!
//! [`BridgeConnection`] owns exactly one logical connection to the remote
//! rosbridge endpoint. States move `Idle -> Connecting -> Connected ->
//! (Disconnected | Error)`; the two terminal states stay put until the
//! operator calls [`open`](BridgeConnection::open) again. No automatic
//! retry exists at this layer or anywhere above it.
//!
//! Transport and protocol failures are absorbed here: they surface as a
//! status change plus a [`BridgeEvent`] on the broadcast surface, never as
//! a panic or an error returned to the caller of `open`.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use turtlelink_types::{ConnectionStatus, LinkError};

use crate::transport::{Transport, WireEvent, WsTransport};

/// Broadcast capacity for the event and frame surfaces.
const CHANNEL_CAPACITY: usize = 256;

/// Lifecycle notifications emitted by [`BridgeConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Handshake succeeded; the connection is live.
    Connected,
    /// Orderly teardown, remote or local.
    Closed,
    /// Transport-level failure with a diagnostic description.
    Error(String),
}

/// One logical connection to the remote bridge peer.
///
/// Clones are cheap handles sharing the same underlying state and
/// broadcast channels. At most one transport connection is live per
/// handle family at any time.
#[derive(Clone)]
pub struct BridgeConnection {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ConnectionStatus>>,
    events: broadcast::Sender<BridgeEvent>,
    frames: broadcast::Sender<String>,
    outbound: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
    io_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BridgeConnection {
    /// Create a connection driven by the given transport. Nothing happens on
    /// the wire until [`open`](Self::open).
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (frames, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            transport,
            state: Arc::new(Mutex::new(ConnectionStatus::Idle)),
            events,
            frames,
            outbound: Arc::new(Mutex::new(None)),
            io_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a connection over the production WebSocket transport.
    pub fn websocket() -> Self {
        Self::new(Arc::new(WsTransport))
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.state)
    }

    /// Subscribe to lifecycle notifications.
    ///
    /// Subscribe before calling [`open`](Self::open) or the `Connected`
    /// event may be missed.
    pub fn events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Subscribe to raw inbound text frames.
    pub fn frames(&self) -> broadcast::Receiver<String> {
        self.frames.subscribe()
    }

    /// Begin connecting to `endpoint`.
    ///
    /// Idempotent while `Connecting` or `Connected`: a second call is a
    /// no-op, so exactly one transport handshake runs per open lifecycle.
    /// The call never blocks on the handshake; completion or failure is
    /// reported through [`events`](Self::events) and [`status`](Self::status).
    /// There is no handshake timeout: an attempt that never completes leaves
    /// the connection `Connecting` until [`close`](Self::close).
    pub fn open(&self, endpoint: &str) {
        {
            let mut state = lock(&self.state);
            if matches!(
                *state,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            ) {
                debug!(status = %*state, "open is a no-op on a live connection");
                return;
            }
            *state = ConnectionStatus::Connecting;
        }

        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let frames = self.frames.clone();
        let outbound = Arc::clone(&self.outbound);
        let endpoint = endpoint.to_string();

        // Every transition below is a compare-and-set under the state lock:
        // `close()` can take effect while this task is inside a poll that an
        // abort cannot interrupt, and its Disconnected commit must stand.
        let task = tokio::spawn(async move {
            let mut pipe = match transport.connect(&endpoint).await {
                Ok(pipe) => pipe,
                Err(e) => {
                    let mut state = lock(&state);
                    if *state != ConnectionStatus::Connecting {
                        return;
                    }
                    *state = ConnectionStatus::Error;
                    drop(state);
                    warn!(endpoint, error = %e, "bridge handshake failed");
                    let _ = events.send(BridgeEvent::Error(e.to_string()));
                    return;
                }
            };

            // The state check and the outbound install share one critical
            // section so a concurrent close() either sees both or neither.
            {
                let mut state = lock(&state);
                if *state != ConnectionStatus::Connecting {
                    debug!(endpoint, "handshake resolved after close, discarding pipe");
                    return;
                }
                *lock(&outbound) = Some(pipe.outbound.clone());
                *state = ConnectionStatus::Connected;
            }
            debug!(endpoint, "bridge connected");
            let _ = events.send(BridgeEvent::Connected);

            loop {
                match pipe.inbound.recv().await {
                    Some(WireEvent::Frame(frame)) => {
                        // No receivers is a normal condition, not an error.
                        let _ = frames.send(frame);
                    }
                    Some(WireEvent::Closed) | None => {
                        if leave_connected(&state, &outbound, ConnectionStatus::Disconnected) {
                            debug!(endpoint, "bridge closed by peer");
                            let _ = events.send(BridgeEvent::Closed);
                        }
                        return;
                    }
                    Some(WireEvent::Faulted(diag)) => {
                        if leave_connected(&state, &outbound, ConnectionStatus::Error) {
                            warn!(endpoint, error = %diag, "bridge transport fault");
                            let _ = events.send(BridgeEvent::Error(diag));
                        }
                        return;
                    }
                }
            }
        });

        *lock(&self.io_task) = Some(task);
    }

    /// Tear the connection down.
    ///
    /// Guarantees `Disconnected` and release of the transport on every code
    /// path, including while a handshake is still in flight. Safe to call
    /// repeatedly; only the first effective call emits a `Closed` event.
    pub fn close(&self) {
        if let Some(task) = lock(&self.io_task).take() {
            task.abort();
        }

        // Clear the outbound sender under the state lock so the io task's
        // Connected commit cannot interleave between the two writes.
        let closed = {
            let mut state = lock(&self.state);
            *lock(&self.outbound) = None;
            if *state == ConnectionStatus::Disconnected {
                false
            } else {
                *state = ConnectionStatus::Disconnected;
                true
            }
        };
        if closed {
            let _ = self.events.send(BridgeEvent::Closed);
        }
    }

    /// Send a serialised frame to the peer.
    ///
    /// Fire-and-forget: no acknowledgment is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] when the connection is not in the
    /// `Connected` state; nothing is queued for later replay.
    pub fn send_frame(&self, frame: String) -> Result<(), LinkError> {
        if self.status() != ConnectionStatus::Connected {
            return Err(LinkError::NotConnected);
        }
        let outbound = lock(&self.outbound);
        match outbound.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| LinkError::NotConnected),
            None => Err(LinkError::NotConnected),
        }
    }
}

/// Move out of `Connected` into `to`, releasing the outbound sender.
///
/// Returns `false` without touching anything when the state already left
/// `Connected` (a concurrent [`BridgeConnection::close`] won the race).
fn leave_connected(
    state: &Mutex<ConnectionStatus>,
    outbound: &Mutex<Option<mpsc::UnboundedSender<String>>>,
    to: ConnectionStatus,
) -> bool {
    let mut state = lock(state);
    if *state != ConnectionStatus::Connected {
        return false;
    }
    *lock(outbound) = None;
    *state = to;
    true
}

/// Lock a mutex, recovering the inner value if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
