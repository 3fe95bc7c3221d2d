//! In-process transport double for tests.
//!
//! [`LoopbackTransport`] implements [`Transport`] without any network: it
//! records every frame the connection sends and lets the test inject
//! inbound wire events, close the "remote" end, or fail the handshake.
//! Used by the unit tests in this crate and the integration suite of the
//! adapter crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use turtlelink_types::LinkError;

use crate::transport::{Transport, WireEvent, WirePipe};

/// A recording, scriptable stand-in for the WebSocket transport.
#[derive(Default)]
pub struct LoopbackTransport {
    sent: Arc<Mutex<Vec<String>>>,
    inbound: Mutex<Option<mpsc::UnboundedSender<WireEvent>>>,
    connect_count: AtomicUsize,
    fail_next: Mutex<Option<String>>,
    connect_delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<GateInner>>,
}

struct GateInner {
    entered: Arc<AtomicBool>,
    release: std_mpsc::Receiver<()>,
}

/// Handle pausing one handshake at the point where it is about to resolve.
///
/// Obtained from [`LoopbackTransport::gate_next_connect`]. The gated
/// `connect` parks its worker thread, so tests using a gate need the
/// multi-threaded runtime flavour.
pub struct HandshakeGate {
    entered: Arc<AtomicBool>,
    release: std_mpsc::Sender<()>,
}

impl HandshakeGate {
    /// Wait until the handshake has started and is parked at the gate.
    ///
    /// Panics after two seconds; only meaningful inside a test.
    pub async fn entered(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !self.entered.load(Ordering::SeqCst) {
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for the gated handshake to start");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Let the parked handshake resolve.
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` call fail with the given diagnostic.
    pub fn fail_next_connect(&self, diag: &str) {
        *self.fail_next.lock().unwrap() = Some(diag.to_string());
    }

    /// Delay every handshake, to hold the connection in `Connecting`.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    /// Park the next handshake just before it resolves, keeping the
    /// caller's poll in progress until the returned gate is released.
    pub fn gate_next_connect(&self) -> HandshakeGate {
        let entered = Arc::new(AtomicBool::new(false));
        let (release_tx, release_rx) = std_mpsc::channel();
        *self.gate.lock().unwrap() = Some(GateInner {
            entered: Arc::clone(&entered),
            release: release_rx,
        });
        HandshakeGate {
            entered,
            release: release_tx,
        }
    }

    /// Number of handshakes performed so far.
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Every frame sent by the connection, in send order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Deliver a text frame from the "remote peer".
    pub fn push_frame(&self, frame: &str) {
        self.push(WireEvent::Frame(frame.to_string()));
    }

    /// Close the connection from the remote side.
    pub fn close_remote(&self) {
        self.push(WireEvent::Closed);
    }

    /// Fail the transport mid-stream.
    pub fn fault_remote(&self, diag: &str) {
        self.push(WireEvent::Faulted(diag.to_string()));
    }

    /// Block (async) until at least `n` frames have been recorded.
    ///
    /// Panics after two seconds; only meaningful inside a test.
    pub async fn wait_for_sent_count(&self, n: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if self.sent.lock().unwrap().len() >= n {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {n} sent frames, have {}",
                    self.sent.lock().unwrap().len()
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn push(&self, event: WireEvent) {
        if let Some(tx) = self.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, _endpoint: &str) -> Result<WirePipe, LinkError> {
        let delay = *self.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        if let Some(diag) = self.fail_next.lock().unwrap().take() {
            return Err(LinkError::Connection(diag));
        }
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            // Parks the worker thread so the whole poll stays in progress;
            // an abort issued meanwhile cannot take effect until the next
            // await point.
            gate.entered.store(true, Ordering::SeqCst);
            let _ = gate.release.recv();
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        *self.inbound.lock().unwrap() = Some(inbound_tx);

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let sent = Arc::clone(&self.sent);
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                sent.lock().unwrap().push(frame);
            }
        });

        Ok(WirePipe {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
