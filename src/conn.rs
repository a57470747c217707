use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use crate::registry::Registry;
use crate::zid::Zid;

/// State of one accepted socket, shared between its own worker and (after
/// pairing) the worker of its peer.
///
/// The socket travels: it is parked in `stream` whenever no task is actively
/// using it, and whichever side ends up driving the paired flow claims both
/// its own and its peer's parked socket. The `peer` back-reference is a
/// lookup relation only: it is weak and never keeps the other handle alive.
pub struct Conn {
    id: Zid,
    accepted_at: Instant,
    stream: Mutex<Option<TcpStream>>,
    peer: Mutex<Option<Weak<Conn>>>,
    /// Latches false -> true exactly once, after `peer` has been written.
    barrier: watch::Sender<bool>,
    shutdown: Notify,
}

impl Conn {
    pub fn new(id: Zid, stream: TcpStream) -> Conn {
        let (barrier, _) = watch::channel(false);
        Conn {
            id,
            accepted_at: Instant::now(),
            stream: Mutex::new(Some(stream)),
            peer: Mutex::new(None),
            barrier,
            shutdown: Notify::new(),
        }
    }

    pub fn id(&self) -> Zid {
        self.id
    }

    /// Point in time at which the bind request must have arrived in full.
    pub(crate) fn bind_deadline(&self, handshake_timeout: Duration) -> Instant {
        self.accepted_at + handshake_timeout
    }

    pub(crate) fn take_stream(&self) -> Option<TcpStream> {
        self.stream.lock().unwrap().take()
    }

    pub(crate) fn park_stream(&self, stream: TcpStream) {
        *self.stream.lock().unwrap() = Some(stream);
    }

    pub(crate) fn latch_peer(&self, peer: &Arc<Conn>) {
        let prev = self.peer.lock().unwrap().replace(Arc::downgrade(peer));
        debug_assert!(prev.is_none(), "peer latched twice");
    }

    pub(crate) fn clear_peer(&self) {
        self.peer.lock().unwrap().take();
    }

    pub(crate) fn peer(&self) -> Option<Arc<Conn>> {
        self.peer.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Makes the latched peer visible to whoever waits on [Conn::barrier].
    pub(crate) fn signal_barrier(&self) {
        self.barrier.send_replace(true);
    }

    pub(crate) fn barrier(&self) -> watch::Receiver<bool> {
        self.barrier.subscribe()
    }

    /// Blocks until some other worker runs [Conn::close] on this handle.
    pub(crate) async fn wait_shutdown(&self) {
        self.shutdown.notified().await;
    }

    /// Closes whatever part of the socket is still parked here and wakes the
    /// owning worker so it can observe the shutdown and tear itself down.
    pub(crate) fn close(&self) {
        drop(self.stream.lock().unwrap().take());
        self.shutdown.notify_one();
    }

    /// Final cleanup, run exactly once by the owning worker when it exits:
    /// closes this handle's socket, cascades the close to the paired handle
    /// (which deregisters itself when its own worker exits) and releases the
    /// id. Safe to run twice.
    pub(crate) fn teardown(&self, registry: &Registry<Conn>) {
        drop(self.stream.lock().unwrap().take());
        if let Some(peer) = self.peer() {
            peer.close();
        }
        registry.release(self.id);
    }
}
