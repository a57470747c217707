//! A TCP rendezvous relay.
//!
//! Two clients that cannot reach each other directly each dial the relay.
//! On accept, every connection is assigned a random 32-bit id (its *zid*)
//! and told about it in an announce frame; the clients exchange their zids
//! out of band and each sends back a bind frame naming the other. Once both
//! sides have named each other - in either order - the relay stops
//! interpreting the streams and splices the two sockets into a transparent
//! full-duplex byte pipe until either side closes.
//!
//! The pairing protocol tolerates arbitrary interleavings: each side latches
//! its chosen peer and signals a one-shot barrier, then waits for the peer's
//! barrier and verifies that the peer chose *it*. A side that was named by
//! nobody (or by the wrong connection) fails that symmetry check and is torn
//! down alone; a completed pair always satisfies `a.peer == b && b.peer == a`.
//!
//! Bind requests must arrive within 15 seconds of accept, and a named peer
//! must reciprocate within 30 seconds; both deadlines are configurable in
//! [config::RelayConfig]. Ids are only valid while their connection is
//! registered, unknown or self-referential binds are rejected, and a torn
//! down connection always cascades the close to its paired socket.
//!
//! Frame layout and steady-state forwarding live in [frame] and the proxy
//! module; the wire format is 12 bytes: a 4-byte magic, a big-endian payload
//! length (always 4) and the big-endian zid.

pub mod buffer_pool;
pub mod config;
pub mod conn;
pub mod frame;
pub mod registry;
pub mod server;
pub mod zid;

mod handshake;
mod proxy;

#[cfg(test)]
mod test_util;
