//! Drives a freshly accepted, registered connection to one of its terminal
//! states: paired (one side of the pair goes on to proxy the flow, the other
//! parks until the flow dies), rejected, or timed out.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::conn::Conn;
use crate::frame::{to_hex, Frame, FRAME_LEN};
use crate::proxy;
use crate::server::RelayState;

/// What a successfully paired worker does next. Socket handles move to the
/// side with the numerically lower id, which drives both directions of the
/// flow; the other side keeps its registry entry alive until the flow ends.
enum Role {
    Pump { local: TcpStream, remote: TcpStream },
    Standby,
}

/// Worker entry point: one invocation per accepted connection. All exits
/// funnel through [Conn::teardown].
pub(crate) async fn run(conn: Arc<Conn>, state: Arc<RelayState>) {
    match rendezvous(&conn, &state).await {
        Some(Role::Pump { local, remote }) => proxy::relay(local, remote, &conn, &state).await,
        Some(Role::Standby) => conn.wait_shutdown().await,
        None => {}
    }
    conn.teardown(&state.registry);
}

async fn rendezvous(conn: &Arc<Conn>, state: &RelayState) -> Option<Role> {
    let Some(mut stream) = conn.take_stream() else {
        return None;
    };

    let mut buf = BytesMut::with_capacity(FRAME_LEN);
    Frame { zid: conn.id() }.ser(&mut buf);
    if let Err(e) = stream.write_all(&buf).await {
        warn!("failed to write announce frame: {}", e);
        return None;
    }

    let deadline = conn.bind_deadline(state.config.handshake_timeout);
    let bind = read_bind_request(&mut stream, deadline, state).await?;

    if bind.zid == conn.id() {
        warn!("cannot self-bind");
        return None;
    }
    let Some(peer) = state.registry.lookup(bind.zid) else {
        warn!("unknown zid {} in bind request", bind.zid);
        return None;
    };

    // Park the socket and publish the chosen peer before signaling; whoever
    // observes the barrier must see both.
    conn.park_stream(stream);
    conn.latch_peer(&peer);
    conn.signal_barrier();

    let mut barrier = peer.barrier();
    match timeout(state.config.rendezvous_timeout, barrier.wait_for(|bound| *bound)).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => {
            // the peer handle is gone altogether
            conn.clear_peer();
            conn.take_stream();
            debug!("peer {} disappeared during rendezvous", bind.zid);
            return None;
        }
        Err(_elapsed) => {
            conn.clear_peer();
            match conn.take_stream() {
                Some(stream) => {
                    warn!("bind timed out: {} -> {}", conn.id(), bind.zid);
                    drop(stream);
                    return None;
                }
                // An empty slot means the peer completed the pairing in the
                // same instant and owns both sockets now; fall back to the
                // standby role instead of killing the fresh pair.
                None => return Some(Role::Standby),
            }
        }
    }

    match peer.peer() {
        Some(back) if Arc::ptr_eq(&back, conn) => {}
        other => {
            conn.clear_peer();
            conn.take_stream();
            let actual = other.map_or("<gone>".to_string(), |p| p.id().to_string());
            warn!("mismatched bind: {} -> {} -> {}", conn.id(), peer.id(), actual);
            return None;
        }
    }

    if conn.id() < peer.id() {
        let local = conn.take_stream()?;
        let Some(remote) = peer.take_stream() else {
            debug!("peer {} tore down before handover", peer.id());
            return None;
        };
        info!("bound {} <-> {}", conn.id(), peer.id());
        Some(Role::Pump { local, remote })
    } else {
        Some(Role::Standby)
    }
}

/// Reads exactly one 12-byte bind request, bounded by the handshake deadline
/// anchored at accept time. Reads nothing past the frame: bytes the client
/// pipelines behind its bind request belong to the proxied flow.
async fn read_bind_request(
    stream: &mut TcpStream,
    deadline: Instant,
    state: &RelayState,
) -> Option<Frame> {
    let mut frame = [0u8; FRAME_LEN];
    let mut filled = 0;

    while filled < FRAME_LEN {
        match timeout_at(deadline, stream.read(&mut frame[filled..])).await {
            Err(_elapsed) => {
                warn!("no bind request within {:?}", state.config.handshake_timeout);
                return None;
            }
            // end-of-stream before a complete frame is a silent close
            Ok(Ok(0)) => {
                debug!("closed before completing bind request ({} bytes)", filled);
                return None;
            }
            Ok(Ok(n)) => filled += n,
            Ok(Err(e)) => {
                warn!("failed to read bind request ({}): {}", to_hex(&frame[..filled]), e);
                return None;
            }
        }
    }

    match Frame::try_read(&mut &frame[..]) {
        Ok(bind) => Some(bind),
        Err(e) => {
            warn!("invalid bind request ({}): {}", to_hex(&frame), e);
            None
        }
    }
}
