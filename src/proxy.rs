//! Steady-state byte forwarding between a paired pair of sockets.
//!
//! Two strategies: on Linux, and unless disabled, the whole flow goes through
//! the kernel's socket-to-socket splice. Everywhere else a userspace loop
//! runs per direction with a pooled buffer; the loop for the first direction
//! to hit end-of-stream or an error wins and the whole flow is torn down,
//! closing both sockets.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::buffer_pool::BufferPool;
use crate::conn::Conn;
use crate::server::RelayState;

pub(crate) async fn relay(local: TcpStream, remote: TcpStream, conn: &Conn, state: &RelayState) {
    match copy_streams(local, remote, &state.pool, state.config.zero_copy).await {
        Ok(()) => {}
        Err(e) if is_disconnect(&e) => debug!("flow ended: {}", e),
        Err(e) => warn!("copy failed: {} -> {}", conn.id(), e),
    }
}

async fn copy_streams(
    a: TcpStream,
    b: TcpStream,
    pool: &BufferPool,
    zero_copy: bool,
) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    if zero_copy {
        let (mut a, mut b) = (a, b);
        tokio_splice::zero_copy_bidirectional(&mut a, &mut b).await?;
        return Ok(());
    }
    #[cfg(not(target_os = "linux"))]
    let _ = zero_copy;

    let (mut a_rd, mut a_wr) = a.into_split();
    let (mut b_rd, mut b_wr) = b.into_split();

    // Whichever direction finishes first ends the flow; dropping the other
    // half-pair closes both sockets (abortively, given zero linger).
    tokio::select! {
        r = forward(&mut a_rd, &mut b_wr, pool) => r,
        r = forward(&mut b_rd, &mut a_wr, pool) => r,
    }
}

async fn forward<R, W>(rd: &mut R, wr: &mut W, pool: &BufferPool) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = pool.get();
    let result = copy_loop(rd, wr, &mut buf).await;
    pool.put(buf);
    result
}

async fn copy_loop<R, W>(rd: &mut R, wr: &mut W, buf: &mut BytesMut) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        buf.clear();
        if rd.read_buf(buf).await? == 0 {
            return Ok(());
        }
        wr.write_all(buf).await?;
    }
}

/// Disconnect-class errors are the normal way a proxied flow ends (the
/// cascading close of the peer socket shows up here too) and never warrant
/// an error log. Classified by kind, never by message text.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}
