use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::buffer_pool::BufferPool;
use crate::config::RelayConfig;
use crate::conn::Conn;
use crate::handshake;
use crate::registry::Registry;

/// Everything the per-connection workers share.
pub struct RelayState {
    pub registry: Registry<Conn>,
    pub pool: BufferPool,
    pub config: RelayConfig,
}

pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> anyhow::Result<RelayServer> {
        config.validate()?;

        let listener = TcpListener::bind(config.listen_addr).await?;
        info!("listening on {}", listener.local_addr()?);

        let pool = BufferPool::new(config.buffer_size, config.buffer_pool_size);
        Ok(RelayServer {
            listener,
            state: Arc::new(RelayState {
                registry: Registry::new(),
                pool,
                config,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn serve(&self) -> anyhow::Result<()> {
        loop {
            let (stream, peer_addr) = self.listener.accept().await?;

            // Best-effort: proxied traffic should not be coalesced, and close
            // must not block on unacknowledged data.
            let _ = stream.set_nodelay(true);
            let _ = stream.set_linger(Some(Duration::ZERO));

            let conn = match self
                .state
                .registry
                .allocate(move |id| Arc::new(Conn::new(id, stream)))
            {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(%peer_addr, "dropping connection: {}", e);
                    continue;
                }
            };

            debug!(id = %conn.id(), %peer_addr, "accepted connection");
            let span = info_span!("conn", id = %conn.id());
            tokio::spawn(handshake::run(conn, self.state.clone()).instrument(span));
        }
    }
}
