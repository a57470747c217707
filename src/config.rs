use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::bail;

pub const DEFAULT_PORT: u16 = 8888;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Address of the listening socket. The relay serves a single listener;
    /// the default binds all interfaces.
    pub listen_addr: SocketAddr,

    /// Proxy paired sockets through the kernel's socket-to-socket copy
    /// (splice) instead of a userspace buffer. Only effective on platforms
    /// that have such a primitive; elsewhere the userspace path is used
    /// regardless of this flag.
    pub zero_copy: bool,

    /// How long a freshly accepted connection has, counted from accept, to
    /// deliver a complete bind request.
    pub handshake_timeout: Duration,

    /// How long a connection that has named its peer waits for that peer to
    /// name someone in return.
    pub rendezvous_timeout: Duration,

    /// Size of the buffers used by the userspace copy path.
    pub buffer_size: usize,

    /// Number of copy buffers retained when idle; buffers beyond this are
    /// freed on return.
    pub buffer_pool_size: usize,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            listen_addr: (Ipv4Addr::UNSPECIFIED, DEFAULT_PORT).into(),
            zero_copy: true,
            handshake_timeout: Duration::from_secs(15),
            rendezvous_timeout: Duration::from_secs(30),
            buffer_size: 1024,
            buffer_pool_size: 1024,
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.buffer_size < 64 {
            bail!("copy buffer size {} is too small", self.buffer_size);
        }
        if self.handshake_timeout.is_zero() || self.rendezvous_timeout.is_zero() {
            bail!("timeouts must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RelayConfig::default().validate().is_ok());
        assert_eq!(RelayConfig::default().listen_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_rejects_degenerate_values() {
        let config = RelayConfig {
            buffer_size: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            rendezvous_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
