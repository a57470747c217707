use std::net::Ipv4Addr;

use clap::Parser;
use tracing::Level;

use rendezvous_relay::config::{RelayConfig, DEFAULT_PORT};
use rendezvous_relay::server::RelayServer;

#[derive(Parser)]
struct Args {
    /// listening port
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// zero-copy proxying through the kernel splice path
    #[clap(long, action = clap::ArgAction::Set, default_value_t = true)]
    splice: bool,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let config = RelayConfig {
        listen_addr: (Ipv4Addr::UNSPECIFIED, args.port).into(),
        zero_copy: args.splice,
        ..Default::default()
    };

    let server = RelayServer::bind(config).await?;
    server.serve().await
}
