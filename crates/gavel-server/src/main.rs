//! Gavel server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! gavel-server --bind 0.0.0.0:4433
//!
//! # Start with TLS certificate and a custom credential directory
//! gavel-server --bind 0.0.0.0:4433 --cert cert.pem --key key.pem --credentials certs
//! ```

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::Parser;
use gavel_server::{Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gavel auction server
#[derive(Parser, Debug)]
#[command(name = "gavel-server")]
#[command(about = "Live auction state replication server")]
#[command(version)]
struct Args {
    /// Address to bind the QUIC endpoint to
    #[arg(short, long, default_value = "0.0.0.0:4433")]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Multicast group to publish auction state on
    #[arg(long, default_value = "224.0.0.5")]
    multicast_group: Ipv4Addr,

    /// Multicast port
    #[arg(long, default_value = "41234")]
    multicast_port: u16,

    /// Root directory of the credential store
    #[arg(long, default_value = "certs")]
    credentials: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Gavel server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
        tracing::warn!("This is NOT suitable for production use!");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        multicast_group: args.multicast_group,
        multicast_port: args.multicast_port,
        credential_dir: args.credentials,
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
