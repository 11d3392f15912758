//! Gavel production server.
//!
//! Replicates the single auction record to every live participant over two
//! transports: a per-connection QUIC push channel and a UDP multicast
//! group. New participants bootstrap the shared session key, their verified
//! identity, and the multicast rendezvous address through the asymmetric
//! handshake in `gavel-crypto`.
//!
//! ## Architecture
//!
//! ```text
//! gavel-server
//!   ├─ SystemEnv         (production Environment impl)
//!   ├─ QuinnTransport    (QUIC via Quinn)
//!   ├─ AuctionHouse      (state machine, one owner behind one mutex)
//!   ├─ Fanout            (per-connection push delivery)
//!   ├─ MulticastBridge   (UDP group publish + inbound relay)
//!   └─ Bootstrap         (credential handshake)
//! ```
//!
//! All auction mutations are serialized through the single driver mutex;
//! network I/O executes the actions the state machine returns.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bridge;
mod error;
mod fanout;
mod system_env;
mod transport;

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use bridge::MulticastBridge;
pub use error::ServerError;
pub use fanout::{Fanout, PushChannel};
use gavel_core::{AuctionAction, AuctionHouse, ConnectionId, Environment};
use gavel_crypto::{
    Bootstrap, BootstrapOutcome, DirStore, IdentifierPolicy, Rejection, SessionKey,
};
use gavel_proto::{BootstrapReply, BootstrapRequest, ClientEvent, PushEvent, RejectReason};
pub use system_env::SystemEnv;
use tokio::sync::Mutex;
pub use transport::{MAX_MESSAGE_SIZE, QuinnConnection, QuinnTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind the QUIC endpoint to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Multicast group to publish state changes on
    pub multicast_group: Ipv4Addr,
    /// Multicast port
    pub multicast_port: u16,
    /// Root directory of the credential store
    pub credential_dir: PathBuf,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            multicast_group: Ipv4Addr::new(224, 0, 0, 5),
            multicast_port: 41234,
            credential_dir: PathBuf::from("certs"),
        }
    }
}

/// Mutable server state: the one serialization boundary.
///
/// The auction house and the fanout registry are guarded together because
/// bid validity and ticker lifecycle both depend on a consistent joint view
/// of item state and connection count.
struct Driver {
    house: AuctionHouse,
    fanout: Fanout<QuinnConnection>,
    ticker: Option<tokio::task::JoinHandle<()>>,
}

/// State shared across connection tasks, the bridge task, and the ticker.
struct Shared {
    driver: Mutex<Driver>,
    bridge: MulticastBridge,
    bootstrap: Bootstrap<DirStore>,
    env: SystemEnv,
}

/// Production Gavel server.
pub struct Server {
    shared: Arc<Shared>,
    transport: QuinnTransport,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// Generates the process-wide session key, joins the multicast group,
    /// and binds the QUIC endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if binding either socket fails or the TLS
    /// configuration is invalid.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();

        let mut entropy = [0u8; 32];
        env.random_bytes(&mut entropy);
        let session_key = SessionKey::from_entropy(entropy);

        let bridge = MulticastBridge::bind(config.multicast_group, config.multicast_port).await?;

        let bootstrap = Bootstrap::new(
            DirStore::new(config.credential_dir),
            IdentifierPolicy::default(),
            session_key,
            config.multicast_group.to_string(),
        );

        let transport =
            QuinnTransport::bind(&config.bind_address, config.cert_path, config.key_path)?;

        let driver = Driver {
            house: AuctionHouse::default(),
            fanout: Fanout::new(),
            ticker: None,
        };

        Ok(Self {
            shared: Arc::new(Shared { driver: Mutex::new(driver), bridge, bootstrap, env }),
            transport,
        })
    }

    /// Run the server, accepting connections and bridging multicast
    /// traffic.
    ///
    /// This method runs until the endpoint is closed or an error occurs.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        tokio::spawn(bridge_loop(Arc::clone(&self.shared)));

        loop {
            let conn = self.transport.accept().await?;
            let conn_id = self.shared.env.random_u64();
            let shared = Arc::clone(&self.shared);

            tokio::spawn(async move {
                handle_connection(shared, conn, conn_id).await;
            });
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle one connection for its whole lifetime: register, pump client
/// events, deregister.
async fn handle_connection(shared: Arc<Shared>, conn: QuinnConnection, conn_id: ConnectionId) {
    tracing::debug!(conn_id, remote = %conn.remote_address(), "connection accepted");

    {
        let mut driver = shared.driver.lock().await;
        driver.fanout.insert(conn_id, conn.clone());
        let actions = driver.house.connect(conn_id);
        execute_actions(&shared, &mut driver, actions).await;
    }

    // Bootstrap requests arrive on bidirectional streams, independently of
    // the event stream below.
    let bootstrap_task = tokio::spawn(bootstrap_loop(Arc::clone(&shared), conn.clone()));

    loop {
        match conn.accept_message().await {
            Ok(bytes) => handle_client_event(&shared, conn_id, &bytes).await,
            Err(e) => {
                tracing::debug!(conn_id, "connection closed: {}", e);
                break;
            },
        }
    }

    bootstrap_task.abort();

    let mut driver = shared.driver.lock().await;
    driver.fanout.remove(conn_id);
    let actions = driver.house.disconnect(conn_id);
    execute_actions(&shared, &mut driver, actions).await;
}

/// Decode and apply one client event.
///
/// A malformed event is a validation error reported to the sender only; it
/// never touches auction state.
async fn handle_client_event(shared: &Arc<Shared>, conn_id: ConnectionId, bytes: &[u8]) {
    // Apply and publish under one lock acquisition so item updates reach
    // connections in the order they were accepted.
    let mut driver = shared.driver.lock().await;

    let actions = match ClientEvent::decode(bytes) {
        Ok(ClientEvent::NewBid(bid)) => driver.house.submit_bid(conn_id, &bid),
        Err(e) => {
            tracing::debug!(conn_id, "malformed client event: {}", e);
            vec![AuctionAction::SendToConnection {
                conn_id,
                event: PushEvent::Error(format!("malformed event: {e}")),
            }]
        },
    };

    execute_actions(shared, &mut driver, actions).await;
}

/// Serve bootstrap handshakes on bidirectional streams.
async fn bootstrap_loop(shared: Arc<Shared>, conn: QuinnConnection) {
    loop {
        match conn.accept_request().await {
            Ok((request, reply_stream)) => {
                let reply = process_bootstrap(&shared, &request);
                let payload = serde_json::to_vec(&reply).unwrap_or_default();
                if let Err(e) = conn.reply(reply_stream, &payload).await {
                    tracing::debug!("bootstrap reply failed: {}", e);
                }
            },
            Err(_) => break,
        }
    }
}

/// Run one bootstrap handshake. Rejections are values; a store or RSA
/// fault is logged and answered as an unsuccessful reply.
fn process_bootstrap(shared: &Shared, request: &[u8]) -> BootstrapReply {
    let Ok(request) = serde_json::from_slice::<BootstrapRequest>(request) else {
        return BootstrapReply::rejected(RejectReason::InvalidIdentifier);
    };

    let outcome = shared.bootstrap.authenticate(
        &mut rand::thread_rng(),
        &request.identifier,
        &request.public_key,
    );

    match outcome {
        Ok(BootstrapOutcome::Granted(grant)) => BootstrapReply {
            success: true,
            encrypted_symmetric_key: Some(grant.session_key),
            encrypted_user_info: Some(grant.user_info),
            encrypted_multicast_address: Some(grant.multicast_address),
            reason: None,
            message: None,
        },
        Ok(BootstrapOutcome::Rejected(rejection)) => BootstrapReply::rejected(match rejection {
            Rejection::InvalidIdentifier => RejectReason::InvalidIdentifier,
            Rejection::UnknownIdentifier => RejectReason::UnknownIdentifier,
            Rejection::KeyMismatch => RejectReason::KeyMismatch,
        }),
        Err(e) => {
            tracing::error!("bootstrap fault: {}", e);
            BootstrapReply {
                success: false,
                encrypted_symmetric_key: None,
                encrypted_user_info: None,
                encrypted_multicast_address: None,
                reason: None,
                message: Some("internal error".to_string()),
            }
        },
    }
}

/// Pump inbound multicast datagrams to the fanout, suppressing self-echo.
async fn bridge_loop(shared: Arc<Shared>) {
    loop {
        match shared.bridge.recv().await {
            Ok((payload, sender)) => {
                if shared.bridge.is_self_echo(sender) {
                    continue;
                }
                tracing::debug!(%sender, "relaying multicast payload");

                let mut driver = shared.driver.lock().await;
                let actions = driver.house.relay(payload);
                execute_actions(&shared, &mut driver, actions).await;
            },
            Err(e) => {
                tracing::warn!("multicast receive failed: {}", e);
            },
        }
    }
}

/// Execute state machine actions.
///
/// Runs a worklist: a stale connection discovered during delivery feeds a
/// deregistration back into the state machine, whose follow-up actions
/// (possibly `StopTicker`) land on the same queue.
async fn execute_actions(shared: &Arc<Shared>, driver: &mut Driver, actions: Vec<AuctionAction>) {
    let mut queue: VecDeque<AuctionAction> = actions.into();

    while let Some(action) = queue.pop_front() {
        match action {
            AuctionAction::SendToConnection { conn_id, event } => {
                if let Some(stale) = driver.fanout.send_to(conn_id, &event).await {
                    driver.fanout.remove(stale);
                    queue.extend(driver.house.disconnect(stale));
                }
            },

            AuctionAction::Broadcast(item) => {
                let stale = driver.fanout.publish(&PushEvent::CurrentItem(item)).await;
                for conn_id in stale {
                    driver.fanout.remove(conn_id);
                    queue.extend(driver.house.disconnect(conn_id));
                }
            },

            AuctionAction::Relay(payload) => {
                let stale = driver.fanout.publish(&PushEvent::Message(payload)).await;
                for conn_id in stale {
                    driver.fanout.remove(conn_id);
                    queue.extend(driver.house.disconnect(conn_id));
                }
            },

            AuctionAction::Multicast(item) => {
                shared.bridge.publish(&item).await;
            },

            AuctionAction::StartTicker => {
                if driver.ticker.as_ref().is_none_or(tokio::task::JoinHandle::is_finished) {
                    driver.ticker = Some(spawn_ticker(Arc::clone(shared)));
                }
            },

            AuctionAction::StopTicker => {
                if let Some(handle) = driver.ticker.take() {
                    handle.abort();
                    tracing::debug!("ticker stopped");
                }
            },
        }
    }
}

/// Spawn the one-second countdown ticker.
///
/// Kept out of async context so the spawned future is created in a plain
/// function, which breaks the `run_ticker` / `execute_actions` future type
/// cycle.
fn spawn_ticker(shared: Arc<Shared>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_ticker(shared))
}

/// Drive the countdown: one tick per second through the state owner.
///
/// Cancellation is the `StopTicker` action aborting this task; the
/// connection check itself lives in `AuctionHouse::tick`, under the same
/// lock as the decrement, so a tick racing the final disconnect can never
/// advance state unobserved.
async fn run_ticker(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The first tick of a tokio interval completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let mut driver = shared.driver.lock().await;
        let actions = driver.house.tick();
        execute_actions(&shared, &mut driver, actions).await;
    }
}
