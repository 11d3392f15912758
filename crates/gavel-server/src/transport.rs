//! QUIC transport via Quinn.
//!
//! Message framing is one JSON value per stream: the server pushes events
//! on unidirectional streams it opens (fire-and-forget, no acknowledgment),
//! clients submit events on unidirectional streams and run the bootstrap
//! handshake on a single bidirectional stream.

use std::net::SocketAddr;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::ServerError;
use crate::fanout::PushChannel;

/// Upper bound for a single inbound message.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// QUIC endpoint wrapper.
pub struct QuinnTransport {
    endpoint: quinn::Endpoint,
}

impl QuinnTransport {
    /// Bind a server endpoint.
    ///
    /// With `cert_path`/`key_path` given, loads the PEM chain and key;
    /// otherwise generates a self-signed certificate for development.
    pub fn bind(
        bind_address: &str,
        cert_path: Option<String>,
        key_path: Option<String>,
    ) -> Result<Self, ServerError> {
        // Ignore the error: another component may have installed the
        // provider already.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let (certs, key) = match (cert_path, key_path) {
            (Some(cert), Some(key)) => load_pem_identity(&cert, &key)?,
            _ => self_signed_identity()?,
        };

        let server_config = quinn::ServerConfig::with_single_cert(certs, key)
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let addr: SocketAddr = bind_address.parse()?;
        let endpoint = quinn::Endpoint::server(server_config, addr)?;

        Ok(Self { endpoint })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<QuinnConnection, ServerError> {
        loop {
            let Some(incoming) = self.endpoint.accept().await else {
                return Err(ServerError::Transport("endpoint closed".to_string()));
            };

            match incoming.await {
                Ok(connection) => return Ok(QuinnConnection { inner: connection }),
                Err(e) => {
                    // A failed handshake only affects that client.
                    tracing::debug!("connection handshake failed: {}", e);
                },
            }
        }
    }

    /// The local address the endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.endpoint.local_addr()?)
    }
}

/// A live QUIC connection.
#[derive(Clone)]
pub struct QuinnConnection {
    inner: quinn::Connection,
}

impl QuinnConnection {
    /// Remote peer address.
    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    /// Accept a client-opened unidirectional stream and read its single
    /// message.
    pub async fn accept_message(&self) -> Result<Vec<u8>, ServerError> {
        let mut recv = self
            .inner
            .accept_uni()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;
        recv.read_to_end(MAX_MESSAGE_SIZE)
            .await
            .map_err(|e| ServerError::Protocol(e.to_string()))
    }

    /// Accept a client-opened bidirectional stream: read the request and
    /// return the reply handle.
    pub async fn accept_request(&self) -> Result<(Vec<u8>, quinn::SendStream), ServerError> {
        let (send, mut recv) = self
            .inner
            .accept_bi()
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;
        let request = recv
            .read_to_end(MAX_MESSAGE_SIZE)
            .await
            .map_err(|e| ServerError::Protocol(e.to_string()))?;
        Ok((request, send))
    }

    /// Write a reply on a bidirectional stream and finish it.
    pub async fn reply(
        &self,
        mut send: quinn::SendStream,
        payload: &[u8],
    ) -> Result<(), ServerError> {
        send.write_all(payload).await.map_err(|e| ServerError::Transport(e.to_string()))?;
        send.finish().map_err(|e| ServerError::Transport(e.to_string()))?;
        Ok(())
    }
}

impl PushChannel for QuinnConnection {
    async fn push(&self, payload: &[u8]) -> bool {
        let Ok(mut send) = self.inner.open_uni().await else {
            return false;
        };
        if send.write_all(payload).await.is_err() {
            return false;
        }
        send.finish().is_ok()
    }
}

impl std::fmt::Debug for QuinnConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuinnConnection").field("remote", &self.remote_address()).finish()
    }
}

/// Load a PEM certificate chain and private key from disk.
fn load_pem_identity(
    cert_path: &str,
    key_path: &str,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let cert_file = std::fs::File::open(cert_path)?;
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut std::io::BufReader::new(cert_file))
            .collect::<Result<_, _>>()?;

    let key_file = std::fs::File::open(key_path)?;
    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_file))?
        .ok_or_else(|| ServerError::Config(format!("no private key in {key_path}")))?;

    if certs.is_empty() {
        return Err(ServerError::Config(format!("no certificates in {cert_path}")));
    }

    Ok((certs, key))
}

/// Generate a self-signed certificate for development use.
fn self_signed_identity()
-> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ServerError> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(e.to_string()))?;

    let cert = certified.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    Ok((vec![cert], key.into()))
}
