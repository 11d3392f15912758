//! Bootstrap handshake service.
//!
//! Validates a claimed public key against the credential store and, on
//! match, encrypts the session key, the identity record, and the multicast
//! rendezvous address individually under the caller's key.
//!
//! All randomness is provided by the caller, keeping the service itself
//! deterministic and testable with seeded RNGs.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::Serialize;

use crate::store::{CredentialStore, StoreError};

/// Errors from bootstrap processing.
///
/// These are faults, not rejections: a failed handshake for business
/// reasons is a [`BootstrapOutcome::Rejected`] value.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Credential store fault.
    #[error("credential store: {0}")]
    Store(#[from] StoreError),

    /// The matched key could not be parsed as an RSA public key.
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// RSA encryption failed.
    #[error("encryption failed: {0}")]
    Encrypt(#[from] rsa::Error),

    /// Identity record serialization failed.
    #[error("identity record serialization: {0}")]
    Identity(#[from] serde_json::Error),
}

/// Why a handshake was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Identifier failed the format predicate.
    InvalidIdentifier,
    /// No credential stored for the identifier.
    UnknownIdentifier,
    /// Claimed key does not match the stored key after normalization.
    KeyMismatch,
}

/// Identifier format predicate.
///
/// The default checks a fixed length; the predicate is kept pluggable so
/// deployments can swap in a stricter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Identifier must be exactly this many characters.
    FixedLength(usize),
    /// Any non-empty identifier.
    AnyNonEmpty,
}

impl IdentifierPolicy {
    /// Whether an identifier satisfies this policy.
    pub fn allows(self, identifier: &str) -> bool {
        match self {
            Self::FixedLength(len) => identifier.chars().count() == len,
            Self::AnyNonEmpty => !identifier.is_empty(),
        }
    }
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self::FixedLength(11)
    }
}

/// The process-wide symmetric session key.
///
/// Generated once at process start from injected entropy, shared by
/// construction across every participant that completes the handshake,
/// never rotated and never persisted.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(String);

impl SessionKey {
    /// Build the key from 32 bytes of entropy, hex encoded for transport.
    pub fn from_entropy(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// The hex form delivered to clients.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionKey").field(&"<redacted 32 bytes>").finish()
    }
}

/// The three independently produced ciphertexts, each base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedGrant {
    /// Session key ciphertext.
    pub session_key: String,
    /// Identity record ciphertext.
    pub user_info: String,
    /// Multicast rendezvous address ciphertext.
    pub multicast_address: String,
}

/// Result of a handshake attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Key matched; secrets encrypted under the caller's key.
    Granted(EncryptedGrant),
    /// Business rejection; no ciphertexts, no state change.
    Rejected(Rejection),
}

/// Identity record plaintext delivered to the client.
#[derive(Debug, Serialize)]
struct UserInfo<'a> {
    name: &'a str,
    identifier: &'a str,
}

/// Normalize a PEM key for comparison.
///
/// Strips every linebreak variant anywhere in the string and trims
/// surrounding whitespace. Required because PEM formatting can differ in
/// transit (`\r\n` vs `\n`, trailing newline or not).
pub fn normalize_key(key: &str) -> String {
    key.replace(['\r', '\n'], "").trim().to_string()
}

/// The bootstrap handshake service.
///
/// Holds the session key and rendezvous address as explicit injected
/// values. `authenticate` has no side effects beyond the three encryption
/// operations.
pub struct Bootstrap<S> {
    store: S,
    policy: IdentifierPolicy,
    session_key: SessionKey,
    rendezvous: String,
}

impl<S: CredentialStore> Bootstrap<S> {
    /// Create the service.
    ///
    /// `rendezvous` is the multicast group address delivered (encrypted) to
    /// clients that complete the handshake.
    pub fn new(
        store: S,
        policy: IdentifierPolicy,
        session_key: SessionKey,
        rendezvous: impl Into<String>,
    ) -> Self {
        Self { store, policy, session_key, rendezvous: rendezvous.into() }
    }

    /// Run the handshake for a claimed identifier and public key.
    ///
    /// Rejections (`InvalidIdentifier`, `UnknownIdentifier`, `KeyMismatch`)
    /// are values; `Err` is reserved for store or RSA faults.
    pub fn authenticate<R>(
        &self,
        rng: &mut R,
        identifier: &str,
        claimed_key_pem: &str,
    ) -> Result<BootstrapOutcome, CryptoError>
    where
        R: RngCore + CryptoRng,
    {
        if !self.policy.allows(identifier) {
            return Ok(BootstrapOutcome::Rejected(Rejection::InvalidIdentifier));
        }

        let Some(credential) = self.store.lookup(identifier)? else {
            tracing::debug!(identifier, "bootstrap: no stored credential");
            return Ok(BootstrapOutcome::Rejected(Rejection::UnknownIdentifier));
        };

        if normalize_key(&credential.public_key_pem) != normalize_key(claimed_key_pem) {
            tracing::debug!(identifier, "bootstrap: key mismatch");
            return Ok(BootstrapOutcome::Rejected(Rejection::KeyMismatch));
        }

        let key = parse_public_key(claimed_key_pem)?;

        let user_info =
            serde_json::to_string(&UserInfo { name: &credential.display_name, identifier })?;

        // Three separate ciphertexts: each plaintext stays under the RSA
        // plaintext ceiling and a client can decrypt only what it needs.
        let grant = EncryptedGrant {
            session_key: encrypt(rng, &key, self.session_key.as_str().as_bytes())?,
            user_info: encrypt(rng, &key, user_info.as_bytes())?,
            multicast_address: encrypt(rng, &key, self.rendezvous.as_bytes())?,
        };

        tracing::info!(identifier, "bootstrap granted");
        Ok(BootstrapOutcome::Granted(grant))
    }
}

impl<S> std::fmt::Debug for Bootstrap<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("policy", &self.policy)
            .field("rendezvous", &self.rendezvous)
            .finish_non_exhaustive()
    }
}

/// Parse a PEM public key, accepting both SPKI (`BEGIN PUBLIC KEY`) and
/// PKCS#1 (`BEGIN RSA PUBLIC KEY`) framing.
fn parse_public_key(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))
}

/// Encrypt one plaintext under the key with PKCS#1 v1.5 padding, base64
/// encoded for transport.
fn encrypt<R>(rng: &mut R, key: &RsaPublicKey, plaintext: &[u8]) -> Result<String, CryptoError>
where
    R: RngCore + CryptoRng,
{
    let ciphertext = key.encrypt(rng, Pkcs1v15Encrypt, plaintext)?;
    Ok(BASE64.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_linebreak_variants() {
        let unix = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";
        let dos = "-----BEGIN PUBLIC KEY-----\r\nAAAA\r\n-----END PUBLIC KEY-----\r\n";
        let padded = "  -----BEGIN PUBLIC KEY-----\rAAAA\r-----END PUBLIC KEY-----  ";

        assert_eq!(normalize_key(unix), normalize_key(dos));
        assert_eq!(normalize_key(unix), normalize_key(padded));
    }

    #[test]
    fn normalization_distinguishes_different_keys() {
        assert_ne!(normalize_key("AAAA"), normalize_key("BBBB"));
    }

    #[test]
    fn default_policy_requires_eleven_characters() {
        let policy = IdentifierPolicy::default();

        assert!(policy.allows("12345678901"));
        assert!(!policy.allows("1234567890"));
        assert!(!policy.allows(""));
    }

    #[test]
    fn session_key_is_hex_of_entropy() {
        let key = SessionKey::from_entropy([0xab; 32]);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_entropy([7; 32]);
        let debug = format!("{key:?}");
        assert!(!debug.contains(key.as_str()));
        assert!(debug.contains("redacted"));
    }
}
