//! Gavel credential bootstrap.
//!
//! This crate implements the one-shot handshake that lets a new participant
//! securely obtain the shared session key, its verified identity record,
//! and the multicast rendezvous address.
//!
//! # Design
//!
//! The handshake is pure request/response with no state mutation: a claimed
//! public key is compared against the stored one under whitespace
//! normalization, and on match three small plaintexts are each encrypted
//! independently under the caller's key (RSA PKCS#1 v1.5). Separate
//! ciphertexts keep each plaintext under the asymmetric size ceiling and
//! let a client decrypt only what it needs.
//!
//! # Security Properties
//!
//! - No lockout or backoff: a rejection is a value, not a fault
//! - The session key is an explicit injected value, generated once at
//!   process start, never rotated, never persisted
//! - Rejections never reveal which payloads would have been produced
//!
//! Note: the delivered session key is not applied to push-channel or
//! multicast traffic anywhere in the system; it only provisions clients
//! for encryption layered on later.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod store;

pub use bootstrap::{
    Bootstrap, BootstrapOutcome, CryptoError, EncryptedGrant, IdentifierPolicy, Rejection,
    SessionKey, normalize_key,
};
pub use store::{Credential, CredentialStore, DirStore, MemoryStore, StoreError};
