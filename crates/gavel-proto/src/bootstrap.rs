//! Bootstrap handshake request/response payloads.
//!
//! The handshake is a one-shot request/response exchange, not a stream.
//! A client presents an identifier and a claimed public key; on success the
//! server returns three independently encrypted secrets.

use serde::{Deserialize, Serialize};

/// Client request to bootstrap credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
    /// Claimed identifier, validated against the credential store.
    pub identifier: String,
    /// Claimed public key, PEM encoded.
    pub public_key: String,
}

/// Reason a bootstrap request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Identifier failed the format predicate.
    InvalidIdentifier,
    /// No stored key for this identifier.
    UnknownIdentifier,
    /// Claimed key does not match the stored key after normalization.
    KeyMismatch,
}

impl RejectReason {
    /// Human-readable form carried alongside the code.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "invalid identifier format",
            Self::UnknownIdentifier => "no stored key for identifier",
            Self::KeyMismatch => "key mismatch",
        }
    }
}

/// Server response to a [`BootstrapRequest`].
///
/// On success the three ciphertext fields are populated; on failure they are
/// absent and `reason` carries the rejection code.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl redacts the ciphertexts to keep
///   encrypted secrets out of logs. Always use custom `Debug`
///   implementations for types carrying secret material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReply {
    /// Whether the handshake succeeded.
    pub success: bool,
    /// Session key, base64 ciphertext under the claimed public key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encrypted_symmetric_key: Option<String>,
    /// Identity record JSON, base64 ciphertext under the claimed public key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encrypted_user_info: Option<String>,
    /// Multicast rendezvous address, base64 ciphertext under the claimed
    /// public key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub encrypted_multicast_address: Option<String>,
    /// Rejection code, present iff `success` is false.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<RejectReason>,
    /// Human-readable rejection message.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
}

impl BootstrapReply {
    /// Build a rejection reply carrying a reason code and message.
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            success: false,
            encrypted_symmetric_key: None,
            encrypted_user_info: None,
            encrypted_multicast_address: None,
            reason: Some(reason),
            message: Some(reason.message().to_string()),
        }
    }
}

impl std::fmt::Debug for BootstrapReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact =
            |field: &Option<String>| field.as_ref().map(|c| format!("<redacted {} bytes>", c.len()));

        f.debug_struct("BootstrapReply")
            .field("success", &self.success)
            .field("encrypted_symmetric_key", &redact(&self.encrypted_symmetric_key))
            .field("encrypted_user_info", &redact(&self.encrypted_user_info))
            .field("encrypted_multicast_address", &redact(&self.encrypted_multicast_address))
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}
