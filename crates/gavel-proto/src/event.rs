//! Push and client event envelopes.
//!
//! Events are JSON envelopes tagged by an `event` field with the payload
//! under `data`, e.g. `{"event":"newBid","data":{"amount":110,"user":"A"}}`.

use serde::{Deserialize, Serialize};

use crate::{AuctionItem, Bid, ProtoError};

/// Server-to-connection push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    /// Full auction state, emitted on every change and once on connect.
    CurrentItem(AuctionItem),
    /// Human-readable rejection reason, delivered to the submitter only.
    Error(String),
    /// Opaque relayed multicast payload.
    Message(String),
}

impl PushEvent {
    /// Encode to the JSON envelope.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Connection-to-server event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// A bid submission for the current item.
    NewBid(Bid),
}

impl ClientEvent {
    /// Encode to the JSON envelope.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
