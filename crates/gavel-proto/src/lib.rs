//! Wire types for the Gavel auction protocol.
//!
//! Everything that crosses a transport boundary lives here: the auction
//! item record, push events (server to connection), client events
//! (connection to server), and the bootstrap request/response pair.
//!
//! # Wire format
//!
//! All payloads are UTF-8 JSON with `camelCase` field names. The multicast
//! datagram body is the bare [`AuctionItem`]; push and client events are
//! tagged envelopes (`{"event": ..., "data": ...}`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bootstrap;
mod event;
mod item;

pub use bootstrap::{BootstrapReply, BootstrapRequest, RejectReason};
pub use event::{ClientEvent, PushEvent};
pub use item::{AuctionItem, Bid, INITIAL_TIME_REMAINING};

/// Errors produced while encoding or decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Payload was not valid JSON for the expected type.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
