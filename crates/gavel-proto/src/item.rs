//! Auction item record and bid input.

use serde::{Deserialize, Serialize};

/// Countdown assigned to a freshly rotated item, in seconds.
pub const INITIAL_TIME_REMAINING: u32 = 60;

/// The single mutable auction record replicated to every participant.
///
/// # Invariants
///
/// - `current_bid >= initial_bid` at all times
/// - Exactly one item is current at any instant; rotation replaces the
///   record wholesale, never field by field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionItem {
    /// Monotonically increasing item identifier, starts at 1.
    pub id: u64,
    /// Human-readable description.
    pub description: String,
    /// Opening price for this item.
    pub initial_bid: u64,
    /// Minimum amount a new bid must exceed the current bid by.
    pub min_bid_increment: u64,
    /// Highest accepted bid so far.
    pub current_bid: u64,
    /// Identity of the highest bidder, absent until the first accepted bid.
    pub current_bid_user: Option<String>,
    /// Seconds until this item rotates out.
    pub time_remaining: u32,
}

impl AuctionItem {
    /// The item seeded at process start.
    pub fn seed() -> Self {
        Self {
            id: 1,
            description: "Test item".to_string(),
            initial_bid: 100,
            min_bid_increment: 10,
            current_bid: 100,
            current_bid_user: None,
            time_remaining: INITIAL_TIME_REMAINING,
        }
    }

    /// The item that replaces this one when its countdown expires.
    ///
    /// Same lot parameters, next id, bid state reset, full countdown.
    pub fn successor(&self) -> Self {
        Self {
            id: self.id + 1,
            description: self.description.clone(),
            initial_bid: self.initial_bid,
            min_bid_increment: self.min_bid_increment,
            current_bid: self.initial_bid,
            current_bid_user: None,
            time_remaining: INITIAL_TIME_REMAINING,
        }
    }

    /// Lowest amount a bid must reach to be accepted.
    ///
    /// Saturates at `u64::MAX` so a maximal accepted bid cannot wrap the
    /// threshold below the current bid.
    pub fn minimum_acceptable_bid(&self) -> u64 {
        self.current_bid.saturating_add(self.min_bid_increment)
    }

    /// Serialize to the multicast wire form (bare JSON object).
    pub fn to_wire(&self) -> String {
        // Serialization of a plain struct with string/int fields cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Ephemeral bid input. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    /// Offered amount.
    pub amount: u64,
    /// Identity string of the bidder.
    pub user: String,
}
