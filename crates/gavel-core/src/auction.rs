//! Auction state machine.
//!
//! Orchestrates the live connection set, the bid acceptance rule, and the
//! countdown-to-rotation cycle for the single current item.
//!
//! ## Responsibilities
//!
//! - Connection Registry: Track live connections, idempotent deregister
//! - Bid Rule: Accept a bid iff it clears the current bid plus increment
//! - Countdown: Decrement once per tick; rotate the item on expiry
//! - Action Generation: Return actions for the driver to execute, no direct
//!   I/O
//!
//! ## Design
//!
//! All mutations run through one owner. Deciding "is this bid valid" and
//! "should the ticker keep running" both need a consistent joint read of
//! item state and connection count, so the registry and the item live in
//! the same struct behind the same serialization boundary. The ticker
//! lifecycle is an explicit two-state machine with guarded transitions:
//! `StartTicker` is emitted only on Idle → Running and `StopTicker` only on
//! Running → Idle, so the driver can never double-start or double-stop.

use std::collections::HashSet;

use gavel_proto::{AuctionItem, Bid, PushEvent};

/// Identity of a live per-connection push channel.
pub type ConnectionId = u64;

/// Countdown ticker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    /// No connections; no running ticker.
    Idle,
    /// At least one connection was present when the ticker started.
    Running,
}

/// Actions returned by [`AuctionHouse`] for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuctionAction {
    /// Deliver an event to a single connection.
    SendToConnection {
        /// Target connection.
        conn_id: ConnectionId,
        /// Event to deliver.
        event: PushEvent,
    },

    /// Deliver the item to every registered connection.
    Broadcast(AuctionItem),

    /// Publish the item on the multicast group.
    Multicast(AuctionItem),

    /// Deliver an opaque relayed payload to every registered connection.
    Relay(String),

    /// Begin the one-second countdown ticker.
    StartTicker,

    /// Cancel the countdown ticker.
    StopTicker,
}

/// The single owner of auction state.
///
/// Owns the current [`AuctionItem`] and the registry of live connections.
/// Pure state machine: methods mutate owned state and return actions, the
/// caller handles I/O and the actual timer.
#[derive(Debug)]
pub struct AuctionHouse {
    item: AuctionItem,
    connections: HashSet<ConnectionId>,
    ticker: TickerState,
}

impl AuctionHouse {
    /// Create a house holding the given starting item.
    pub fn new(item: AuctionItem) -> Self {
        Self { item, connections: HashSet::new(), ticker: TickerState::Idle }
    }

    /// The current item.
    pub fn item(&self) -> &AuctionItem {
        &self.item
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Current ticker lifecycle state.
    pub fn ticker_state(&self) -> TickerState {
        self.ticker
    }

    /// Register a connection.
    ///
    /// On the 0 → 1 transition the ticker starts. The new connection always
    /// receives a snapshot of the current item. Registering an id that is
    /// already present re-sends the snapshot and nothing else.
    pub fn connect(&mut self, conn_id: ConnectionId) -> Vec<AuctionAction> {
        let mut actions = Vec::new();

        if self.connections.insert(conn_id) && self.ticker == TickerState::Idle {
            self.ticker = TickerState::Running;
            actions.push(AuctionAction::StartTicker);
        }

        tracing::debug!(conn_id, total = self.connections.len(), "connection registered");

        actions.push(AuctionAction::SendToConnection {
            conn_id,
            event: PushEvent::CurrentItem(self.item.clone()),
        });

        actions
    }

    /// Deregister a connection.
    ///
    /// Idempotent: disconnect notifications can race with stale-write
    /// cleanup, so an unknown id is a no-op. On the 1 → 0 transition the
    /// ticker stops.
    pub fn disconnect(&mut self, conn_id: ConnectionId) -> Vec<AuctionAction> {
        if !self.connections.remove(&conn_id) {
            return Vec::new();
        }

        tracing::debug!(conn_id, total = self.connections.len(), "connection deregistered");

        if self.connections.is_empty() && self.ticker == TickerState::Running {
            self.ticker = TickerState::Idle;
            return vec![AuctionAction::StopTicker];
        }

        Vec::new()
    }

    /// Apply a bid from a connection.
    ///
    /// Accepted iff `amount >= current_bid + min_bid_increment`. On accept
    /// the bid fields update atomically and the item republishes on both
    /// transports. A rejection is a normal outcome, reported to the
    /// submitter only.
    pub fn submit_bid(&mut self, conn_id: ConnectionId, bid: &Bid) -> Vec<AuctionAction> {
        if bid.amount < self.item.minimum_acceptable_bid() {
            return vec![AuctionAction::SendToConnection {
                conn_id,
                event: PushEvent::Error(format!(
                    "bid below minimum: offered {}, need at least {}",
                    bid.amount,
                    self.item.minimum_acceptable_bid()
                )),
            }];
        }

        self.item.current_bid = bid.amount;
        self.item.current_bid_user = Some(bid.user.clone());

        tracing::info!(amount = bid.amount, user = %bid.user, "bid accepted");

        self.republish()
    }

    /// Advance the countdown by one tick.
    ///
    /// The connection check happens here, under the same owner as the
    /// decrement, so a tick racing a final disconnect can never silently
    /// advance state with no observers: either the disconnect ran first and
    /// this tick only stops the ticker, or this tick runs to completion
    /// first.
    pub fn tick(&mut self) -> Vec<AuctionAction> {
        if self.connections.is_empty() {
            if self.ticker == TickerState::Running {
                self.ticker = TickerState::Idle;
                return vec![AuctionAction::StopTicker];
            }
            return Vec::new();
        }

        if self.item.time_remaining > 0 {
            self.item.time_remaining -= 1;
        } else {
            // Countdown expired: replace the record wholesale.
            self.item = self.item.successor();
            tracing::info!(id = self.item.id, "auction rotated to new item");
        }

        self.republish()
    }

    /// Relay an opaque payload, received from the multicast group, to every
    /// connection.
    pub fn relay(&self, payload: String) -> Vec<AuctionAction> {
        vec![AuctionAction::Relay(payload)]
    }

    fn republish(&self) -> Vec<AuctionAction> {
        vec![
            AuctionAction::Broadcast(self.item.clone()),
            AuctionAction::Multicast(self.item.clone()),
        ]
    }
}

impl Default for AuctionHouse {
    fn default() -> Self {
        Self::new(AuctionItem::seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house() -> AuctionHouse {
        AuctionHouse::default()
    }

    #[test]
    fn first_connect_starts_ticker_and_sends_snapshot() {
        let mut house = house();
        let actions = house.connect(7);

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], AuctionAction::StartTicker);
        assert!(matches!(
            &actions[1],
            AuctionAction::SendToConnection { conn_id: 7, event: PushEvent::CurrentItem(_) }
        ));
        assert_eq!(house.ticker_state(), TickerState::Running);
    }

    #[test]
    fn second_connect_does_not_restart_ticker() {
        let mut house = house();
        house.connect(1);
        let actions = house.connect(2);

        assert!(!actions.contains(&AuctionAction::StartTicker));
        assert_eq!(house.connection_count(), 2);
    }

    #[test]
    fn duplicate_connect_only_resends_snapshot() {
        let mut house = house();
        house.connect(1);
        let actions = house.connect(1);

        assert_eq!(actions.len(), 1);
        assert_eq!(house.connection_count(), 1);
    }

    #[test]
    fn last_disconnect_stops_ticker() {
        let mut house = house();
        house.connect(1);
        house.connect(2);

        assert!(house.disconnect(1).is_empty());
        assert_eq!(house.disconnect(2), vec![AuctionAction::StopTicker]);
        assert_eq!(house.ticker_state(), TickerState::Idle);
    }

    #[test]
    fn disconnect_of_unknown_connection_is_noop() {
        let mut house = house();
        house.connect(1);

        assert!(house.disconnect(99).is_empty());
        assert_eq!(house.connection_count(), 1);
        assert_eq!(house.ticker_state(), TickerState::Running);
    }

    #[test]
    fn tick_with_zero_connections_changes_nothing() {
        let mut house = house();
        let before = house.item().clone();

        assert!(house.tick().is_empty());
        assert_eq!(house.item(), &before);
    }
}
