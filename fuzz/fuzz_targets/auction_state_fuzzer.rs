//! Fuzz target for the [`AuctionHouse`] state machine
//!
//! Prevent state corruption via arbitrary event interleavings
//!
//! # Strategy
//!
//! - Event sequences: Arbitrary sequences of connects, disconnects, bids,
//!   ticks, and relays
//! - Registry probing: Duplicate connects, disconnects of unknown ids
//! - Bid probing: Amounts around the acceptance threshold, including 0 and
//!   u64::MAX
//!
//! # Invariants
//!
//! - `current_bid >= initial_bid` always
//! - An accepted bid equals the offered amount; a rejected bid changes
//!   nothing
//! - `StartTicker` only on the Idle -> Running transition, `StopTicker`
//!   only on Running -> Idle (never double-started or double-stopped)
//! - Ticker never Running with zero connections after an event completes
//! - Item id never decreases; rotation advances it by exactly 1
//! - NEVER panic on any event sequence

#![no_main]

use arbitrary::Arbitrary;
use gavel_core::{AuctionAction, AuctionHouse, TickerState};
use gavel_proto::Bid;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum AuctionEvent {
    Connect { conn: u8 },
    Disconnect { conn: u8 },
    SubmitBid { conn: u8, amount: u64, user_len: u8 },
    Tick,
    Relay { payload_len: u8 },
}

fuzz_target!(|events: Vec<AuctionEvent>| {
    let mut house = AuctionHouse::default();
    let mut last_id = house.item().id;

    for event in events {
        let ticker_before = house.ticker_state();
        let connections_before = house.connection_count();
        let bid_before = house.item().current_bid;

        let actions = match event {
            AuctionEvent::Connect { conn } => house.connect(u64::from(conn)),

            AuctionEvent::Disconnect { conn } => house.disconnect(u64::from(conn)),

            AuctionEvent::SubmitBid { conn, amount, user_len } => {
                let user = "u".repeat((user_len % 32) as usize);
                let minimum = house.item().minimum_acceptable_bid();
                let actions = house.submit_bid(u64::from(conn), &Bid { amount, user });

                if amount >= minimum {
                    assert_eq!(house.item().current_bid, amount);
                } else {
                    assert_eq!(house.item().current_bid, bid_before);
                }
                actions
            },

            AuctionEvent::Tick => house.tick(),

            AuctionEvent::Relay { payload_len } => {
                house.relay("x".repeat((payload_len % 100) as usize))
            },
        };

        let starts = actions.iter().filter(|a| matches!(a, AuctionAction::StartTicker)).count();
        let stops = actions.iter().filter(|a| matches!(a, AuctionAction::StopTicker)).count();
        assert!(starts <= 1 && stops <= 1, "at most one ticker transition per event");

        if starts == 1 {
            assert_eq!(ticker_before, TickerState::Idle, "start while already running");
            assert_eq!(connections_before, 0, "start without the 0 -> 1 transition");
            assert_eq!(house.ticker_state(), TickerState::Running);
        }
        if stops == 1 {
            assert_eq!(ticker_before, TickerState::Running, "stop while already idle");
            assert_eq!(house.ticker_state(), TickerState::Idle);
        }

        assert!(
            house.item().current_bid >= house.item().initial_bid,
            "current bid fell below initial bid"
        );

        let id = house.item().id;
        assert!(id == last_id || id == last_id + 1, "item id must advance by exactly 1");
        last_id = id;

        if house.connection_count() == 0 {
            // A tick in flight may observe the empty registry exactly once;
            // by the time the event returns the ticker must be idle.
            assert_eq!(house.ticker_state(), TickerState::Idle);
        }
    }
});
