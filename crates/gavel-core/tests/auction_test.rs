//! Auction state machine tests.
//!
//! Verifies the bid rule, countdown rotation, and ticker lifecycle
//! invariants:
//! - A low bid leaves state untouched and reaches only the submitter
//! - An accepted bid updates state and republishes on both transports
//! - The countdown strictly decreases, then rotates the item
//! - With zero connections no tick-driven change occurs

use gavel_core::{AuctionAction, AuctionHouse, TickerState};
use gavel_proto::{AuctionItem, Bid, INITIAL_TIME_REMAINING, PushEvent};
use proptest::prelude::*;

fn bid(amount: u64, user: &str) -> Bid {
    Bid { amount, user: user.to_string() }
}

fn connected_house() -> AuctionHouse {
    let mut house = AuctionHouse::default();
    house.connect(1);
    house
}

#[test]
fn low_bid_is_rejected_to_submitter_only() {
    let mut house = connected_house();
    house.connect(2);
    let before = house.item().clone();

    let actions = house.submit_bid(2, &bid(105, "A"));

    assert_eq!(house.item(), &before, "rejected bid must not change state");
    assert_eq!(actions.len(), 1);
    match &actions[0] {
        AuctionAction::SendToConnection { conn_id, event: PushEvent::Error(_) } => {
            assert_eq!(*conn_id, 2);
        },
        other => panic!("expected submitter-only error, got {other:?}"),
    }
}

#[test]
fn accepted_bid_updates_state_and_republishes() {
    let mut house = connected_house();

    let actions = house.submit_bid(1, &bid(110, "A"));

    assert_eq!(house.item().current_bid, 110);
    assert_eq!(house.item().current_bid_user.as_deref(), Some("A"));
    assert!(actions.iter().any(|a| matches!(a, AuctionAction::Broadcast(_))));
    assert!(actions.iter().any(|a| matches!(a, AuctionAction::Multicast(_))));
}

#[test]
fn bid_exactly_at_minimum_is_accepted() {
    let mut house = connected_house();
    let minimum = house.item().minimum_acceptable_bid();

    house.submit_bid(1, &bid(minimum, "A"));

    assert_eq!(house.item().current_bid, minimum);
}

#[test]
fn increment_applies_on_top_of_accepted_bids() {
    // Scenario from the design: 100/10 item, 110 accepted, 115 rejected
    // (needs >= 120), 130 accepted.
    let mut house = connected_house();

    house.submit_bid(1, &bid(110, "A"));
    assert_eq!(house.item().current_bid, 110);
    assert_eq!(house.item().current_bid_user.as_deref(), Some("A"));

    let actions = house.submit_bid(1, &bid(115, "B"));
    assert_eq!(house.item().current_bid, 110, "115 needs >= 120");
    assert!(matches!(
        &actions[0],
        AuctionAction::SendToConnection { event: PushEvent::Error(_), .. }
    ));

    house.submit_bid(1, &bid(130, "B"));
    assert_eq!(house.item().current_bid, 130);
    assert_eq!(house.item().current_bid_user.as_deref(), Some("B"));
}

#[test]
fn maximal_bid_saturates_the_threshold() {
    let mut house = connected_house();

    house.submit_bid(1, &bid(u64::MAX, "A"));
    assert_eq!(house.item().current_bid, u64::MAX);

    // The next minimum saturates instead of wrapping around, so a low
    // follow-up bid stays rejected and state untouched.
    let actions = house.submit_bid(1, &bid(120, "B"));
    assert!(matches!(
        &actions[0],
        AuctionAction::SendToConnection { event: PushEvent::Error(_), .. }
    ));
    assert_eq!(house.item().current_bid, u64::MAX);
    assert!(house.item().current_bid >= house.item().initial_bid);

    // A repeat maximal bid still clears the saturated threshold.
    house.submit_bid(1, &bid(u64::MAX, "B"));
    assert_eq!(house.item().current_bid_user.as_deref(), Some("B"));
}

#[test]
fn countdown_strictly_decreases_while_connected() {
    let mut house = connected_house();

    for expected in (0..INITIAL_TIME_REMAINING).rev() {
        let actions = house.tick();
        assert_eq!(house.item().time_remaining, expected);
        assert!(actions.iter().any(|a| matches!(a, AuctionAction::Broadcast(_))));
    }
}

#[test]
fn expired_countdown_rotates_item() {
    let mut house = connected_house();
    house.submit_bid(1, &bid(150, "A"));

    for _ in 0..INITIAL_TIME_REMAINING {
        house.tick();
    }
    assert_eq!(house.item().time_remaining, 0);
    assert_eq!(house.item().id, 1);

    // The tick at zero replaces the item wholesale.
    house.tick();

    let item = house.item();
    assert_eq!(item.id, 2);
    assert_eq!(item.current_bid, item.initial_bid);
    assert_eq!(item.current_bid_user, None);
    assert_eq!(item.time_remaining, INITIAL_TIME_REMAINING);
}

#[test]
fn idle_state_is_frozen_until_reconnect() {
    let mut house = connected_house();
    house.tick();
    house.submit_bid(1, &bid(200, "A"));
    let frozen = house.item().clone();

    house.disconnect(1);
    for _ in 0..10 {
        house.tick();
    }
    assert_eq!(house.item(), &frozen, "no tick-driven change with zero connections");

    // Reconnection finds the state exactly as left.
    let actions = house.connect(2);
    let snapshot = actions.iter().find_map(|a| match a {
        AuctionAction::SendToConnection { event: PushEvent::CurrentItem(item), .. } => Some(item),
        _ => None,
    });
    assert_eq!(snapshot, Some(&frozen));
}

#[test]
fn tick_racing_last_disconnect_only_stops_ticker() {
    let mut house = connected_house();
    house.disconnect(1);
    let before = house.item().clone();

    // The ticker already transitioned to Idle with the disconnect; a tick
    // still in flight must be a pure no-op.
    assert!(house.tick().is_empty());
    assert_eq!(house.item(), &before);
    assert_eq!(house.ticker_state(), TickerState::Idle);
}

#[test]
fn relay_fans_out_verbatim() {
    let house = connected_house();
    let actions = house.relay("opaque payload".to_string());

    assert_eq!(actions, vec![AuctionAction::Relay("opaque payload".to_string())]);
}

proptest! {
    /// Arbitrary bid sequences never push the current bid below the initial
    /// bid and never accept a bid under the increment rule.
    #[test]
    fn bid_sequences_preserve_invariants(amounts in prop::collection::vec(0u64..10_000, 0..64)) {
        let mut house = connected_house();

        for (i, amount) in amounts.iter().enumerate() {
            let minimum = house.item().minimum_acceptable_bid();
            let before = house.item().current_bid;

            house.submit_bid(1, &bid(*amount, &format!("user-{i}")));

            let after = house.item().current_bid;
            if *amount >= minimum {
                prop_assert_eq!(after, *amount);
            } else {
                prop_assert_eq!(after, before);
            }
            prop_assert!(after >= house.item().initial_bid);
        }
    }

    /// Any interleaving of connects, disconnects, and ticks keeps the
    /// ticker state consistent with the connection count.
    #[test]
    fn lifecycle_keeps_ticker_consistent(ops in prop::collection::vec(0u8..4, 1..128)) {
        let mut house = AuctionHouse::default();

        for (i, op) in ops.iter().enumerate() {
            let conn = (i % 5) as u64;
            match op {
                0 => { house.connect(conn); },
                1 => { house.disconnect(conn); },
                2 => { house.tick(); },
                _ => { house.submit_bid(conn, &bid(i as u64 * 7, "p")); },
            }

            if house.connection_count() > 0 {
                prop_assert_eq!(house.ticker_state(), TickerState::Running);
            }
            if house.ticker_state() == TickerState::Running && house.connection_count() == 0 {
                // Only reachable between a final disconnect and the next
                // tick; disconnect always stops eagerly, so never here.
                prop_assert!(false, "ticker running with zero connections");
            }
        }
    }

    /// Rotation only ever advances the id by exactly one.
    #[test]
    fn rotation_increments_id_by_one(extra_ticks in 0u32..200) {
        let mut house = connected_house();
        let mut last_id = house.item().id;

        for _ in 0..(INITIAL_TIME_REMAINING + 1 + extra_ticks) {
            house.tick();
            let id = house.item().id;
            prop_assert!(id == last_id || id == last_id + 1);
            last_id = id;
        }
    }
}

#[test]
fn item_wire_form_matches_multicast_contract() {
    let item = AuctionItem::seed();
    let wire = item.to_wire();

    // Inbound relay treats payloads as opaque, but our own datagrams must
    // be the bare camelCase item object.
    let value: serde_json::Value = serde_json::from_str(&wire).expect("valid JSON");
    assert_eq!(value["id"], 1);
    assert_eq!(value["currentBid"], 100);
    assert!(value.get("event").is_none());
}
