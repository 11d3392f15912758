//! Gavel core protocol logic.
//!
//! This crate holds the pure, action-based heart of the auction server:
//! a single state machine owning the current auction item, the live
//! connection set, and the countdown ticker state. Methods take an event,
//! mutate owned state, and return actions for a driver to execute. No I/O,
//! no clocks, no runtime dependency.
//!
//! ## Architecture
//!
//! ```text
//! gavel-core
//!   ├─ Environment     (entropy abstraction)
//!   └─ AuctionHouse    (registry + bid rule + countdown state machine)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auction;
pub mod env;

pub use auction::{AuctionAction, AuctionHouse, ConnectionId, TickerState};
pub use env::Environment;
