//! Cartwatch
//!
//! Change detection and rule-based validation for storefront carts: typed
//! snapshots, structural diffs, a bounded replayable history and a
//! declarative test engine.

pub mod cart;
pub mod diff;
pub mod engine;
pub mod history;
pub mod prelude;
pub mod rules;
pub mod transfer;
pub mod uuids;
