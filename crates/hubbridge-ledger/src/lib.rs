//! # hubbridge-ledger
//!
//! The two ledgers the bridge reconciles.
//!
//! - **EscrowLedger**: UTXOs locked on the asset chain. Append-only; only
//!   the `spent` flag mutates, and [`EscrowLedger::mark_spent`] is the sole
//!   double-spend guard.
//! - **HubLedger**: net mint, the withdrawal queue, the current anchor
//!   outpoint and the settled cursor. [`HubLedger::advance_anchor`] is the
//!   only writer of the anchor/cursor pair and resolves concurrent
//!   relayers with a compare-and-swap on the anchor.
//!
//! Neither ledger knows about the other. The deposit relay that credits
//! both at once lives in the settlement crate's `Bridge`.

pub mod escrow;
pub mod hub;

pub use escrow::EscrowLedger;
pub use hub::{AnchorAdvance, HubLedger};
