//! # hubbridge-settlement
//!
//! **Settlement plane**: validation and delivery of both transaction kinds,
//! the invariant checker, and the [`Bridge`] aggregate that owns both
//! ledgers.
//!
//! ## Flow
//!
//! ```text
//! deposit / withdraw ──▶ EscrowLedger + HubLedger
//! relayer ──▶ SettlementTx ──validate──▶ ACCEPTED ──deliver──▶ escrow spent, change = next anchor
//! relayer ──▶ ReconciliationTx ──validate──▶ ACCEPTED ──deliver──▶ HubLedger CAS(anchor, cursor)
//! after every transition: InvariantChecker::check()
//! ```
//!
//! ## Error classes
//!
//! - Validation rejections: returned, recorded, never retried.
//! - Delivery drops (inputs lost to a racing settlement): returned as an outcome.
//! - Stale reconciliations: a normal `CasOutcome::Stale`, not an error.
//! - Protocol faults: logged and then panic. See [`fault`].

pub mod bridge;
pub mod digest;
pub mod fault;
pub mod invariants;
pub mod reconciliation;
pub mod settlement;

pub use bridge::Bridge;
pub use digest::{compute_state_digest, StateDigest};
pub use invariants::InvariantChecker;
pub use reconciliation::{deliver_reconciliation, draft_reconciliation, validate_reconciliation};
pub use settlement::{deliver_settlement, draft_settlement, validate_settlement, SettlementDelivery};
