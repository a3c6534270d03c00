//! # hubbridge-types
//!
//! Shared types, errors, and configuration for the **HubBridge** escrow/hub
//! reconciliation model.
//!
//! This crate is the leaf dependency of the workspace: every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UtxoIndex`], [`WithdrawalIndex`], [`SettlementId`], [`ReconciliationId`], [`SettledCursor`]
//! - **Ledger records**: [`Utxo`], [`Withdrawal`], [`Amount`]
//! - **Settlement model**: [`SettlementProposal`], [`SettlementTx`], [`SettlementState`], [`SettlementRejection`], [`SettlementDrop`]
//! - **Reconciliation model**: [`ReconciliationProposal`], [`ReconciliationTx`], [`ReconciliationState`], [`ReconciliationRejection`], [`AnchorUpdate`], [`CasOutcome`]
//! - **Invariants**: [`Violation`]
//! - **Configuration**: [`BridgeConfig`]
//! - **Errors**: [`BridgeError`] with `HB_ERR_` prefix codes, [`ProtocolFault`]
//! - **Constants**: protocol defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod reconciliation;
pub mod settlement;
pub mod violation;

// Re-export all primary types at crate root for ergonomic imports:
//   use hubbridge_types::{UtxoIndex, SettlementTx, Violation, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use ledger::*;
pub use reconciliation::*;
pub use settlement::*;
pub use violation::*;

// Constants are accessed via `hubbridge_types::constants::FOO`
// (not re-exported to avoid name collisions).
