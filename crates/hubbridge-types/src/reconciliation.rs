//! # ReconciliationTx: the hub-chain bookkeeping transaction
//!
//! Once a settlement is finalized on the asset chain, a reconciliation moves
//! the hub's anchor and settled cursor forward to match it. The move is a
//! compare-and-swap on the anchor, so a reconciliation that was accepted
//! against an anchor that has since changed lands as a silent no-op.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────────┐ validate ok ┌──────────┐  deliver   ┌──────────────────────┐
//!   │ PROPOSED ├────────────▶│ ACCEPTED ├───────────▶│ DELIVERED(Applied |  │
//!   └────┬─────┘             └──────────┘            │           Stale)     │
//!        │ validate err                              └──────────────────────┘
//!        ▼
//!   ┌──────────┐
//!   │ REJECTED │
//!   └──────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProtocolFault, ReconciliationId, SettlementId, UtxoIndex, WithdrawalIndex};

/// The anchor/cursor move a reconciliation asks the hub to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorUpdate {
    pub old_anchor: UtxoIndex,
    pub new_anchor: UtxoIndex,
    pub new_cursor: WithdrawalIndex,
}

/// Result of the hub's compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CasOutcome {
    /// `old_anchor` matched; anchor and cursor moved.
    Applied,
    /// `old_anchor` no longer matched; nothing changed.
    Stale { current_anchor: UtxoIndex },
}

impl CasOutcome {
    #[must_use]
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

/// What a relayer submits for validation.
///
/// The expected values are optional because a relayer may draft a
/// reconciliation for a settlement it has not yet seen finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationProposal {
    pub settlement: SettlementId,
    pub expected_old_anchor: UtxoIndex,
    pub expected_new_anchor: Option<UtxoIndex>,
    pub expected_new_cursor: Option<WithdrawalIndex>,
}

/// Why validation refused a reconciliation proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ReconciliationRejection {
    #[error("settlement {settlement} not found")]
    UnknownSettlement { settlement: SettlementId },

    #[error("settlement {settlement} was not accepted (state {state})")]
    SettlementNotAccepted {
        settlement: SettlementId,
        state: String,
    },

    #[error("settlement {settlement} not confirmed on the asset chain")]
    SettlementNotFinalized { settlement: SettlementId },

    #[error("given O not the current anchor: given {given} != hub {current}")]
    StaleAnchor { given: UtxoIndex, current: UtxoIndex },

    #[error("confirmed TX did not have given outpoint: given {given:?} != confirmed tx {confirmed}")]
    AnchorMismatch {
        given: Option<UtxoIndex>,
        confirmed: UtxoIndex,
    },

    #[error("confirmed TX did not handle withdrawals up to given cursor: given {given:?} != confirmed tx {confirmed}")]
    CursorMismatch {
        given: Option<WithdrawalIndex>,
        confirmed: WithdrawalIndex,
    },

    #[error("confirmed TX {settlement} did not spend anchor {anchor}")]
    AnchorNotSpent {
        settlement: SettlementId,
        anchor: UtxoIndex,
    },
}

/// Lifecycle state of a reconciliation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationState {
    Proposed,
    Accepted(AnchorUpdate),
    Rejected(ReconciliationRejection),
    Delivered {
        update: AnchorUpdate,
        outcome: CasOutcome,
    },
}

impl ReconciliationState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Accepted(_) => "ACCEPTED",
            Self::Rejected(_) => "REJECTED",
            Self::Delivered { .. } => "DELIVERED",
        }
    }

    #[must_use]
    pub fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Proposed, Self::Accepted(_) | Self::Rejected(_))
                | (Self::Accepted(_), Self::Delivered { .. })
        )
    }

    /// Move to `target`, consuming the current state.
    ///
    /// # Errors
    /// Returns [`ProtocolFault::IllegalTransition`] if the move is not an
    /// edge of the state machine.
    pub fn transition(self, target: Self) -> Result<Self, ProtocolFault> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ProtocolFault::IllegalTransition {
                from: self.name(),
                to: target.name(),
            })
        }
    }
}

impl std::fmt::Display for ReconciliationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A reconciliation transaction as recorded by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationTx {
    pub id: ReconciliationId,
    pub proposal: ReconciliationProposal,
    pub state: ReconciliationState,
}

impl ReconciliationTx {
    #[must_use]
    pub fn proposed(id: ReconciliationId, proposal: ReconciliationProposal) -> Self {
        Self {
            id,
            proposal,
            state: ReconciliationState::Proposed,
        }
    }

    #[must_use]
    pub fn is_pending_delivery(&self) -> bool {
        matches!(self.state, ReconciliationState::Accepted(_))
    }

    /// The update this transaction carries, once accepted.
    #[must_use]
    pub fn update(&self) -> Option<AnchorUpdate> {
        match self.state {
            ReconciliationState::Accepted(update)
            | ReconciliationState::Delivered { update, .. } => Some(update),
            _ => None,
        }
    }

    /// CAS outcome, once delivered.
    #[must_use]
    pub fn outcome(&self) -> Option<CasOutcome> {
        match self.state {
            ReconciliationState::Delivered { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}
