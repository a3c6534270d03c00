//! # SettlementTx: the asset-chain payout transaction
//!
//! A settlement spends escrow coins (always including the current anchor),
//! pays out a contiguous range of queued withdrawals, and returns the
//! remainder to escrow as a change output that becomes the next anchor.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────────┐ validate ok ┌──────────┐ deliver ok  ┌───────────┐
//!   │ PROPOSED ├────────────▶│ ACCEPTED ├────────────▶│ DELIVERED │
//!   └────┬─────┘             └────┬─────┘             └───────────┘
//!        │ validate err           │ input already spent
//!        ▼                        ▼
//!   ┌──────────┐           ┌───────────────────┐
//!   │ REJECTED │           │ DELIVERY_REJECTED │
//!   └──────────┘           └───────────────────┘
//! ```
//!
//! `REJECTED`, `DELIVERED` and `DELIVERY_REJECTED` are terminal. A relayer
//! that wants another attempt proposes a new transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProtocolFault, SettledCursor, SettlementId, UtxoIndex, WithdrawalIndex};

/// What a relayer submits for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProposal {
    /// Escrow coins to spend. Must include the current anchor.
    pub inputs: Vec<UtxoIndex>,
    /// Total paid out to withdrawers.
    pub credited_amount: u128,
    /// Last withdrawal index this settlement pays.
    pub covers_through: WithdrawalIndex,
}

/// Why validation refused a settlement proposal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SettlementRejection {
    #[error("proposed TX spends no inputs")]
    EmptyInputs,

    #[error("proposed TX spends unknown {input} (escrow has {escrow_len} coins)")]
    UnknownInput { input: UtxoIndex, escrow_len: u64 },

    #[error("proposed TX lists {input} more than once")]
    DuplicateInput { input: UtxoIndex },

    #[error("proposed TX pays proposed spend {proposed_spend} which overflows an escrow amount")]
    InputValueOverflow { proposed_spend: u128 },

    #[error("proposed TX covers unknown {covers_through} (queue has {queue_len} withdrawals)")]
    UnknownWithdrawal {
        covers_through: WithdrawalIndex,
        queue_len: u64,
    },

    #[error("proposed TX covers through {covers_through} which does not advance settled cursor {cursor}")]
    CursorNotAdvanced {
        covers_through: WithdrawalIndex,
        cursor: SettledCursor,
    },

    #[error("proposed TX does not spend current anchor {anchor}")]
    MissingAnchor { anchor: UtxoIndex },

    #[error("proposed TX does not credit the right amount: expect {expected} != tx credit {credited}")]
    CreditMismatch { expected: u128, credited: u128 },

    #[error("proposed TX does not leave a seed for the next anchor: proposed {proposed_spend} < required {required}")]
    InsufficientSeed { proposed_spend: u128, required: u128 },
}

/// Why an accepted settlement was dropped at delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SettlementDrop {
    /// A competing settlement was delivered first and consumed this input.
    #[error("input {input} already spent by an earlier delivery")]
    InputAlreadySpent { input: UtxoIndex },
}

/// Lifecycle state of a settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementState {
    Proposed,
    Accepted,
    Rejected(SettlementRejection),
    /// Finalized on the asset chain; `new_outpoint` is the change output.
    Delivered { new_outpoint: UtxoIndex },
    DeliveryRejected(SettlementDrop),
}

impl SettlementState {
    /// Short upper-case name for logs and fault messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected(_) => "REJECTED",
            Self::Delivered { .. } => "DELIVERED",
            Self::DeliveryRejected(_) => "DELIVERY_REJECTED",
        }
    }

    /// Can this state move to `target`? Only the data-free shape of the
    /// target matters.
    #[must_use]
    pub fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Proposed, Self::Accepted | Self::Rejected(_))
                | (Self::Accepted, Self::Delivered { .. } | Self::DeliveryRejected(_))
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

impl std::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A settlement transaction as recorded by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTx {
    pub id: SettlementId,
    pub inputs: Vec<UtxoIndex>,
    pub credited_amount: u128,
    pub covers_through: WithdrawalIndex,
    pub state: SettlementState,
}

impl SettlementTx {
    /// Record a fresh proposal in the `PROPOSED` state.
    #[must_use]
    pub fn proposed(id: SettlementId, proposal: SettlementProposal) -> Self {
        Self {
            id,
            inputs: proposal.inputs,
            credited_amount: proposal.credited_amount,
            covers_through: proposal.covers_through,
            state: SettlementState::Proposed,
        }
    }

    /// Did validation admit this transaction? True for every state
    /// reachable from `ACCEPTED`.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(
            self.state,
            SettlementState::Accepted
                | SettlementState::Delivered { .. }
                | SettlementState::DeliveryRejected(_)
        )
    }

    /// Has the asset chain finalized this transaction?
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self.state, SettlementState::Delivered { .. })
    }

    /// Accepted and still waiting for a delivery attempt.
    #[must_use]
    pub fn is_pending_delivery(&self) -> bool {
        self.state == SettlementState::Accepted
    }

    /// The change output, set only once delivered.
    #[must_use]
    pub fn new_outpoint(&self) -> Option<UtxoIndex> {
        match self.state {
            SettlementState::Delivered { new_outpoint } => Some(new_outpoint),
            _ => None,
        }
    }

    #[must_use]
    pub fn spends(&self, utxo: UtxoIndex) -> bool {
        self.inputs.contains(&utxo)
    }
}

/// Fixture constructor for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl SettlementProposal {
    pub fn fixture(inputs: &[u64], credited_amount: u128, covers_through: u64) -> Self {
        Self {
            inputs: inputs.iter().copied().map(UtxoIndex).collect(),
            credited_amount,
            covers_through: WithdrawalIndex(covers_through),
        }
    }
}
