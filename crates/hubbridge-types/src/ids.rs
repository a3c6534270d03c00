//! Index-based identifiers used throughout HubBridge.
//!
//! Both ledgers and both transaction lists are append-only, so every entity
//! is addressed by its position in the list that owns it. The newtypes keep
//! a UTXO index from being passed where a withdrawal index is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UtxoIndex
// ---------------------------------------------------------------------------

/// Position of a UTXO in the escrow ledger. This is the model's outpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UtxoIndex(pub u64);

impl UtxoIndex {
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<usize> for UtxoIndex {
    fn from(ix: usize) -> Self {
        Self(ix as u64)
    }
}

impl fmt::Display for UtxoIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utxo:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// WithdrawalIndex
// ---------------------------------------------------------------------------

/// Position of a withdrawal request in the hub's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WithdrawalIndex(pub u64);

impl WithdrawalIndex {
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<usize> for WithdrawalIndex {
    fn from(ix: usize) -> Self {
        Self(ix as u64)
    }
}

impl fmt::Display for WithdrawalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SettlementId / ReconciliationId
// ---------------------------------------------------------------------------

/// Position of a settlement transaction in the bridge's settlement list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SettlementId(pub u64);

impl SettlementId {
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<usize> for SettlementId {
    fn from(ix: usize) -> Self {
        Self(ix as u64)
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txkas:{}", self.0)
    }
}

/// Position of a reconciliation transaction in the bridge's reconciliation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReconciliationId(pub u64);

impl ReconciliationId {
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl From<usize> for ReconciliationId {
    fn from(ix: usize) -> Self {
        Self(ix as u64)
    }
}

impl fmt::Display for ReconciliationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txhub:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SettledCursor
// ---------------------------------------------------------------------------

/// Index of the last withdrawal whose escrow payout has been finalized.
///
/// `None` means nothing has been settled yet (the `L = -1` starting point).
/// The derived ordering puts `None` before every `Some`, which is the order
/// the cursor is allowed to move in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct SettledCursor(pub Option<WithdrawalIndex>);

impl SettledCursor {
    /// The cursor before any withdrawal has been settled.
    pub const GENESIS: Self = Self(None);

    #[must_use]
    pub fn at(ix: WithdrawalIndex) -> Self {
        Self(Some(ix))
    }

    /// Queue position of the first unsettled withdrawal.
    #[must_use]
    pub fn next_unsettled(self) -> usize {
        self.0.map_or(0, |ix| ix.as_usize().saturating_add(1))
    }

    /// Whether the withdrawal at `ix` is covered by this cursor.
    #[must_use]
    pub fn covers(self, ix: WithdrawalIndex) -> bool {
        self.0.is_some_and(|last| ix <= last)
    }
}

impl From<WithdrawalIndex> for SettledCursor {
    fn from(ix: WithdrawalIndex) -> Self {
        Self::at(ix)
    }
}

impl fmt::Display for SettledCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ix) => write!(f, "{}", ix.0),
            None => write!(f, "-1"),
        }
    }
}
