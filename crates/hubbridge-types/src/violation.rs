//! Safety violations reported by the invariant checker.
//!
//! A violation is a test-time signal, never an operational error path. Any
//! non-empty report must fail the run that produced it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{SettledCursor, SettlementId, UtxoIndex};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Violation {
    /// Invariant 1: unspent escrow must back the outstanding mint.
    #[error("escrow < mint: {escrow} < {mint}")]
    EscrowBelowMint { escrow: u128, mint: i128 },

    /// Invariant 2: unsettled withdrawals must cover the escrow/mint gap.
    #[error("hub in flight withdrawals + mint < escrow: {incomplete} + {mint} < {escrow}")]
    ObligationsBelowGap {
        incomplete: u128,
        mint: i128,
        escrow: u128,
    },

    #[error("{utxo} spent by both {first} and {second}")]
    DoubleSpend {
        utxo: UtxoIndex,
        first: SettlementId,
        second: SettlementId,
    },

    #[error("{utxo} is spent but no delivered settlement spends it")]
    OrphanSpend { utxo: UtxoIndex },

    #[error("{utxo} is an input of delivered {settlement} but is not marked spent")]
    UnmarkedInput {
        utxo: UtxoIndex,
        settlement: SettlementId,
    },

    #[error("delivered {settlement} records outpoint {outpoint} which is not in escrow")]
    OutpointMissing {
        settlement: SettlementId,
        outpoint: UtxoIndex,
    },

    #[error("delivered {settlement} left anchor seed {amount} below minimum {min_seed}")]
    SeedBelowMinimum {
        settlement: SettlementId,
        amount: u64,
        min_seed: u64,
    },

    /// Anchor linearity: the anchor replaced by a CAS must be an input of
    /// the settlement that justified it.
    #[error("anchor {anchor} advanced by {settlement} which did not spend it")]
    AnchorNotSpent {
        settlement: SettlementId,
        anchor: UtxoIndex,
    },

    #[error("anchor advance #{position} starts at {actual} but the chain head was {expected}")]
    AnchorChainBroken {
        position: usize,
        expected: UtxoIndex,
        actual: UtxoIndex,
    },

    #[error("hub anchor {hub} does not match anchor chain head {head}")]
    AnchorHeadMismatch { hub: UtxoIndex, head: UtxoIndex },

    /// `position` is the anchor advance, or the harness step, that moved it.
    #[error("settled cursor moved backwards at #{position}: {from} -> {to}")]
    CursorRegressed {
        position: usize,
        from: SettledCursor,
        to: SettledCursor,
    },
}

impl Violation {
    /// Whether this is one of the two headline economic invariants.
    #[must_use]
    pub fn is_economic(&self) -> bool {
        matches!(
            self,
            Self::EscrowBelowMint { .. } | Self::ObligationsBelowGap { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economic_classification() {
        assert!(Violation::EscrowBelowMint { escrow: 6, mint: 7 }.is_economic());
        assert!(!Violation::OrphanSpend { utxo: UtxoIndex(1) }.is_economic());
    }

    #[test]
    fn display_contains_numbers() {
        let msg = Violation::EscrowBelowMint { escrow: 6, mint: 7 }.to_string();
        assert!(msg.contains('6') && msg.contains('7'), "Got: {msg}");
    }
}
