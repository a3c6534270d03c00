//! Escrow ledger: the set of coins locked on the asset chain.
//!
//! Coins are addressed by their position ([`UtxoIndex`]) and never removed.
//! Deposits and settlement change outputs append; settlement delivery flips
//! `spent` through [`EscrowLedger::mark_spent`], which checks every input
//! before touching any of them.

use std::collections::HashSet;

use hubbridge_types::{sum_amounts, Amount, BridgeError, Result, Utxo, UtxoIndex};
use serde::{Deserialize, Serialize};

/// Append-only list of escrow UTXOs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLedger {
    utxos: Vec<Utxo>,
}

impl EscrowLedger {
    /// Create a ledger holding only the genesis seed coin at index 0.
    #[must_use]
    pub fn genesis(seed_amount: Amount) -> Self {
        Self {
            utxos: vec![Utxo::unspent(seed_amount)],
        }
    }

    /// Lock a deposited coin. Amount validation is the caller's job.
    pub fn deposit(&mut self, amount: Amount) -> UtxoIndex {
        let ix = self.push(amount);
        tracing::debug!(utxo = %ix, amount, "Escrow deposit");
        ix
    }

    /// Append a settlement's change output. The returned index is the
    /// candidate for the next anchor.
    pub fn append_change(&mut self, amount: Amount) -> UtxoIndex {
        let ix = self.push(amount);
        tracing::debug!(utxo = %ix, amount, "Escrow change output");
        ix
    }

    fn push(&mut self, amount: Amount) -> UtxoIndex {
        self.utxos.push(Utxo::unspent(amount));
        UtxoIndex::from(self.utxos.len() - 1)
    }

    /// Mark every index spent, or none of them.
    ///
    /// # Errors
    /// - [`BridgeError::UnknownUtxo`] if an index is past the end of the ledger
    /// - [`BridgeError::DoubleSpend`] if an index is already spent or is
    ///   listed twice
    pub fn mark_spent(&mut self, indices: &[UtxoIndex]) -> Result<()> {
        let mut seen = HashSet::with_capacity(indices.len());
        for &ix in indices {
            let utxo = self.get(ix).ok_or(BridgeError::UnknownUtxo(ix))?;
            if utxo.spent || !seen.insert(ix) {
                return Err(BridgeError::DoubleSpend(ix));
            }
        }
        for &ix in indices {
            self.utxos[ix.as_usize()].spent = true;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, ix: UtxoIndex) -> Option<&Utxo> {
        self.utxos.get(ix.as_usize())
    }

    #[must_use]
    pub fn contains(&self, ix: UtxoIndex) -> bool {
        ix.as_usize() < self.utxos.len()
    }

    #[must_use]
    pub fn is_unspent(&self, ix: UtxoIndex) -> bool {
        self.get(ix).is_some_and(|u| !u.spent)
    }

    /// First index in `indices` that is already spent (or unknown).
    #[must_use]
    pub fn first_unavailable(&self, indices: &[UtxoIndex]) -> Option<UtxoIndex> {
        indices.iter().copied().find(|&ix| !self.is_unspent(ix))
    }

    /// Total value of the given coins, spent or not. `None` if any index is
    /// unknown.
    #[must_use]
    pub fn value_of(&self, indices: &[UtxoIndex]) -> Option<u128> {
        indices
            .iter()
            .map(|&ix| self.get(ix).map(|u| u128::from(u.amount)))
            .sum()
    }

    /// Sum of all unspent coins: the escrow balance.
    #[must_use]
    pub fn unspent_total(&self) -> u128 {
        sum_amounts(self.utxos.iter().filter(|u| !u.spent).map(|u| u.amount))
    }

    /// Indices of all unspent coins, in ledger order.
    pub fn unspent_indices(&self) -> impl Iterator<Item = UtxoIndex> + '_ {
        self.utxos
            .iter()
            .enumerate()
            .filter(|(_, u)| !u.spent)
            .map(|(ix, _)| UtxoIndex::from(ix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (UtxoIndex, &Utxo)> {
        self.utxos
            .iter()
            .enumerate()
            .map(|(ix, u)| (UtxoIndex::from(ix), u))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(amounts: &[Amount]) -> EscrowLedger {
        let mut ledger = EscrowLedger::genesis(1);
        for &a in amounts {
            ledger.deposit(a);
        }
        ledger
    }

    #[test]
    fn genesis_has_seed_coin() {
        let ledger = EscrowLedger::genesis(1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.unspent_total(), 1);
        assert!(ledger.is_unspent(UtxoIndex(0)));
    }

    #[test]
    fn deposit_appends_unspent() {
        let mut ledger = EscrowLedger::genesis(1);
        let ix = ledger.deposit(10);
        assert_eq!(ix, UtxoIndex(1));
        assert_eq!(ledger.unspent_total(), 11);
    }

    #[test]
    fn mark_spent_flips_all() {
        let mut ledger = ledger_with(&[10, 20]);
        ledger.mark_spent(&[UtxoIndex(0), UtxoIndex(2)]).unwrap();
        assert!(!ledger.is_unspent(UtxoIndex(0)));
        assert!(ledger.is_unspent(UtxoIndex(1)));
        assert!(!ledger.is_unspent(UtxoIndex(2)));
        assert_eq!(ledger.unspent_total(), 10);
    }

    #[test]
    fn double_spend_blocked() {
        let mut ledger = ledger_with(&[10]);
        ledger.mark_spent(&[UtxoIndex(1)]).unwrap();
        let err = ledger.mark_spent(&[UtxoIndex(1)]).unwrap_err();
        assert!(matches!(err, BridgeError::DoubleSpend(ix) if ix == UtxoIndex(1)));
    }

    #[test]
    fn mark_spent_is_all_or_nothing() {
        let mut ledger = ledger_with(&[10, 20]);
        ledger.mark_spent(&[UtxoIndex(2)]).unwrap();
        let before = ledger.clone();

        let err = ledger
            .mark_spent(&[UtxoIndex(0), UtxoIndex(1), UtxoIndex(2)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::DoubleSpend(_)));
        assert_eq!(ledger, before, "failed mark_spent must not mutate");
    }

    #[test]
    fn duplicate_index_in_one_call_blocked() {
        let mut ledger = ledger_with(&[10]);
        let err = ledger
            .mark_spent(&[UtxoIndex(1), UtxoIndex(1)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::DoubleSpend(_)));
        assert!(ledger.is_unspent(UtxoIndex(1)));
    }

    #[test]
    fn unknown_index_rejected() {
        let mut ledger = ledger_with(&[]);
        let err = ledger.mark_spent(&[UtxoIndex(5)]).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownUtxo(ix) if ix == UtxoIndex(5)));
    }

    #[test]
    fn change_output_is_new_anchor_candidate() {
        let mut ledger = ledger_with(&[10]);
        ledger.mark_spent(&[UtxoIndex(0), UtxoIndex(1)]).unwrap();
        let anchor = ledger.append_change(7);
        assert_eq!(anchor, UtxoIndex(2));
        assert_eq!(ledger.unspent_total(), 7);
        assert_eq!(ledger.unspent_indices().collect::<Vec<_>>(), vec![UtxoIndex(2)]);
    }

    #[test]
    fn value_of_counts_spent_and_rejects_unknown() {
        let mut ledger = ledger_with(&[10, 20]);
        ledger.mark_spent(&[UtxoIndex(1)]).unwrap();
        assert_eq!(ledger.value_of(&[UtxoIndex(0), UtxoIndex(1)]), Some(11));
        assert_eq!(ledger.value_of(&[UtxoIndex(0), UtxoIndex(9)]), None);
    }

    #[test]
    fn first_unavailable_finds_spent_input() {
        let mut ledger = ledger_with(&[10, 20]);
        ledger.mark_spent(&[UtxoIndex(2)]).unwrap();
        assert_eq!(
            ledger.first_unavailable(&[UtxoIndex(0), UtxoIndex(2), UtxoIndex(1)]),
            Some(UtxoIndex(2))
        );
        assert_eq!(ledger.first_unavailable(&[UtxoIndex(0), UtxoIndex(1)]), None);
    }

    #[test]
    fn serde_roundtrip() {
        let ledger = ledger_with(&[3, 4]);
        let json = serde_json::to_string(&ledger).unwrap();
        let back: EscrowLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(ledger, back);
    }
}
