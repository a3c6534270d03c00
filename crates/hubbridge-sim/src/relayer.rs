//! Relayer-side proposal building.
//!
//! Which escrow coins a settlement spends is relayer policy, not protocol.
//! Validation only cares that the anchor is among the inputs and that they
//! cover the credit plus the next seed. [`InputSelector`] is the seam where
//! that policy plugs in.

use hubbridge_ledger::EscrowLedger;
use hubbridge_settlement::Bridge;
use hubbridge_types::{
    ReconciliationProposal, SettlementId, SettlementProposal, UtxoIndex, WithdrawalIndex,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

/// Chooses the inputs of a settlement.
pub trait InputSelector {
    /// Pick inputs from `escrow`. `target` is the credit plus the minimum
    /// seed; a selector may return less, in which case validation rejects
    /// the proposal.
    fn select(&mut self, escrow: &EscrowLedger, anchor: UtxoIndex, target: u128)
        -> Vec<UtxoIndex>;
}

/// Uniformly random subset of unspent coins, ignoring the anchor and the
/// target. Exercises every validation failure path.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl InputSelector for RandomSelector {
    fn select(&mut self, escrow: &EscrowLedger, _anchor: UtxoIndex, _target: u128) -> Vec<UtxoIndex> {
        let mut all: Vec<UtxoIndex> = (0..escrow.len()).map(UtxoIndex::from).collect();
        all.shuffle(&mut self.rng);
        let n = self.rng.gen_range(0..=all.len());
        all.into_iter()
            .filter(|&ix| escrow.is_unspent(ix))
            .take(n)
            .collect()
    }
}

/// The anchor, then the largest unspent coins until the target is covered.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchorFirstSelector;

impl InputSelector for AnchorFirstSelector {
    fn select(&mut self, escrow: &EscrowLedger, anchor: UtxoIndex, target: u128) -> Vec<UtxoIndex> {
        let mut picked = vec![anchor];
        let mut total = escrow.get(anchor).map_or(0, |u| u128::from(u.amount));

        let mut rest: Vec<_> = escrow
            .iter()
            .filter(|(ix, utxo)| *ix != anchor && !utxo.spent)
            .map(|(ix, utxo)| (ix, utxo.amount))
            .collect();
        // Largest first; ties broken by ledger order.
        rest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (ix, amount) in rest {
            if total >= target {
                break;
            }
            picked.push(ix);
            total += u128::from(amount);
        }
        picked
    }
}

/// Drafts proposals from the current bridge state with a given policy.
#[derive(Debug, Clone)]
pub struct Relayer<S> {
    selector: S,
}

impl<S: InputSelector> Relayer<S> {
    pub fn new(selector: S) -> Self {
        Self { selector }
    }

    /// Settle every pending withdrawal through `covers_through`.
    pub fn draft_settlement(
        &mut self,
        bridge: &Bridge,
        covers_through: WithdrawalIndex,
    ) -> SettlementProposal {
        let hub = bridge.hub();
        let credit = hub
            .range_total(hub.cursor(), covers_through)
            .unwrap_or_default();
        let target = credit.saturating_add(u128::from(bridge.config().min_seed_amount));
        let inputs = self.selector.select(bridge.escrow(), hub.anchor(), target);
        bridge.draft_settlement(inputs, covers_through)
    }

    /// Claim the outcome of `settlement` against a chosen old anchor.
    #[must_use]
    pub fn draft_reconciliation(
        &self,
        bridge: &Bridge,
        settlement: SettlementId,
        old_anchor: UtxoIndex,
    ) -> ReconciliationProposal {
        bridge.draft_reconciliation(settlement, old_anchor)
    }

    /// Claim the outcome of `settlement` against the hub's current anchor.
    #[must_use]
    pub fn draft_reconciliation_at_head(
        &self,
        bridge: &Bridge,
        settlement: SettlementId,
    ) -> ReconciliationProposal {
        bridge.draft_reconciliation(settlement, bridge.hub().anchor())
    }
}
