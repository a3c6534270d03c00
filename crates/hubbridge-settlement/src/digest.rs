//! Deterministic state digest.
//!
//! Two bridges that applied the same actions in the same order must hash to
//! the same digest. The encoding is versioned by
//! [`constants::STATE_DIGEST_DOMAIN`] and covers the config, both ledgers,
//! the anchor history and every field of both transaction lists, rejection
//! and drop reasons included.

use std::fmt;

use hubbridge_types::{
    constants, AnchorUpdate, CasOutcome, ReconciliationState, SettledCursor, SettlementState,
};
use sha2::{Digest, Sha256};

use crate::Bridge;

/// SHA-256 over the canonical encoding of a bridge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDigest(pub [u8; 32]);

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hash the full bridge state.
#[must_use]
pub fn compute_state_digest(bridge: &Bridge) -> StateDigest {
    let mut hasher = Sha256::new();
    hasher.update(constants::STATE_DIGEST_DOMAIN);

    let config = bridge.config();
    hasher.update(config.genesis_seed_amount.to_le_bytes());
    hasher.update(config.min_seed_amount.to_le_bytes());

    let escrow = bridge.escrow();
    hasher.update((escrow.len() as u64).to_le_bytes());
    for (_, utxo) in escrow.iter() {
        hasher.update(utxo.amount.to_le_bytes());
        hasher.update([u8::from(utxo.spent)]);
    }

    let hub = bridge.hub();
    hasher.update(hub.mint().to_le_bytes());
    hasher.update((hub.withdrawals().len() as u64).to_le_bytes());
    for w in hub.withdrawals() {
        hasher.update(w.amount.to_le_bytes());
    }
    hasher.update(hub.anchor().0.to_le_bytes());
    update_cursor(&mut hasher, hub.cursor());
    hasher.update((hub.history().len() as u64).to_le_bytes());
    for advance in hub.history() {
        hasher.update(advance.settlement.0.to_le_bytes());
        hasher.update(advance.old_anchor.0.to_le_bytes());
        hasher.update(advance.new_anchor.0.to_le_bytes());
        update_cursor(&mut hasher, advance.new_cursor);
    }

    hasher.update((bridge.settlements().len() as u64).to_le_bytes());
    for tx in bridge.settlements() {
        hasher.update((tx.inputs.len() as u64).to_le_bytes());
        for input in &tx.inputs {
            hasher.update(input.0.to_le_bytes());
        }
        hasher.update(tx.credited_amount.to_le_bytes());
        hasher.update(tx.covers_through.0.to_le_bytes());
        match &tx.state {
            SettlementState::Proposed => hasher.update([0u8]),
            SettlementState::Accepted => hasher.update([1u8]),
            SettlementState::Rejected(reason) => {
                hasher.update([2u8]);
                update_reason(&mut hasher, reason);
            }
            SettlementState::Delivered { new_outpoint } => {
                hasher.update([3u8]);
                hasher.update(new_outpoint.0.to_le_bytes());
            }
            SettlementState::DeliveryRejected(drop) => {
                hasher.update([4u8]);
                update_reason(&mut hasher, drop);
            }
        }
    }

    hasher.update((bridge.reconciliations().len() as u64).to_le_bytes());
    for tx in bridge.reconciliations() {
        hasher.update(tx.proposal.settlement.0.to_le_bytes());
        hasher.update(tx.proposal.expected_old_anchor.0.to_le_bytes());
        update_option(&mut hasher, tx.proposal.expected_new_anchor.map(|ix| ix.0));
        update_option(&mut hasher, tx.proposal.expected_new_cursor.map(|ix| ix.0));
        match &tx.state {
            ReconciliationState::Proposed => hasher.update([0u8]),
            ReconciliationState::Accepted(update) => {
                hasher.update([1u8]);
                update_anchor_update(&mut hasher, update);
            }
            ReconciliationState::Rejected(reason) => {
                hasher.update([2u8]);
                update_reason(&mut hasher, reason);
            }
            ReconciliationState::Delivered { update, outcome } => {
                hasher.update([3u8]);
                update_anchor_update(&mut hasher, update);
                match outcome {
                    CasOutcome::Applied => hasher.update([0u8]),
                    CasOutcome::Stale { current_anchor } => {
                        hasher.update([1u8]);
                        hasher.update(current_anchor.0.to_le_bytes());
                    }
                }
            }
        }
    }

    StateDigest(hasher.finalize().into())
}

fn update_cursor(hasher: &mut Sha256, cursor: SettledCursor) {
    update_option(hasher, cursor.0.map(|ix| ix.0));
}

fn update_option(hasher: &mut Sha256, value: Option<u64>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hasher.update(v.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
}

fn update_anchor_update(hasher: &mut Sha256, update: &AnchorUpdate) {
    hasher.update(update.old_anchor.0.to_le_bytes());
    hasher.update(update.new_anchor.0.to_le_bytes());
    hasher.update(update.new_cursor.0.to_le_bytes());
}

/// Length-prefixed display text of a rejection or drop reason.
fn update_reason(hasher: &mut Sha256, reason: &impl fmt::Display) {
    let text = reason.to_string();
    hasher.update((text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}
