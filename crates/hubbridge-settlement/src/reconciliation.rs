//! ReconciliationTx validation and delivery.
//!
//! A reconciliation tells the hub that a settlement has finalized on the
//! asset chain. Validation re-derives everything it claims from the
//! referenced settlement; delivery is a compare-and-swap on the hub anchor,
//! so delivering an accepted-but-stale reconciliation changes nothing.

use hubbridge_ledger::HubLedger;
use hubbridge_types::{
    AnchorUpdate, CasOutcome, ProtocolFault, ReconciliationProposal, ReconciliationRejection,
    ReconciliationState, ReconciliationTx, SettlementId, SettlementTx, UtxoIndex,
};

use crate::fault::halt;

/// Relayer-side proposal step: claim whatever the referenced settlement
/// currently shows. Unknown or undelivered settlements leave the expected
/// values unset, and validation rejects them.
#[must_use]
pub fn draft_reconciliation(
    settlements: &[SettlementTx],
    settlement: SettlementId,
    expected_old_anchor: UtxoIndex,
) -> ReconciliationProposal {
    let tx = settlements.get(settlement.as_usize());
    ReconciliationProposal {
        settlement,
        expected_old_anchor,
        expected_new_anchor: tx.and_then(SettlementTx::new_outpoint),
        expected_new_cursor: tx.map(|tx| tx.covers_through),
    }
}

/// Validator-side check. Pure. On success returns the update delivery
/// will ask the hub to apply.
///
/// # Errors
/// Returns the first [`ReconciliationRejection`] that applies.
pub fn validate_reconciliation(
    proposal: &ReconciliationProposal,
    settlements: &[SettlementTx],
    hub: &HubLedger,
) -> Result<AnchorUpdate, ReconciliationRejection> {
    let settlement = proposal.settlement;

    // 1. Known and accepted.
    let tx = settlements
        .get(settlement.as_usize())
        .ok_or(ReconciliationRejection::UnknownSettlement { settlement })?;
    if !tx.is_accepted() {
        return Err(ReconciliationRejection::SettlementNotAccepted {
            settlement,
            state: tx.state.name().to_string(),
        });
    }

    // 2. Finalized on the asset chain.
    let Some(new_outpoint) = tx.new_outpoint() else {
        return Err(ReconciliationRejection::SettlementNotFinalized { settlement });
    };

    // 3. Claimed old anchor is the hub's current anchor.
    let current = hub.anchor();
    if proposal.expected_old_anchor != current {
        return Err(ReconciliationRejection::StaleAnchor {
            given: proposal.expected_old_anchor,
            current,
        });
    }

    // 4. Claimed outcome matches what the settlement produced.
    if proposal.expected_new_anchor != Some(new_outpoint) {
        return Err(ReconciliationRejection::AnchorMismatch {
            given: proposal.expected_new_anchor,
            confirmed: new_outpoint,
        });
    }
    if proposal.expected_new_cursor != Some(tx.covers_through) {
        return Err(ReconciliationRejection::CursorMismatch {
            given: proposal.expected_new_cursor,
            confirmed: tx.covers_through,
        });
    }

    // 5. The settlement spent the anchor being replaced.
    if !tx.spends(proposal.expected_old_anchor) {
        return Err(ReconciliationRejection::AnchorNotSpent {
            settlement,
            anchor: proposal.expected_old_anchor,
        });
    }

    Ok(AnchorUpdate {
        old_anchor: proposal.expected_old_anchor,
        new_anchor: new_outpoint,
        new_cursor: tx.covers_through,
    })
}

/// Hub-finality step for an accepted reconciliation.
///
/// # Panics
/// On delivering twice or delivering a tx that was never accepted.
pub fn deliver_reconciliation(tx: &mut ReconciliationTx, hub: &mut HubLedger) -> CasOutcome {
    let update = match tx.state {
        ReconciliationState::Accepted(update) => update,
        ReconciliationState::Delivered { .. } => halt(ProtocolFault::DoubleDelivery {
            tx: tx.id.to_string(),
        }),
        ref other => halt(ProtocolFault::NotAccepted {
            tx: tx.id.to_string(),
            state: other.name(),
        }),
    };

    let outcome = hub.advance_anchor(tx.proposal.settlement, update);
    if let CasOutcome::Stale { current_anchor } = outcome {
        tracing::warn!(
            reconciliation = %tx.id,
            expected = %update.old_anchor,
            current = %current_anchor,
            "Reconciliation delivered against stale anchor, no effect"
        );
    }
    move_to(tx, ReconciliationState::Delivered { update, outcome });
    outcome
}

/// Apply a validation verdict to a freshly proposed tx.
pub(crate) fn record_verdict(
    tx: &mut ReconciliationTx,
    verdict: &Result<AnchorUpdate, ReconciliationRejection>,
) {
    match verdict {
        Ok(update) => {
            tracing::info!(
                reconciliation = %tx.id,
                settlement = %tx.proposal.settlement,
                old_anchor = %update.old_anchor,
                new_anchor = %update.new_anchor,
                "Reconciliation accepted"
            );
            move_to(tx, ReconciliationState::Accepted(*update));
        }
        Err(reason) => {
            tracing::debug!(reconciliation = %tx.id, %reason, "Reconciliation rejected");
            move_to(tx, ReconciliationState::Rejected(reason.clone()));
        }
    }
}

fn move_to(tx: &mut ReconciliationTx, target: ReconciliationState) {
    let current = std::mem::replace(&mut tx.state, ReconciliationState::Proposed);
    tx.state = current.transition(target).unwrap_or_else(|fault| halt(fault));
}
