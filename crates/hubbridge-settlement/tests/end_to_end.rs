//! End-to-end tests across both ledgers.
//!
//! Each test drives a [`Bridge`] through deposit, withdrawal, settlement
//! and reconciliation, and checks every invariant after every step.

use hubbridge_settlement::{Bridge, SettlementDelivery};
use hubbridge_types::*;

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig::default()).expect("default config is valid")
}

/// Panics with the full violation list if any invariant fails.
fn assert_healthy(b: &Bridge) {
    let violations = b.check_invariants();
    assert!(violations.is_empty(), "invariant violations: {violations:?}");
}

fn delivered_outpoint(delivery: SettlementDelivery) -> UtxoIndex {
    match delivery {
        SettlementDelivery::Delivered { new_outpoint } => new_outpoint,
        SettlementDelivery::Dropped(drop) => panic!("settlement dropped: {drop}"),
    }
}

#[test]
fn single_round_walkthrough() {
    let mut b = bridge();
    assert_healthy(&b);

    b.deposit(10).unwrap();
    assert_eq!(b.escrow_total(), 11);
    assert_eq!(b.mint(), 11);
    assert_healthy(&b);

    b.request_withdrawal(4).unwrap();
    assert_eq!(b.mint(), 7);
    assert_healthy(&b);

    let s = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    assert_eq!(b.settlement(s).unwrap().credited_amount, 4);
    assert_healthy(&b);

    let outpoint = delivered_outpoint(b.deliver_settlement(s).unwrap());
    assert_eq!(outpoint, UtxoIndex(2));
    // 1 + 10 - 4
    assert_eq!(b.escrow().get(outpoint).unwrap().amount, 7);
    assert_healthy(&b);

    let r = b.propose_reconciliation(s, UtxoIndex(0)).unwrap();
    let update = b.reconciliation(r).unwrap().update().unwrap();
    assert_eq!(update.new_anchor, UtxoIndex(2));
    assert_eq!(update.new_cursor, WithdrawalIndex(0));

    assert_eq!(b.deliver_reconciliation(r).unwrap(), CasOutcome::Applied);
    assert_eq!(b.hub().anchor(), UtxoIndex(2));
    assert_eq!(b.hub().cursor(), SettledCursor::at(WithdrawalIndex(0)));
    assert_eq!(b.escrow_total(), 7);
    assert_eq!(b.mint(), 7);
    assert_eq!(b.incomplete_withdrawals(), 0);
    assert_healthy(&b);
}

#[test]
fn racing_relayers_first_delivery_wins() {
    let mut b = bridge();
    b.deposit(10).unwrap();
    b.deposit(20).unwrap();
    b.request_withdrawal(4).unwrap();

    // Both validate against anchor 0 before either is delivered.
    let a = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    let c = b
        .propose_settlement(vec![UtxoIndex(2), UtxoIndex(0)], WithdrawalIndex(0))
        .unwrap();
    assert_eq!(b.undelivered_settlements().count(), 2);

    delivered_outpoint(b.deliver_settlement(c).unwrap());
    assert_healthy(&b);

    let dropped = b.deliver_settlement(a).unwrap();
    assert_eq!(
        dropped,
        SettlementDelivery::Dropped(SettlementDrop::InputAlreadySpent {
            input: UtxoIndex(0)
        })
    );
    // Coin 1 belonged only to the loser and is still in escrow.
    assert!(b.escrow().is_unspent(UtxoIndex(1)));
    assert_eq!(b.undelivered_settlements().count(), 0);
    assert_healthy(&b);

    // Only the winner can be reconciled.
    let err = b.propose_reconciliation(a, UtxoIndex(0)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ReconciliationRejected {
            reason: ReconciliationRejection::SettlementNotFinalized { .. },
            ..
        }
    ));
    let r = b.propose_reconciliation(c, UtxoIndex(0)).unwrap();
    assert!(b.deliver_reconciliation(r).unwrap().is_applied());
    assert_healthy(&b);
}

#[test]
fn stale_reconciliation_changes_nothing() {
    let mut b = bridge();
    b.deposit(10).unwrap();
    b.request_withdrawal(4).unwrap();
    let s = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    b.deliver_settlement(s).unwrap();

    // Two relayers reconcile the same settlement against the same anchor.
    let first = b.propose_reconciliation(s, UtxoIndex(0)).unwrap();
    let second = b.propose_reconciliation(s, UtxoIndex(0)).unwrap();
    assert_eq!(b.undelivered_reconciliations().count(), 2);

    assert_eq!(b.deliver_reconciliation(first).unwrap(), CasOutcome::Applied);
    let hub_before = b.hub().clone();
    assert_eq!(
        b.deliver_reconciliation(second).unwrap(),
        CasOutcome::Stale {
            current_anchor: UtxoIndex(2)
        }
    );
    assert_eq!(b.hub(), &hub_before);
    assert_eq!(b.hub().history().len(), 1);
    assert_healthy(&b);

    // Proposing against the old anchor is now refused outright.
    let err = b.propose_reconciliation(s, UtxoIndex(0)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ReconciliationRejected {
            reason: ReconciliationRejection::StaleAnchor {
                given: UtxoIndex(0),
                current: UtxoIndex(2)
            },
            ..
        }
    ));
}

#[test]
fn multiple_rounds_chain_anchors() {
    let mut b = bridge();
    b.deposit(10).unwrap();
    b.request_withdrawal(4).unwrap();
    let s0 = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    let o1 = delivered_outpoint(b.deliver_settlement(s0).unwrap());
    let r0 = b.propose_reconciliation(s0, UtxoIndex(0)).unwrap();
    b.deliver_reconciliation(r0).unwrap();
    assert_healthy(&b);

    // Round two covers two withdrawals at once.
    let d = b.deposit(5).unwrap();
    b.request_withdrawal(3).unwrap();
    b.request_withdrawal(2).unwrap();
    assert_healthy(&b);

    // Covering only the first of the two pending withdrawals is allowed too,
    // but this relayer settles both.
    let s1 = b.propose_settlement(vec![o1, d], WithdrawalIndex(2)).unwrap();
    assert_eq!(b.settlement(s1).unwrap().credited_amount, 5);
    let o2 = delivered_outpoint(b.deliver_settlement(s1).unwrap());
    assert_healthy(&b);

    let r1 = b.propose_reconciliation(s1, o1).unwrap();
    assert!(b.deliver_reconciliation(r1).unwrap().is_applied());

    assert_eq!(b.hub().anchor(), o2);
    assert!(b.is_withdrawal_settled(WithdrawalIndex(2)));
    // 7 + 5 - 5
    assert_eq!(b.escrow_total(), 7);
    assert_eq!(b.mint(), 7);

    let history = b.hub().history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].new_anchor, history[1].old_anchor);
    assert_healthy(&b);
}

#[test]
fn settlement_cannot_skip_or_repeat_withdrawals() {
    let mut b = bridge();
    b.deposit(50).unwrap();
    b.request_withdrawal(4).unwrap();
    b.request_withdrawal(6).unwrap();

    // Crediting only the latest withdrawal would skip withdrawal 0.
    let mut proposal = b.draft_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(1));
    proposal.credited_amount = 6;
    let err = b.submit_settlement(proposal).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::SettlementRejected {
            reason: SettlementRejection::CreditMismatch {
                expected: 10,
                credited: 6
            },
            ..
        }
    ));

    let s = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    let outpoint = delivered_outpoint(b.deliver_settlement(s).unwrap());
    let r = b.propose_reconciliation(s, UtxoIndex(0)).unwrap();
    b.deliver_reconciliation(r).unwrap();

    // Withdrawal 0 is settled; covering it again is refused.
    let err = b
        .propose_settlement(vec![outpoint], WithdrawalIndex(0))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::SettlementRejected {
            reason: SettlementRejection::CursorNotAdvanced { .. },
            ..
        }
    ));
    assert_healthy(&b);
}

#[test]
fn reconciliation_of_rejected_settlement_refused() {
    let mut b = bridge();
    b.deposit(10).unwrap();
    b.request_withdrawal(4).unwrap();

    let err = b
        .propose_settlement(vec![UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap_err();
    let BridgeError::SettlementRejected { id, .. } = err else {
        panic!("expected a settlement rejection");
    };

    let err = b.propose_reconciliation(id, UtxoIndex(0)).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ReconciliationRejected {
            reason: ReconciliationRejection::SettlementNotAccepted { .. },
            ..
        }
    ));

    let err = b
        .propose_reconciliation(SettlementId(9), UtxoIndex(0))
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::ReconciliationRejected {
            reason: ReconciliationRejection::UnknownSettlement { .. },
            ..
        }
    ));
    assert_eq!(b.hub().anchor(), UtxoIndex(0));
    assert_healthy(&b);
}

#[test]
fn unreconciled_settlement_blocks_next_round() {
    let mut b = bridge();
    b.deposit(10).unwrap();
    b.request_withdrawal(4).unwrap();
    let s = b
        .propose_settlement(vec![UtxoIndex(0), UtxoIndex(1)], WithdrawalIndex(0))
        .unwrap();
    b.deliver_settlement(s).unwrap();

    // The hub still points at the spent anchor 0. A settlement built on it
    // passes validation but is dropped at delivery.
    let d = b.deposit(20).unwrap();
    b.request_withdrawal(3).unwrap();
    let next = b
        .propose_settlement(vec![UtxoIndex(0), d], WithdrawalIndex(1))
        .unwrap();
    assert_eq!(b.settlement(next).unwrap().credited_amount, 7);
    assert_eq!(
        b.deliver_settlement(next).unwrap(),
        SettlementDelivery::Dropped(SettlementDrop::InputAlreadySpent {
            input: UtxoIndex(0)
        })
    );
    assert!(b.escrow().is_unspent(d));
    assert_healthy(&b);
}
