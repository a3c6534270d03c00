//! Invariant checker over the combined bridge state.
//!
//! Economic invariants, checked after every transition:
//! ```text
//! (1) Σ unspent escrow                    >= mint
//! (2) Σ withdrawals past the settled cursor >= Σ unspent escrow - mint
//! ```
//!
//! Structural invariants, derivable from the append-only records:
//! - no coin is an input of two delivered settlements
//! - spent flags agree exactly with delivered settlement inputs
//! - every delivered settlement's change output exists and is a valid seed
//! - every applied anchor advance replaced an anchor its settlement spent,
//!   starts where the previous one ended, and never moves the cursor back
//! - the hub anchor is the head of that chain
//!
//! The checker never mutates and never fails; it returns every violation
//! it finds. An empty list is the only passing result.

use std::collections::HashMap;

use hubbridge_ledger::{EscrowLedger, HubLedger};
use hubbridge_types::{Amount, SettlementId, SettlementTx, UtxoIndex, Violation};

/// Read-only view over everything the invariants range over.
pub struct InvariantChecker<'a> {
    escrow: &'a EscrowLedger,
    hub: &'a HubLedger,
    settlements: &'a [SettlementTx],
    min_seed_amount: Amount,
}

impl<'a> InvariantChecker<'a> {
    #[must_use]
    pub fn new(
        escrow: &'a EscrowLedger,
        hub: &'a HubLedger,
        settlements: &'a [SettlementTx],
        min_seed_amount: Amount,
    ) -> Self {
        Self {
            escrow,
            hub,
            settlements,
            min_seed_amount,
        }
    }

    /// Run every check and collect all violations.
    #[must_use]
    pub fn check(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        self.check_escrow_sufficiency(&mut violations);
        self.check_obligation_sufficiency(&mut violations);
        self.check_spends(&mut violations);
        self.check_outpoints(&mut violations);
        self.check_anchor_chain(&mut violations);
        violations
    }

    /// Invariant 1.
    pub fn check_escrow_sufficiency(&self, out: &mut Vec<Violation>) {
        let escrow = self.escrow.unspent_total();
        let mint = self.hub.mint();
        if to_signed(escrow) < mint {
            out.push(Violation::EscrowBelowMint { escrow, mint });
        }
    }

    /// Invariant 2.
    pub fn check_obligation_sufficiency(&self, out: &mut Vec<Violation>) {
        let escrow = self.escrow.unspent_total();
        let mint = self.hub.mint();
        let incomplete = self.hub.incomplete_total();
        let gap = to_signed(escrow).saturating_sub(mint);
        if to_signed(incomplete) < gap {
            out.push(Violation::ObligationsBelowGap {
                incomplete,
                mint,
                escrow,
            });
        }
    }

    /// No double-spend, and spent flags match delivered inputs.
    pub fn check_spends(&self, out: &mut Vec<Violation>) {
        let mut spender: HashMap<UtxoIndex, SettlementId> = HashMap::new();
        for tx in self.settlements.iter().filter(|tx| tx.is_delivered()) {
            for &input in &tx.inputs {
                if let Some(&first) = spender.get(&input) {
                    out.push(Violation::DoubleSpend {
                        utxo: input,
                        first,
                        second: tx.id,
                    });
                    continue;
                }
                spender.insert(input, tx.id);
                if self.escrow.is_unspent(input) {
                    out.push(Violation::UnmarkedInput {
                        utxo: input,
                        settlement: tx.id,
                    });
                }
            }
        }

        for (ix, utxo) in self.escrow.iter() {
            if utxo.spent && !spender.contains_key(&ix) {
                out.push(Violation::OrphanSpend { utxo: ix });
            }
        }
    }

    /// Every delivered change output exists and can seed the next anchor.
    pub fn check_outpoints(&self, out: &mut Vec<Violation>) {
        for tx in self.settlements {
            let Some(outpoint) = tx.new_outpoint() else {
                continue;
            };
            match self.escrow.get(outpoint) {
                None => out.push(Violation::OutpointMissing {
                    settlement: tx.id,
                    outpoint,
                }),
                Some(utxo) if utxo.amount < self.min_seed_amount => {
                    out.push(Violation::SeedBelowMinimum {
                        settlement: tx.id,
                        amount: utxo.amount,
                        min_seed: self.min_seed_amount,
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// Anchor linearity, chain continuity and cursor monotonicity.
    pub fn check_anchor_chain(&self, out: &mut Vec<Violation>) {
        let mut head = self.hub.genesis_anchor();
        for (position, advance) in self.hub.history().iter().enumerate() {
            if advance.old_anchor != head {
                out.push(Violation::AnchorChainBroken {
                    position,
                    expected: head,
                    actual: advance.old_anchor,
                });
            }

            let spent_anchor = self
                .settlements
                .get(advance.settlement.as_usize())
                .is_some_and(|tx| tx.is_delivered() && tx.spends(advance.old_anchor));
            if !spent_anchor {
                out.push(Violation::AnchorNotSpent {
                    settlement: advance.settlement,
                    anchor: advance.old_anchor,
                });
            }

            if advance.new_cursor < advance.old_cursor {
                out.push(Violation::CursorRegressed {
                    position,
                    from: advance.old_cursor,
                    to: advance.new_cursor,
                });
            }

            head = advance.new_anchor;
        }

        if self.hub.anchor() != head {
            out.push(Violation::AnchorHeadMismatch {
                hub: self.hub.anchor(),
                head,
            });
        }
    }
}

fn to_signed(value: u128) -> i128 {
    i128::try_from(value).unwrap_or(i128::MAX)
}
