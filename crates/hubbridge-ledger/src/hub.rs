//! Hub ledger: mint, withdrawal queue, anchor and settled cursor.
//!
//! Withdrawals burn on request: `mint` drops the moment a withdrawal is
//! queued, before any escrow payout. No bound is checked against escrow
//! here; under-collateralization is the invariant checker's to catch.
//!
//! The `(anchor, cursor)` pair changes only through
//! [`HubLedger::advance_anchor`], a compare-and-swap on the anchor. Every
//! applied swap is appended to the anchor history.

use hubbridge_types::{
    sum_amounts, Amount, AnchorUpdate, BridgeError, CasOutcome, Result, SettledCursor,
    SettlementId, UtxoIndex, Withdrawal, WithdrawalIndex,
};
use serde::{Deserialize, Serialize};

/// One applied compare-and-swap on the hub's anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorAdvance {
    /// The settlement whose finality justified the move.
    pub settlement: SettlementId,
    pub old_anchor: UtxoIndex,
    pub new_anchor: UtxoIndex,
    pub old_cursor: SettledCursor,
    pub new_cursor: SettledCursor,
}

/// Hub-side bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubLedger {
    /// Net minted balance. Negative only if withdrawals outrun deposits.
    mint: i128,
    withdrawals: Vec<Withdrawal>,
    anchor: UtxoIndex,
    cursor: SettledCursor,
    genesis_anchor: UtxoIndex,
    history: Vec<AnchorAdvance>,
}

impl HubLedger {
    /// Start with the genesis seed already minted and anchored.
    #[must_use]
    pub fn genesis(seed_amount: Amount, anchor: UtxoIndex) -> Self {
        Self {
            mint: i128::from(seed_amount),
            withdrawals: Vec::new(),
            anchor,
            cursor: SettledCursor::GENESIS,
            genesis_anchor: anchor,
            history: Vec::new(),
        }
    }

    /// Credit a relayed deposit.
    pub fn credit_mint(&mut self, amount: Amount) -> Result<()> {
        self.mint = self
            .mint
            .checked_add(i128::from(amount))
            .ok_or(BridgeError::MintOverflow)?;
        Ok(())
    }

    /// Queue a withdrawal and burn its amount from mint immediately.
    pub fn request_withdrawal(&mut self, amount: Amount) -> Result<WithdrawalIndex> {
        self.mint = self
            .mint
            .checked_sub(i128::from(amount))
            .ok_or(BridgeError::MintOverflow)?;
        self.withdrawals.push(Withdrawal { amount });
        let ix = WithdrawalIndex::from(self.withdrawals.len() - 1);
        tracing::debug!(withdrawal = %ix, amount, mint = self.mint, "Withdrawal queued");
        Ok(ix)
    }

    /// Compare-and-swap the anchor.
    ///
    /// Applies `update` only if `update.old_anchor` is the current anchor.
    /// Otherwise nothing changes and the outcome is [`CasOutcome::Stale`],
    /// which is a normal result of racing relayers, not an error.
    pub fn advance_anchor(&mut self, settlement: SettlementId, update: AnchorUpdate) -> CasOutcome {
        if update.old_anchor != self.anchor {
            tracing::debug!(
                settlement = %settlement,
                given = %update.old_anchor,
                current = %self.anchor,
                "Stale anchor update dropped"
            );
            return CasOutcome::Stale {
                current_anchor: self.anchor,
            };
        }

        let advance = AnchorAdvance {
            settlement,
            old_anchor: self.anchor,
            new_anchor: update.new_anchor,
            old_cursor: self.cursor,
            new_cursor: SettledCursor::at(update.new_cursor),
        };
        self.anchor = advance.new_anchor;
        self.cursor = advance.new_cursor;
        self.history.push(advance);

        tracing::info!(
            settlement = %settlement,
            old_anchor = %advance.old_anchor,
            new_anchor = %advance.new_anchor,
            cursor = %advance.new_cursor,
            "Anchor advanced"
        );
        CasOutcome::Applied
    }

    /// Sum of withdrawals in `(cursor, through]`. `None` if `through` is
    /// not in the queue.
    #[must_use]
    pub fn range_total(&self, cursor: SettledCursor, through: WithdrawalIndex) -> Option<u128> {
        let end = through.as_usize().checked_add(1)?;
        let range = self.withdrawals.get(cursor.next_unsettled()..end)?;
        Some(sum_amounts(range.iter().map(|w| w.amount)))
    }

    /// Sum of withdrawals past the settled cursor.
    #[must_use]
    pub fn incomplete_total(&self) -> u128 {
        let start = self.cursor.next_unsettled().min(self.withdrawals.len());
        sum_amounts(self.withdrawals[start..].iter().map(|w| w.amount))
    }

    /// Has the escrow payout for this withdrawal been reconciled?
    #[must_use]
    pub fn is_settled(&self, ix: WithdrawalIndex) -> bool {
        self.cursor.covers(ix)
    }

    #[must_use]
    pub fn mint(&self) -> i128 {
        self.mint
    }

    #[must_use]
    pub fn anchor(&self) -> UtxoIndex {
        self.anchor
    }

    #[must_use]
    pub fn cursor(&self) -> SettledCursor {
        self.cursor
    }

    #[must_use]
    pub fn genesis_anchor(&self) -> UtxoIndex {
        self.genesis_anchor
    }

    #[must_use]
    pub fn withdrawals(&self) -> &[Withdrawal] {
        &self.withdrawals
    }

    /// Applied anchor advances, oldest first.
    #[must_use]
    pub fn history(&self) -> &[AnchorAdvance] {
        &self.history
    }
}
