//! The bridge aggregate.
//!
//! [`Bridge`] owns both ledgers and the append-only lists of proposed
//! transactions. It is a plain value: no globals, no interior mutability.
//! Every mutation goes through `&mut self`, so a caller that holds one
//! bridge per run gets fully isolated, deterministic state.

use hubbridge_ledger::{EscrowLedger, HubLedger};
use hubbridge_types::{
    constants, Amount, AnchorUpdate, BridgeConfig, BridgeError, CasOutcome,
    ReconciliationId, ReconciliationProposal, ReconciliationRejection, ReconciliationTx, Result,
    SettlementId, SettlementProposal, SettlementRejection, SettlementTx, UtxoIndex, Violation,
    WithdrawalIndex,
};
use serde::{Deserialize, Serialize};

use crate::digest::{compute_state_digest, StateDigest};
use crate::invariants::InvariantChecker;
use crate::reconciliation;
use crate::settlement::{self, SettlementDelivery};

/// Both ledgers plus every settlement and reconciliation ever proposed.
///
/// Transaction ids are positions in their list; proposals that fail
/// validation are kept in their `REJECTED` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bridge {
    config: BridgeConfig,
    escrow: EscrowLedger,
    hub: HubLedger,
    settlements: Vec<SettlementTx>,
    reconciliations: Vec<ReconciliationTx>,
}

impl Bridge {
    /// Genesis: escrow holds one seed coin, the hub has it minted and
    /// anchored, and no withdrawal is settled.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let anchor = UtxoIndex(constants::GENESIS_ANCHOR_INDEX);
        let escrow = EscrowLedger::genesis(config.genesis_seed_amount);
        let hub = HubLedger::genesis(config.genesis_seed_amount, anchor);
        tracing::info!(
            seed = config.genesis_seed_amount,
            min_seed = config.min_seed_amount,
            anchor = %anchor,
            "Bridge initialized"
        );
        Ok(Self {
            config,
            escrow,
            hub,
            settlements: Vec::new(),
            reconciliations: Vec::new(),
        })
    }

    // =================================================================
    // Deposits and withdrawals
    // =================================================================

    /// Lock `amount` in escrow and credit the same amount to mint.
    ///
    /// Mint is credited first so an overflow leaves both ledgers untouched.
    pub fn deposit(&mut self, amount: Amount) -> Result<UtxoIndex> {
        if amount == 0 {
            return Err(BridgeError::ZeroAmount);
        }
        self.hub.credit_mint(amount)?;
        Ok(self.escrow.deposit(amount))
    }

    /// Queue a withdrawal on the hub, burning `amount` from mint.
    pub fn request_withdrawal(&mut self, amount: Amount) -> Result<WithdrawalIndex> {
        if amount == 0 {
            return Err(BridgeError::ZeroAmount);
        }
        self.hub.request_withdrawal(amount)
    }

    // =================================================================
    // Settlement (asset chain)
    // =================================================================

    /// Build a proposal crediting exactly `(cursor, covers_through]`.
    #[must_use]
    pub fn draft_settlement(
        &self,
        inputs: Vec<UtxoIndex>,
        covers_through: WithdrawalIndex,
    ) -> SettlementProposal {
        settlement::draft_settlement(&self.hub, inputs, covers_through)
    }

    /// Validate a proposal against the current state without recording it.
    pub fn validate_settlement(
        &self,
        proposal: &SettlementProposal,
    ) -> std::result::Result<(), SettlementRejection> {
        settlement::validate_settlement(proposal, &self.escrow, &self.hub, &self.config)
    }

    /// Record a proposal and validate it.
    ///
    /// The tx is kept either way. A rejection comes back as
    /// [`BridgeError::SettlementRejected`] carrying the assigned id.
    pub fn submit_settlement(&mut self, proposal: SettlementProposal) -> Result<SettlementId> {
        let id = SettlementId::from(self.settlements.len());
        let verdict = self.validate_settlement(&proposal);
        let mut tx = SettlementTx::proposed(id, proposal);
        settlement::record_verdict(&mut tx, &verdict);
        self.settlements.push(tx);
        match verdict {
            Ok(()) => Ok(id),
            Err(reason) => Err(BridgeError::SettlementRejected { id, reason }),
        }
    }

    /// Draft and submit in one step.
    pub fn propose_settlement(
        &mut self,
        inputs: Vec<UtxoIndex>,
        covers_through: WithdrawalIndex,
    ) -> Result<SettlementId> {
        let proposal = self.draft_settlement(inputs, covers_through);
        self.submit_settlement(proposal)
    }

    /// Finalize an accepted settlement on the asset chain.
    ///
    /// # Panics
    /// On a protocol fault, see [`settlement::deliver_settlement`].
    pub fn deliver_settlement(&mut self, id: SettlementId) -> Result<SettlementDelivery> {
        let tx = self
            .settlements
            .get_mut(id.as_usize())
            .ok_or(BridgeError::UnknownSettlement(id))?;
        Ok(settlement::deliver_settlement(tx, &mut self.escrow, &self.config))
    }

    // =================================================================
    // Reconciliation (hub)
    // =================================================================

    /// Build a proposal that claims whatever `settlement` produced.
    #[must_use]
    pub fn draft_reconciliation(
        &self,
        settlement: SettlementId,
        expected_old_anchor: UtxoIndex,
    ) -> ReconciliationProposal {
        reconciliation::draft_reconciliation(&self.settlements, settlement, expected_old_anchor)
    }

    /// Validate a proposal against the current state without recording it.
    pub fn validate_reconciliation(
        &self,
        proposal: &ReconciliationProposal,
    ) -> std::result::Result<AnchorUpdate, ReconciliationRejection> {
        reconciliation::validate_reconciliation(proposal, &self.settlements, &self.hub)
    }

    /// Record a proposal and validate it. Rejected proposals are kept.
    pub fn submit_reconciliation(
        &mut self,
        proposal: ReconciliationProposal,
    ) -> Result<ReconciliationId> {
        let id = ReconciliationId::from(self.reconciliations.len());
        let verdict = self.validate_reconciliation(&proposal);
        let mut tx = ReconciliationTx::proposed(id, proposal);
        reconciliation::record_verdict(&mut tx, &verdict);
        self.reconciliations.push(tx);
        match verdict {
            Ok(_) => Ok(id),
            Err(reason) => Err(BridgeError::ReconciliationRejected { id, reason }),
        }
    }

    /// Draft and submit in one step.
    pub fn propose_reconciliation(
        &mut self,
        settlement: SettlementId,
        expected_old_anchor: UtxoIndex,
    ) -> Result<ReconciliationId> {
        let proposal = self.draft_reconciliation(settlement, expected_old_anchor);
        self.submit_reconciliation(proposal)
    }

    /// Finalize an accepted reconciliation on the hub. A stale anchor is a
    /// normal [`CasOutcome::Stale`].
    ///
    /// # Panics
    /// On a protocol fault, see [`reconciliation::deliver_reconciliation`].
    pub fn deliver_reconciliation(&mut self, id: ReconciliationId) -> Result<CasOutcome> {
        let tx = self
            .reconciliations
            .get_mut(id.as_usize())
            .ok_or(BridgeError::UnknownReconciliation(id))?;
        Ok(reconciliation::deliver_reconciliation(tx, &mut self.hub))
    }

    // =================================================================
    // Invariants
    // =================================================================

    /// Every violation in the current state. Empty means healthy.
    #[must_use]
    pub fn check_invariants(&self) -> Vec<Violation> {
        InvariantChecker::new(
            &self.escrow,
            &self.hub,
            &self.settlements,
            self.config.min_seed_amount,
        )
        .check()
    }

    /// Like [`Bridge::check_invariants`], but as a `Result`.
    pub fn assert_invariants(&self) -> Result<()> {
        let violations = self.check_invariants();
        if violations.is_empty() {
            return Ok(());
        }
        for v in &violations {
            tracing::error!(violation = %v, economic = v.is_economic(), "Invariant violated");
        }
        Err(BridgeError::InvariantViolation(violations))
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn escrow(&self) -> &EscrowLedger {
        &self.escrow
    }

    #[must_use]
    pub fn hub(&self) -> &HubLedger {
        &self.hub
    }

    #[must_use]
    pub fn settlements(&self) -> &[SettlementTx] {
        &self.settlements
    }

    #[must_use]
    pub fn reconciliations(&self) -> &[ReconciliationTx] {
        &self.reconciliations
    }

    #[must_use]
    pub fn settlement(&self, id: SettlementId) -> Option<&SettlementTx> {
        self.settlements.get(id.as_usize())
    }

    #[must_use]
    pub fn reconciliation(&self, id: ReconciliationId) -> Option<&ReconciliationTx> {
        self.reconciliations.get(id.as_usize())
    }

    /// Sum of unspent escrow coins.
    #[must_use]
    pub fn escrow_total(&self) -> u128 {
        self.escrow.unspent_total()
    }

    #[must_use]
    pub fn mint(&self) -> i128 {
        self.hub.mint()
    }

    /// Sum of queued withdrawals not yet covered by the settled cursor.
    #[must_use]
    pub fn incomplete_withdrawals(&self) -> u128 {
        self.hub.incomplete_total()
    }

    #[must_use]
    pub fn is_withdrawal_settled(&self, ix: WithdrawalIndex) -> bool {
        self.hub.is_settled(ix)
    }

    /// Accepted settlements still waiting for asset-chain finality.
    pub fn undelivered_settlements(&self) -> impl Iterator<Item = SettlementId> + '_ {
        self.settlements
            .iter()
            .filter(|tx| tx.is_pending_delivery())
            .map(|tx| tx.id)
    }

    /// Accepted reconciliations still waiting for hub finality.
    pub fn undelivered_reconciliations(&self) -> impl Iterator<Item = ReconciliationId> + '_ {
        self.reconciliations
            .iter()
            .filter(|tx| tx.is_pending_delivery())
            .map(|tx| tx.id)
    }

    #[must_use]
    pub fn digest(&self) -> StateDigest {
        compute_state_digest(self)
    }
}
