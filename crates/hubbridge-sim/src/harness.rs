//! Randomized action harness.
//!
//! A [`Simulation`] applies [`Action`]s to a [`Bridge`] and checks every
//! invariant after every step, plus cursor monotonicity between steps.
//! Actions carry raw choices that are resolved against the state at the time
//! they are applied, so any sequence of actions is meaningful: a choice with
//! nothing to pick from becomes a skipped step.

use hubbridge_settlement::{Bridge, SettlementDelivery};
use hubbridge_types::{
    Amount, BridgeError, CasOutcome, ReconciliationId, ReconciliationProposal, Result,
    SettledCursor, SettlementId, UtxoIndex, Violation, WithdrawalIndex,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::relayer::{InputSelector, RandomSelector, Relayer};

/// Mixed into the run seed for the relayer so actions and input selection
/// draw from independent streams.
const RELAYER_SEED_SALT: u64 = 0x5eed_5e1e_c7ed_0001;

/// One step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Deposit { amount: Amount },
    Withdraw { amount: Amount },
    /// Settle through withdrawal `through % queue_len`, which may already be
    /// settled.
    ProposeSettlement { through: u64 },
    /// Settle through unsettled withdrawal `through % unsettled`.
    SettlePending { through: u64 },
    /// Deliver undelivered settlement `pick % pending`.
    DeliverSettlement { pick: u64 },
    /// Reconcile settlement `settlement % settlements` against escrow coin
    /// `old_anchor % escrow_len`, which is often not the hub's anchor.
    ProposeReconciliation { settlement: u64, old_anchor: u64 },
    /// Reconcile delivered-but-unreconciled settlement
    /// `settlement % candidates` against the hub's current anchor.
    ReconcileAtHead { settlement: u64 },
    /// Deliver undelivered reconciliation `pick % pending`.
    DeliverReconciliation { pick: u64 },
}

impl Action {
    /// Draw one action.
    ///
    /// The well-formed relayer moves ([`Action::SettlePending`],
    /// [`Action::ReconcileAtHead`]) are drawn twice as often as their
    /// arbitrary counterparts so that runs chain several anchors.
    pub fn random(rng: &mut impl Rng, max_deposit: Amount, max_withdrawal: Amount) -> Self {
        match rng.gen_range(0..14u8) {
            0 | 1 => Self::Deposit {
                amount: rng.gen_range(1..=max_deposit),
            },
            2 | 3 => Self::Withdraw {
                amount: rng.gen_range(1..=max_withdrawal),
            },
            4 => Self::ProposeSettlement {
                through: rng.next_u64(),
            },
            5 | 6 => Self::SettlePending {
                through: rng.next_u64(),
            },
            7 | 8 => Self::DeliverSettlement {
                pick: rng.next_u64(),
            },
            9 => Self::ProposeReconciliation {
                settlement: rng.next_u64(),
                old_anchor: rng.next_u64(),
            },
            10 | 11 => Self::ReconcileAtHead {
                settlement: rng.next_u64(),
            },
            _ => Self::DeliverReconciliation {
                pick: rng.next_u64(),
            },
        }
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Deposited(UtxoIndex),
    Withdrew(WithdrawalIndex),
    SettlementAccepted(SettlementId),
    SettlementRejected { id: SettlementId, reason: String },
    SettlementDelivered { id: SettlementId, new_outpoint: UtxoIndex },
    SettlementDropped { id: SettlementId, reason: String },
    ReconciliationAccepted(ReconciliationId),
    ReconciliationRejected { id: ReconciliationId, reason: String },
    ReconciliationDelivered { id: ReconciliationId, outcome: CasOutcome },
    /// Nothing to choose from.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: usize,
    pub action: Action,
    pub outcome: StepOutcome,
    pub cursor: SettledCursor,
}

/// Counters over a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub steps: usize,
    pub deposits: usize,
    pub withdrawals: usize,
    pub settlements_accepted: usize,
    pub settlements_rejected: usize,
    pub settlements_delivered: usize,
    pub settlements_dropped: usize,
    pub reconciliations_accepted: usize,
    pub reconciliations_rejected: usize,
    pub cas_applied: usize,
    pub cas_stale: usize,
    pub skipped: usize,
    pub final_cursor: SettledCursor,
    pub escrow_total: u128,
    pub mint: i128,
    /// Hex SHA-256 of the final state.
    pub digest: String,
}

impl RunSummary {
    fn record(&mut self, outcome: &StepOutcome) {
        self.steps += 1;
        match outcome {
            StepOutcome::Deposited(_) => self.deposits += 1,
            StepOutcome::Withdrew(_) => self.withdrawals += 1,
            StepOutcome::SettlementAccepted(_) => self.settlements_accepted += 1,
            StepOutcome::SettlementRejected { .. } => self.settlements_rejected += 1,
            StepOutcome::SettlementDelivered { .. } => self.settlements_delivered += 1,
            StepOutcome::SettlementDropped { .. } => self.settlements_dropped += 1,
            StepOutcome::ReconciliationAccepted(_) => self.reconciliations_accepted += 1,
            StepOutcome::ReconciliationRejected { .. } => self.reconciliations_rejected += 1,
            StepOutcome::ReconciliationDelivered { outcome, .. } => {
                if outcome.is_applied() {
                    self.cas_applied += 1;
                } else {
                    self.cas_stale += 1;
                }
            }
            StepOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// A bridge under test plus the relayer driving it.
#[derive(Debug)]
pub struct Simulation<S> {
    bridge: Bridge,
    relayer: Relayer<S>,
    reports: Vec<StepReport>,
    summary: RunSummary,
}

impl<S: InputSelector> Simulation<S> {
    pub fn new(bridge: Bridge, relayer: Relayer<S>) -> Self {
        Self {
            bridge,
            relayer,
            reports: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Apply one action, then check every invariant.
    ///
    /// Validation rejections, delivery drops and stale reconciliations are
    /// ordinary outcomes. The only errors are ledger errors and
    /// [`BridgeError::InvariantViolation`].
    pub fn apply(&mut self, action: Action) -> Result<&StepReport> {
        let cursor_before = self.bridge.hub().cursor();
        let outcome = self.execute(action)?;
        let cursor = self.bridge.hub().cursor();

        let mut violations = self.bridge.check_invariants();
        if cursor < cursor_before {
            violations.push(Violation::CursorRegressed {
                position: self.reports.len(),
                from: cursor_before,
                to: cursor,
            });
        }
        if !violations.is_empty() {
            tracing::error!(
                step = self.reports.len(),
                ?action,
                count = violations.len(),
                "Invariant check failed"
            );
            return Err(BridgeError::InvariantViolation(violations));
        }

        tracing::trace!(step = self.reports.len(), ?action, ?outcome, "Step applied");
        self.summary.record(&outcome);
        self.reports.push(StepReport {
            step: self.reports.len(),
            action,
            outcome,
            cursor,
        });
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// Apply every action in order, stopping at the first error.
    pub fn run(&mut self, actions: impl IntoIterator<Item = Action>) -> Result<RunSummary> {
        for action in actions {
            self.apply(action)?;
        }
        Ok(self.summary())
    }

    fn execute(&mut self, action: Action) -> Result<StepOutcome> {
        let outcome = match action {
            Action::Deposit { amount } => StepOutcome::Deposited(self.bridge.deposit(amount)?),
            Action::Withdraw { amount } => {
                StepOutcome::Withdrew(self.bridge.request_withdrawal(amount)?)
            }
            Action::ProposeSettlement { through } => {
                let Some(covers_through) = pick(through, self.bridge.hub().withdrawals().len())
                    .map(WithdrawalIndex::from)
                else {
                    return Ok(StepOutcome::Skipped);
                };
                self.propose_settlement(covers_through)?
            }
            Action::SettlePending { through } => {
                let first = self.bridge.hub().cursor().next_unsettled();
                let unsettled = self.bridge.hub().withdrawals().len().saturating_sub(first);
                let Some(offset) = pick(through, unsettled) else {
                    return Ok(StepOutcome::Skipped);
                };
                self.propose_settlement(WithdrawalIndex::from(first + offset))?
            }
            Action::DeliverSettlement { pick: choice } => {
                let pending: Vec<_> = self.bridge.undelivered_settlements().collect();
                let Some(id) = pick(choice, pending.len()).map(|i| pending[i]) else {
                    return Ok(StepOutcome::Skipped);
                };
                match self.bridge.deliver_settlement(id)? {
                    SettlementDelivery::Delivered { new_outpoint } => {
                        StepOutcome::SettlementDelivered { id, new_outpoint }
                    }
                    SettlementDelivery::Dropped(drop) => StepOutcome::SettlementDropped {
                        id,
                        reason: drop.to_string(),
                    },
                }
            }
            Action::ProposeReconciliation {
                settlement,
                old_anchor,
            } => {
                let (Some(settlement), Some(old_anchor)) = (
                    pick(settlement, self.bridge.settlements().len()).map(SettlementId::from),
                    pick(old_anchor, self.bridge.escrow().len()).map(UtxoIndex::from),
                ) else {
                    return Ok(StepOutcome::Skipped);
                };
                let proposal = self
                    .relayer
                    .draft_reconciliation(&self.bridge, settlement, old_anchor);
                self.submit_reconciliation(proposal)?
            }
            Action::ReconcileAtHead { settlement } => {
                let candidates: Vec<_> = self
                    .bridge
                    .settlements()
                    .iter()
                    .filter(|tx| {
                        tx.is_delivered() && !self.bridge.is_withdrawal_settled(tx.covers_through)
                    })
                    .map(|tx| tx.id)
                    .collect();
                let Some(settlement) = pick(settlement, candidates.len()).map(|i| candidates[i])
                else {
                    return Ok(StepOutcome::Skipped);
                };
                let proposal = self
                    .relayer
                    .draft_reconciliation_at_head(&self.bridge, settlement);
                self.submit_reconciliation(proposal)?
            }
            Action::DeliverReconciliation { pick: choice } => {
                let pending: Vec<_> = self.bridge.undelivered_reconciliations().collect();
                let Some(id) = pick(choice, pending.len()).map(|i| pending[i]) else {
                    return Ok(StepOutcome::Skipped);
                };
                let outcome = self.bridge.deliver_reconciliation(id)?;
                StepOutcome::ReconciliationDelivered { id, outcome }
            }
        };
        Ok(outcome)
    }

    fn propose_settlement(&mut self, covers_through: WithdrawalIndex) -> Result<StepOutcome> {
        let proposal = self.relayer.draft_settlement(&self.bridge, covers_through);
        match self.bridge.submit_settlement(proposal) {
            Ok(id) => Ok(StepOutcome::SettlementAccepted(id)),
            Err(BridgeError::SettlementRejected { id, reason }) => {
                Ok(StepOutcome::SettlementRejected {
                    id,
                    reason: reason.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn submit_reconciliation(&mut self, proposal: ReconciliationProposal) -> Result<StepOutcome> {
        match self.bridge.submit_reconciliation(proposal) {
            Ok(id) => Ok(StepOutcome::ReconciliationAccepted(id)),
            Err(BridgeError::ReconciliationRejected { id, reason }) => {
                Ok(StepOutcome::ReconciliationRejected {
                    id,
                    reason: reason.to_string(),
                })
            }
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    #[must_use]
    pub fn relayer(&self) -> &Relayer<S> {
        &self.relayer
    }

    #[must_use]
    pub fn reports(&self) -> &[StepReport] {
        &self.reports
    }

    /// Counters so far, with the current state's totals and digest.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            final_cursor: self.bridge.hub().cursor(),
            escrow_total: self.bridge.escrow_total(),
            mint: self.bridge.mint(),
            digest: self.bridge.digest().to_string(),
            ..self.summary.clone()
        }
    }
}

/// `choice % len` as an index, or `None` if there is nothing to pick.
fn pick(choice: u64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    usize::try_from(choice % len as u64).ok()
}

/// Run `config.steps` random actions with a [`RandomSelector`] relayer.
///
/// The same config always produces the same reports and digest.
pub fn run_seeded(config: &SimConfig) -> Result<Simulation<RandomSelector>> {
    config.validate()?;
    let bridge = Bridge::new(config.bridge.clone())?;
    let relayer = Relayer::new(RandomSelector::new(config.seed ^ RELAYER_SEED_SALT));
    let mut sim = Simulation::new(bridge, relayer);
    let mut rng = StdRng::seed_from_u64(config.seed);

    for _ in 0..config.steps {
        let action = Action::random(&mut rng, config.max_deposit, config.max_withdrawal);
        sim.apply(action)?;
    }

    let summary = sim.summary();
    tracing::info!(
        seed = config.seed,
        steps = summary.steps,
        cas_applied = summary.cas_applied,
        cursor = %summary.final_cursor,
        digest = %summary.digest,
        "Seeded run finished"
    );
    Ok(sim)
}
