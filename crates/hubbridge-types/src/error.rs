//! Error types for the HubBridge model.
//!
//! All recoverable errors use the `HB_ERR_` prefix convention for easy
//! grepping in logs. Error codes are grouped by subsystem:
//! - 1xx: Escrow ledger errors
//! - 2xx: Hub ledger errors
//! - 3xx: Settlement errors
//! - 4xx: Reconciliation errors
//! - 8xx: Invariant errors
//! - 9xx: General / internal errors
//!
//! Protocol-design faults live in [`ProtocolFault`] with the `HB_FAULT_`
//! prefix. They are never returned to callers as recoverable errors; the
//! bridge logs them and halts.

use thiserror::Error;

use crate::{
    ReconciliationId, ReconciliationRejection, SettlementId, SettlementRejection, UtxoIndex,
    Violation,
};

/// Central error enum for all recoverable HubBridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // =================================================================
    // Escrow Errors (1xx)
    // =================================================================
    /// The UTXO index is past the end of the escrow ledger.
    #[error("HB_ERR_100: Unknown UTXO: {0}")]
    UnknownUtxo(UtxoIndex),

    /// The UTXO was already spent. This is the double-spend guard.
    #[error("HB_ERR_101: UTXO already spent: {0}")]
    DoubleSpend(UtxoIndex),

    /// Deposits and withdrawals must move a positive amount.
    #[error("HB_ERR_102: Amount must be positive")]
    ZeroAmount,

    // =================================================================
    // Hub Errors (2xx)
    // =================================================================
    /// Mint arithmetic left the representable range.
    #[error("HB_ERR_200: Mint overflow")]
    MintOverflow,

    // =================================================================
    // Settlement Errors (3xx)
    // =================================================================
    /// Validation refused the settlement proposal. The proposal is still
    /// recorded under `id` in its terminal `REJECTED` state.
    #[error("HB_ERR_300: Settlement {id} rejected: {reason}")]
    SettlementRejected {
        id: SettlementId,
        #[source]
        reason: SettlementRejection,
    },

    /// No settlement with this id was ever proposed.
    #[error("HB_ERR_301: Settlement not found: {0}")]
    UnknownSettlement(SettlementId),

    // =================================================================
    // Reconciliation Errors (4xx)
    // =================================================================
    /// Validation refused the reconciliation proposal. The proposal is
    /// still recorded under `id` in its terminal `REJECTED` state.
    #[error("HB_ERR_400: Reconciliation {id} rejected: {reason}")]
    ReconciliationRejected {
        id: ReconciliationId,
        #[source]
        reason: ReconciliationRejection,
    },

    /// No reconciliation with this id was ever proposed.
    #[error("HB_ERR_401: Reconciliation not found: {0}")]
    UnknownReconciliation(ReconciliationId),

    // =================================================================
    // Invariant Errors (8xx)
    // =================================================================
    /// The invariant checker reported at least one violation.
    #[error("HB_ERR_800: {} invariant violation(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    InvariantViolation(Vec<Violation>),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Serialization / deserialization error.
    #[error("HB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values, etc.).
    #[error("HB_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("HB_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A condition validation should already have ruled out.
///
/// Seeing one means the validation logic itself is wrong; continuing would
/// silently break the safety invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    #[error("HB_FAULT_01: {tx} already delivered")]
    DoubleDelivery { tx: String },

    #[error("HB_FAULT_02: {tx} delivered from state {state}, expected ACCEPTED")]
    NotAccepted { tx: String, state: &'static str },

    #[error("HB_FAULT_03: {settlement} left remainder {remainder} below seed {min_seed} after passing validation")]
    SeedBelowMinimum {
        settlement: SettlementId,
        remainder: u128,
        min_seed: u64,
    },

    #[error("HB_FAULT_04: illegal state transition {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("HB_FAULT_05: {settlement} passed the spent re-check but could not spend its inputs: {reason}")]
    SpendFailed {
        settlement: SettlementId,
        reason: String,
    },

    #[error("HB_FAULT_06: {settlement} change {remainder} does not fit an escrow amount")]
    ChangeOverflow {
        settlement: SettlementId,
        remainder: u128,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = BridgeError::DoubleSpend(UtxoIndex(3));
        let msg = format!("{err}");
        assert!(msg.starts_with("HB_ERR_101"), "Got: {msg}");
        assert!(msg.contains("utxo:3"));
    }

    #[test]
    fn rejection_display_names_tx_and_reason() {
        let err = BridgeError::SettlementRejected {
            id: SettlementId(2),
            reason: SettlementRejection::MissingAnchor {
                anchor: UtxoIndex(0),
            },
        };
        let msg = format!("{err}");
        assert!(msg.starts_with("HB_ERR_300"), "Got: {msg}");
        assert!(msg.contains("txkas:2"));
        assert!(msg.contains("does not spend current anchor"));
    }

    #[test]
    fn invariant_violation_reports_first() {
        let err = BridgeError::InvariantViolation(vec![Violation::EscrowBelowMint {
            escrow: 6,
            mint: 7,
        }]);
        let msg = format!("{err}");
        assert!(msg.starts_with("HB_ERR_800: 1 invariant"), "Got: {msg}");
        assert!(msg.contains("escrow < mint"));
    }

    #[test]
    fn all_errors_have_hb_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(BridgeError::ZeroAmount),
            Box::new(BridgeError::MintOverflow),
            Box::new(BridgeError::UnknownSettlement(SettlementId(1))),
            Box::new(BridgeError::UnknownReconciliation(ReconciliationId(1))),
            Box::new(BridgeError::Configuration("test".into())),
            Box::new(BridgeError::InvariantViolation(Vec::new())),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("HB_ERR_"),
                "Error missing HB_ERR_ prefix: {msg}"
            );
        }
    }

    #[test]
    fn faults_have_fault_prefix() {
        let fault = ProtocolFault::DoubleDelivery {
            tx: SettlementId(0).to_string(),
        };
        assert!(fault.to_string().starts_with("HB_FAULT_01"));
    }
}
