//! Ledger record types: escrow UTXOs and hub withdrawal requests.

use serde::{Deserialize, Serialize};

/// Amount of the bridged asset in base units.
pub type Amount = u64;

/// An escrow coin on the asset chain.
///
/// Records are never removed from the escrow ledger; only `spent` flips,
/// and only from `false` to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub amount: Amount,
    pub spent: bool,
}

impl Utxo {
    /// A fresh unspent coin.
    #[must_use]
    pub fn unspent(amount: Amount) -> Self {
        Self {
            amount,
            spent: false,
        }
    }
}

/// A withdrawal request in the hub's queue. Settled status is derived from
/// the hub's cursor, never stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub amount: Amount,
}

/// Sum amounts into a `u128` so long runs cannot overflow.
pub fn sum_amounts<I>(amounts: I) -> u128
where
    I: IntoIterator<Item = Amount>,
{
    amounts.into_iter().map(u128::from).sum()
}
