//! # Withdrawal Ledger
//!
//! Per-address pending-balance accounting. This is the pull-payment half of
//! the custody model: completions, refunds, and fee withdrawals *credit* an
//! address here, and the actual outbound transfer happens only when that
//! address calls `withdraw_funds` — which debits the entry to zero *before*
//! any value moves.
//!
//! Only two writers exist: the engine's credit during
//! completion/refund/fee-withdrawal, and the engine's debit of the caller's
//! own entry inside `withdraw_funds`. The single legal write-after-debit is
//! the engine restoring the exact debited amount after a failed payout.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::escrow::error::EscrowError;
use crate::runtime::Address;

/// Pending (owed, not yet transferred) balances keyed by address.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WithdrawalLedger {
    pending: HashMap<Address, u64>,
}

impl WithdrawalLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the pending balance of `address`, creating the
    /// entry if needed. Returns the updated balance.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::BalanceOverflow`] if the credit would exceed
    /// `u64::MAX`.
    pub fn credit(&mut self, address: &Address, amount: u64) -> Result<u64, EscrowError> {
        let entry = self.pending.entry(address.clone()).or_insert(0);
        let updated = entry
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow {
                current: *entry,
                credit: amount,
            })?;
        *entry = updated;
        Ok(updated)
    }

    /// Reads and zeroes the pending balance of `address`, returning the
    /// prior value. Zero for addresses with no entry.
    pub fn debit(&mut self, address: &Address) -> u64 {
        self.pending.remove(address).unwrap_or(0)
    }

    /// The current pending balance of `address`.
    pub fn pending(&self, address: &Address) -> u64 {
        self.pending.get(address).copied().unwrap_or(0)
    }

    /// Sum of all pending balances. Wide enough that the audit sum itself
    /// cannot overflow.
    pub fn total_pending(&self) -> u128 {
        self.pending.values().map(|v| *v as u128).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
