//! # Ledger Runtime Interface
//!
//! The escrow engine never talks to the outside world directly. Everything
//! environmental — who is calling, how much value rides on the call, what
//! time it is, where paid-out funds actually go, who holds the owner
//! capability — crosses this seam as an explicit value or trait object.
//!
//! The embedding runtime (the `vela-node` binary in a devnet deployment, a
//! chain execution engine in production) is responsible for authenticating
//! the caller and executing each engine call as one atomic unit. The engine
//! holds up its end by never mutating state before its guards pass, so a
//! returned error always means "nothing happened".

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A party identity: the hex-encoded public key of an account, as issued by
/// the embedding runtime's identity layer.
///
/// The empty string is the *null address* — it identifies nobody and is
/// rejected wherever a real party is required.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a hex-encoded public key string.
    pub fn new(hex_pubkey: impl Into<String>) -> Self {
        Self(hex_pubkey.into())
    }

    /// The null address — identifies nobody.
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Returns `true` if this is the null address.
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Per-call environment supplied by the runtime: the authenticated caller,
/// the value attached to the call, and the current ledger time.
///
/// Timestamps are supplied here rather than read from the wall clock so
/// that the engine sees the runtime's monotonically non-decreasing view of
/// time — and so tests can pin it.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// The authenticated identity making this call.
    pub caller: Address,
    /// Value (in photons) attached to the call. Zero for every operation
    /// except deposits.
    pub value: u64,
    /// The runtime's current timestamp.
    pub now: DateTime<Utc>,
}

impl CallContext {
    /// A call with no attached value.
    pub fn new(caller: Address, now: DateTime<Utc>) -> Self {
        Self {
            caller,
            value: 0,
            now,
        }
    }

    /// Attaches value to the call, builder-style.
    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Errors surfaced by an outbound value transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The recipient cannot receive value (closed account, rejecting
    /// program, runtime refusal). The transfer had no effect.
    #[error("recipient {recipient} rejected transfer of {amount} photons")]
    Rejected {
        /// The address the transfer was destined for.
        recipient: Address,
        /// The amount that failed to move.
        amount: u64,
    },

    /// Crediting the recipient would overflow their on-ledger balance.
    #[error("transfer of {amount} photons would overflow {recipient}'s balance")]
    Overflow {
        /// The address the transfer was destined for.
        recipient: Address,
        /// The amount that failed to move.
        amount: u64,
    },
}

/// Outbound value transfer — the one irreversible side effect in the
/// system.
///
/// Implementations must be all-or-nothing: on `Err`, no value moved. The
/// engine invokes this at exactly one point (`withdraw_funds`), after all
/// of its own accounting for the call has been committed.
pub trait Settlement {
    /// Transfers `amount` photons out of escrow custody to `recipient`.
    fn transfer(&mut self, recipient: &Address, amount: u64) -> Result<(), TransferError>;
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// The owner capability, consumed as an external collaborator.
///
/// The engine only ever asks two questions: "is this caller the owner?"
/// (gating configuration changes) and "where do withdrawn protocol fees
/// go?". How ownership is actually established — a genesis key, a
/// multisig, a governance module — is the embedding runtime's business.
pub trait Ownership {
    /// Whether `caller` holds the owner capability.
    fn is_owner(&self, caller: &Address) -> bool;

    /// The address credited when accrued protocol fees are withdrawn.
    fn beneficiary(&self) -> &Address;
}

/// The simplest ownership model: one fixed address holds the capability
/// and receives fee withdrawals.
#[derive(Clone, Debug)]
pub struct SingleOwner {
    owner: Address,
}

impl SingleOwner {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }
}

impl Ownership for SingleOwner {
    fn is_owner(&self, caller: &Address) -> bool {
        !caller.is_null() && *caller == self.owner
    }

    fn beneficiary(&self) -> &Address {
        &self.owner
    }
}

// ---------------------------------------------------------------------------
// MemorySettlement
// ---------------------------------------------------------------------------

/// In-memory settlement backend: a flat account book mapping addresses to
/// on-ledger balances.
///
/// This is the reference [`Settlement`] used by the devnet node and the
/// test suite. Recipients can be marked as rejecting to exercise the
/// failed-payout path — the moral equivalent of a contract without a
/// payable fallback.
#[derive(Debug, Default)]
pub struct MemorySettlement {
    /// On-ledger balances keyed by address.
    accounts: HashMap<Address, u64>,
    /// Addresses that currently refuse incoming transfers.
    rejecting: HashSet<Address>,
}

impl MemorySettlement {
    /// Creates an empty account book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The settled (paid-out) balance of `address`. Zero for unknown
    /// addresses.
    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).copied().unwrap_or(0)
    }

    /// Marks `address` as unable to receive transfers.
    pub fn reject_transfers_to(&mut self, address: Address) {
        self.rejecting.insert(address);
    }

    /// Clears a previous rejection mark, making `address` payable again.
    pub fn accept_transfers_to(&mut self, address: &Address) {
        self.rejecting.remove(address);
    }

    /// Total value settled across all accounts. Wide enough that the audit
    /// sum itself cannot overflow.
    pub fn total_settled(&self) -> u128 {
        self.accounts.values().map(|v| *v as u128).sum()
    }
}

impl Settlement for MemorySettlement {
    fn transfer(&mut self, recipient: &Address, amount: u64) -> Result<(), TransferError> {
        if self.rejecting.contains(recipient) {
            return Err(TransferError::Rejected {
                recipient: recipient.clone(),
                amount,
            });
        }

        let current = self.accounts.entry(recipient.clone()).or_insert(0);
        let updated = current.checked_add(amount).ok_or(TransferError::Overflow {
            recipient: recipient.clone(),
            amount,
        })?;
        *current = updated;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
