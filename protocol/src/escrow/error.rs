//! # Escrow Errors
//!
//! The full failure taxonomy for escrow operations. Every variant is a
//! *rejection*: the engine guarantees that an `Err` return left no state
//! change behind. The one recoverable condition — a failed outbound payout
//! during withdrawal — is deliberately **not** an error; see
//! [`WithdrawOutcome`](super::engine::WithdrawOutcome).

use thiserror::Error;

use crate::escrow::store::TransactionState;

/// Errors that can occur during escrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// The caller does not hold the role this operation requires.
    #[error("unauthorized: {party} is not the {required} for this operation")]
    Unauthorized {
        /// The address that attempted the operation.
        party: String,
        /// The role the operation requires.
        required: &'static str,
    },

    /// The transaction is not in a state that allows this operation.
    #[error("invalid state: transaction is {current}, expected {expected}")]
    InvalidState {
        /// The transaction's current state.
        current: TransactionState,
        /// The state required for this operation.
        expected: &'static str,
    },

    /// A party address is null or self-referential.
    #[error("invalid party: {0}")]
    InvalidParty(&'static str),

    /// A deposit must attach a non-zero value.
    #[error("invalid amount: a deposit must attach a non-zero value")]
    InvalidAmount,

    /// The requested fee rate exceeds the protocol's hard cap.
    #[error("fee rate {requested} bps exceeds the maximum of {max} bps")]
    FeeRateOutOfBounds {
        /// The rate the caller asked for.
        requested: u32,
        /// The protocol cap.
        max: u32,
    },

    /// The caller has no pending balance (or no fees have accrued).
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// No transaction exists with the given ID.
    #[error("transaction {0} does not exist")]
    TransactionNotFound(u64),

    /// A checked credit would overflow a balance counter.
    ///
    /// Unreachable while custodied value is bounded by real transfers in,
    /// but surfaced rather than wrapped if it ever happens.
    #[error("balance overflow: current {current}, credit {credit}")]
    BalanceOverflow {
        /// The balance before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}
