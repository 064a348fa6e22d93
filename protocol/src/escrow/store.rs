//! # Transaction Store
//!
//! The authoritative table of escrow transactions. IDs are dense, start at
//! zero, are assigned in creation order, and are never reused — a record,
//! once created, exists forever, and a terminal record never changes again.
//!
//! The store validates parties at creation and hands out records; all
//! lifecycle mutation goes through the engine, which is why the mutable
//! accessor is crate-private.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::escrow::error::EscrowError;
use crate::runtime::Address;

// ---------------------------------------------------------------------------
// TransactionState
// ---------------------------------------------------------------------------

/// The lifecycle state of an escrow transaction.
///
/// Transitions only move forward:
///
/// ```text
/// AwaitingPayment → AwaitingDelivery → Complete
///                          ↓              ↑
///                       Disputed ─────────┴→ Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    /// Created; waiting for the buyer to deposit the purchase amount.
    AwaitingPayment,
    /// Funds are in custody; waiting for the buyer to confirm delivery.
    AwaitingDelivery,
    /// Buyer or seller has contested delivery; an arbitrator must rule.
    Disputed,
    /// Funds credited to the seller net of the protocol fee (terminal).
    Complete,
    /// Full amount credited back to the buyer (terminal).
    Refunded,
}

impl TransactionState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Refunded)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::AwaitingPayment => write!(f, "AwaitingPayment"),
            TransactionState::AwaitingDelivery => write!(f, "AwaitingDelivery"),
            TransactionState::Disputed => write!(f, "Disputed"),
            TransactionState::Complete => write!(f, "Complete"),
            TransactionState::Refunded => write!(f, "Refunded"),
        }
    }
}

// ---------------------------------------------------------------------------
// EscrowTransaction
// ---------------------------------------------------------------------------

/// A single escrow transaction record.
///
/// `buyer`, `seller`, and `created_at` are fixed at creation. `amount` is
/// zero exactly while the transaction awaits payment, then set once by the
/// deposit. `completed_at` is `None` exactly while the transaction is
/// non-terminal, then set once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    /// Dense zero-based identifier, assigned at creation.
    pub id: u64,
    /// The party that created the transaction and funds it.
    pub buyer: Address,
    /// The party the funds are escrowed for.
    pub seller: Address,
    /// Escrowed amount in photons.
    pub amount: u64,
    /// Current lifecycle state.
    pub state: TransactionState,
    /// Ledger time at creation.
    pub created_at: DateTime<Utc>,
    /// Ledger time at which the record reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// TransactionStore
// ---------------------------------------------------------------------------

/// Append-only table of escrow transactions, indexed by ID.
///
/// Backed by a `Vec`: IDs being dense and zero-based means the ID *is* the
/// index.
#[derive(Debug, Default)]
pub struct TransactionStore {
    transactions: Vec<EscrowTransaction>,
}

impl TransactionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new transaction in `AwaitingPayment` and returns its ID.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidParty`] if either party is the null
    /// address or if `buyer == seller`.
    pub fn create(
        &mut self,
        buyer: Address,
        seller: Address,
        created_at: DateTime<Utc>,
    ) -> Result<u64, EscrowError> {
        if seller.is_null() {
            return Err(EscrowError::InvalidParty("seller address is null"));
        }
        if buyer.is_null() {
            return Err(EscrowError::InvalidParty("buyer address is null"));
        }
        if buyer == seller {
            return Err(EscrowError::InvalidParty("buyer and seller must differ"));
        }

        let id = self.transactions.len() as u64;
        self.transactions.push(EscrowTransaction {
            id,
            buyer,
            seller,
            amount: 0,
            state: TransactionState::AwaitingPayment,
            created_at,
            completed_at: None,
        });
        Ok(id)
    }

    /// Looks up a transaction by ID.
    pub fn get(&self, id: u64) -> Result<&EscrowTransaction, EscrowError> {
        self.transactions
            .get(id as usize)
            .ok_or(EscrowError::TransactionNotFound(id))
    }

    /// Mutable lookup. Crate-private: lifecycle mutation is the engine's
    /// exclusive privilege.
    pub(crate) fn get_mut(&mut self, id: u64) -> Result<&mut EscrowTransaction, EscrowError> {
        self.transactions
            .get_mut(id as usize)
            .ok_or(EscrowError::TransactionNotFound(id))
    }

    /// Number of transactions ever created.
    pub fn count(&self) -> u64 {
        self.transactions.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer() -> Address {
        Address::from("buyer_pk")
    }

    fn seller() -> Address {
        Address::from("seller_pk")
    }

    #[test]
    fn ids_are_dense_and_start_at_zero() {
        let mut store = TransactionStore::new();
        let now = Utc::now();

        assert_eq!(store.create(buyer(), seller(), now).unwrap(), 0);
        assert_eq!(store.create(seller(), buyer(), now).unwrap(), 1);
        assert_eq!(store.create(buyer(), Address::from("other_pk"), now).unwrap(), 2);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn new_record_awaits_payment_with_zero_amount() {
        let mut store = TransactionStore::new();
        let id = store.create(buyer(), seller(), Utc::now()).unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.state, TransactionState::AwaitingPayment);
        assert_eq!(record.amount, 0);
        assert!(record.completed_at.is_none());
        assert_eq!(record.buyer, buyer());
        assert_eq!(record.seller, seller());
    }

    #[test]
    fn null_seller_rejected() {
        let mut store = TransactionStore::new();
        let result = store.create(buyer(), Address::null(), Utc::now());
        assert!(matches!(result, Err(EscrowError::InvalidParty(_))));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn self_dealing_rejected() {
        let mut store = TransactionStore::new();
        let result = store.create(buyer(), buyer(), Utc::now());
        assert!(matches!(result, Err(EscrowError::InvalidParty(_))));
    }

    #[test]
    fn unknown_id_not_found() {
        let store = TransactionStore::new();
        assert!(matches!(
            store.get(7),
            Err(EscrowError::TransactionNotFound(7))
        ));
    }

    #[test]
    fn terminal_states_are_exactly_complete_and_refunded() {
        assert!(TransactionState::Complete.is_terminal());
        assert!(TransactionState::Refunded.is_terminal());
        assert!(!TransactionState::AwaitingPayment.is_terminal());
        assert!(!TransactionState::AwaitingDelivery.is_terminal());
        assert!(!TransactionState::Disputed.is_terminal());
    }

    #[test]
    fn record_serialization_roundtrip() {
        let mut store = TransactionStore::new();
        let id = store.create(buyer(), seller(), Utc::now()).unwrap();

        let json = serde_json::to_string(store.get(id).unwrap()).unwrap();
        let restored: EscrowTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, id);
        assert_eq!(restored.state, TransactionState::AwaitingPayment);
    }
}
