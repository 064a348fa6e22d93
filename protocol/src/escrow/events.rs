//! # Escrow Events
//!
//! The audit trail. Each successful state-changing operation records the
//! matching event exactly once; the embedding runtime drains them (see
//! [`EscrowEngine::take_events`](super::engine::EscrowEngine::take_events))
//! and fans them out to subscribers, metrics, or durable logs.
//!
//! Serde-tagged for wire transport, same envelope shape as API event
//! streams elsewhere in the ALAS stack.

use serde::{Deserialize, Serialize};

use crate::runtime::Address;

/// An observable fact about a completed escrow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscrowEvent {
    /// A new transaction was created by its buyer.
    TransactionCreated {
        id: u64,
        buyer: Address,
        seller: Address,
    },
    /// The buyer deposited the purchase amount into custody.
    PaymentDeposited { id: u64, amount: u64 },
    /// The buyer confirmed delivery; the seller was credited `seller_net`
    /// and the protocol accrued `fee`.
    DeliveryConfirmed {
        id: u64,
        seller_net: u64,
        fee: u64,
    },
    /// Buyer or seller contested delivery.
    TransactionDisputed { id: u64, raised_by: Address },
    /// The arbitrator ruled. `amount_released` went to the winner's
    /// pending balance (net of `fee` when released to the seller).
    DisputeResolved {
        id: u64,
        winner: Address,
        released_to_seller: bool,
        amount_released: u64,
        fee: u64,
    },
    /// The full escrowed amount was credited back to the buyer.
    TransactionRefunded { id: u64, amount: u64 },
    /// The owner replaced the arbitrator.
    ArbitratorChanged {
        previous: Address,
        current: Address,
    },
    /// The owner retuned the fee rate.
    FeeRateChanged {
        previous_bps: u32,
        current_bps: u32,
    },
    /// Accrued protocol fees moved into the beneficiary's pending balance.
    FeesWithdrawn { beneficiary: Address, amount: u64 },
    /// A withdrawal paid out: `amount` left custody for `recipient`.
    PaymentReleased { recipient: Address, amount: u64 },
    /// A withdrawal's outbound transfer failed; the pending balance was
    /// restored and remains withdrawable.
    WithdrawalFailed { recipient: Address, amount: u64 },
}
