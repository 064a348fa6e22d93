//! # Escrow — Transaction State Machine & Fund Custody
//!
//! The core of the protocol, split along the same lines as the custody
//! model itself:
//!
//! - **Fees** (`fees.rs`): pure basis-point fee split, no side effects.
//! - **Store** (`store.rs`): the authoritative table of escrow
//!   transactions, dense integer IDs, creation-order assignment.
//! - **Ledger** (`ledger.rs`): per-address pending balances — the
//!   pull-payment half of "funds are owed" vs. "funds are transferred".
//! - **Events** (`events.rs`): the audit trail, one event per successful
//!   state-changing call.
//! - **Engine** (`engine.rs`): every public operation as a guarded state
//!   transition over the pieces above.
//!
//! ## Crate Policy
//!
//! All monetary arithmetic is checked; wrapping arithmetic and money do
//! not mix. Guards run before mutations in every operation.

pub mod engine;
pub mod error;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod store;

pub use engine::{EscrowEngine, WithdrawOutcome};
pub use error::EscrowError;
pub use events::EscrowEvent;
pub use store::{EscrowTransaction, TransactionState};
