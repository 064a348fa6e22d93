//! # Escrow Engine
//!
//! Orchestrates the store, fee policy, and withdrawal ledger: every public
//! operation is a guarded state transition. The contract with callers is
//! strict — all guards run before the first mutation, so an `Err` return
//! means the engine is byte-for-byte unchanged. There is no local retry or
//! recovery; rejected calls are simply rejected.
//!
//! The one outbound side effect, the settlement transfer, happens at a
//! single point inside [`EscrowEngine::withdraw_funds`], strictly after the
//! caller's pending balance has been zeroed. A reentrant caller therefore
//! observes a zero balance and gets [`EscrowError::NothingToWithdraw`].
//!
//! The engine takes `&mut self`, which is the whole concurrency story:
//! the embedding runtime serializes calls (the devnet node does it with a
//! `tokio::sync::RwLock`), and each call is atomic by construction.

use chrono::{DateTime, Utc};

use crate::config::MAX_FEE_RATE_BPS;
use crate::escrow::error::EscrowError;
use crate::escrow::events::EscrowEvent;
use crate::escrow::fees::{self, FeeSplit};
use crate::escrow::ledger::WithdrawalLedger;
use crate::escrow::store::{EscrowTransaction, TransactionState, TransactionStore};
use crate::runtime::{Address, CallContext, Ownership, Settlement};

// ---------------------------------------------------------------------------
// WithdrawOutcome
// ---------------------------------------------------------------------------

/// The result of a successful `withdraw_funds` call.
///
/// A failed outbound transfer is *not* an error: the call's accounting
/// committed (debit, then restore), the funds remain withdrawable, and a
/// [`EscrowEvent::WithdrawalFailed`] event records the failure. `Err` is
/// reserved for rejections that changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawOutcome {
    /// The payout succeeded; `amount` left custody.
    Paid { amount: u64 },
    /// The recipient could not receive value; the pending balance was
    /// restored in full and can be withdrawn later.
    Restored { amount: u64 },
}

// ---------------------------------------------------------------------------
// EscrowEngine
// ---------------------------------------------------------------------------

/// The escrow state machine and fund-custody ledger.
pub struct EscrowEngine {
    /// Authoritative transaction records.
    store: TransactionStore,
    /// Per-address pending balances awaiting pull-payment withdrawal.
    ledger: WithdrawalLedger,
    /// The owner capability (configuration changes, fee beneficiary).
    ownership: Box<dyn Ownership + Send + Sync>,
    /// The address empowered to resolve disputes.
    arbitrator: Address,
    /// Current protocol fee rate in basis points.
    fee_rate_bps: u32,
    /// Accrued, not-yet-withdrawn protocol fees.
    collected_fees: u64,
    /// Audit events awaiting drain by the embedding runtime.
    events: Vec<EscrowEvent>,
}

impl EscrowEngine {
    /// Creates an engine with the given ownership capability, arbitrator,
    /// and initial fee rate.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidParty`] for a null arbitrator and
    /// [`EscrowError::FeeRateOutOfBounds`] for a rate above
    /// [`MAX_FEE_RATE_BPS`].
    pub fn new(
        ownership: Box<dyn Ownership + Send + Sync>,
        arbitrator: Address,
        fee_rate_bps: u32,
    ) -> Result<Self, EscrowError> {
        if arbitrator.is_null() {
            return Err(EscrowError::InvalidParty("arbitrator address is null"));
        }
        if fee_rate_bps > MAX_FEE_RATE_BPS {
            return Err(EscrowError::FeeRateOutOfBounds {
                requested: fee_rate_bps,
                max: MAX_FEE_RATE_BPS,
            });
        }

        Ok(Self {
            store: TransactionStore::new(),
            ledger: WithdrawalLedger::new(),
            ownership,
            arbitrator,
            fee_rate_bps,
            collected_fees: 0,
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Transaction lifecycle
    // -----------------------------------------------------------------------

    /// Creates a new escrow transaction. The caller becomes the buyer.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::InvalidParty`] if `seller` is null or equals
    /// the caller.
    pub fn create_transaction(
        &mut self,
        ctx: &CallContext,
        seller: Address,
    ) -> Result<u64, EscrowError> {
        let buyer = ctx.caller.clone();
        let id = self.store.create(buyer.clone(), seller.clone(), ctx.now)?;
        self.events
            .push(EscrowEvent::TransactionCreated { id, buyer, seller });
        Ok(id)
    }

    /// Deposits the attached value into custody for transaction `id`,
    /// moving it from `AwaitingPayment` to `AwaitingDelivery`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::Unauthorized`] if the caller is not the
    /// buyer, [`EscrowError::InvalidState`] if the transaction is not
    /// awaiting payment, and [`EscrowError::InvalidAmount`] for a zero
    /// attached value.
    pub fn deposit_payment(&mut self, ctx: &CallContext, id: u64) -> Result<(), EscrowError> {
        let record = self.store.get(id)?;
        if ctx.caller != record.buyer {
            return Err(EscrowError::Unauthorized {
                party: ctx.caller.to_string(),
                required: "buyer",
            });
        }
        if record.state != TransactionState::AwaitingPayment {
            return Err(EscrowError::InvalidState {
                current: record.state,
                expected: "AwaitingPayment",
            });
        }
        if ctx.value == 0 {
            return Err(EscrowError::InvalidAmount);
        }

        let record = self.store.get_mut(id)?;
        record.amount = ctx.value;
        record.state = TransactionState::AwaitingDelivery;
        self.events.push(EscrowEvent::PaymentDeposited {
            id,
            amount: ctx.value,
        });
        Ok(())
    }

    /// Buyer confirms delivery: the seller is credited the escrowed amount
    /// net of the protocol fee (at the *current* rate), and the
    /// transaction completes.
    pub fn confirm_delivery(&mut self, ctx: &CallContext, id: u64) -> Result<(), EscrowError> {
        let record = self.store.get(id)?;
        if ctx.caller != record.buyer {
            return Err(EscrowError::Unauthorized {
                party: ctx.caller.to_string(),
                required: "buyer",
            });
        }
        if record.state != TransactionState::AwaitingDelivery {
            return Err(EscrowError::InvalidState {
                current: record.state,
                expected: "AwaitingDelivery",
            });
        }

        let split = self.release_to_seller(id, ctx.now)?;
        self.events.push(EscrowEvent::DeliveryConfirmed {
            id,
            seller_net: split.net,
            fee: split.fee,
        });
        Ok(())
    }

    /// Buyer or seller contests delivery, freezing the transaction until
    /// the arbitrator rules.
    pub fn initiate_dispute(&mut self, ctx: &CallContext, id: u64) -> Result<(), EscrowError> {
        let record = self.store.get(id)?;
        if ctx.caller != record.buyer && ctx.caller != record.seller {
            return Err(EscrowError::Unauthorized {
                party: ctx.caller.to_string(),
                required: "buyer or seller",
            });
        }
        if record.state != TransactionState::AwaitingDelivery {
            return Err(EscrowError::InvalidState {
                current: record.state,
                expected: "AwaitingDelivery",
            });
        }

        let record = self.store.get_mut(id)?;
        record.state = TransactionState::Disputed;
        self.events.push(EscrowEvent::TransactionDisputed {
            id,
            raised_by: ctx.caller.clone(),
        });
        Ok(())
    }

    /// Arbitrator rules on a disputed transaction: release to the seller
    /// (fee applies, transaction completes) or refund the buyer in full
    /// (no fee, transaction is refunded).
    pub fn resolve_dispute(
        &mut self,
        ctx: &CallContext,
        id: u64,
        release_to_seller: bool,
    ) -> Result<(), EscrowError> {
        let record = self.store.get(id)?;
        if ctx.caller != self.arbitrator {
            return Err(EscrowError::Unauthorized {
                party: ctx.caller.to_string(),
                required: "arbitrator",
            });
        }
        if record.state != TransactionState::Disputed {
            return Err(EscrowError::InvalidState {
                current: record.state,
                expected: "Disputed",
            });
        }
        let buyer = record.buyer.clone();
        let seller = record.seller.clone();

        if release_to_seller {
            let split = self.release_to_seller(id, ctx.now)?;
            self.events.push(EscrowEvent::DisputeResolved {
                id,
                winner: seller,
                released_to_seller: true,
                amount_released: split.net,
                fee: split.fee,
            });
        } else {
            let amount = self.refund_to_buyer(id, ctx.now)?;
            self.events.push(EscrowEvent::DisputeResolved {
                id,
                winner: buyer,
                released_to_seller: false,
                amount_released: amount,
                fee: 0,
            });
            self.events
                .push(EscrowEvent::TransactionRefunded { id, amount });
        }
        Ok(())
    }

    /// Pays out the caller's entire pending balance.
    ///
    /// The balance is zeroed *before* the outbound transfer; on transfer
    /// failure it is restored in full and the call still succeeds with
    /// [`WithdrawOutcome::Restored`] — withdrawal never silently burns
    /// funds, and the caller can simply retry later.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NothingToWithdraw`] if the caller has no
    /// pending balance.
    pub fn withdraw_funds(
        &mut self,
        ctx: &CallContext,
        settlement: &mut dyn Settlement,
    ) -> Result<WithdrawOutcome, EscrowError> {
        if self.ledger.pending(&ctx.caller) == 0 {
            return Err(EscrowError::NothingToWithdraw);
        }

        // Zero first, transfer second: a reentrant caller observes an
        // empty balance.
        let amount = self.ledger.debit(&ctx.caller);
        match settlement.transfer(&ctx.caller, amount) {
            Ok(()) => {
                self.events.push(EscrowEvent::PaymentReleased {
                    recipient: ctx.caller.clone(),
                    amount,
                });
                Ok(WithdrawOutcome::Paid { amount })
            }
            Err(_) => {
                // The one legal write-after-debit: restore the exact
                // debited amount.
                self.ledger.credit(&ctx.caller, amount)?;
                self.events.push(EscrowEvent::WithdrawalFailed {
                    recipient: ctx.caller.clone(),
                    amount,
                });
                Ok(WithdrawOutcome::Restored { amount })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Configuration (owner-gated)
    // -----------------------------------------------------------------------

    /// Replaces the arbitrator. Owner only; the new arbitrator must be a
    /// real address.
    pub fn change_arbitrator(
        &mut self,
        ctx: &CallContext,
        new_arbitrator: Address,
    ) -> Result<(), EscrowError> {
        self.require_owner(ctx)?;
        if new_arbitrator.is_null() {
            return Err(EscrowError::InvalidParty("arbitrator address is null"));
        }

        let previous = std::mem::replace(&mut self.arbitrator, new_arbitrator.clone());
        self.events.push(EscrowEvent::ArbitratorChanged {
            previous,
            current: new_arbitrator,
        });
        Ok(())
    }

    /// Retunes the fee rate. Owner only; capped at [`MAX_FEE_RATE_BPS`].
    ///
    /// The new rate applies to every transaction that completes from this
    /// point on, including transactions already funded at the old rate.
    pub fn change_fee_rate(&mut self, ctx: &CallContext, fee_rate_bps: u32) -> Result<(), EscrowError> {
        self.require_owner(ctx)?;
        if fee_rate_bps > MAX_FEE_RATE_BPS {
            return Err(EscrowError::FeeRateOutOfBounds {
                requested: fee_rate_bps,
                max: MAX_FEE_RATE_BPS,
            });
        }

        let previous_bps = std::mem::replace(&mut self.fee_rate_bps, fee_rate_bps);
        self.events.push(EscrowEvent::FeeRateChanged {
            previous_bps,
            current_bps: fee_rate_bps,
        });
        Ok(())
    }

    /// Moves all accrued protocol fees into the ownership beneficiary's
    /// pending balance, subject to the same pull-payment withdrawal as any
    /// other recipient.
    pub fn withdraw_fees(&mut self, ctx: &CallContext) -> Result<(), EscrowError> {
        self.require_owner(ctx)?;
        if self.collected_fees == 0 {
            return Err(EscrowError::NothingToWithdraw);
        }

        let beneficiary = self.ownership.beneficiary().clone();
        let amount = self.collected_fees;
        self.ledger.credit(&beneficiary, amount)?;
        self.collected_fees = 0;
        self.events.push(EscrowEvent::FeesWithdrawn {
            beneficiary,
            amount,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    /// The transaction record for `id`.
    pub fn transaction(&self, id: u64) -> Result<&EscrowTransaction, EscrowError> {
        self.store.get(id)
    }

    /// Number of transactions ever created.
    pub fn transaction_count(&self) -> u64 {
        self.store.count()
    }

    /// The pending (withdrawable) balance of `address`.
    pub fn pending_withdrawal(&self, address: &Address) -> u64 {
        self.ledger.pending(address)
    }

    /// Sum of all pending balances.
    pub fn total_pending(&self) -> u128 {
        self.ledger.total_pending()
    }

    /// The current arbitrator.
    pub fn arbitrator(&self) -> &Address {
        &self.arbitrator
    }

    /// The current fee rate in basis points.
    pub fn fee_rate_bps(&self) -> u32 {
        self.fee_rate_bps
    }

    /// Accrued, not-yet-withdrawn protocol fees.
    pub fn collected_fees(&self) -> u64 {
        self.collected_fees
    }

    /// Drains the audit-event log. The embedding runtime calls this after
    /// each operation and fans the events out.
    pub fn take_events(&mut self) -> Vec<EscrowEvent> {
        std::mem::take(&mut self.events)
    }

    /// The undrained audit-event log.
    pub fn events(&self) -> &[EscrowEvent] {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Internal effects
    // -----------------------------------------------------------------------

    fn require_owner(&self, ctx: &CallContext) -> Result<(), EscrowError> {
        if !self.ownership.is_owner(&ctx.caller) {
            return Err(EscrowError::Unauthorized {
                party: ctx.caller.to_string(),
                required: "owner",
            });
        }
        Ok(())
    }

    /// The "complete" effect: split the escrowed amount at the current fee
    /// rate, accrue the fee, credit the seller, and seal the record.
    ///
    /// Guards must have passed already. The fallible steps (fee accrual,
    /// ledger credit) run before any record mutation so the effect is
    /// all-or-nothing.
    fn release_to_seller(&mut self, id: u64, now: DateTime<Utc>) -> Result<FeeSplit, EscrowError> {
        let record = self.store.get(id)?;
        let seller = record.seller.clone();
        let split = fees::compute_fee(record.amount, self.fee_rate_bps);

        let fees_after =
            self.collected_fees
                .checked_add(split.fee)
                .ok_or(EscrowError::BalanceOverflow {
                    current: self.collected_fees,
                    credit: split.fee,
                })?;
        self.ledger.credit(&seller, split.net)?;
        self.collected_fees = fees_after;

        let record = self.store.get_mut(id)?;
        record.state = TransactionState::Complete;
        record.completed_at = Some(now);
        Ok(split)
    }

    /// The "refund" effect: credit the buyer the full escrowed amount (no
    /// fee) and seal the record.
    fn refund_to_buyer(&mut self, id: u64, now: DateTime<Utc>) -> Result<u64, EscrowError> {
        let record = self.store.get(id)?;
        let buyer = record.buyer.clone();
        let amount = record.amount;

        self.ledger.credit(&buyer, amount)?;

        let record = self.store.get_mut(id)?;
        record.state = TransactionState::Refunded;
        record.completed_at = Some(now);
        Ok(amount)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MemorySettlement, SingleOwner};

    const OWNER: &str = "owner_pk";
    const ARBITER: &str = "arbiter_pk";
    const BUYER: &str = "buyer_pk";
    const SELLER: &str = "seller_pk";

    fn engine() -> EscrowEngine {
        EscrowEngine::new(
            Box::new(SingleOwner::new(Address::from(OWNER))),
            Address::from(ARBITER),
            250,
        )
        .unwrap()
    }

    fn call(who: &str) -> CallContext {
        CallContext::new(Address::from(who), Utc::now())
    }

    /// Helper: create + deposit, returning the transaction ID.
    fn funded(engine: &mut EscrowEngine, amount: u64) -> u64 {
        let id = engine
            .create_transaction(&call(BUYER), Address::from(SELLER))
            .unwrap();
        engine
            .deposit_payment(&call(BUYER).with_value(amount), id)
            .unwrap();
        id
    }

    #[test]
    fn constructor_rejects_null_arbitrator() {
        let result = EscrowEngine::new(
            Box::new(SingleOwner::new(Address::from(OWNER))),
            Address::null(),
            250,
        );
        assert!(matches!(result, Err(EscrowError::InvalidParty(_))));
    }

    #[test]
    fn constructor_rejects_excessive_fee_rate() {
        let result = EscrowEngine::new(
            Box::new(SingleOwner::new(Address::from(OWNER))),
            Address::from(ARBITER),
            1_001,
        );
        assert!(matches!(
            result,
            Err(EscrowError::FeeRateOutOfBounds { requested: 1_001, .. })
        ));
    }

    #[test]
    fn deposit_by_non_buyer_unauthorized() {
        let mut engine = engine();
        let id = engine
            .create_transaction(&call(BUYER), Address::from(SELLER))
            .unwrap();

        let result = engine.deposit_payment(&call(SELLER).with_value(100), id);
        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(engine.transaction(id).unwrap().amount, 0);
    }

    #[test]
    fn deposit_requires_positive_value() {
        let mut engine = engine();
        let id = engine
            .create_transaction(&call(BUYER), Address::from(SELLER))
            .unwrap();

        let result = engine.deposit_payment(&call(BUYER), id);
        assert!(matches!(result, Err(EscrowError::InvalidAmount)));
    }

    #[test]
    fn second_deposit_rejected_with_invalid_state() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);

        let result = engine.deposit_payment(&call(BUYER).with_value(500), id);
        assert!(matches!(
            result,
            Err(EscrowError::InvalidState {
                current: TransactionState::AwaitingDelivery,
                ..
            })
        ));
        // First deposit sticks.
        assert_eq!(engine.transaction(id).unwrap().amount, 1_000);
    }

    #[test]
    fn confirm_splits_amount_between_seller_and_fees() {
        let mut engine = engine();
        let id = funded(&mut engine, 10_000);

        engine.confirm_delivery(&call(BUYER), id).unwrap();

        let record = engine.transaction(id).unwrap();
        assert_eq!(record.state, TransactionState::Complete);
        assert!(record.completed_at.is_some());
        // 250 bps of 10_000 = 250.
        assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 9_750);
        assert_eq!(engine.collected_fees(), 250);
    }

    #[test]
    fn confirm_by_seller_unauthorized() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);

        let result = engine.confirm_delivery(&call(SELLER), id);
        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
    }

    #[test]
    fn dispute_allowed_for_both_parties_only() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        assert!(matches!(
            engine.initiate_dispute(&call("stranger_pk"), id),
            Err(EscrowError::Unauthorized { .. })
        ));
        engine.initiate_dispute(&call(SELLER), id).unwrap();
        assert_eq!(
            engine.transaction(id).unwrap().state,
            TransactionState::Disputed
        );
    }

    #[test]
    fn dispute_before_deposit_invalid_state() {
        let mut engine = engine();
        let id = engine
            .create_transaction(&call(BUYER), Address::from(SELLER))
            .unwrap();
        assert!(matches!(
            engine.initiate_dispute(&call(BUYER), id),
            Err(EscrowError::InvalidState { .. })
        ));
    }

    #[test]
    fn resolve_requires_arbitrator() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        engine.initiate_dispute(&call(BUYER), id).unwrap();

        assert!(matches!(
            engine.resolve_dispute(&call(BUYER), id, false),
            Err(EscrowError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.resolve_dispute(&call(OWNER), id, false),
            Err(EscrowError::Unauthorized { .. })
        ));
    }

    #[test]
    fn refund_returns_full_amount_without_fee() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        engine.initiate_dispute(&call(BUYER), id).unwrap();

        engine.resolve_dispute(&call(ARBITER), id, false).unwrap();

        let record = engine.transaction(id).unwrap();
        assert_eq!(record.state, TransactionState::Refunded);
        assert_eq!(engine.pending_withdrawal(&Address::from(BUYER)), 1_000);
        assert_eq!(engine.collected_fees(), 0);
    }

    #[test]
    fn terminal_record_rejects_every_transition() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        engine.confirm_delivery(&call(BUYER), id).unwrap();

        assert!(matches!(
            engine.deposit_payment(&call(BUYER).with_value(1), id),
            Err(EscrowError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.confirm_delivery(&call(BUYER), id),
            Err(EscrowError::InvalidState { .. })
        ));
        assert!(matches!(
            engine.initiate_dispute(&call(BUYER), id),
            Err(EscrowError::InvalidState { .. })
        ));
    }

    #[test]
    fn withdraw_pays_out_and_zeroes_pending() {
        let mut engine = engine();
        let mut settlement = MemorySettlement::new();
        let id = funded(&mut engine, 10_000);
        engine.confirm_delivery(&call(BUYER), id).unwrap();

        let outcome = engine
            .withdraw_funds(&call(SELLER), &mut settlement)
            .unwrap();

        assert_eq!(outcome, WithdrawOutcome::Paid { amount: 9_750 });
        assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 0);
        assert_eq!(settlement.balance(&Address::from(SELLER)), 9_750);
    }

    #[test]
    fn failed_payout_restores_pending_balance() {
        let mut engine = engine();
        let mut settlement = MemorySettlement::new();
        settlement.reject_transfers_to(Address::from(SELLER));
        let id = funded(&mut engine, 10_000);
        engine.confirm_delivery(&call(BUYER), id).unwrap();

        let outcome = engine
            .withdraw_funds(&call(SELLER), &mut settlement)
            .unwrap();

        assert_eq!(outcome, WithdrawOutcome::Restored { amount: 9_750 });
        assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 9_750);
        assert_eq!(settlement.balance(&Address::from(SELLER)), 0);
    }

    #[test]
    fn withdraw_with_empty_balance_rejected() {
        let mut engine = engine();
        let mut settlement = MemorySettlement::new();
        assert!(matches!(
            engine.withdraw_funds(&call(SELLER), &mut settlement),
            Err(EscrowError::NothingToWithdraw)
        ));
    }

    #[test]
    fn configuration_is_owner_gated() {
        let mut engine = engine();
        assert!(matches!(
            engine.change_arbitrator(&call(BUYER), Address::from("new_arbiter_pk")),
            Err(EscrowError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.change_fee_rate(&call(ARBITER), 100),
            Err(EscrowError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.withdraw_fees(&call(SELLER)),
            Err(EscrowError::Unauthorized { .. })
        ));
    }

    #[test]
    fn fee_rate_boundary_is_exactly_one_thousand() {
        let mut engine = engine();
        engine.change_fee_rate(&call(OWNER), 1_000).unwrap();
        assert_eq!(engine.fee_rate_bps(), 1_000);

        let result = engine.change_fee_rate(&call(OWNER), 1_001);
        assert!(matches!(
            result,
            Err(EscrowError::FeeRateOutOfBounds { requested: 1_001, .. })
        ));
        assert_eq!(engine.fee_rate_bps(), 1_000);
    }

    #[test]
    fn replaced_arbitrator_takes_over() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        engine.initiate_dispute(&call(BUYER), id).unwrap();

        engine
            .change_arbitrator(&call(OWNER), Address::from("new_arbiter_pk"))
            .unwrap();

        // The old arbitrator is out; the new one rules.
        assert!(matches!(
            engine.resolve_dispute(&call(ARBITER), id, true),
            Err(EscrowError::Unauthorized { .. })
        ));
        engine
            .resolve_dispute(&call("new_arbiter_pk"), id, true)
            .unwrap();
    }

    #[test]
    fn null_arbitrator_change_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.change_arbitrator(&call(OWNER), Address::null()),
            Err(EscrowError::InvalidParty(_))
        ));
    }

    #[test]
    fn fee_withdrawal_moves_accrual_into_pending() {
        let mut engine = engine();
        let id = funded(&mut engine, 10_000);
        engine.confirm_delivery(&call(BUYER), id).unwrap();
        assert_eq!(engine.collected_fees(), 250);

        engine.withdraw_fees(&call(OWNER)).unwrap();

        assert_eq!(engine.collected_fees(), 0);
        assert_eq!(engine.pending_withdrawal(&Address::from(OWNER)), 250);

        // Nothing left to withdraw a second time.
        assert!(matches!(
            engine.withdraw_fees(&call(OWNER)),
            Err(EscrowError::NothingToWithdraw)
        ));
    }

    #[test]
    fn events_are_recorded_once_per_operation() {
        let mut engine = engine();
        let id = funded(&mut engine, 10_000);
        engine.confirm_delivery(&call(BUYER), id).unwrap();

        let events = engine.take_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], EscrowEvent::TransactionCreated { id: 0, .. }));
        assert!(matches!(
            events[1],
            EscrowEvent::PaymentDeposited { id: 0, amount: 10_000 }
        ));
        assert!(matches!(
            events[2],
            EscrowEvent::DeliveryConfirmed {
                id: 0,
                seller_net: 9_750,
                fee: 250,
            }
        ));

        // Drained: nothing left, and failed calls record nothing.
        assert!(engine.take_events().is_empty());
        let _ = engine.deposit_payment(&call(BUYER).with_value(1), id);
        assert!(engine.events().is_empty());
    }

    #[test]
    fn refund_resolution_records_ruling_and_refund() {
        let mut engine = engine();
        let id = funded(&mut engine, 1_000);
        engine.initiate_dispute(&call(SELLER), id).unwrap();
        engine.take_events();

        engine.resolve_dispute(&call(ARBITER), id, false).unwrap();

        let events = engine.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            EscrowEvent::DisputeResolved {
                released_to_seller: false,
                amount_released: 1_000,
                fee: 0,
                ..
            }
        ));
        assert!(matches!(
            events[1],
            EscrowEvent::TransactionRefunded { id: 0, amount: 1_000 }
        ));
    }
}
