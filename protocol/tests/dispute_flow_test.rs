//! Integration tests for the dispute and arbitration flow.
//!
//! Covers who may open a dispute, who may rule, both ruling outcomes, the
//! immutability of resolved records, and the fee-rate timing semantics for
//! transactions that complete under a different rate than they were funded
//! at.

use chrono::Utc;
use vela_protocol::escrow::{
    EscrowEngine, EscrowError, EscrowEvent, TransactionState, WithdrawOutcome,
};
use vela_protocol::runtime::{Address, CallContext, MemorySettlement, SingleOwner};

const OWNER: &str = "owner_pk";
const ARBITER: &str = "arbiter_pk";
const BUYER: &str = "buyer_pk";
const SELLER: &str = "seller_pk";

fn engine_at(fee_rate_bps: u32) -> EscrowEngine {
    EscrowEngine::new(
        Box::new(SingleOwner::new(Address::from(OWNER))),
        Address::from(ARBITER),
        fee_rate_bps,
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

// ---------------------------------------------------------------------------
// Opening Disputes
// ---------------------------------------------------------------------------

#[test]
fn either_party_can_dispute() {
    let mut engine = engine_at(250);

    let first = funded(&mut engine, 1_000);
    engine.initiate_dispute(&call(BUYER), first).unwrap();
    assert_eq!(
        engine.transaction(first).unwrap().state,
        TransactionState::Disputed
    );

    let second = funded(&mut engine, 1_000);
    engine.initiate_dispute(&call(SELLER), second).unwrap();
    assert_eq!(
        engine.transaction(second).unwrap().state,
        TransactionState::Disputed
    );
}

#[test]
fn outsiders_cannot_dispute() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 1_000);

    for intruder in [ARBITER, OWNER, "stranger_pk"] {
        assert!(matches!(
            engine.initiate_dispute(&call(intruder), id),
            Err(EscrowError::Unauthorized { .. })
        ));
    }
}

#[test]
fn dispute_requires_funds_in_custody() {
    let mut engine = engine_at(250);
    let id = engine
        .create_transaction(&call(BUYER), Address::from(SELLER))
        .unwrap();

    // Nothing deposited yet — there is nothing to fight over.
    assert!(matches!(
        engine.initiate_dispute(&call(BUYER), id),
        Err(EscrowError::InvalidState { .. })
    ));
}

#[test]
fn double_dispute_rejected() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 1_000);
    engine.initiate_dispute(&call(BUYER), id).unwrap();

    assert!(matches!(
        engine.initiate_dispute(&call(SELLER), id),
        Err(EscrowError::InvalidState { .. })
    ));
}

// ---------------------------------------------------------------------------
// Rulings
// ---------------------------------------------------------------------------

#[test]
fn release_ruling_completes_with_fee() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 10_000);
    engine.initiate_dispute(&call(BUYER), id).unwrap();

    engine.resolve_dispute(&call(ARBITER), id, true).unwrap();

    let record = engine.transaction(id).unwrap();
    assert_eq!(record.state, TransactionState::Complete);
    assert!(record.completed_at.is_some());
    assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 9_750);
    assert_eq!(engine.pending_withdrawal(&Address::from(BUYER)), 0);
    assert_eq!(engine.collected_fees(), 250);
}

#[test]
fn refund_ruling_returns_everything_to_the_buyer() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 10_000);
    engine.initiate_dispute(&call(SELLER), id).unwrap();

    engine.resolve_dispute(&call(ARBITER), id, false).unwrap();

    let record = engine.transaction(id).unwrap();
    assert_eq!(record.state, TransactionState::Refunded);
    assert!(record.completed_at.is_some());
    assert_eq!(engine.pending_withdrawal(&Address::from(BUYER)), 10_000);
    assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 0);
    // Refunds are fee-free.
    assert_eq!(engine.collected_fees(), 0);
}

#[test]
fn only_the_arbitrator_rules() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 1_000);
    engine.initiate_dispute(&call(BUYER), id).unwrap();

    for intruder in [BUYER, SELLER, OWNER, "stranger_pk"] {
        assert!(matches!(
            engine.resolve_dispute(&call(intruder), id, true),
            Err(EscrowError::Unauthorized { .. })
        ));
    }
}

#[test]
fn resolution_requires_a_dispute() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 1_000);

    assert!(matches!(
        engine.resolve_dispute(&call(ARBITER), id, true),
        Err(EscrowError::InvalidState { .. })
    ));
}

#[test]
fn resolved_records_are_frozen() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 1_000);
    engine.initiate_dispute(&call(BUYER), id).unwrap();
    engine.resolve_dispute(&call(ARBITER), id, false).unwrap();

    // Double resolution, late confirmation, and re-disputes all bounce.
    assert!(matches!(
        engine.resolve_dispute(&call(ARBITER), id, true),
        Err(EscrowError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.confirm_delivery(&call(BUYER), id),
        Err(EscrowError::InvalidState { .. })
    ));
    assert!(matches!(
        engine.initiate_dispute(&call(SELLER), id),
        Err(EscrowError::InvalidState { .. })
    ));

    // And the buyer's refund is untouched by the failed attempts.
    assert_eq!(engine.pending_withdrawal(&Address::from(BUYER)), 1_000);
}

// ---------------------------------------------------------------------------
// Fee-Rate Timing
// ---------------------------------------------------------------------------

#[test]
fn fee_rate_is_read_at_completion_not_deposit() {
    // The engine deliberately applies the rate in force when a transaction
    // *completes*, not the rate when it was funded. An owner rate change
    // therefore reprices transactions already in flight — this test pins
    // that behavior so any move to snapshot-at-deposit is a conscious one.
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 10_000);

    engine.change_fee_rate(&call(OWNER), 1_000).unwrap();
    engine.confirm_delivery(&call(BUYER), id).unwrap();

    // 10% applied, not the 2.5% in force at deposit time.
    assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 9_000);
    assert_eq!(engine.collected_fees(), 1_000);
}

#[test]
fn rate_change_also_reprices_disputed_transactions() {
    let mut engine = engine_at(1_000);
    let id = funded(&mut engine, 10_000);
    engine.initiate_dispute(&call(BUYER), id).unwrap();

    engine.change_fee_rate(&call(OWNER), 0).unwrap();
    engine.resolve_dispute(&call(ARBITER), id, true).unwrap();

    // Zero-rate at ruling time: the seller takes everything.
    assert_eq!(engine.pending_withdrawal(&Address::from(SELLER)), 10_000);
    assert_eq!(engine.collected_fees(), 0);
}

// ---------------------------------------------------------------------------
// Fee Custody End-to-End
// ---------------------------------------------------------------------------

#[test]
fn accrued_fees_flow_through_the_same_pull_payment_path() {
    let mut engine = engine_at(250);
    let mut settlement = MemorySettlement::new();
    let id = funded(&mut engine, 100_000_000);
    engine.confirm_delivery(&call(BUYER), id).unwrap();
    assert_eq!(engine.collected_fees(), 2_500_000);

    // Owner moves fees into their pending balance, then withdraws like
    // any other recipient.
    engine.withdraw_fees(&call(OWNER)).unwrap();
    assert_eq!(engine.collected_fees(), 0);
    assert_eq!(engine.pending_withdrawal(&Address::from(OWNER)), 2_500_000);

    let outcome = engine
        .withdraw_funds(&call(OWNER), &mut settlement)
        .unwrap();
    assert_eq!(outcome, WithdrawOutcome::Paid { amount: 2_500_000 });
    assert_eq!(settlement.balance(&Address::from(OWNER)), 2_500_000);
}

// ---------------------------------------------------------------------------
// Event Trail
// ---------------------------------------------------------------------------

#[test]
fn dispute_flow_emits_the_full_audit_trail() {
    let mut engine = engine_at(250);
    let id = funded(&mut engine, 10_000);
    engine.initiate_dispute(&call(SELLER), id).unwrap();
    engine.resolve_dispute(&call(ARBITER), id, true).unwrap();

    let events = engine.take_events();
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            EscrowEvent::TransactionCreated { .. } => "created",
            EscrowEvent::PaymentDeposited { .. } => "deposited",
            EscrowEvent::TransactionDisputed { .. } => "disputed",
            EscrowEvent::DisputeResolved { .. } => "resolved",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["created", "deposited", "disputed", "resolved"]);

    match &events[3] {
        EscrowEvent::DisputeResolved {
            winner,
            released_to_seller,
            amount_released,
            fee,
            ..
        } => {
            assert_eq!(winner, &Address::from(SELLER));
            assert!(released_to_seller);
            assert_eq!(*amount_released, 9_750);
            assert_eq!(*fee, 250);
        }
        other => panic!("expected DisputeResolved, got {:?}", other),
    }
}
