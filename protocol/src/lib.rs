// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # VELA Protocol — Core Library
//!
//! VELA is an escrowed-settlement protocol: a buyer commits funds toward a
//! purchase, a seller delivers, and the funds leave custody only on the
//! buyer's explicit confirmation or an arbitrator's ruling. No timeouts, no
//! partial payments, no multi-party committees — one buyer, one seller, one
//! arbitrator, one indivisible amount per transaction.
//!
//! The interesting part is not the state machine (five states, you can draw
//! it on a napkin) but keeping custody honest while adversaries call every
//! operation in every order: funds must never be lost, double-released, or
//! moved outside the defined transitions. VELA holds that line with two
//! disciplines:
//!
//! 1. **Guards before mutations.** Every operation validates everything it
//!    will ever reject *before* touching state, so an error return means
//!    nothing changed.
//! 2. **Pull payments.** Outbound transfers are never made inside a state
//!    transition. Completions and refunds only credit an internal
//!    withdrawal ledger; the recipient triggers the actual transfer later,
//!    and that transfer happens strictly after their balance is zeroed.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and bounds. One home for every magic
//!   number.
//! - **runtime** — The seam to the embedding ledger runtime: caller
//!   identity, attached value, timestamps, outbound settlement, and the
//!   ownership capability.
//! - **escrow** — The core: transaction store, fee policy, withdrawal
//!   ledger, audit events, and the engine that ties them together.

pub mod config;
pub mod escrow;
pub mod runtime;
