//! # Protocol Configuration & Constants
//!
//! Every magic number in VELA lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol fingerprint for network identification. Used in status
/// responses so tooling can tell a VELA deployment from its siblings.
pub const PROTOCOL_FINGERPRINT: &str = "ALAS-VELA-2026";

/// The full version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Value Denomination
// ---------------------------------------------------------------------------

/// Value precision — number of decimal places in the settlement currency.
/// 8 decimals, same as Bitcoin. We're not reinventing this wheel.
pub const VALUE_DECIMALS: u8 = 8;

/// Smallest units ("photons") per whole settlement unit.
pub const PHOTONS_PER_UNIT: u64 = 100_000_000;

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Basis-point denominator: 10_000 bps = 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Hard upper bound on the protocol fee rate: 1_000 bps = 10%. The owner
/// capability can retune the rate at will below this line, never above it.
pub const MAX_FEE_RATE_BPS: u32 = 1_000;

/// Default fee rate for fresh deployments: 250 bps = 2.5%.
pub const DEFAULT_FEE_RATE_BPS: u32 = 250;

// ---------------------------------------------------------------------------
// Network Parameters
// ---------------------------------------------------------------------------

/// Default REST/WebSocket API port.
pub const DEFAULT_RPC_PORT: u16 = 9751;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9752;
