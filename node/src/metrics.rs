//! # Prometheus Metrics
//!
//! Exposes operational metrics for the escrow node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers. Counters
//! and gauges are driven entirely by the engine's audit events — one
//! [`record`](EscrowMetrics::record) call per drained event keeps the
//! gauges in lockstep with custody.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use vela_protocol::escrow::EscrowEvent;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc` internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct EscrowMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total escrow transactions created.
    pub transactions_created_total: IntCounter,
    /// Total deposits taken into custody.
    pub payments_deposited_total: IntCounter,
    /// Total buyer delivery confirmations.
    pub deliveries_confirmed_total: IntCounter,
    /// Total disputes opened.
    pub disputes_opened_total: IntCounter,
    /// Total arbitrator rulings.
    pub disputes_resolved_total: IntCounter,
    /// Total transactions refunded to their buyer.
    pub transactions_refunded_total: IntCounter,
    /// Total successful outbound payouts.
    pub payments_released_total: IntCounter,
    /// Total failed outbound payouts (balance restored).
    pub withdrawal_failures_total: IntCounter,
    /// Total owner configuration changes (arbitrator or fee rate).
    pub config_changes_total: IntCounter,
    /// Value currently escrowed in non-terminal transactions, in photons.
    pub escrowed_value_photons: IntGauge,
    /// Value currently owed via the withdrawal ledger, in photons.
    pub pending_withdrawals_photons: IntGauge,
    /// Accrued, not-yet-withdrawn protocol fees, in photons.
    pub collected_fees_photons: IntGauge,
}

impl EscrowMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("vela".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
            let g = IntGauge::new(name, help).expect("metric creation");
            registry.register(Box::new(g.clone())).expect("metric registration");
            g
        }

        Self {
            transactions_created_total: counter(
                &registry,
                "transactions_created_total",
                "Total escrow transactions created",
            ),
            payments_deposited_total: counter(
                &registry,
                "payments_deposited_total",
                "Total deposits taken into escrow custody",
            ),
            deliveries_confirmed_total: counter(
                &registry,
                "deliveries_confirmed_total",
                "Total buyer delivery confirmations",
            ),
            disputes_opened_total: counter(
                &registry,
                "disputes_opened_total",
                "Total disputes opened by buyers or sellers",
            ),
            disputes_resolved_total: counter(
                &registry,
                "disputes_resolved_total",
                "Total arbitrator rulings",
            ),
            transactions_refunded_total: counter(
                &registry,
                "transactions_refunded_total",
                "Total transactions refunded in full to their buyer",
            ),
            payments_released_total: counter(
                &registry,
                "payments_released_total",
                "Total successful outbound payouts",
            ),
            withdrawal_failures_total: counter(
                &registry,
                "withdrawal_failures_total",
                "Total failed outbound payouts (pending balance restored)",
            ),
            config_changes_total: counter(
                &registry,
                "config_changes_total",
                "Total owner configuration changes",
            ),
            escrowed_value_photons: gauge(
                &registry,
                "escrowed_value_photons",
                "Value currently escrowed in non-terminal transactions",
            ),
            pending_withdrawals_photons: gauge(
                &registry,
                "pending_withdrawals_photons",
                "Value currently owed via the withdrawal ledger",
            ),
            collected_fees_photons: gauge(
                &registry,
                "collected_fees_photons",
                "Accrued, not-yet-withdrawn protocol fees",
            ),
            registry,
        }
    }

    /// Folds one audit event into the counters and custody gauges.
    pub fn record(&self, event: &EscrowEvent) {
        match event {
            EscrowEvent::TransactionCreated { .. } => {
                self.transactions_created_total.inc();
            }
            EscrowEvent::PaymentDeposited { amount, .. } => {
                self.payments_deposited_total.inc();
                self.escrowed_value_photons.add(*amount as i64);
            }
            EscrowEvent::DeliveryConfirmed {
                seller_net, fee, ..
            } => {
                self.deliveries_confirmed_total.inc();
                self.escrowed_value_photons.sub((seller_net + fee) as i64);
                self.pending_withdrawals_photons.add(*seller_net as i64);
                self.collected_fees_photons.add(*fee as i64);
            }
            EscrowEvent::TransactionDisputed { .. } => {
                self.disputes_opened_total.inc();
            }
            EscrowEvent::DisputeResolved {
                amount_released,
                fee,
                ..
            } => {
                self.disputes_resolved_total.inc();
                self.escrowed_value_photons.sub((amount_released + fee) as i64);
                self.pending_withdrawals_photons.add(*amount_released as i64);
                self.collected_fees_photons.add(*fee as i64);
            }
            // Custody movement for a refund is carried by the paired
            // DisputeResolved event; this one only counts.
            EscrowEvent::TransactionRefunded { .. } => {
                self.transactions_refunded_total.inc();
            }
            EscrowEvent::ArbitratorChanged { .. } | EscrowEvent::FeeRateChanged { .. } => {
                self.config_changes_total.inc();
            }
            EscrowEvent::FeesWithdrawn { amount, .. } => {
                self.collected_fees_photons.sub(*amount as i64);
                self.pending_withdrawals_photons.add(*amount as i64);
            }
            EscrowEvent::PaymentReleased { amount, .. } => {
                self.payments_released_total.inc();
                self.pending_withdrawals_photons.sub(*amount as i64);
            }
            EscrowEvent::WithdrawalFailed { .. } => {
                self.withdrawal_failures_total.inc();
            }
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<EscrowMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
