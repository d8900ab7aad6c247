//! Prometheus metrics for the relayer
//!
//! Exposed on `/metrics` by [`crate::server`] when a metrics port is configured.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct RelayMetrics {
    /// Completed transfers by outcome kind
    pub outcomes_total: IntCounterVec,
    /// Attestation service polls
    pub attestation_attempts_total: IntCounter,
    /// Bridge events decoded from the source chain
    pub burn_events_total: IntCounter,
    /// receiveMessage transactions handed to the submission queue
    pub submissions_total: IntCounter,
    /// Transfers currently being completed
    pub transfers_in_flight: IntGauge,
    /// Last source block scanned by the watcher
    pub last_source_block: IntGauge,
    pub registry: Registry,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "cctp_relayer_transfer_outcomes_total",
                "Completed transfers by outcome",
            ),
            &["outcome"],
        )
        .expect("constant metric name is valid");

        let attestation_attempts_total = IntCounter::new(
            "cctp_relayer_attestation_attempts_total",
            "Total attestation service polls",
        )
        .expect("constant metric name is valid");

        let burn_events_total = IntCounter::new(
            "cctp_relayer_burn_events_total",
            "Total Bridge events observed on the source chain",
        )
        .expect("constant metric name is valid");

        let submissions_total = IntCounter::new(
            "cctp_relayer_submissions_total",
            "Total receiveMessage submissions attempted",
        )
        .expect("constant metric name is valid");

        let transfers_in_flight = IntGauge::new(
            "cctp_relayer_transfers_in_flight",
            "Transfers currently being completed",
        )
        .expect("constant metric name is valid");

        let last_source_block = IntGauge::new(
            "cctp_relayer_last_source_block",
            "Last source chain block scanned for Bridge events",
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration runs once per instance
        registry
            .register(Box::new(outcomes_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(attestation_attempts_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(burn_events_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(submissions_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(transfers_in_flight.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(last_source_block.clone()))
            .expect("metric registration must not be called twice");

        Self {
            outcomes_total,
            attestation_attempts_total,
            burn_events_total,
            submissions_total,
            transfers_in_flight,
            last_source_block,
            registry,
        }
    }

    pub fn record_outcome(&self, kind: &str) {
        self.outcomes_total.with_label_values(&[kind]).inc();
    }

    pub fn outcome_count(&self, kind: &str) -> u64 {
        self.outcomes_total.with_label_values(&[kind]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counter() {
        let metrics = RelayMetrics::new();
        metrics.record_outcome("confirmed");
        metrics.record_outcome("confirmed");
        metrics.record_outcome("failed");
        assert_eq!(metrics.outcome_count("confirmed"), 2);
        assert_eq!(metrics.outcome_count("failed"), 1);
        assert_eq!(metrics.outcome_count("already_finalized"), 0);
    }

    #[test]
    fn test_registry_gathers_all_families() {
        let metrics = RelayMetrics::new();
        metrics.record_outcome("confirmed");
        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"cctp_relayer_transfer_outcomes_total".to_string()));
        assert!(names.contains(&"cctp_relayer_attestation_attempts_total".to_string()));
    }
}
