//! Transfer completion
//!
//! Drives one burn transaction from attestation to destination-chain
//! finalization:
//!
//! ```text
//! Start -> FetchingAttestation -> AlreadyFinalizedPre
//!                              -> ReadyToSubmit -> Submitting -> Confirmed
//!                                                             -> AlreadyFinalizedPost
//!                                                             -> Failed
//! ```
//!
//! The nonce is checked twice: before submitting (inside the attestation
//! fetch) and again when a submission fails. A failed submission whose nonce
//! turns out to be used lost a race to another relayer and is reported as
//! `AlreadyFinalized`, not as a failure.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::B256;
use tracing::{debug, error, info, warn};

use crate::attestation::{AttestationClient, PollPolicy};
use crate::domains::DomainRegistry;
use crate::error::RelayError;
use crate::idempotency::IdempotencyOracle;
use crate::metrics::RelayMetrics;
use crate::submission::SubmissionQueue;
use crate::types::TransferOutcome;

/// Per-transfer state, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Start,
    FetchingAttestation,
    AlreadyFinalizedPre,
    ReadyToSubmit,
    Submitting,
    Confirmed,
    AlreadyFinalizedPost,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Start => "start",
            TransferState::FetchingAttestation => "fetching_attestation",
            TransferState::AlreadyFinalizedPre => "already_finalized_pre",
            TransferState::ReadyToSubmit => "ready_to_submit",
            TransferState::Submitting => "submitting",
            TransferState::Confirmed => "confirmed",
            TransferState::AlreadyFinalizedPost => "already_finalized_post",
            TransferState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Completes transfers from one source domain into one destination domain
#[derive(Clone)]
pub struct TransferCompleter {
    attestation: AttestationClient,
    oracle: IdempotencyOracle,
    registry: Arc<DomainRegistry>,
    queue: SubmissionQueue,
    source_domain: u32,
    destination_domain: u32,
    policy: PollPolicy,
    metrics: Arc<RelayMetrics>,
}

impl TransferCompleter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        attestation: AttestationClient,
        oracle: IdempotencyOracle,
        registry: Arc<DomainRegistry>,
        queue: SubmissionQueue,
        source_domain: u32,
        destination_domain: u32,
        policy: PollPolicy,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            attestation,
            oracle,
            registry,
            queue,
            source_domain,
            destination_domain,
            policy,
            metrics,
        }
    }

    pub fn source_domain(&self) -> u32 {
        self.source_domain
    }

    pub fn destination_domain(&self) -> u32 {
        self.destination_domain
    }

    /// Complete the transfer started by `burn_tx_hash`
    ///
    /// Never returns an error: every failure is folded into
    /// [`TransferOutcome::Failed`].
    pub async fn complete(&self, burn_tx_hash: B256) -> TransferOutcome {
        self.metrics.transfers_in_flight.inc();
        let outcome = self.run(burn_tx_hash).await;
        self.metrics.transfers_in_flight.dec();
        self.metrics.record_outcome(outcome.kind());
        outcome
    }

    async fn run(&self, burn_tx_hash: B256) -> TransferOutcome {
        let mut state = TransferState::Start;
        transition(&mut state, TransferState::FetchingAttestation, burn_tx_hash);

        let record = match self
            .attestation
            .fetch(self.source_domain, burn_tx_hash, &self.policy)
            .await
        {
            Ok(record) => record,
            Err(reason) => {
                transition(&mut state, TransferState::Failed, burn_tx_hash);
                return TransferOutcome::Failed { reason };
            }
        };

        if let Some(decoded) = &record.decoded {
            info!(
                tx_hash = %burn_tx_hash,
                amount = decoded.amount.as_deref().unwrap_or("-"),
                mint_recipient = decoded.mint_recipient.as_deref().unwrap_or("-"),
                "Decoded transfer"
            );
        }

        if record.already_finalized {
            transition(&mut state, TransferState::AlreadyFinalizedPre, burn_tx_hash);
            return TransferOutcome::AlreadyFinalized;
        }
        transition(&mut state, TransferState::ReadyToSubmit, burn_tx_hash);

        let Some(transmitter) = self.registry.transmitter_for(self.destination_domain) else {
            transition(&mut state, TransferState::Failed, burn_tx_hash);
            return TransferOutcome::Failed {
                reason: RelayError::UnsupportedDomain(self.destination_domain),
            };
        };

        transition(&mut state, TransferState::Submitting, burn_tx_hash);
        self.metrics.submissions_total.inc();

        match self
            .queue
            .submit(transmitter, record.message, record.attestation)
            .await
        {
            Ok(receipt) => {
                transition(&mut state, TransferState::Confirmed, burn_tx_hash);
                TransferOutcome::Confirmed { receipt }
            }
            Err(e) => {
                warn!(
                    tx_hash = %burn_tx_hash,
                    nonce = ?record.nonce,
                    error = %e,
                    "Submission failed, re-checking nonce"
                );
                let finalized = match &record.nonce {
                    Some(nonce) => {
                        self.oracle
                            .is_finalized(self.destination_domain, nonce)
                            .await
                    }
                    None => false,
                };
                if finalized {
                    transition(&mut state, TransferState::AlreadyFinalizedPost, burn_tx_hash);
                    TransferOutcome::AlreadyFinalized
                } else {
                    transition(&mut state, TransferState::Failed, burn_tx_hash);
                    TransferOutcome::Failed {
                        reason: RelayError::Submission(e.to_string()),
                    }
                }
            }
        }
    }
}

fn transition(state: &mut TransferState, next: TransferState, tx_hash: B256) {
    debug!(tx_hash = %tx_hash, from = %state, to = %next, "Transfer state");
    *state = next;
}

/// Log the terminal outcome of a transfer
pub fn report_outcome(burn_tx_hash: B256, outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Confirmed { receipt } => info!(
            tx_hash = %burn_tx_hash,
            outcome = outcome.kind(),
            dest_tx_hash = %receipt.tx_hash,
            dest_block = receipt.block_number,
            "Transfer completed"
        ),
        TransferOutcome::AlreadyFinalized => info!(
            tx_hash = %burn_tx_hash,
            outcome = outcome.kind(),
            "Transfer already finalized on destination"
        ),
        TransferOutcome::Failed { reason } => error!(
            tx_hash = %burn_tx_hash,
            outcome = outcome.kind(),
            reason = %reason,
            "Transfer failed"
        ),
    }
}
