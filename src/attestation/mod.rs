//! Attestation polling
//!
//! [`AttestationClient::fetch`] polls the attestation service for one burn
//! transaction until it reports a complete attestation or the attempt budget
//! runs out. The policy is a fixed interval bounded by attempt count, and each
//! request carries its own timeout.
//!
//! Anything short of a complete attestation (no messages, pending status,
//! malformed body, HTTP error, timeout) is "not yet": logged and retried.
//! A complete entry only needs a non-empty attestation. A missing `message`
//! becomes empty bytes and a missing `eventNonce` skips the finalization
//! check; a bad payload then fails at submission.

pub mod iris;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Bytes, B256};
use async_trait::async_trait;
use eyre::Result;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::idempotency::IdempotencyOracle;
use crate::metrics::RelayMetrics;
use crate::types::{AttestationRecord, DecodedBody, ProtocolNonce};

pub use iris::{AttestationMessage, IrisClient, MessagesResponse};

/// One query against the attestation service
#[async_trait]
pub trait AttestationSource: Send + Sync {
    async fn query(&self, source_domain: u32, tx_hash: B256) -> Result<MessagesResponse>;
}

/// Polling policy for one fetch
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,
    /// Total attempts before giving up
    pub max_attempts: u32,
    /// Timeout applied to each individual request
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            max_attempts: 60,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of inspecting one attestation response
#[derive(Debug)]
enum PollStatus {
    NoMessages,
    Pending(String),
    Malformed(String),
    /// Transport error or timeout, already logged
    Unavailable,
    Ready(ReadyAttestation),
}

#[derive(Debug)]
struct ReadyAttestation {
    message: Bytes,
    attestation: Bytes,
    nonce: Option<ProtocolNonce>,
    decoded: Option<DecodedBody>,
}

/// Polls the attestation service and decorates complete attestations with the
/// destination-side finalization state
#[derive(Clone)]
pub struct AttestationClient {
    source: Arc<dyn AttestationSource>,
    oracle: IdempotencyOracle,
    destination_domain: u32,
    metrics: Arc<RelayMetrics>,
}

impl AttestationClient {
    pub fn new(
        source: Arc<dyn AttestationSource>,
        oracle: IdempotencyOracle,
        destination_domain: u32,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            source,
            oracle,
            destination_domain,
            metrics,
        }
    }

    /// Poll until a complete attestation is available for `tx_hash`
    pub async fn fetch(
        &self,
        source_domain: u32,
        tx_hash: B256,
        policy: &PollPolicy,
    ) -> Result<AttestationRecord, RelayError> {
        let max_attempts = policy.max_attempts;

        for attempt in 1..=max_attempts {
            self.metrics.attestation_attempts_total.inc();

            let status = match tokio::time::timeout(
                policy.request_timeout,
                self.source.query(source_domain, tx_hash),
            )
            .await
            {
                Ok(Ok(response)) => inspect_response(&response),
                Ok(Err(e)) => {
                    warn!(
                        tx_hash = %tx_hash,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Error fetching attestation"
                    );
                    PollStatus::Unavailable
                }
                Err(_) => {
                    warn!(
                        tx_hash = %tx_hash,
                        attempt,
                        max_attempts,
                        timeout_ms = policy.request_timeout.as_millis() as u64,
                        "Attestation request timed out"
                    );
                    PollStatus::Unavailable
                }
            };

            match status {
                PollStatus::Ready(ready) => {
                    info!(
                        tx_hash = %tx_hash,
                        nonce = ?ready.nonce,
                        message_len = ready.message.len(),
                        attempt,
                        "Attestation received"
                    );
                    let already_finalized = match &ready.nonce {
                        Some(nonce) => {
                            self.oracle
                                .is_finalized(self.destination_domain, nonce)
                                .await
                        }
                        None => {
                            warn!(
                                tx_hash = %tx_hash,
                                "Attestation has no usable eventNonce, skipping finalization check"
                            );
                            false
                        }
                    };
                    return Ok(AttestationRecord {
                        message: ready.message,
                        attestation: ready.attestation,
                        nonce: ready.nonce,
                        decoded: ready.decoded,
                        already_finalized,
                    });
                }
                PollStatus::Pending(status) => {
                    info!(
                        tx_hash = %tx_hash,
                        status = %status,
                        attempt,
                        max_attempts,
                        "Attestation not ready, waiting"
                    );
                }
                PollStatus::NoMessages => {
                    info!(
                        tx_hash = %tx_hash,
                        attempt,
                        max_attempts,
                        "No messages found yet, waiting"
                    );
                }
                PollStatus::Malformed(reason) => {
                    warn!(
                        tx_hash = %tx_hash,
                        attempt,
                        max_attempts,
                        reason = %reason,
                        "Malformed attestation response"
                    );
                }
                PollStatus::Unavailable => {}
            }

            if attempt < max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        Err(RelayError::AttestationTimeout {
            attempts: max_attempts,
        })
    }
}

/// Classify the first message of a response
fn inspect_response(response: &MessagesResponse) -> PollStatus {
    let Some(msg) = response.messages.first() else {
        return PollStatus::NoMessages;
    };

    let attestation = msg
        .attestation
        .as_deref()
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("PENDING"));

    let attestation = match (msg.status.as_str(), attestation) {
        (iris::STATUS_COMPLETE, Some(a)) => a,
        (status, _) => return PollStatus::Pending(status.to_string()),
    };

    let attestation = match decode_hex(attestation) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => return PollStatus::Pending(msg.status.clone()),
        Err(e) => return PollStatus::Malformed(format!("attestation: {e}")),
    };

    let message = match msg.message.as_deref().map(decode_hex) {
        Some(Ok(bytes)) => bytes,
        Some(Err(e)) => {
            debug!(error = %e, "Undecodable message bytes, submitting empty message");
            Bytes::new()
        }
        None => Bytes::new(),
    };

    let nonce = match msg.event_nonce.as_deref().map(str::parse::<ProtocolNonce>) {
        Some(Ok(nonce)) => Some(nonce),
        Some(Err(e)) => {
            debug!(error = %e, "Unparsable eventNonce");
            None
        }
        None => None,
    };

    let decoded = msg
        .decoded_message
        .as_ref()
        .and_then(|d| d.decoded_message_body.as_ref())
        .map(|body| DecodedBody {
            amount: body.amount.clone(),
            mint_recipient: body.mint_recipient.clone(),
        });

    PollStatus::Ready(ReadyAttestation {
        message,
        attestation,
        nonce,
        decoded,
    })
}

fn decode_hex(raw: &str) -> std::result::Result<Bytes, hex::FromHexError> {
    hex::decode(raw.trim_start_matches("0x")).map(Bytes::from)
}
