//! Destination-side idempotency checks
//!
//! Answers "has this protocol nonce already been consumed on the destination
//! chain?". Used before submitting and again after a failed submission.
//! Every uncertain answer (unsupported domain, RPC error) is reported as
//! `false`: the worst case is a redundant submission that the
//! MessageTransmitter rejects.

use std::sync::Arc;

use alloy::primitives::U256;
use tracing::{debug, warn};

use crate::chain::DestinationChain;
use crate::domains::DomainRegistry;
use crate::types::ProtocolNonce;

#[derive(Clone)]
pub struct IdempotencyOracle {
    registry: Arc<DomainRegistry>,
    chain: Arc<dyn DestinationChain>,
}

impl IdempotencyOracle {
    pub fn new(registry: Arc<DomainRegistry>, chain: Arc<dyn DestinationChain>) -> Self {
        Self { registry, chain }
    }

    /// Whether `nonce` is already used on `domain`'s MessageTransmitter
    pub async fn is_finalized(&self, domain: u32, nonce: &ProtocolNonce) -> bool {
        let Some(transmitter) = self.registry.transmitter_for(domain) else {
            warn!(
                domain,
                nonce = %nonce,
                "No message transmitter for domain, assuming nonce is unused"
            );
            return false;
        };

        match self.chain.used_nonces(transmitter, nonce.as_b256()).await {
            Ok(used) => {
                debug!(
                    domain,
                    transmitter = %transmitter,
                    nonce = %nonce,
                    used = %used,
                    "usedNonces result"
                );
                used > U256::ZERO
            }
            Err(e) => {
                warn!(
                    domain,
                    nonce = %nonce,
                    error = %e,
                    "Failed to read usedNonces, assuming nonce is unused"
                );
                false
            }
        }
    }
}
