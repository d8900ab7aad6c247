//! Per-account submission queue
//!
//! All `receiveMessage` transactions from the relay account go through a single
//! worker task, one at a time, so concurrent transfers never race on the
//! account's transaction nonce. Callers await a oneshot reply carrying the
//! receipt or the send/revert error.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use eyre::{eyre, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::chain::DestinationChain;
use crate::types::SubmissionReceipt;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A queued receiveMessage request
struct SubmissionRequest {
    transmitter: Address,
    message: Bytes,
    attestation: Bytes,
    reply: oneshot::Sender<Result<SubmissionReceipt>>,
}

/// Handle to the submission worker for one destination account
#[derive(Clone)]
pub struct SubmissionQueue {
    tx: mpsc::Sender<SubmissionRequest>,
}

impl SubmissionQueue {
    /// Spawn the worker task. It exits once every handle has been dropped.
    pub fn spawn(chain: Arc<dyn DestinationChain>) -> Self {
        Self::with_capacity(chain, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(chain: Arc<dyn DestinationChain>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run_worker(chain, rx));
        Self { tx }
    }

    /// Submit and wait for the receipt
    pub async fn submit(
        &self,
        transmitter: Address,
        message: Bytes,
        attestation: Bytes,
    ) -> Result<SubmissionReceipt> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(SubmissionRequest {
                transmitter,
                message,
                attestation,
                reply,
            })
            .await
            .map_err(|_| eyre!("Submission queue is closed"))?;

        response
            .await
            .map_err(|_| eyre!("Submission worker dropped the request"))?
    }
}

async fn run_worker(chain: Arc<dyn DestinationChain>, mut rx: mpsc::Receiver<SubmissionRequest>) {
    debug!("Submission worker started");
    let mut processed = 0u64;

    while let Some(request) = rx.recv().await {
        let result = chain
            .receive_message(request.transmitter, request.message, request.attestation)
            .await;
        processed += 1;
        // Caller may have gone away; the transaction outcome is already final
        let _ = request.reply.send(result);
    }

    info!(processed, "Submission worker stopped");
}
