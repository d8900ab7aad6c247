//! Destination chain access
//!
//! [`DestinationChain`] is the seam between the relay pipeline and the
//! destination EVM chain: one read (`usedNonces`) and one write
//! (`receiveMessage` followed by a receipt wait). [`EvmDestination`] is the
//! alloy implementation.
//!
//! # Transaction Building
//!
//! Uses `ProviderBuilder::with_recommended_fillers()` so nonce, gas and fees
//! are populated automatically. Submissions for one account are serialized by
//! [`SubmissionQueue`](crate::submission::SubmissionQueue), so the pending
//! nonce read by the filler is never shared between two in-flight sends.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::{debug, info};
use url::Url;

use crate::contracts::MessageTransmitterV2;
use crate::types::SubmissionReceipt;

/// Read/write access to the destination MessageTransmitter
#[async_trait]
pub trait DestinationChain: Send + Sync {
    /// Raw `usedNonces(nonce)` value; non-zero means finalized
    async fn used_nonces(&self, transmitter: Address, nonce: B256) -> Result<U256>;

    /// Send `receiveMessage(message, attestation)` and wait for inclusion.
    /// A reverted receipt is an error.
    async fn receive_message(
        &self,
        transmitter: Address,
        message: Bytes,
        attestation: Bytes,
    ) -> Result<SubmissionReceipt>;
}

/// Destination chain client backed by an HTTP JSON-RPC endpoint and a local key
pub struct EvmDestination {
    rpc_url: Url,
    chain_id: u64,
    signer: PrivateKeySigner,
}

impl EvmDestination {
    pub fn new(rpc_url: Url, chain_id: u64, private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;

        info!(
            relayer_address = %signer.address(),
            chain_id,
            "Destination chain client initialized"
        );

        Ok(Self {
            rpc_url,
            chain_id,
            signer,
        })
    }

    /// Relay account address
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl DestinationChain for EvmDestination {
    async fn used_nonces(&self, transmitter: Address, nonce: B256) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let contract = MessageTransmitterV2::new(transmitter, &provider);

        let used = contract
            .usedNonces(nonce)
            .call()
            .await
            .map_err(|e| eyre!("usedNonces call failed: {}", e))?;

        Ok(used._0)
    }

    async fn receive_message(
        &self,
        transmitter: Address,
        message: Bytes,
        attestation: Bytes,
    ) -> Result<SubmissionReceipt> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());

        let contract = MessageTransmitterV2::new(transmitter, &provider);
        let call = contract.receiveMessage(message, attestation);

        // eth_call first so a revert surfaces with its reason before any gas is spent
        call.call()
            .await
            .map_err(|e| eyre!("receiveMessage simulation failed: {}", e))?;

        debug!(
            transmitter = %transmitter,
            chain_id = self.chain_id,
            "Submitting receiveMessage"
        );

        let pending_tx = call
            .send()
            .await
            .map_err(|e| eyre!("Failed to send receiveMessage: {}", e))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "receiveMessage sent, waiting for receipt");

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| eyre!("Failed to get receipt: {}", e))?;

        if !receipt.status() {
            return Err(eyre!("receiveMessage transaction {} reverted", tx_hash));
        }

        Ok(SubmissionReceipt {
            tx_hash,
            block_number: receipt.block_number,
        })
    }
}
