//! Circle Iris attestation API client
//!
//! `GET {host}/v2/messages/{sourceDomain}?transactionHash={hash}`

use std::time::Duration;

use alloy::primitives::B256;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::AttestationSource;

/// Production attestation host
pub const IRIS_API_MAINNET: &str = "https://iris-api.circle.com";
/// Sandbox attestation host
pub const IRIS_API_SANDBOX: &str = "https://iris-api-sandbox.circle.com";

/// Terminal status of a message
pub const STATUS_COMPLETE: &str = "complete";

/// Response body of the messages endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub messages: Vec<AttestationMessage>,
}

/// One message entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMessage {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub attestation: Option<String>,
    #[serde(default)]
    pub event_nonce: Option<String>,
    #[serde(default)]
    pub decoded_message: Option<DecodedMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedMessage {
    #[serde(default)]
    pub decoded_message_body: Option<DecodedMessageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedMessageBody {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub mint_recipient: Option<String>,
}

/// HTTP client for the Iris API
#[derive(Debug, Clone)]
pub struct IrisClient {
    host: String,
    client: Client,
}

impl IrisClient {
    /// Client for the production or sandbox host
    pub fn for_environment(testnet: bool) -> Result<Self> {
        let host = if testnet { IRIS_API_SANDBOX } else { IRIS_API_MAINNET };
        Self::with_host(host)
    }

    /// Client for an explicit host (no trailing slash required)
    pub fn with_host(host: &str) -> Result<Self> {
        // Upper bound only; the poller applies the configured per-request timeout
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// URL queried for a burn transaction
    pub fn messages_url(&self, source_domain: u32, tx_hash: B256) -> String {
        format!(
            "{}/v2/messages/{}?transactionHash={}",
            self.host, source_domain, tx_hash
        )
    }
}

#[async_trait]
impl AttestationSource for IrisClient {
    async fn query(&self, source_domain: u32, tx_hash: B256) -> Result<MessagesResponse> {
        let url = self.messages_url(source_domain, tx_hash);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("Attestation request failed")?;

        // Iris answers 404 until it has indexed the burn
        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = %url, "Attestation service has no messages yet");
            return Ok(MessagesResponse::default());
        }

        if !response.status().is_success() {
            return Err(eyre!("Attestation API returned status {}", response.status()));
        }

        response
            .json::<MessagesResponse>()
            .await
            .wrap_err("Failed to parse attestation response")
    }
}
