//! Common types for the CCTP relay pipeline
//!
//! Burn events observed on the source chain, attestation records returned by
//! the attestation service, and the terminal outcome of a completion attempt.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

// ============================================================================
// Source Chain
// ============================================================================

/// Transfer speed requested by the depositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedClass {
    Fast,
    Standard,
}

impl SpeedClass {
    /// Map the raw `uint8 speed` event field (0 = fast, anything else = standard)
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            SpeedClass::Fast
        } else {
            SpeedClass::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedClass::Fast => "fast",
            SpeedClass::Standard => "standard",
        }
    }
}

impl fmt::Display for SpeedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge event emitted by the source-chain bridge contract
///
/// Event: Bridge(address indexed token, uint32 indexed destinationDomain,
///               address indexed receiver, uint256 amount, uint64 nonce, uint8 speed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnEvent {
    /// Source token address
    pub token: Address,
    /// CCTP domain the value is bridged to
    pub destination_domain: u32,
    /// Receiver on the destination chain
    pub receiver: Address,
    /// Amount burned
    pub amount: U256,
    /// Bridge contract nonce (not the attestation service nonce)
    pub nonce: u64,
    /// Requested speed
    pub speed: SpeedClass,
    /// Burn transaction hash, used to look up the attestation
    pub source_tx_hash: B256,
    /// Block the log was included in
    pub block_number: Option<u64>,
    /// Log index within the block
    pub log_index: Option<u64>,
}

// ============================================================================
// Attestation
// ============================================================================

/// Nonce assigned by the attestation service (`eventNonce`)
///
/// Used as the `bytes32` key of `usedNonces` on the destination
/// MessageTransmitter. Distinct from [`BurnEvent::nonce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolNonce(pub B256);

impl ProtocolNonce {
    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl FromStr for ProtocolNonce {
    type Err = String;

    /// Accepts a 0x-prefixed 32-byte hex string or a decimal integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            let value = U256::from_str_radix(&s[2..], 16)
                .map_err(|e| format!("invalid hex nonce {s:?}: {e}"))?;
            return Ok(Self(B256::from(value)));
        }
        let value =
            U256::from_str_radix(s, 10).map_err(|e| format!("invalid nonce {s:?}: {e}"))?;
        Ok(Self(B256::from(value)))
    }
}

impl fmt::Display for ProtocolNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded burn message body reported by the attestation service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBody {
    pub amount: Option<String>,
    pub mint_recipient: Option<String>,
}

/// A complete attestation for one burn transaction
#[derive(Debug, Clone)]
pub struct AttestationRecord {
    /// Raw CCTP message bytes
    pub message: Bytes,
    /// Attestation signature bytes
    pub attestation: Bytes,
    /// Service-assigned nonce; `None` when the service omitted it
    pub nonce: Option<ProtocolNonce>,
    /// Decoded body, when the service provides it
    pub decoded: Option<DecodedBody>,
    /// Nonce was already used on the destination chain when fetched
    pub already_finalized: bool,
}

// ============================================================================
// Outcome
// ============================================================================

/// Receipt handle for a confirmed receiveMessage transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Terminal result of one completion attempt
#[derive(Debug)]
pub enum TransferOutcome {
    /// receiveMessage was included successfully
    Confirmed { receipt: SubmissionReceipt },
    /// The nonce was already used on the destination chain
    AlreadyFinalized,
    /// The transfer could not be completed
    Failed { reason: RelayError },
}

impl TransferOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            TransferOutcome::Confirmed { .. } => "confirmed",
            TransferOutcome::AlreadyFinalized => "already_finalized",
            TransferOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransferOutcome::Failed { .. })
    }
}

/// Parse a burn transaction hash given on the command line
pub fn parse_tx_hash(raw: &str) -> Result<B256, RelayError> {
    let trimmed = raw.trim();
    if trimmed.len() != 66 || !trimmed.starts_with("0x") {
        return Err(RelayError::MalformedTxHash(raw.to_string()));
    }
    B256::from_str(trimmed).map_err(|_| RelayError::MalformedTxHash(raw.to_string()))
}
