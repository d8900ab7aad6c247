//! Relay error taxonomy
//!
//! Configuration errors abort the process before any network activity.
//! Everything else is a per-transfer failure that ends up inside a
//! [`TransferOutcome::Failed`](crate::types::TransferOutcome) and never
//! escapes the watcher loop.

use thiserror::Error;

/// Errors surfaced by the relay pipeline
#[derive(Debug, Error)]
pub enum RelayError {
    /// Chain id is not present in the domain table
    #[error("unknown chain id: {0}")]
    UnknownChain(u64),

    /// Transaction hash is not a 0x-prefixed 32-byte hex string
    #[error("malformed transaction hash: {0:?}")]
    MalformedTxHash(String),

    /// Any other invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attestation service never reported a complete attestation
    #[error("attestation not available after {attempts} attempts")]
    AttestationTimeout { attempts: u32 },

    /// Destination domain has no known finalization contract
    #[error("no message transmitter configured for domain {0}")]
    UnsupportedDomain(u32),

    /// receiveMessage reverted or could not be sent, and the nonce is still unused
    #[error("submission failed: {0}")]
    Submission(String),
}

impl RelayError {
    /// Whether this error is a fatal configuration problem
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RelayError::UnknownChain(_)
                | RelayError::MalformedTxHash(_)
                | RelayError::InvalidConfig(_)
        )
    }
}
