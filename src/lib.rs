//! CCTP V2 Transfer Relayer - Library interface
//!
//! Completes burn-and-mint transfers: fetches the attestation for a source
//! chain burn and submits `receiveMessage` on the destination chain, either
//! for one transaction or for every Bridge event a watched contract emits.
//!
//! Re-exports internal modules for use in integration tests.

pub mod attestation;
pub mod bounded_cache;
pub mod chain;
pub mod completer;
pub mod config;
pub mod contracts;
pub mod domains;
pub mod error;
pub mod idempotency;
pub mod metrics;
pub mod server;
pub mod submission;
pub mod types;
pub mod watcher;

pub use attestation::{AttestationClient, AttestationSource, IrisClient, PollPolicy};
pub use chain::{DestinationChain, EvmDestination};
pub use completer::{report_outcome, TransferCompleter};
pub use domains::DomainRegistry;
pub use error::RelayError;
pub use idempotency::IdempotencyOracle;
pub use submission::SubmissionQueue;
pub use types::{AttestationRecord, BurnEvent, ProtocolNonce, TransferOutcome};
pub use watcher::{BurnEventSource, BurnEventWatcher, EvmBurnSource, WatcherConfig};
