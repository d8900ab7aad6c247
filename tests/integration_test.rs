//! Integration tests for the relay pipeline
//!
//! Run with: cargo test --test integration_test -- --nocapture
//!
//! The attestation service is a local axum server; the destination chain is an
//! in-process fake. No external network access is needed.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use cctp_relayer::attestation::{AttestationClient, AttestationSource, IrisClient, PollPolicy};
use cctp_relayer::completer::TransferCompleter;
use cctp_relayer::domains::DomainRegistry;
use cctp_relayer::error::RelayError;
use cctp_relayer::idempotency::IdempotencyOracle;
use cctp_relayer::metrics::RelayMetrics;
use cctp_relayer::submission::SubmissionQueue;
use cctp_relayer::types::{BurnEvent, SpeedClass, TransferOutcome};
use cctp_relayer::watcher::{BurnEventSource, BurnEventWatcher, WatcherConfig};

mod helpers {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use alloy::primitives::{Address, Bytes, B256, U256};
    use async_trait::async_trait;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use cctp_relayer::chain::DestinationChain;
    use cctp_relayer::types::SubmissionReceipt;
    use eyre::{eyre, Result};
    use serde_json::{json, Value};

    /// One scripted reply of the fake attestation service
    #[derive(Clone)]
    pub enum Reply {
        NotFound,
        ServerError,
        Pending,
        Complete,
        /// Complete entry with only status, attestation and eventNonce
        CompleteMinimal,
        Slow(Duration),
    }

    #[derive(Clone)]
    pub struct IrisState {
        pub script: Arc<Vec<Reply>>,
        pub calls: Arc<AtomicUsize>,
        pub seen: Arc<Mutex<Vec<(u32, String)>>>,
    }

    pub fn complete_body() -> Value {
        json!({
            "messages": [{
                "message": "0x00000001000000000000000600",
                "eventNonce": "123",
                "attestation": "0xAA",
                "status": "complete",
                "decodedMessage": {
                    "decodedMessageBody": {
                        "amount": "1000000",
                        "mintRecipient": "0x000000000000000000000000742d35cc6634c0532925a3b844bc9e7595f8fa0d"
                    }
                }
            }]
        })
    }

    async fn messages(
        State(state): State<IrisState>,
        Path(domain): Path<u32>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        let n = state.calls.fetch_add(1, Ordering::SeqCst);
        state.seen.lock().unwrap().push((
            domain,
            params.get("transactionHash").cloned().unwrap_or_default(),
        ));

        let reply = state
            .script
            .get(n)
            .or_else(|| state.script.last())
            .cloned()
            .unwrap_or(Reply::NotFound);

        match reply {
            Reply::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            Reply::ServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream error").into_response()
            }
            Reply::Pending => Json(json!({"messages": [{"status": "pending"}]})).into_response(),
            Reply::Complete => Json(complete_body()).into_response(),
            Reply::CompleteMinimal => Json(json!({
                "messages": [{"status": "complete", "attestation": "0xAA", "eventNonce": "123"}]
            }))
            .into_response(),
            Reply::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Json(complete_body()).into_response()
            }
        }
    }

    /// Serve the scripted attestation API on an ephemeral local port
    pub async fn spawn_iris(script: Vec<Reply>) -> (String, IrisState) {
        let state = IrisState {
            script: Arc::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/v2/messages/{domain}", get(messages))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), state)
    }

    /// Destination chain that tracks a single nonce slot
    pub struct FakeDestination {
        pub used: AtomicBool,
        pub submissions: AtomicUsize,
        pub revert_and_mark_used: bool,
    }

    impl FakeDestination {
        pub fn new(used: bool) -> Self {
            Self {
                used: AtomicBool::new(used),
                submissions: AtomicUsize::new(0),
                revert_and_mark_used: false,
            }
        }
    }

    #[async_trait]
    impl DestinationChain for FakeDestination {
        async fn used_nonces(&self, _transmitter: Address, _nonce: B256) -> Result<U256> {
            Ok(U256::from(self.used.load(Ordering::SeqCst) as u8))
        }

        async fn receive_message(
            &self,
            _transmitter: Address,
            _message: Bytes,
            attestation: Bytes,
        ) -> Result<SubmissionReceipt> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            assert_eq!(attestation, Bytes::from(vec![0xaa]));
            if self.revert_and_mark_used {
                self.used.store(true, Ordering::SeqCst);
                return Err(eyre!("execution reverted: Nonce already used"));
            }
            self.used.store(true, Ordering::SeqCst);
            Ok(SubmissionReceipt {
                tx_hash: B256::repeat_byte(0xde),
                block_number: Some(1),
            })
        }
    }
}

use helpers::{spawn_iris, FakeDestination, Reply};

fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(20),
        max_attempts,
        request_timeout: Duration::from_millis(300),
    }
}

fn build_completer(
    host: &str,
    dest: Arc<FakeDestination>,
    max_attempts: u32,
) -> (TransferCompleter, Arc<RelayMetrics>) {
    let registry = Arc::new(DomainRegistry::builtin(false));
    let metrics = Arc::new(RelayMetrics::new());
    let source_domain = registry.domain_for_chain(1).unwrap();
    let destination_domain = registry.domain_for_chain(8453).unwrap();
    let oracle = IdempotencyOracle::new(registry.clone(), dest.clone());
    let iris = Arc::new(IrisClient::with_host(host).unwrap());
    let attestation =
        AttestationClient::new(iris, oracle.clone(), destination_domain, metrics.clone());
    let completer = TransferCompleter::new(
        attestation,
        oracle,
        registry,
        SubmissionQueue::spawn(dest),
        source_domain,
        destination_domain,
        policy(max_attempts),
        metrics.clone(),
    );
    (completer, metrics)
}

fn burn_hash() -> B256 {
    B256::repeat_byte(0x42)
}

#[tokio::test]
async fn test_pending_then_complete_confirms_after_two_polls() {
    let (host, iris) = spawn_iris(vec![Reply::Pending, Reply::Complete]).await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, metrics) = build_completer(&host, dest.clone(), 10);

    let outcome = completer.complete(burn_hash()).await;

    match outcome {
        TransferOutcome::Confirmed { receipt } => {
            assert_eq!(receipt.tx_hash, B256::repeat_byte(0xde))
        }
        other => panic!("expected confirmed, got {other:?}"),
    }
    assert_eq!(iris.calls.load(Ordering::SeqCst), 2);
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.attestation_attempts_total.get(), 2);

    let seen = iris.seen.lock().unwrap();
    assert_eq!(seen[0].0, 0);
    assert_eq!(seen[0].1, format!("{}", burn_hash()));
}

#[tokio::test]
async fn test_minimal_complete_body_confirms_after_two_polls() {
    let (host, iris) = spawn_iris(vec![Reply::Pending, Reply::CompleteMinimal]).await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, _) = build_completer(&host, dest.clone(), 60);

    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(outcome, TransferOutcome::Confirmed { .. }), "{outcome:?}");
    assert_eq!(iris.calls.load(Ordering::SeqCst), 2);
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_not_found_and_server_errors_are_retried() {
    let (host, iris) = spawn_iris(vec![
        Reply::NotFound,
        Reply::ServerError,
        Reply::Pending,
        Reply::Complete,
    ])
    .await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, _) = build_completer(&host, dest, 10);

    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(outcome, TransferOutcome::Confirmed { .. }));
    assert_eq!(iris.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_never_complete_times_out_after_exact_attempts() {
    let (host, iris) = spawn_iris(vec![Reply::NotFound]).await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, _) = build_completer(&host, dest.clone(), 3);

    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(
        outcome,
        TransferOutcome::Failed {
            reason: RelayError::AttestationTimeout { attempts: 3 }
        }
    ));
    assert_eq!(iris.calls.load(Ordering::SeqCst), 3);
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hung_request_is_abandoned_and_retried() {
    let (host, iris) = spawn_iris(vec![Reply::Slow(Duration::from_secs(5)), Reply::Complete]).await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, _) = build_completer(&host, dest, 5);

    let started = std::time::Instant::now();
    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(outcome, TransferOutcome::Confirmed { .. }));
    assert_eq!(iris.calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_used_nonce_short_circuits() {
    let (host, _iris) = spawn_iris(vec![Reply::Complete]).await;
    let dest = Arc::new(FakeDestination::new(true));
    let (completer, metrics) = build_completer(&host, dest.clone(), 5);

    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(outcome, TransferOutcome::AlreadyFinalized));
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.outcome_count("already_finalized"), 1);
}

#[tokio::test]
async fn test_lost_race_is_already_finalized() {
    let (host, _iris) = spawn_iris(vec![Reply::Complete]).await;
    let mut dest = FakeDestination::new(false);
    dest.revert_and_mark_used = true;
    let dest = Arc::new(dest);
    let (completer, _) = build_completer(&host, dest.clone(), 5);

    let outcome = completer.complete(burn_hash()).await;

    assert!(matches!(outcome, TransferOutcome::AlreadyFinalized));
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_iris_client_parses_decoded_body() {
    let (host, _iris) = spawn_iris(vec![Reply::Complete]).await;
    let client = IrisClient::with_host(&host).unwrap();

    let response = client.query(0, burn_hash()).await.unwrap();

    let msg = &response.messages[0];
    assert_eq!(msg.status, "complete");
    assert_eq!(msg.event_nonce.as_deref(), Some("123"));
    let body = msg
        .decoded_message
        .as_ref()
        .and_then(|d| d.decoded_message_body.as_ref())
        .unwrap();
    assert_eq!(body.amount.as_deref(), Some("1000000"));
}

/// Serves a fixed set of Bridge events at a fixed head
struct StaticBurns {
    head: u64,
    events: Vec<BurnEvent>,
}

#[async_trait::async_trait]
impl BurnEventSource for StaticBurns {
    async fn latest_block(&self) -> eyre::Result<u64> {
        Ok(self.head)
    }

    async fn burn_events(&self, from_block: u64, to_block: u64) -> eyre::Result<Vec<BurnEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.block_number.is_some_and(|b| b >= from_block && b <= to_block))
            .cloned()
            .collect())
    }
}

fn burn(tx: u8, block: u64) -> BurnEvent {
    BurnEvent {
        token: Address::repeat_byte(0x01),
        destination_domain: 6,
        receiver: Address::repeat_byte(0x02),
        amount: alloy::primitives::U256::from(1_000u64),
        nonce: tx as u64,
        speed: SpeedClass::Standard,
        source_tx_hash: B256::repeat_byte(tx),
        block_number: Some(block),
        log_index: Some(0),
    }
}

#[tokio::test]
async fn test_watcher_completes_each_burn_once() {
    let (host, iris) = spawn_iris(vec![Reply::Complete]).await;
    let dest = Arc::new(FakeDestination::new(false));
    let (completer, metrics) = build_completer(&host, dest.clone(), 5);

    // Same burn tx logged twice, plus one burn for another domain
    let mut other_domain = burn(3, 12);
    other_domain.destination_domain = 3;
    let source = Arc::new(StaticBurns {
        head: 20,
        events: vec![burn(1, 10), burn(1, 10), other_domain],
    });

    let config = WatcherConfig {
        poll_interval: Duration::from_millis(50),
        max_block_range: 5,
        max_concurrent: 2,
        start_block: Some(1),
        destination_domain: Some(6),
        ..Default::default()
    };
    let mut watcher = BurnEventWatcher::new(source, config, metrics.clone());
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);

    let handle = tokio::spawn(async move {
        watcher
            .watch(
                move |event: BurnEvent| {
                    let completer = completer.clone();
                    async move { completer.complete(event.source_tx_hash).await }
                },
                shutdown_rx,
            )
            .await
    });

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(()).await.unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(iris.calls.load(Ordering::SeqCst), 1);
    assert_eq!(dest.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.outcome_count("confirmed"), 1);
    assert_eq!(metrics.burn_events_total.get(), 3);
    assert_eq!(metrics.last_source_block.get(), 20);
}
