//! Source chain Bridge event watcher
//!
//! Polls the source chain for `Bridge` logs emitted by the bridge contract and
//! hands each burn to a completion callback. Completions run concurrently on a
//! `JoinSet`, bounded by a semaphore, so a burst of events never spawns more
//! than `max_concurrent` transfers at once.
//!
//! The loop runs until the shutdown channel fires. Shutdown stops polling and
//! waits for in-flight completions: a submitted transaction cannot be aborted.
//!
//! There is no durable cursor. On start the watcher scans from `start_block`
//! (or from the next new block), and the dispatch cache suppresses repeats of
//! the same burn transaction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::bounded_cache::{
    BoundedHashCache, DEFAULT_DISPATCH_CACHE_SIZE, DEFAULT_DISPATCH_CACHE_TTL,
};
use crate::completer::report_outcome;
use crate::contracts::CctpBridge;
use crate::metrics::RelayMetrics;
use crate::types::{BurnEvent, SpeedClass, TransferOutcome};

/// Block source for Bridge events
#[async_trait]
pub trait BurnEventSource: Send + Sync {
    /// Latest block number on the source chain
    async fn latest_block(&self) -> Result<u64>;

    /// Bridge events in `[from_block, to_block]`, in log order
    async fn burn_events(&self, from_block: u64, to_block: u64) -> Result<Vec<BurnEvent>>;
}

/// Bridge event source backed by an HTTP JSON-RPC endpoint
pub struct EvmBurnSource {
    provider: RootProvider<Http<Client>>,
    bridge_address: Address,
}

impl EvmBurnSource {
    pub fn new(rpc_url: Url, bridge_address: Address) -> Self {
        let provider = ProviderBuilder::new().on_http(rpc_url);
        Self {
            provider,
            bridge_address,
        }
    }

    pub fn bridge_address(&self) -> Address {
        self.bridge_address
    }
}

#[async_trait]
impl BurnEventSource for EvmBurnSource {
    async fn latest_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .wrap_err("Failed to get block number")
    }

    async fn burn_events(&self, from_block: u64, to_block: u64) -> Result<Vec<BurnEvent>> {
        let filter = Filter::new()
            .address(self.bridge_address)
            .event_signature(CctpBridge::Bridge::SIGNATURE_HASH)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .wrap_err("Failed to get logs")?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match parse_bridge_log(log) {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(
                        tx_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        error = %e,
                        "Failed to parse Bridge log"
                    );
                }
            }
        }
        Ok(events)
    }
}

/// Decode a `Bridge` log into a [`BurnEvent`]
pub fn parse_bridge_log(log: &Log) -> Result<BurnEvent> {
    let decoded = log
        .log_decode::<CctpBridge::Bridge>()
        .map_err(|e| eyre!("Failed to decode Bridge event: {}", e))?;
    let event = &decoded.inner.data;

    let source_tx_hash = log
        .transaction_hash
        .ok_or_else(|| eyre!("Missing transaction hash"))?;

    Ok(BurnEvent {
        token: event.token,
        destination_domain: event.destinationDomain,
        receiver: event.receiver,
        amount: event.amount,
        nonce: event.nonce,
        speed: SpeedClass::from_raw(event.speed),
        source_tx_hash,
        block_number: log.block_number,
        log_index: log.log_index,
    })
}

/// Watcher settings
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Delay between source chain polls
    pub poll_interval: Duration,
    /// Largest block span requested in one `eth_getLogs`
    pub max_block_range: u64,
    /// Completions allowed to run at once
    pub max_concurrent: usize,
    /// First block to scan; `None` starts at the next new block
    pub start_block: Option<u64>,
    /// Only dispatch events bound for this domain
    pub destination_domain: Option<u32>,
    pub dispatch_cache_size: usize,
    pub dispatch_cache_ttl: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(4000),
            max_block_range: 2000,
            max_concurrent: 4,
            start_block: None,
            destination_domain: None,
            dispatch_cache_size: DEFAULT_DISPATCH_CACHE_SIZE,
            dispatch_cache_ttl: DEFAULT_DISPATCH_CACHE_TTL,
        }
    }
}

pub struct BurnEventWatcher {
    source: Arc<dyn BurnEventSource>,
    config: WatcherConfig,
    metrics: Arc<RelayMetrics>,
    dispatched: BoundedHashCache,
    next_block: Option<u64>,
}

impl BurnEventWatcher {
    pub fn new(
        source: Arc<dyn BurnEventSource>,
        config: WatcherConfig,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        let dispatched =
            BoundedHashCache::new(config.dispatch_cache_size, config.dispatch_cache_ttl);
        Self {
            source,
            next_block: config.start_block,
            config,
            metrics,
            dispatched,
        }
    }

    /// Next block the watcher will scan, once known
    pub fn next_block(&self) -> Option<u64> {
        self.next_block
    }

    /// Watch until `shutdown` fires, calling `on_event` for every new burn
    ///
    /// Errors from the source chain are logged and retried on the next poll;
    /// this only returns after shutdown, once in-flight completions finish.
    pub async fn watch<F, Fut>(
        &mut self,
        on_event: F,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<()>
    where
        F: Fn(BurnEvent) -> Fut,
        Fut: Future<Output = TransferOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut tasks: JoinSet<(B256, TransferOutcome)> = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            start_block = ?self.config.start_block,
            max_concurrent = self.config.max_concurrent,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Burn event watcher started"
        );

        'watch: loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping watcher");
                    break 'watch;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    reap(joined);
                }
                _ = ticker.tick() => {
                    let events = self.scan().await;
                    for event in events {
                        if !self.should_dispatch(&event) {
                            continue;
                        }

                        let permit = tokio::select! {
                            permit = semaphore.clone().acquire_owned() => {
                                permit.map_err(|_| eyre!("Watcher semaphore closed"))?
                            }
                            _ = shutdown.recv() => {
                                info!("Shutdown received while dispatching, stopping watcher");
                                break 'watch;
                            }
                        };

                        let tx_hash = event.source_tx_hash;
                        let completion = on_event(event);
                        tasks.spawn(async move {
                            let outcome = completion.await;
                            drop(permit);
                            (tx_hash, outcome)
                        });
                    }
                }
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight transfers to finish");
        }
        while let Some(joined) = tasks.join_next().await {
            reap(joined);
        }

        info!(next_block = ?self.next_block, "Burn event watcher stopped");
        Ok(())
    }

    /// Scan new blocks in chunks of at most `max_block_range`
    ///
    /// A failing chunk stops the scan; the cursor stays on it so the next
    /// poll retries from there.
    async fn scan(&mut self) -> Vec<BurnEvent> {
        let latest = match self.source.latest_block().await {
            Ok(block) => block,
            Err(e) => {
                warn!(error = %e, "Failed to read source chain head");
                return Vec::new();
            }
        };

        let mut from = *self.next_block.get_or_insert(latest.saturating_add(1));
        let max_range = self.config.max_block_range.max(1);
        let mut events = Vec::new();

        while from <= latest {
            let to = from.saturating_add(max_range - 1).min(latest);
            match self.source.burn_events(from, to).await {
                Ok(mut found) => {
                    if !found.is_empty() {
                        debug!(
                            from_block = from,
                            to_block = to,
                            count = found.len(),
                            "Bridge events found"
                        );
                    }
                    events.append(&mut found);
                    self.next_block = Some(to + 1);
                    self.metrics.last_source_block.set(to as i64);
                    from = to + 1;
                }
                Err(e) => {
                    warn!(
                        from_block = from,
                        to_block = to,
                        error = %e,
                        "Failed to scan block range"
                    );
                    break;
                }
            }
        }

        events
    }

    fn should_dispatch(&mut self, event: &BurnEvent) -> bool {
        self.metrics.burn_events_total.inc();

        if let Some(domain) = self.config.destination_domain {
            if event.destination_domain != domain {
                debug!(
                    tx_hash = %event.source_tx_hash,
                    destination_domain = event.destination_domain,
                    "Skipping burn for another destination domain"
                );
                return false;
            }
        }

        if !self.dispatched.insert(event.source_tx_hash) {
            debug!(tx_hash = %event.source_tx_hash, "Burn already dispatched");
            return false;
        }

        info!(
            tx_hash = %event.source_tx_hash,
            block_number = ?event.block_number,
            token = %event.token,
            receiver = %event.receiver,
            amount = %event.amount,
            bridge_nonce = event.nonce,
            speed = %event.speed,
            destination_domain = event.destination_domain,
            "New burn detected"
        );
        true
    }
}

fn reap(joined: std::result::Result<(B256, TransferOutcome), JoinError>) {
    match joined {
        Ok((tx_hash, outcome)) => report_outcome(tx_hash, &outcome),
        Err(e) => error!(error = %e, "Transfer task panicked"),
    }
}
