//! CCTP V2 Transfer Relayer
//!
//! Completes Circle CCTP burn-and-mint transfers on the destination chain.
//!
//! # Modes
//!
//! - `--tx <hash>`: complete one burn transaction and exit. Exits non-zero if
//!   the transfer fails.
//! - `--watch <bridge>`: poll the source chain for Bridge events and complete
//!   each burn until SIGINT/SIGTERM.
//!
//! # Idempotency
//!
//! Every completion checks `usedNonces` before submitting and again after a
//! failed submission, so several relayers (or repeated manual runs) can race
//! on the same transfer without double submission.

use std::sync::Arc;

use cctp_relayer::attestation::{AttestationClient, IrisClient};
use cctp_relayer::chain::{DestinationChain, EvmDestination};
use cctp_relayer::completer::{report_outcome, TransferCompleter};
use cctp_relayer::config::{Cli, Config, RelayMode};
use cctp_relayer::domains::DomainRegistry;
use cctp_relayer::idempotency::IdempotencyOracle;
use cctp_relayer::metrics::RelayMetrics;
use cctp_relayer::server::{self, AppState, RouteInfo};
use cctp_relayer::submission::SubmissionQueue;
use cctp_relayer::types::{BurnEvent, TransferOutcome};
use cctp_relayer::watcher::{BurnEventWatcher, EvmBurnSource, WatcherConfig};
use clap::Parser;
use eyre::eyre;
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let registry = DomainRegistry::builtin(cli.testnet);
    let config = Config::load(cli, &registry)?;

    info!(
        source_chain_id = config.source_chain_id,
        dest_chain_id = config.dest_chain_id,
        source_domain = config.source_domain,
        destination_domain = config.destination_domain,
        testnet = config.testnet,
        attestation_host = %config.attestation_host,
        "Starting CCTP relayer"
    );

    let registry = Arc::new(registry);
    let metrics = Arc::new(RelayMetrics::new());

    let destination: Arc<dyn DestinationChain> = Arc::new(EvmDestination::new(
        config.dest_rpc_url.clone(),
        config.dest_chain_id,
        &config.private_key,
    )?);
    let oracle = IdempotencyOracle::new(registry.clone(), destination.clone());
    let iris = Arc::new(IrisClient::with_host(&config.attestation_host)?);
    let attestation = AttestationClient::new(
        iris,
        oracle.clone(),
        config.destination_domain,
        metrics.clone(),
    );
    let queue = SubmissionQueue::spawn(destination);

    let completer = TransferCompleter::new(
        attestation,
        oracle,
        registry,
        queue,
        config.source_domain,
        config.destination_domain,
        config.poll.clone(),
        metrics.clone(),
    );

    match config.mode {
        RelayMode::Once { tx_hash } => {
            info!(tx_hash = %tx_hash, "Completing transfer");
            let outcome = completer.complete(tx_hash).await;
            report_outcome(tx_hash, &outcome);
            if let TransferOutcome::Failed { reason } = outcome {
                return Err(eyre!("Transfer {} failed: {}", tx_hash, reason));
            }
        }
        RelayMode::Watch { bridge } => {
            if let Some(port) = config.metrics_port {
                let state = AppState {
                    route: RouteInfo {
                        source_chain_id: config.source_chain_id,
                        dest_chain_id: config.dest_chain_id,
                        source_domain: config.source_domain,
                        destination_domain: config.destination_domain,
                    },
                    metrics: metrics.clone(),
                };
                tokio::spawn(async move {
                    if let Err(e) = server::start_server("0.0.0.0", port, state).await {
                        error!(error = %e, "Health server stopped");
                    }
                });
            }

            // Create shutdown channel
            let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

            // Handle signals
            tokio::spawn(async move {
                wait_for_shutdown_signal().await;
                let _ = shutdown_tx.send(()).await;
            });

            let source = Arc::new(EvmBurnSource::new(config.source_rpc_url.clone(), bridge));
            let watcher_config = WatcherConfig {
                poll_interval: config.watch_poll_interval,
                max_concurrent: config.max_concurrent,
                start_block: config.from_block,
                destination_domain: Some(config.destination_domain),
                ..Default::default()
            };
            info!(bridge = %bridge, "Watching for Bridge events");

            let mut watcher = BurnEventWatcher::new(source, watcher_config, metrics);
            watcher
                .watch(
                    move |event: BurnEvent| {
                        let completer = completer.clone();
                        async move { completer.complete(event.source_tx_hash).await }
                    },
                    shutdown_rx,
                )
                .await?;
        }
    }

    info!("CCTP relayer stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cctp_relayer=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
