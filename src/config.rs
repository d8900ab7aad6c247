//! Relayer configuration
//!
//! Command line flags select the route and the mode; secrets and endpoints
//! come from the environment (optionally via `.env`). Everything is
//! validated here, before any network activity.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use clap::{ArgGroup, Parser};
use url::Url;

use crate::attestation::iris::{IRIS_API_MAINNET, IRIS_API_SANDBOX};
use crate::attestation::PollPolicy;
use crate::domains::DomainRegistry;
use crate::error::RelayError;
use crate::types::parse_tx_hash;

const DEFAULT_WATCH_POLL_INTERVAL_MS: u64 = 4000;

/// Command line interface
#[derive(Parser, Debug, Clone)]
#[command(name = "cctp-relayer")]
#[command(about = "Completes CCTP V2 transfers on the destination chain", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["tx", "watch"])))]
pub struct Cli {
    /// Source chain id (native EVM chain id)
    #[arg(long)]
    pub source: u64,

    /// Destination chain id (native EVM chain id)
    #[arg(long)]
    pub dest: u64,

    /// Complete a single burn transaction and exit
    #[arg(long, value_name = "TX_HASH")]
    pub tx: Option<String>,

    /// Watch a bridge contract for Bridge events
    #[arg(long, value_name = "BRIDGE_ADDRESS")]
    pub watch: Option<String>,

    /// Use the sandbox attestation service and testnet contracts
    #[arg(long)]
    pub testnet: bool,

    /// Attestation poll interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub interval: u64,

    /// Maximum attestation poll attempts
    #[arg(long, default_value_t = 60)]
    pub retries: u32,

    /// Timeout for one attestation request in milliseconds
    #[arg(long, default_value_t = 10_000)]
    pub request_timeout: u64,

    /// Transfers completed concurrently in watch mode
    #[arg(long, default_value_t = 4)]
    pub max_concurrent: usize,

    /// First source block to scan in watch mode
    #[arg(long)]
    pub from_block: Option<u64>,
}

/// Raw environment values
#[derive(Clone, Default)]
pub struct EnvSettings {
    pub private_key: Option<String>,
    pub source_rpc_url: Option<String>,
    pub dest_rpc_url: Option<String>,
    pub attestation_api_url: Option<String>,
    pub watch_poll_interval_ms: Option<String>,
    pub metrics_port: Option<String>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self {
            private_key: env::var("PRIVATE_KEY").ok(),
            source_rpc_url: env::var("SOURCE_RPC_URL").ok(),
            dest_rpc_url: env::var("DEST_RPC_URL").ok(),
            attestation_api_url: env::var("ATTESTATION_API_URL").ok(),
            watch_poll_interval_ms: env::var("WATCH_POLL_INTERVAL_MS").ok(),
            metrics_port: env::var("METRICS_PORT").ok(),
        }
    }
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for EnvSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSettings")
            .field("private_key", &"<redacted>")
            .field("source_rpc_url", &self.source_rpc_url)
            .field("dest_rpc_url", &self.dest_rpc_url)
            .field("attestation_api_url", &self.attestation_api_url)
            .field("watch_poll_interval_ms", &self.watch_poll_interval_ms)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

/// What the relayer does once started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMode {
    /// Complete one burn transaction
    Once { tx_hash: B256 },
    /// Watch a bridge contract indefinitely
    Watch { bridge: Address },
}

/// Validated configuration
#[derive(Clone)]
pub struct Config {
    pub source_chain_id: u64,
    pub dest_chain_id: u64,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub testnet: bool,
    pub mode: RelayMode,
    /// 0x-prefixed signing key for the destination chain
    pub private_key: String,
    pub source_rpc_url: Url,
    pub dest_rpc_url: Url,
    pub attestation_host: String,
    pub poll: PollPolicy,
    pub watch_poll_interval: Duration,
    pub max_concurrent: usize,
    pub from_block: Option<u64>,
    /// Health/metrics server port (watch mode only)
    pub metrics_port: Option<u16>,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("source_chain_id", &self.source_chain_id)
            .field("dest_chain_id", &self.dest_chain_id)
            .field("source_domain", &self.source_domain)
            .field("destination_domain", &self.destination_domain)
            .field("testnet", &self.testnet)
            .field("mode", &self.mode)
            .field("private_key", &"<redacted>")
            .field("source_rpc_url", &self.source_rpc_url.as_str())
            .field("dest_rpc_url", &self.dest_rpc_url.as_str())
            .field("attestation_host", &self.attestation_host)
            .field("poll", &self.poll)
            .field("watch_poll_interval", &self.watch_poll_interval)
            .field("max_concurrent", &self.max_concurrent)
            .field("from_block", &self.from_block)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Config {
    /// Load `.env` (if present) and the process environment, then validate
    pub fn load(cli: Cli, registry: &DomainRegistry) -> Result<Self, RelayError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_parts(cli, EnvSettings::from_env(), registry)
    }

    /// Validate CLI flags and environment values
    pub fn from_parts(
        cli: Cli,
        env: EnvSettings,
        registry: &DomainRegistry,
    ) -> Result<Self, RelayError> {
        let source_domain = registry.domain_for_chain(cli.source)?;
        let destination_domain = registry.domain_for_chain(cli.dest)?;

        let mode = match (&cli.tx, &cli.watch) {
            (Some(tx), None) => RelayMode::Once {
                tx_hash: parse_tx_hash(tx)?,
            },
            (None, Some(bridge)) => RelayMode::Watch {
                bridge: Address::from_str(bridge.trim()).map_err(|_| {
                    RelayError::InvalidConfig(format!("invalid bridge address: {bridge:?}"))
                })?,
            },
            _ => {
                return Err(RelayError::InvalidConfig(
                    "exactly one of --tx or --watch is required".to_string(),
                ))
            }
        };

        if cli.retries == 0 {
            return Err(RelayError::InvalidConfig("--retries must be at least 1".to_string()));
        }
        if cli.max_concurrent == 0 {
            return Err(RelayError::InvalidConfig(
                "--max-concurrent must be at least 1".to_string(),
            ));
        }
        if cli.request_timeout == 0 {
            return Err(RelayError::InvalidConfig(
                "--request-timeout must be greater than 0".to_string(),
            ));
        }

        let private_key = normalize_private_key(&required(env.private_key, "PRIVATE_KEY")?)?;
        let source_rpc_url = parse_url(
            &required(env.source_rpc_url, "SOURCE_RPC_URL")?,
            "SOURCE_RPC_URL",
        )?;
        let dest_rpc_url =
            parse_url(&required(env.dest_rpc_url, "DEST_RPC_URL")?, "DEST_RPC_URL")?;

        let attestation_host = match env.attestation_api_url {
            Some(host) if !host.trim().is_empty() => {
                parse_url(&host, "ATTESTATION_API_URL")?;
                host.trim().trim_end_matches('/').to_string()
            }
            _ if cli.testnet => IRIS_API_SANDBOX.to_string(),
            _ => IRIS_API_MAINNET.to_string(),
        };

        let watch_poll_interval_ms = match env.watch_poll_interval_ms {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|&ms| ms > 0).ok_or_else(|| {
                RelayError::InvalidConfig(format!("invalid WATCH_POLL_INTERVAL_MS: {raw:?}"))
            })?,
            None => DEFAULT_WATCH_POLL_INTERVAL_MS,
        };

        let metrics_port = env
            .metrics_port
            .map(|raw| {
                raw.trim().parse::<u16>().map_err(|_| {
                    RelayError::InvalidConfig(format!("invalid METRICS_PORT: {raw:?}"))
                })
            })
            .transpose()?;

        Ok(Self {
            source_chain_id: cli.source,
            dest_chain_id: cli.dest,
            source_domain,
            destination_domain,
            testnet: cli.testnet,
            mode,
            private_key,
            source_rpc_url,
            dest_rpc_url,
            attestation_host,
            poll: PollPolicy {
                interval: Duration::from_millis(cli.interval),
                max_attempts: cli.retries,
                request_timeout: Duration::from_millis(cli.request_timeout),
            },
            watch_poll_interval: Duration::from_millis(watch_poll_interval_ms),
            max_concurrent: cli.max_concurrent,
            from_block: cli.from_block,
            metrics_port,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, RelayError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            RelayError::InvalidConfig(format!("{name} environment variable is required"))
        })
}

fn parse_url(raw: &str, name: &str) -> Result<Url, RelayError> {
    Url::parse(raw.trim()).map_err(|e| RelayError::InvalidConfig(format!("invalid {name}: {e}")))
}

/// Accept the key with or without `0x`; require 32 bytes of hex
fn normalize_private_key(raw: &str) -> Result<String, RelayError> {
    let trimmed = raw.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_part.len() != 64 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(RelayError::InvalidConfig(
            "PRIVATE_KEY must be 32 bytes of hex (64 chars, optional 0x prefix)".to_string(),
        ));
    }
    Ok(format!("0x{hex_part}"))
}
