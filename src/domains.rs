//! CCTP domain registry
//!
//! Maps native EVM chain ids to CCTP domain ids, and domains to the
//! MessageTransmitterV2 contract that finalizes transfers into them.
//! The tables are built once at startup and never mutated, so the registry
//! is shared behind an `Arc` without synchronization.

use std::collections::HashMap;

use alloy::primitives::{address, Address};

use crate::error::RelayError;

/// MessageTransmitterV2 address on every supported mainnet
pub const MAINNET_MESSAGE_TRANSMITTER: Address =
    address!("81D40F21F12A8F0E3252Bccb954D722d4c464B64");

/// MessageTransmitterV2 address on every supported testnet
pub const SANDBOX_MESSAGE_TRANSMITTER: Address =
    address!("E737e5cEBEEBa77EFE34D4aa090756590b1CE275");

/// Native chain id -> CCTP domain id
pub const CHAIN_DOMAINS: &[(u64, u32)] = &[
    (1, 0),       // Ethereum
    (10, 2),      // Optimism
    (42161, 3),   // Arbitrum
    (137, 7),     // Polygon
    (43114, 1),   // Avalanche
    (8453, 6),    // Base
    (59144, 11),  // Linea
    (130, 12),    // Codex
    (146, 13),    // Sonic
    (480, 14),    // World Chain
    (1301, 15),   // Unichain testnet
    (534352, 16), // Sei
    (56, 17),     // BNB Smart Chain
    (50, 18),     // XDC
    (999, 19),    // HyperEVM
    (57073, 21),  // Ink
    (98866, 22),  // Plume
    // Testnets
    (11155111, 0), // Sepolia
    (43113, 1),    // Avalanche Fuji
    (11155420, 2), // OP Sepolia
    (421614, 3),   // Arbitrum Sepolia
    (84532, 6),    // Base Sepolia
    (80002, 7),    // Polygon Amoy
    (59141, 11),   // Linea Sepolia
];

/// Domains with a deployed MessageTransmitterV2
pub const TRANSMITTER_DOMAINS: &[u32] = &[0, 1, 2, 3, 6, 7, 10, 11];

/// Immutable chain/domain lookup tables
#[derive(Debug, Clone)]
pub struct DomainRegistry {
    chain_domains: HashMap<u64, u32>,
    transmitters: HashMap<u32, Address>,
}

impl DomainRegistry {
    /// Build a registry from explicit tables
    pub fn new(
        chain_domains: impl IntoIterator<Item = (u64, u32)>,
        transmitters: impl IntoIterator<Item = (u32, Address)>,
    ) -> Self {
        Self {
            chain_domains: chain_domains.into_iter().collect(),
            transmitters: transmitters.into_iter().collect(),
        }
    }

    /// Registry backed by the built-in tables, pointing at the production
    /// or sandbox MessageTransmitter deployment
    pub fn builtin(testnet: bool) -> Self {
        let transmitter = if testnet {
            SANDBOX_MESSAGE_TRANSMITTER
        } else {
            MAINNET_MESSAGE_TRANSMITTER
        };
        Self::new(
            CHAIN_DOMAINS.iter().copied(),
            TRANSMITTER_DOMAINS.iter().map(|&d| (d, transmitter)),
        )
    }

    /// CCTP domain for a native chain id
    pub fn domain_for_chain(&self, chain_id: u64) -> Result<u32, RelayError> {
        self.chain_domains
            .get(&chain_id)
            .copied()
            .ok_or(RelayError::UnknownChain(chain_id))
    }

    /// Finalization contract for a domain, or `None` if the domain is unsupported
    pub fn transmitter_for(&self, domain: u32) -> Option<Address> {
        self.transmitters.get(&domain).copied()
    }
}
